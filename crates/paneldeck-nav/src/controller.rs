#![forbid(unsafe_code)]

//! Keyboard Navigation Controller.
//!
//! A layered input state machine over the workspace:
//!
//! ```text
//!   key ──► gate (shortcuts enabled, no dialog) ──► shortcut registry
//!              │                                        │
//!              │                         toggle layout / header mode
//!              ▼
//!        active mode (layout | header) ──► sidebar ──► focus-zone Tab
//! ```
//!
//! # Invariants
//!
//! - At most one navigation mode is active; entering one exits the other.
//! - A closed gate tears down any active mode before the key is examined.
//! - The overlay is recomputed after every handled key and on
//!   [`KeyboardNavController::refresh_overlay`].

use std::rc::Rc;

use paneldeck_core::event::{KeyCode, KeyEvent, Platform};
use paneldeck_core::geometry::{GeometrySource, Rect};
use paneldeck_core::ids::PanelId;
use paneldeck_core::prefs::Preferences;
use paneldeck_workspace::WorkspaceController;

use crate::focus::{ConfirmDialog, DialogManager, FocusZone, SessionSidebar};
use crate::paging::{badges, index_for_digit, next_page, page_of, page_range};
use crate::shortcuts::{EnabledPredicate, NavCommand, ShortcutRegistry};
use crate::spatial::{Direction, find_spatial_neighbor};

// =========================================================================
// Workspace seam
// =========================================================================

/// The workspace operations navigation drives.
pub trait NavWorkspace {
    /// Visible tree panels in document order.
    fn visible_panel_ids(&self) -> Vec<PanelId>;
    fn active_panel_id(&self) -> Option<PanelId>;
    fn activate_panel(&mut self, panel_id: &PanelId) -> bool;
    /// Rotate the tab stack holding `panel_id`; returns its new active tab.
    fn cycle_tab(&mut self, panel_id: &PanelId, forward: bool) -> Option<PanelId>;
    fn toggle_split_view(&mut self, panel_id: &PanelId) -> bool;
    fn header_panel_ids(&self) -> Vec<PanelId>;
    /// Returns whether the popover now shows `panel_id`.
    fn toggle_header_panel(&mut self, panel_id: &PanelId) -> bool;
    fn header_popover(&self) -> Option<PanelId>;
    fn close_header_popover(&mut self) -> Option<PanelId>;
    /// Live bounding rectangle of a panel frame.
    fn panel_rect(&self, panel_id: &PanelId) -> Option<Rect>;
}

impl NavWorkspace for WorkspaceController {
    fn visible_panel_ids(&self) -> Vec<PanelId> {
        WorkspaceController::visible_panel_ids(self)
    }

    fn active_panel_id(&self) -> Option<PanelId> {
        WorkspaceController::active_panel_id(self).cloned()
    }

    fn activate_panel(&mut self, panel_id: &PanelId) -> bool {
        WorkspaceController::activate_panel(self, panel_id)
    }

    fn cycle_tab(&mut self, panel_id: &PanelId, forward: bool) -> Option<PanelId> {
        WorkspaceController::cycle_tab(self, panel_id, forward)
    }

    fn toggle_split_view(&mut self, panel_id: &PanelId) -> bool {
        self.toggle_split_view_mode_for_panel_id(panel_id)
    }

    fn header_panel_ids(&self) -> Vec<PanelId> {
        self.list_header_panel_ids()
    }

    fn toggle_header_panel(&mut self, panel_id: &PanelId) -> bool {
        self.toggle_header_panel_by_id(panel_id)
    }

    fn header_popover(&self) -> Option<PanelId> {
        WorkspaceController::header_popover(self).cloned()
    }

    fn close_header_popover(&mut self) -> Option<PanelId> {
        WorkspaceController::close_header_popover(self)
    }

    fn panel_rect(&self, panel_id: &PanelId) -> Option<Rect> {
        GeometrySource::panel_rect(self, panel_id)
    }
}

struct Live<'a>(&'a dyn NavWorkspace);

impl GeometrySource for Live<'_> {
    fn panel_rect(&self, panel_id: &PanelId) -> Option<Rect> {
        self.0.panel_rect(panel_id)
    }
}

// =========================================================================
// State
// =========================================================================

/// Selection while layout navigation is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutNavState {
    pub panel_id: PanelId,
    pub page: usize,
}

/// Paging state while header navigation is active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderNavState {
    pub page: usize,
    /// Panel most recently reached with an arrow key; `Enter` activates it.
    pub last_arrowed: Option<PanelId>,
}

/// The active navigation mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavMode {
    Layout(LayoutNavState),
    Header(HeaderNavState),
}

/// Numbered badge drawn over a panel or header button.
#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub number: u8,
    pub panel_id: PanelId,
    /// `None` for header buttons or panels without a frame.
    pub rect: Option<Rect>,
}

/// What the overlay should draw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavOverlay {
    pub highlight: Option<Rect>,
    pub badges: Vec<Badge>,
}

impl NavOverlay {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.highlight.is_none() && self.badges.is_empty()
    }
}

/// Side effects for the caller to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEffect {
    /// Show this session in the input zone.
    SelectSession(String),
    TogglePin(String),
    /// Move DOM focus to this zone.
    Focus(FocusZone),
}

/// Outcome of [`KeyboardNavController::handle_key`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavResponse {
    /// The key was consumed; the caller should prevent its default action.
    pub handled: bool,
    pub effects: Vec<NavEffect>,
}

impl NavResponse {
    #[must_use]
    pub fn ignored() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn consumed() -> Self {
        Self {
            handled: true,
            effects: Vec::new(),
        }
    }

    #[must_use]
    fn effect(mut self, effect: NavEffect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Input-zone facts the controller cannot observe itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyContext {
    pub input_empty: bool,
    pub input_focused: bool,
}

impl Default for KeyContext {
    fn default() -> Self {
        Self {
            input_empty: true,
            input_focused: false,
        }
    }
}

// =========================================================================
// Controller
// =========================================================================

/// Single entry point for document-level keyboard handling.
pub struct KeyboardNavController {
    shortcuts: ShortcutRegistry<NavCommand>,
    dialogs: Rc<dyn DialogManager>,
    mode: Option<NavMode>,
    overlay: NavOverlay,
    zone: Option<FocusZone>,
    sidebar: SessionSidebar,
}

impl std::fmt::Debug for KeyboardNavController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyboardNavController")
            .field("mode", &self.mode)
            .field("zone", &self.zone)
            .field("sidebar", &self.sidebar)
            .finish_non_exhaustive()
    }
}

impl KeyboardNavController {
    /// Controller whose shortcuts fire while `shortcuts_enabled` holds and
    /// `dialogs` has nothing open.
    #[must_use]
    pub fn new(
        platform: Platform,
        shortcuts_enabled: EnabledPredicate,
        dialogs: Rc<dyn DialogManager>,
    ) -> Self {
        let gate: EnabledPredicate = {
            let dialogs = Rc::clone(&dialogs);
            Rc::new(move || shortcuts_enabled() && !dialogs.has_open_dialog())
        };
        let mut shortcuts = ShortcutRegistry::new(gate);
        for command in NavCommand::ALL {
            shortcuts.register(command, command.default_chord(platform), command.description());
        }
        Self {
            shortcuts,
            dialogs,
            mode: None,
            overlay: NavOverlay::default(),
            zone: None,
            sidebar: SessionSidebar::new(),
        }
    }

    /// Gate on the `keyboardShortcutsEnabled` preference.
    #[must_use]
    pub fn with_preferences(
        platform: Platform,
        preferences: Preferences,
        dialogs: Rc<dyn DialogManager>,
    ) -> Self {
        Self::new(
            platform,
            Rc::new(move || preferences.keyboard_shortcuts_enabled()),
            dialogs,
        )
    }

    #[must_use]
    pub fn shortcuts(&self) -> &ShortcutRegistry<NavCommand> {
        &self.shortcuts
    }

    pub fn shortcuts_mut(&mut self) -> &mut ShortcutRegistry<NavCommand> {
        &mut self.shortcuts
    }

    #[must_use]
    pub fn mode(&self) -> Option<&NavMode> {
        self.mode.as_ref()
    }

    #[must_use]
    pub fn overlay(&self) -> &NavOverlay {
        &self.overlay
    }

    #[must_use]
    pub fn focus_zone(&self) -> Option<FocusZone> {
        self.zone
    }

    #[must_use]
    pub fn sidebar(&self) -> &SessionSidebar {
        &self.sidebar
    }

    pub fn sidebar_mut(&mut self) -> &mut SessionSidebar {
        &mut self.sidebar
    }

    // ---------------------------------------------------------------------
    // Mode transitions
    // ---------------------------------------------------------------------

    /// Enter layout navigation. No-op without visible panels.
    pub fn enter_layout_navigation(&mut self, ws: &dyn NavWorkspace) -> bool {
        let visible = ws.visible_panel_ids();
        let selected = ws
            .active_panel_id()
            .filter(|active| visible.contains(active))
            .or_else(|| visible.first().cloned());
        let Some(panel_id) = selected else {
            return false;
        };
        let page = visible
            .iter()
            .position(|id| *id == panel_id)
            .map_or(0, page_of);
        tracing::debug!(message = "nav.layout_mode_entered", panel_id = %panel_id, page);
        self.mode = Some(NavMode::Layout(LayoutNavState { panel_id, page }));
        self.refresh_overlay(ws);
        true
    }

    /// Enter header navigation. No-op without header panels.
    pub fn enter_header_navigation(&mut self, ws: &dyn NavWorkspace) -> bool {
        let headers = ws.header_panel_ids();
        if headers.is_empty() {
            return false;
        }
        let open = ws.header_popover();
        let page = open
            .as_ref()
            .and_then(|id| headers.iter().position(|h| h == id))
            .map_or(0, page_of);
        tracing::debug!(message = "nav.header_mode_entered", page);
        self.mode = Some(NavMode::Header(HeaderNavState {
            page,
            last_arrowed: open,
        }));
        self.refresh_overlay(ws);
        true
    }

    /// Leave any navigation mode. Returns whether one was active.
    pub fn exit_navigation(&mut self) -> bool {
        self.overlay = NavOverlay::default();
        match self.mode.take() {
            Some(mode) => {
                tracing::debug!(
                    message = "nav.mode_exited",
                    mode = if matches!(mode, NavMode::Layout(_)) { "layout" } else { "header" }
                );
                true
            }
            None => false,
        }
    }

    /// Tear down the active mode if the gate has closed (shortcuts
    /// switched off or a dialog opened). Returns whether it did.
    pub fn sync_gate(&mut self) -> bool {
        if self.mode.is_some() && !self.shortcuts.gate_open() {
            self.exit_navigation()
        } else {
            false
        }
    }

    /// Recompute the highlight and badges; call on resize and scroll.
    pub fn refresh_overlay(&mut self, ws: &dyn NavWorkspace) {
        self.overlay = match &self.mode {
            None => NavOverlay::default(),
            Some(NavMode::Layout(state)) => {
                let visible = ws.visible_panel_ids();
                NavOverlay {
                    highlight: ws.panel_rect(&state.panel_id),
                    badges: badges(&visible, state.page)
                        .map(|(number, id)| Badge {
                            number,
                            panel_id: id.clone(),
                            rect: ws.panel_rect(id),
                        })
                        .collect(),
                }
            }
            Some(NavMode::Header(state)) => {
                let headers = ws.header_panel_ids();
                NavOverlay {
                    highlight: None,
                    badges: badges(&headers, state.page)
                        .map(|(number, id)| Badge {
                            number,
                            panel_id: id.clone(),
                            rect: None,
                        })
                        .collect(),
                }
            }
        };
    }

    /// Move DOM focus to `zone`, updating the sidebar pointer.
    pub fn focus(&mut self, zone: FocusZone) -> Vec<NavEffect> {
        self.zone = Some(zone);
        let mut effects = vec![NavEffect::Focus(zone)];
        match zone {
            FocusZone::Sidebar => {
                if let Some(session) = self.sidebar.enter() {
                    effects.push(NavEffect::SelectSession(session.to_owned()));
                }
            }
            FocusZone::Input => self.sidebar.leave(),
        }
        effects
    }

    /// Focus left both zones (clicked elsewhere).
    pub fn blur(&mut self) {
        self.zone = None;
        self.sidebar.leave();
    }

    // ---------------------------------------------------------------------
    // Key dispatch
    // ---------------------------------------------------------------------

    /// Route one key press.
    pub fn handle_key(
        &mut self,
        event: &KeyEvent,
        ws: &mut dyn NavWorkspace,
        context: KeyContext,
    ) -> NavResponse {
        if !self.shortcuts.gate_open() {
            self.exit_navigation();
            return NavResponse::ignored();
        }

        if let Some(command) = self.shortcuts.resolve(event) {
            return self.run_command(command, ws);
        }

        let response = match self.mode {
            Some(NavMode::Layout(_)) => self.layout_key(event, ws),
            Some(NavMode::Header(_)) => self.header_key(event, ws),
            None => NavResponse::ignored(),
        };
        if response.handled || self.mode.is_some() {
            if self.mode.is_some() {
                self.refresh_overlay(ws);
            }
            return response;
        }

        if self.zone == Some(FocusZone::Sidebar) && event.is_plain() {
            let response = self.sidebar_key(event);
            if response.handled {
                return response;
            }
        }

        if event.code == KeyCode::Tab
            && event.is_plain()
            && context.input_empty
            && !context.input_focused
        {
            let zone = FocusZone::next(self.zone);
            return NavResponse {
                handled: true,
                effects: self.focus(zone),
            };
        }

        NavResponse::ignored()
    }

    fn run_command(&mut self, command: NavCommand, ws: &mut dyn NavWorkspace) -> NavResponse {
        let was_same = matches!(
            (command, &self.mode),
            (NavCommand::ToggleLayoutNavigation, Some(NavMode::Layout(_)))
                | (NavCommand::ToggleHeaderNavigation, Some(NavMode::Header(_)))
        );
        self.exit_navigation();
        if !was_same {
            let _ = match command {
                NavCommand::ToggleLayoutNavigation => self.enter_layout_navigation(ws),
                NavCommand::ToggleHeaderNavigation => self.enter_header_navigation(ws),
            };
        }
        NavResponse::consumed()
    }

    fn layout_key(&mut self, event: &KeyEvent, ws: &mut dyn NavWorkspace) -> NavResponse {
        let Some(NavMode::Layout(state)) = self.mode.clone() else {
            return NavResponse::ignored();
        };
        let visible = ws.visible_panel_ids();

        match event.code {
            KeyCode::Escape => {
                self.exit_navigation();
            }
            KeyCode::Tab | KeyCode::BackTab => {
                let forward = event.code == KeyCode::Tab;
                if let Some(current) = ws.cycle_tab(&state.panel_id, forward) {
                    self.select(ws, current);
                }
            }
            KeyCode::Char('m') if event.is_plain() => {
                let _ = ws.toggle_split_view(&state.panel_id);
                self.revalidate_selection(ws);
            }
            KeyCode::Enter => {
                let _ = ws.activate_panel(&state.panel_id);
                self.exit_navigation();
            }
            code => {
                if let Some(direction) = Direction::from_key(code) {
                    let neighbor =
                        find_spatial_neighbor(&state.panel_id, &visible, &Live(&*ws), direction);
                    if let Some(next) = neighbor {
                        self.select(ws, next);
                    }
                } else if let Some(digit) = event.digit().filter(|_| event.is_plain()) {
                    if digit == 0 {
                        let page = next_page(visible.len(), state.page);
                        if let Some(first) = visible.get(page_range(visible.len(), page).start) {
                            self.mode = Some(NavMode::Layout(LayoutNavState {
                                panel_id: first.clone(),
                                page,
                            }));
                        }
                    } else if let Some(index) = index_for_digit(visible.len(), state.page, digit) {
                        let _ = ws.activate_panel(&visible[index]);
                        self.exit_navigation();
                    }
                } else {
                    return NavResponse::ignored();
                }
            }
        }
        NavResponse::consumed()
    }

    fn select(&mut self, ws: &dyn NavWorkspace, panel_id: PanelId) {
        let page = ws
            .visible_panel_ids()
            .iter()
            .position(|id| *id == panel_id)
            .map_or(0, page_of);
        self.mode = Some(NavMode::Layout(LayoutNavState { panel_id, page }));
    }

    /// Keep the selection on a visible panel after the layout changed.
    fn revalidate_selection(&mut self, ws: &dyn NavWorkspace) {
        let Some(NavMode::Layout(state)) = &self.mode else {
            return;
        };
        let visible = ws.visible_panel_ids();
        if visible.contains(&state.panel_id) {
            let panel_id = state.panel_id.clone();
            self.select(ws, panel_id);
            return;
        }
        match ws
            .active_panel_id()
            .filter(|id| visible.contains(id))
            .or_else(|| visible.first().cloned())
        {
            Some(panel_id) => self.select(ws, panel_id),
            None => {
                self.exit_navigation();
            }
        }
    }

    fn header_key(&mut self, event: &KeyEvent, ws: &mut dyn NavWorkspace) -> NavResponse {
        let Some(NavMode::Header(mut state)) = self.mode.clone() else {
            return NavResponse::ignored();
        };
        let headers = ws.header_panel_ids();
        if headers.is_empty() {
            self.exit_navigation();
            return NavResponse::consumed();
        }
        let page = page_range(headers.len(), state.page);
        let on_page = &headers[page];

        match event.code {
            KeyCode::Escape => {
                self.exit_navigation();
                return NavResponse::consumed();
            }
            KeyCode::Left | KeyCode::Right => {
                if on_page.is_empty() {
                    return NavResponse::consumed();
                }
                let forward = event.code == KeyCode::Right;
                let current = state
                    .last_arrowed
                    .clone()
                    .or_else(|| ws.header_popover())
                    .and_then(|id| on_page.iter().position(|h| *h == id));
                let len = on_page.len();
                let next = match current {
                    Some(i) if forward => (i + 1) % len,
                    Some(i) => (i + len - 1) % len,
                    None if forward => 0,
                    None => len - 1,
                };
                let target = on_page[next].clone();
                if ws.header_popover().as_ref() != Some(&target) {
                    let _ = ws.toggle_header_panel(&target);
                }
                state.last_arrowed = Some(target);
            }
            KeyCode::Enter | KeyCode::Down => {
                let Some(target) = state.last_arrowed.clone() else {
                    return NavResponse::consumed();
                };
                if let Some(open) = ws.header_popover()
                    && open != target
                {
                    let _ = ws.close_header_popover();
                }
                let _ = ws.activate_panel(&target);
                self.exit_navigation();
                return NavResponse::consumed();
            }
            _ => match event.digit().filter(|_| event.is_plain()) {
                Some(0) => {
                    state.page = next_page(headers.len(), state.page);
                    state.last_arrowed = None;
                }
                Some(digit) => {
                    if let Some(index) = index_for_digit(headers.len(), state.page, digit) {
                        let _ = ws.toggle_header_panel(&headers[index]);
                    }
                }
                None => return NavResponse::ignored(),
            },
        }
        self.mode = Some(NavMode::Header(state));
        NavResponse::consumed()
    }

    fn sidebar_key(&mut self, event: &KeyEvent) -> NavResponse {
        match event.code {
            KeyCode::Up | KeyCode::Down => {
                match self.sidebar.step(event.code == KeyCode::Down) {
                    Some(session) => NavResponse::consumed()
                        .effect(NavEffect::SelectSession(session.to_owned())),
                    None => NavResponse::consumed(),
                }
            }
            KeyCode::Enter => NavResponse {
                handled: true,
                effects: self.focus(FocusZone::Input),
            },
            KeyCode::Delete | KeyCode::Backspace | KeyCode::Char('d') => {
                if let Some(session_id) = self.sidebar.focused_session() {
                    self.dialogs.confirm(ConfirmDialog::DeleteSession {
                        session_id: session_id.to_owned(),
                    });
                }
                NavResponse::consumed()
            }
            KeyCode::Char('t') => match self.sidebar.focused_session() {
                Some(session) => {
                    NavResponse::consumed().effect(NavEffect::TogglePin(session.to_owned()))
                }
                None => NavResponse::consumed(),
            },
            KeyCode::Char('c') => {
                if let Some(session_id) = self.sidebar.focused_session() {
                    self.dialogs.confirm(ConfirmDialog::ClearHistory {
                        session_id: session_id.to_owned(),
                    });
                }
                NavResponse::consumed()
            }
            _ => NavResponse::ignored(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paneldeck_core::event::Modifiers;
    use std::cell::{Cell, RefCell};

    /// Scripted workspace: a row of panels plus header panels.
    #[derive(Default)]
    struct FakeWorkspace {
        visible: Vec<PanelId>,
        active: Option<PanelId>,
        headers: Vec<PanelId>,
        popover: Option<PanelId>,
        rects: Vec<(PanelId, Rect)>,
        toggled_split: Vec<PanelId>,
        log: Vec<String>,
    }

    impl FakeWorkspace {
        fn row(ids: &[&str]) -> Self {
            let visible: Vec<PanelId> = ids.iter().map(|s| PanelId::from(*s)).collect();
            let rects = visible
                .iter()
                .enumerate()
                .map(|(i, id)| (id.clone(), Rect::new(i as f64 * 100.0, 0.0, 100.0, 100.0)))
                .collect();
            Self {
                visible,
                rects,
                ..Self::default()
            }
        }
    }

    impl NavWorkspace for FakeWorkspace {
        fn visible_panel_ids(&self) -> Vec<PanelId> {
            self.visible.clone()
        }
        fn active_panel_id(&self) -> Option<PanelId> {
            self.active.clone()
        }
        fn activate_panel(&mut self, panel_id: &PanelId) -> bool {
            self.log.push(format!("activate {panel_id}"));
            if self.headers.contains(panel_id) {
                self.popover = Some(panel_id.clone());
            }
            self.active = Some(panel_id.clone());
            true
        }
        fn cycle_tab(&mut self, panel_id: &PanelId, _forward: bool) -> Option<PanelId> {
            Some(panel_id.clone())
        }
        fn toggle_split_view(&mut self, panel_id: &PanelId) -> bool {
            self.toggled_split.push(panel_id.clone());
            true
        }
        fn header_panel_ids(&self) -> Vec<PanelId> {
            self.headers.clone()
        }
        fn toggle_header_panel(&mut self, panel_id: &PanelId) -> bool {
            self.log.push(format!("toggle {panel_id}"));
            if self.popover.as_ref() == Some(panel_id) {
                self.popover = None;
                false
            } else {
                self.popover = Some(panel_id.clone());
                true
            }
        }
        fn header_popover(&self) -> Option<PanelId> {
            self.popover.clone()
        }
        fn close_header_popover(&mut self) -> Option<PanelId> {
            self.log.push("close popover".into());
            self.popover.take()
        }
        fn panel_rect(&self, panel_id: &PanelId) -> Option<Rect> {
            self.rects.iter().find(|(id, _)| id == panel_id).map(|(_, r)| *r)
        }
    }

    #[derive(Default)]
    struct Dialogs {
        open: Cell<bool>,
        requests: RefCell<Vec<ConfirmDialog>>,
    }

    impl DialogManager for Dialogs {
        fn has_open_dialog(&self) -> bool {
            self.open.get()
        }
        fn confirm(&self, dialog: ConfirmDialog) {
            self.requests.borrow_mut().push(dialog);
        }
    }

    fn controller() -> (KeyboardNavController, Rc<Dialogs>, Rc<Cell<bool>>) {
        let dialogs = Rc::new(Dialogs::default());
        let enabled = Rc::new(Cell::new(true));
        let flag = Rc::clone(&enabled);
        let nav = KeyboardNavController::new(
            Platform::Other,
            Rc::new(move || flag.get()),
            dialogs.clone(),
        );
        (nav, dialogs, enabled)
    }

    fn layout_chord() -> KeyEvent {
        KeyEvent::char('p').with_modifiers(Modifiers::CTRL | Modifiers::SHIFT)
    }

    fn header_chord() -> KeyEvent {
        KeyEvent::char('h').with_modifiers(Modifiers::CTRL | Modifiers::SHIFT)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code)
    }

    fn selected(nav: &KeyboardNavController) -> Option<&str> {
        match nav.mode() {
            Some(NavMode::Layout(state)) => Some(state.panel_id.as_str()),
            _ => None,
        }
    }

    #[test]
    fn layout_entry_selects_active_or_first() {
        let (mut nav, _, _) = controller();
        let mut ws = FakeWorkspace::row(&["a", "b", "c"]);
        ws.active = Some(PanelId::from("b"));
        assert!(nav.handle_key(&layout_chord(), &mut ws, KeyContext::default()).handled);
        assert_eq!(selected(&nav), Some("b"));
        assert_eq!(nav.overlay().badges.len(), 3);
        assert_eq!(nav.overlay().highlight, Some(Rect::new(100.0, 0.0, 100.0, 100.0)));

        nav.exit_navigation();
        ws.active = Some(PanelId::from("hidden"));
        nav.enter_layout_navigation(&ws);
        assert_eq!(selected(&nav), Some("a"));
    }

    #[test]
    fn layout_entry_without_panels_is_noop() {
        let (mut nav, _, _) = controller();
        let mut ws = FakeWorkspace::default();
        nav.handle_key(&layout_chord(), &mut ws, KeyContext::default());
        assert_eq!(nav.mode(), None);
        assert!(nav.overlay().is_empty());
    }

    #[test]
    fn arrows_enter_and_escape() {
        let (mut nav, _, _) = controller();
        let mut ws = FakeWorkspace::row(&["left", "center", "right"]);
        ws.active = Some(PanelId::from("left"));
        let ctx = KeyContext::default();
        nav.handle_key(&layout_chord(), &mut ws, ctx);
        nav.handle_key(&key(KeyCode::Right), &mut ws, ctx);
        nav.handle_key(&key(KeyCode::Right), &mut ws, ctx);
        assert_eq!(selected(&nav), Some("right"));
        nav.handle_key(&key(KeyCode::Right), &mut ws, ctx);
        assert_eq!(selected(&nav), Some("right"));
        nav.handle_key(&key(KeyCode::Left), &mut ws, ctx);
        nav.handle_key(&key(KeyCode::Enter), &mut ws, ctx);
        assert_eq!(nav.mode(), None);
        assert_eq!(ws.active, Some(PanelId::from("center")));
    }

    #[test]
    fn split_toggle_targets_selection() {
        let (mut nav, _, _) = controller();
        let mut ws = FakeWorkspace::row(&["a", "b"]);
        nav.enter_layout_navigation(&ws);
        nav.handle_key(&KeyEvent::char('m'), &mut ws, KeyContext::default());
        assert_eq!(ws.toggled_split, vec![PanelId::from("a")]);
        assert_eq!(selected(&nav), Some("a"));
    }

    #[test]
    fn digit_jumps_and_exits() {
        let (mut nav, _, _) = controller();
        let mut ws = FakeWorkspace::row(&["a", "b", "c"]);
        nav.enter_layout_navigation(&ws);
        nav.handle_key(&KeyEvent::char('3'), &mut ws, KeyContext::default());
        assert_eq!(ws.active, Some(PanelId::from("c")));
        assert_eq!(nav.mode(), None);
    }

    #[test]
    fn zero_pages_forward_and_recenters() {
        let (mut nav, _, _) = controller();
        let names: Vec<String> = (0..11).map(|i| format!("p{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut ws = FakeWorkspace::row(&refs);
        nav.enter_layout_navigation(&ws);
        nav.handle_key(&KeyEvent::char('0'), &mut ws, KeyContext::default());
        assert_eq!(
            nav.mode(),
            Some(&NavMode::Layout(LayoutNavState {
                panel_id: PanelId::from("p9"),
                page: 1
            }))
        );
        assert_eq!(nav.overlay().badges.len(), 2);
        assert_eq!(nav.overlay().badges[1].number, 2);
    }

    #[test]
    fn modes_are_exclusive() {
        let (mut nav, _, _) = controller();
        let mut ws = FakeWorkspace::row(&["a"]);
        ws.headers = vec![PanelId::from("h1")];
        let ctx = KeyContext::default();
        nav.handle_key(&layout_chord(), &mut ws, ctx);
        nav.handle_key(&header_chord(), &mut ws, ctx);
        assert!(matches!(nav.mode(), Some(NavMode::Header(_))));
        nav.handle_key(&header_chord(), &mut ws, ctx);
        assert_eq!(nav.mode(), None);
    }

    #[test]
    fn closed_gate_tears_down_and_ignores() {
        let (mut nav, dialogs, enabled) = controller();
        let mut ws = FakeWorkspace::row(&["a"]);
        nav.enter_layout_navigation(&ws);
        dialogs.open.set(true);
        assert!(nav.sync_gate());
        assert_eq!(nav.mode(), None);
        assert!(!nav.handle_key(&layout_chord(), &mut ws, KeyContext::default()).handled);

        dialogs.open.set(false);
        enabled.set(false);
        nav.enter_layout_navigation(&ws);
        let response = nav.handle_key(&key(KeyCode::Right), &mut ws, KeyContext::default());
        assert!(!response.handled);
        assert_eq!(nav.mode(), None);
    }

    #[test]
    fn header_arrows_wrap_within_page_and_confirm_closes_other_popover() {
        let (mut nav, _, _) = controller();
        let mut ws = FakeWorkspace::default();
        ws.headers = vec![PanelId::from("h1"), PanelId::from("h2")];
        let ctx = KeyContext::default();
        nav.handle_key(&header_chord(), &mut ws, ctx);
        nav.handle_key(&key(KeyCode::Right), &mut ws, ctx);
        nav.handle_key(&key(KeyCode::Right), &mut ws, ctx);
        nav.handle_key(&key(KeyCode::Right), &mut ws, ctx);
        assert_eq!(ws.popover, Some(PanelId::from("h1")));

        // A different popover opened by other means is closed before activation.
        ws.popover = Some(PanelId::from("h2"));
        ws.log.clear();
        nav.handle_key(&key(KeyCode::Enter), &mut ws, ctx);
        assert_eq!(ws.log, vec!["close popover".to_string(), "activate h1".to_string()]);
        assert_eq!(nav.mode(), None);
    }

    #[test]
    fn header_digit_toggles_and_stays() {
        let (mut nav, _, _) = controller();
        let mut ws = FakeWorkspace::default();
        ws.headers = vec![PanelId::from("h1"), PanelId::from("h2")];
        nav.enter_header_navigation(&ws);
        nav.handle_key(&KeyEvent::char('2'), &mut ws, KeyContext::default());
        assert_eq!(ws.popover, Some(PanelId::from("h2")));
        nav.handle_key(&KeyEvent::char('2'), &mut ws, KeyContext::default());
        assert_eq!(ws.popover, None);
        assert!(matches!(nav.mode(), Some(NavMode::Header(_))));
    }

    #[test]
    fn sidebar_keys() {
        let (mut nav, dialogs, _) = controller();
        let mut ws = FakeWorkspace::default();
        nav.sidebar_mut()
            .set_sessions(vec!["s1".into(), "s2".into()]);
        nav.sidebar_mut().set_active_session(Some("s2".into()));
        let ctx = KeyContext::default();

        let response = nav.handle_key(&key(KeyCode::Tab), &mut ws, ctx);
        assert_eq!(
            response.effects,
            vec![
                NavEffect::Focus(FocusZone::Sidebar),
                NavEffect::SelectSession("s2".into())
            ]
        );
        let response = nav.handle_key(&key(KeyCode::Down), &mut ws, ctx);
        assert_eq!(response.effects, vec![NavEffect::SelectSession("s1".into())]);
        let response = nav.handle_key(&KeyEvent::char('t'), &mut ws, ctx);
        assert_eq!(response.effects, vec![NavEffect::TogglePin("s1".into())]);
        nav.handle_key(&KeyEvent::char('d'), &mut ws, ctx);
        nav.handle_key(&KeyEvent::char('c'), &mut ws, ctx);
        assert_eq!(
            *dialogs.requests.borrow(),
            vec![
                ConfirmDialog::DeleteSession { session_id: "s1".into() },
                ConfirmDialog::ClearHistory { session_id: "s1".into() },
            ]
        );
        let response = nav.handle_key(&key(KeyCode::Enter), &mut ws, ctx);
        assert_eq!(response.effects, vec![NavEffect::Focus(FocusZone::Input)]);
        assert_eq!(nav.sidebar().focused_index(), None);
    }

    #[test]
    fn tab_cycles_only_with_empty_unfocused_input() {
        let (mut nav, _, _) = controller();
        let mut ws = FakeWorkspace::default();
        let typing = KeyContext {
            input_empty: false,
            input_focused: true,
        };
        assert!(!nav.handle_key(&key(KeyCode::Tab), &mut ws, typing).handled);
        let idle = KeyContext::default();
        nav.handle_key(&key(KeyCode::Tab), &mut ws, idle);
        assert_eq!(nav.focus_zone(), Some(FocusZone::Sidebar));
        nav.handle_key(&key(KeyCode::Tab), &mut ws, idle);
        assert_eq!(nav.focus_zone(), Some(FocusZone::Input));
    }
}
