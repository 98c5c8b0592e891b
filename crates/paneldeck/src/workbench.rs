#![forbid(unsafe_code)]

//! Wiring of every controller for one window.
//!
//! ```text
//!   WindowSlotManager ──► slot id ──► LayoutStorage (<key>:<slot>)
//!                                          │
//!   PanelRegistry ──► PanelHostController ─┴─► WorkspaceController
//!                                                   │
//!                      KeyboardNavController ◄──────┤
//!                      ServerMessageHandler ────────┘
//! ```

use std::rc::Rc;

use paneldeck_core::clock::Clock;
use paneldeck_core::event::KeyEvent;
use paneldeck_core::geometry::Rect;
use paneldeck_core::ids::PanelId;
use paneldeck_core::prefs::Preferences;
use paneldeck_core::storage::SharedStore;
use paneldeck_host::{
    ContextStore, InputSessionTarget, OutboundSink, PanelHostController, PanelRegistry,
    SESSION_LIST_KEY, ServerMessageHandler, ServerOutcome, SessionSummary,
};
use paneldeck_nav::{DialogManager, KeyContext, KeyboardNavController, NavEffect, NavResponse};
use paneldeck_slots::{Heartbeat, WindowSlotInfo, WindowSlotManager};
use paneldeck_workspace::{
    LayoutStorage, OpenOptions, RestoreOutcome, WorkspaceController, WorkspaceError,
};

use crate::config::WorkbenchConfig;
use crate::error::{Error, Result};

/// Collaborators supplied by the embedding host.
pub struct Environment {
    /// Storage shared by every window of the origin.
    pub durable: SharedStore,
    /// Storage private to this window.
    pub tab: SharedStore,
    pub clock: Rc<dyn Clock>,
    pub registry: PanelRegistry,
    pub outbound: Rc<dyn OutboundSink>,
    pub dialogs: Rc<dyn DialogManager>,
}

/// One window's workspace, navigation and slot lease.
pub struct Workbench {
    config: WorkbenchConfig,
    slots: WindowSlotManager,
    workspace: WorkspaceController,
    nav: KeyboardNavController,
    server: ServerMessageHandler,
    input_session: Rc<InputSessionTarget>,
    preferences: Preferences,
    restored: RestoreOutcome,
}

impl std::fmt::Debug for Workbench {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbench")
            .field("slots", &self.slots)
            .field("workspace", &self.workspace)
            .field("nav", &self.nav)
            .finish_non_exhaustive()
    }
}

impl Workbench {
    /// Claim a slot, restore its layout and start navigation.
    #[must_use]
    pub fn start(env: Environment, config: WorkbenchConfig) -> Self {
        let config = config.validated();
        let mut slots = WindowSlotManager::new(
            Rc::clone(&env.durable),
            env.tab,
            env.clock,
            config.slot_config(),
        );
        let _ = slots.migrate_legacy();
        let slot_id = slots.get_client_window_id();

        let store = slots.durable_store().clone();
        let storage = LayoutStorage::new(store.clone(), slot_id.clone(), config.workspace.keys.clone());
        let mut host = PanelHostController::new(env.registry.shared(), ContextStore::new(), env.outbound);
        host.set_window_id(Some(slot_id.clone()));

        let mut workspace =
            WorkspaceController::new(host, config.workspace.clone()).with_storage(storage);
        let restored = workspace.restore();
        tracing::info!(
            message = "workbench.started",
            slot_id = %slot_id,
            panels = workspace.panel_ids().len(),
            restored = matches!(restored, RestoreOutcome::Restored { .. }),
        );

        let preferences = Preferences::new(store);
        let nav = KeyboardNavController::with_preferences(
            config.platform,
            preferences.clone(),
            env.dialogs,
        );

        Self {
            config,
            slots,
            workspace,
            nav,
            server: ServerMessageHandler::new(),
            input_session: Rc::new(InputSessionTarget::new()),
            preferences,
            restored,
        }
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &WorkbenchConfig {
        &self.config
    }

    /// How the layout was populated at start.
    #[must_use]
    pub fn restore_outcome(&self) -> &RestoreOutcome {
        &self.restored
    }

    #[must_use]
    pub fn slot_id(&self) -> Option<&str> {
        self.slots.current_slot()
    }

    #[must_use]
    pub fn slots(&self) -> &WindowSlotManager {
        &self.slots
    }

    #[must_use]
    pub fn workspace(&self) -> &WorkspaceController {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut WorkspaceController {
        &mut self.workspace
    }

    #[must_use]
    pub fn nav(&self) -> &KeyboardNavController {
        &self.nav
    }

    pub fn nav_mut(&mut self) -> &mut KeyboardNavController {
        &mut self.nav
    }

    #[must_use]
    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// The session the chat input targets.
    #[must_use]
    pub fn input_session(&self) -> &Rc<InputSessionTarget> {
        &self.input_session
    }

    // ---------------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------------

    /// Open a panel; an unavailable type is an error here so the caller can
    /// report it.
    pub fn open_panel(&mut self, panel_type: &str, options: OpenOptions) -> Result<PanelId> {
        self.workspace
            .open_panel(panel_type, options)
            .ok_or_else(|| {
                Error::from(WorkspaceError::Unavailable {
                    panel_type: panel_type.to_owned(),
                })
            })
    }

    /// Route a key press through navigation and apply session effects.
    pub fn handle_key(&mut self, event: &KeyEvent, context: KeyContext) -> NavResponse {
        let response = self.nav.handle_key(event, &mut self.workspace, context);
        for effect in &response.effects {
            if let NavEffect::SelectSession(session_id) = effect {
                self.select_session(Some(session_id.clone()));
            }
        }
        response
    }

    /// Point the chat input at `session_id`.
    pub fn select_session(&mut self, session_id: Option<String>) {
        self.nav.sidebar_mut().set_active_session(session_id.clone());
        self.input_session.set(session_id);
    }

    /// Tear down navigation if a dialog opened or shortcuts were disabled.
    pub fn sync_shortcut_gate(&mut self) -> bool {
        self.nav.sync_gate()
    }

    /// Handle one inbound server message.
    pub fn handle_server_text(&mut self, raw: &str) -> Result<ServerOutcome> {
        let outcome = self.server.handle_text(self.workspace.host_mut(), raw);
        match outcome {
            ServerOutcome::Malformed => Err(Error::Protocol {
                detail: format!("{} bytes", raw.len()),
            }),
            ServerOutcome::SessionsPublished(_) => {
                self.refresh_sidebar();
                Ok(outcome)
            }
            outcome => Ok(outcome),
        }
    }

    fn refresh_sidebar(&mut self) {
        let sessions: Vec<SessionSummary> = self
            .workspace
            .host()
            .get_context(SESSION_LIST_KEY)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        self.nav
            .sidebar_mut()
            .set_sessions(sessions.into_iter().map(|s| s.session_id).collect());
    }

    /// Viewport changed: resize panels and recompute the overlay.
    pub fn resize(&mut self, area: Rect) {
        self.workspace.resize(area);
        self.nav.refresh_overlay(&self.workspace);
    }

    /// Document scrolled: recompute the overlay.
    pub fn scrolled(&mut self) {
        self.nav.refresh_overlay(&self.workspace);
    }

    /// Periodic timer; heartbeats the slot lease when due.
    ///
    /// On [`Heartbeat::Lost`] another window now owns this slot's namespace:
    /// the layout stops persisting and the caller should reload.
    pub fn tick(&mut self) -> Heartbeat {
        let beat = self.slots.tick();
        if let Heartbeat::Lost { slot_id } = &beat {
            let _ = self.workspace.detach_storage();
            tracing::warn!(message = "workbench.slot_lost", slot_id = %slot_id);
        }
        beat
    }

    // ---------------------------------------------------------------------
    // Window slots
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn list_window_slots(&self) -> Vec<WindowSlotInfo> {
        self.slots.list_window_slots()
    }

    pub fn create_window_slot(&mut self) -> String {
        self.slots.create_window_slot()
    }

    pub fn remove_window_slot(&mut self, slot_id: &str) -> Result<()> {
        Ok(self.slots.remove_window_slot(slot_id)?)
    }

    pub fn set_window_slot_name(&mut self, slot_id: &str, name: Option<&str>) -> Result<()> {
        Ok(self.slots.set_window_slot_name(slot_id, name)?)
    }

    /// Move this window to another slot. The caller reloads afterwards to
    /// pick up the new namespace.
    pub fn switch_window_slot(&mut self, slot_id: &str) -> Result<()> {
        Ok(self.slots.set_client_window_id(slot_id)?)
    }

    /// Page unload: release the slot lease.
    pub fn shutdown(mut self) {
        tracing::info!(message = "workbench.shutdown", slot_id = ?self.slots.current_slot());
        self.slots.release();
    }
}
