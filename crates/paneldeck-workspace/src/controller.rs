#![forbid(unsafe_code)]

//! Panel Workspace Controller.
//!
//! Owns the spatial layout tree, the header dock, the modal overlay and the
//! panel records, and drives the [`PanelHostController`] to mount and
//! unmount panel instances as they enter and leave the workspace.
//!
//! # Containment
//!
//! ```text
//!   in-tree leaf  <->  header dock  <->  modal overlay
//!         \               |               /
//!          +-------> unmounted (terminal) <+
//! ```
//!
//! # Invariants
//!
//! 1. Every panel record is contained in exactly one of {tree, header dock,
//!    modal}.
//! 2. Every contained panel id has a record and a mounted instance.
//! 3. Every structural change writes the whole layout document once.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use paneldeck_core::binding::PanelBinding;
use paneldeck_core::geometry::{GeometrySource, Rect, StaticGeometry};
use paneldeck_core::ids::PanelId;
use paneldeck_host::{
    ACTIVE_PANEL_KEY, BindingChange, EMPTY_PANEL_TYPE, HostError, InitialBinding, MountRequest,
    PanelHostController,
};
use paneldeck_layout::{
    Containment, LAYOUT_SCHEMA_VERSION, LayoutOperation, LayoutOperationError, LayoutSnapshot,
    LayoutTree, LayoutValidationError, PanelRecord, Region,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::focus_history::{DEFAULT_FOCUS_HISTORY_DEPTH, FocusHistory};
use crate::persistence::{LayoutStorage, StoredLayout, WorkspaceKeys};

// =========================================================================
// Configuration and options
// =========================================================================

/// Workspace settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkspaceConfig {
    pub keys: WorkspaceKeys,
    /// Panel types opened, left to right, when no stored layout is usable.
    pub default_panel_types: Vec<String>,
    pub focus_history_depth: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            keys: WorkspaceKeys::default(),
            default_panel_types: vec!["sessions".into(), "chat".into()],
            focus_history_depth: DEFAULT_FOCUS_HISTORY_DEPTH,
        }
    }
}

/// Arguments of [`WorkspaceController::open_panel`].
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOptions {
    /// Activate the panel once mounted.
    pub focus: bool,
    /// Region relative to the target; defaults to [`Region::Right`].
    pub placement: Option<Region>,
    /// Panel to split from; defaults to the active panel.
    pub target_panel_id: Option<PanelId>,
    pub binding: InitialBinding,
    pub state: Value,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            focus: true,
            placement: None,
            target_panel_id: None,
            binding: InitialBinding::Default,
            state: Value::Null,
        }
    }
}

impl OpenOptions {
    #[must_use]
    pub fn focused(mut self, focus: bool) -> Self {
        self.focus = focus;
        self
    }

    #[must_use]
    pub fn at(mut self, region: Region) -> Self {
        self.placement = Some(region);
        self
    }

    #[must_use]
    pub fn next_to(mut self, panel_id: PanelId) -> Self {
        self.target_panel_id = Some(panel_id);
        self
    }

    #[must_use]
    pub fn with_binding(mut self, binding: Option<PanelBinding>) -> Self {
        self.binding = InitialBinding::Explicit(binding);
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }
}

/// How [`WorkspaceController::restore`] populated the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored { panels: usize },
    /// No usable stored layout; `reason` is set when one was rejected.
    DefaultLayout { reason: Option<LayoutValidationError> },
}

/// Workspace operation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceError {
    UnknownPanel { panel_id: PanelId },
    NotInTree { panel_id: PanelId },
    Unavailable { panel_type: String },
    Layout(LayoutOperationError),
    Host(HostError),
    /// A mounted instance and the layout records disagree.
    NotMounted { panel_id: PanelId },
    Inconsistent(LayoutValidationError),
}

impl fmt::Display for WorkspaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPanel { panel_id } => write!(f, "panel {panel_id} is not in the workspace"),
            Self::NotInTree { panel_id } => write!(f, "panel {panel_id} is not in the layout tree"),
            Self::Unavailable { panel_type } => {
                write!(f, "panel type \"{panel_type}\" is unavailable")
            }
            Self::Layout(err) => write!(f, "{err}"),
            Self::Host(err) => write!(f, "{err}"),
            Self::NotMounted { panel_id } => {
                write!(f, "panel {panel_id} is recorded but not mounted (or vice versa)")
            }
            Self::Inconsistent(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Layout(err) => Some(err),
            Self::Host(err) => Some(err),
            Self::Inconsistent(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LayoutOperationError> for WorkspaceError {
    fn from(err: LayoutOperationError) -> Self {
        Self::Layout(err)
    }
}

impl From<HostError> for WorkspaceError {
    fn from(err: HostError) -> Self {
        Self::Host(err)
    }
}

// =========================================================================
// Controller
// =========================================================================

/// Owner of the layout tree, header dock, modal overlay and their
/// persistence.
pub struct WorkspaceController {
    host: PanelHostController,
    tree: LayoutTree,
    header: Vec<PanelId>,
    modal: Option<PanelId>,
    records: BTreeMap<PanelId, PanelRecord>,
    active: Option<PanelId>,
    header_popover: Option<PanelId>,
    history: FocusHistory,
    next_panel_seq: u64,
    storage: Option<LayoutStorage>,
    config: WorkspaceConfig,
    viewport: Option<Rect>,
}

impl fmt::Debug for WorkspaceController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceController")
            .field("tree", &self.tree.panel_ids())
            .field("header", &self.header)
            .field("modal", &self.modal)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl WorkspaceController {
    #[must_use]
    pub fn new(host: PanelHostController, config: WorkspaceConfig) -> Self {
        let history = FocusHistory::new(config.focus_history_depth);
        Self {
            host,
            tree: LayoutTree::new(),
            header: Vec::new(),
            modal: None,
            records: BTreeMap::new(),
            active: None,
            header_popover: None,
            history,
            next_panel_seq: 0,
            storage: None,
            config,
            viewport: None,
        }
    }

    /// Persist to `storage` on every structural change.
    #[must_use]
    pub fn with_storage(mut self, storage: LayoutStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Stop persisting. Later changes stay in memory only.
    pub fn detach_storage(&mut self) -> Option<LayoutStorage> {
        let storage = self.storage.take();
        if storage.is_some() {
            tracing::debug!(message = "workspace.storage_detached");
        }
        storage
    }

    // ---------------------------------------------------------------------
    // Restore / persist
    // ---------------------------------------------------------------------

    /// Load the stored layout for this slot and mount its panels, falling
    /// back to the default layout when nothing usable is stored.
    pub fn restore(&mut self) -> RestoreOutcome {
        self.reset();
        let stored = self
            .storage
            .as_ref()
            .map_or(StoredLayout::Missing, LayoutStorage::load);
        match stored {
            StoredLayout::Loaded(snapshot, tree) => {
                let panels = snapshot.panels.len();
                self.adopt(*snapshot, tree);
                tracing::debug!(message = "workspace.restored", panels);
                RestoreOutcome::Restored { panels }
            }
            StoredLayout::Missing => {
                self.open_default_layout();
                RestoreOutcome::DefaultLayout { reason: None }
            }
            StoredLayout::Rejected(err) => {
                tracing::warn!(message = "workspace.layout_rejected", error = %err);
                self.open_default_layout();
                RestoreOutcome::DefaultLayout { reason: Some(err) }
            }
        }
    }

    fn reset(&mut self) {
        let ids: Vec<PanelId> = self.records.keys().cloned().collect();
        for panel_id in ids {
            let _ = self.host.unmount_panel(&panel_id);
        }
        self.tree = LayoutTree::new();
        self.header.clear();
        self.modal = None;
        self.records.clear();
        self.active = None;
        self.header_popover = None;
        self.history = FocusHistory::new(self.config.focus_history_depth);
    }

    fn adopt(&mut self, snapshot: LayoutSnapshot, tree: LayoutTree) {
        self.tree = tree;
        self.header = snapshot.header;
        self.modal = snapshot.modal;
        self.next_panel_seq = snapshot.next_panel_seq;

        for mut record in snapshot.panels {
            let request = MountRequest::new(record.panel_id.clone(), record.panel_type.clone())
                .with_binding(record.binding.clone())
                .with_state(record.state.clone());
            if let Err(err) = self.host.mount_panel(request) {
                tracing::warn!(message = "workspace.restore_mount_failed", error = %err);
                continue;
            }
            record.binding = self.host.get_panel_binding(&record.panel_id);
            let _ = self.records.insert(record.panel_id.clone(), record);
        }

        let stored_history = self
            .storage
            .as_ref()
            .map(LayoutStorage::load_focus_history)
            .unwrap_or_default();
        self.history = FocusHistory::from_entries(
            stored_history
                .into_iter()
                .filter(|id| self.records.contains_key(id)),
            self.config.focus_history_depth,
        );

        match snapshot.active_panel_id {
            Some(active) if self.records.contains_key(&active) => {
                let _ = self.activate(&active, false);
            }
            _ => {
                self.sync_visibility();
                self.persist();
            }
        }
    }

    fn open_default_layout(&mut self) {
        let types = self.config.default_panel_types.clone();
        let mut first = None;
        for panel_type in &types {
            let opened = self.open_panel(panel_type, OpenOptions::default().focused(false));
            if first.is_none() {
                first = opened;
            }
        }
        match first {
            Some(panel_id) => {
                let _ = self.activate_panel(&panel_id);
            }
            None => self.persist(),
        }
    }

    /// Current layout document.
    #[must_use]
    pub fn snapshot(&self) -> LayoutSnapshot {
        LayoutSnapshot {
            schema_version: LAYOUT_SCHEMA_VERSION,
            tree: self.tree.to_snapshot(),
            header: self.header.clone(),
            modal: self.modal.clone(),
            panels: self.records.values().cloned().collect(),
            active_panel_id: self.active.clone(),
            next_panel_seq: self.next_panel_seq,
            extensions: BTreeMap::new(),
        }
    }

    fn persist(&self) {
        if let Some(storage) = &self.storage {
            storage.save(&self.snapshot());
            storage.save_focus_history(self.history.iter());
        }
    }

    /// Check the containment invariants against the mounted set.
    pub fn check_invariants(&self) -> Result<(), WorkspaceError> {
        self.snapshot()
            .validate()
            .map_err(WorkspaceError::Inconsistent)?;
        let mounted: BTreeSet<PanelId> = self.host.panel_ids().into_iter().collect();
        let recorded: BTreeSet<PanelId> = self.records.keys().cloned().collect();
        if let Some(panel_id) = mounted.symmetric_difference(&recorded).next() {
            return Err(WorkspaceError::NotMounted {
                panel_id: panel_id.clone(),
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn host(&self) -> &PanelHostController {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut PanelHostController {
        &mut self.host
    }

    #[must_use]
    pub fn tree(&self) -> &LayoutTree {
        &self.tree
    }

    #[must_use]
    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    #[must_use]
    pub fn storage(&self) -> Option<&LayoutStorage> {
        self.storage.as_ref()
    }

    #[must_use]
    pub fn record(&self, panel_id: &PanelId) -> Option<&PanelRecord> {
        self.records.get(panel_id)
    }

    #[must_use]
    pub fn panel_type(&self, panel_id: &PanelId) -> Option<&str> {
        self.records.get(panel_id).map(|r| r.panel_type.as_str())
    }

    /// Every panel in the workspace, in id order.
    #[must_use]
    pub fn panel_ids(&self) -> Vec<PanelId> {
        self.records.keys().cloned().collect()
    }

    #[must_use]
    pub fn active_panel_id(&self) -> Option<&PanelId> {
        self.active.as_ref()
    }

    /// Header panel currently shown in the popover.
    #[must_use]
    pub fn header_popover(&self) -> Option<&PanelId> {
        self.header_popover.as_ref()
    }

    #[must_use]
    pub fn modal_panel_id(&self) -> Option<&PanelId> {
        self.modal.as_ref()
    }

    #[must_use]
    pub fn focus_history(&self) -> &FocusHistory {
        &self.history
    }

    /// Header-docked panels in display order.
    #[must_use]
    pub fn list_header_panel_ids(&self) -> Vec<PanelId> {
        self.header.clone()
    }

    /// Panels shown in the tree, in document order.
    #[must_use]
    pub fn visible_panel_ids(&self) -> Vec<PanelId> {
        self.tree.visible_panel_ids()
    }

    #[must_use]
    pub fn containment(&self, panel_id: &PanelId) -> Option<Containment> {
        if self.tree.contains_panel(panel_id) {
            Some(Containment::Tree)
        } else if self.header.contains(panel_id) {
            Some(Containment::Header)
        } else if self.modal.as_ref() == Some(panel_id) {
            Some(Containment::Modal)
        } else {
            None
        }
    }

    /// Solved rectangles of the visible tree panels within `area`.
    #[must_use]
    pub fn geometry(&self, area: Rect) -> StaticGeometry {
        self.tree.solve_layout(area).into_iter().collect()
    }

    /// Last area passed to [`Self::resize`].
    #[must_use]
    pub fn viewport(&self) -> Option<Rect> {
        self.viewport
    }

    /// Remember `area` as the viewport and forward solved sizes to the
    /// visible panels.
    pub fn resize(&mut self, area: Rect) {
        self.viewport = Some(area);
        for (panel_id, rect) in self.tree.solve_layout(area) {
            self.host.set_panel_size(&panel_id, rect);
        }
    }

    // ---------------------------------------------------------------------
    // Open / close / replace
    // ---------------------------------------------------------------------

    fn allocate_panel_id(&mut self, panel_type: &str) -> PanelId {
        loop {
            self.next_panel_seq = self.next_panel_seq.saturating_add(1);
            let candidate = PanelId::new(format!("{panel_type}-{}", self.next_panel_seq));
            if !self.records.contains_key(&candidate) && !self.host.is_mounted(&candidate) {
                return candidate;
            }
        }
    }

    fn insertion_target(&self, requested: Option<&PanelId>) -> Option<PanelId> {
        requested
            .filter(|id| self.tree.contains_panel(id))
            .cloned()
            .or_else(|| {
                self.active
                    .clone()
                    .filter(|id| self.tree.contains_panel(id))
            })
            .or_else(|| {
                self.history
                    .most_recent(|id| self.tree.contains_panel(id))
                    .cloned()
            })
            .or_else(|| self.tree.visible_panel_ids().into_iter().next())
    }

    fn place_in_tree(
        &mut self,
        panel_id: PanelId,
        target: Option<&PanelId>,
        region: Region,
    ) -> Result<(), LayoutOperationError> {
        let target = self.insertion_target(target);
        self.tree
            .apply(LayoutOperation::Insert {
                target,
                panel: panel_id,
                attach: region.attach(),
            })
            .map(|_| ())
    }

    fn mount_record(&mut self, record: &mut PanelRecord, binding: InitialBinding) -> Result<(), HostError> {
        let mut request = MountRequest::new(record.panel_id.clone(), record.panel_type.clone())
            .with_state(record.state.clone());
        request.binding = binding;
        let _ = self.host.mount_panel(request)?;
        record.binding = self.host.get_panel_binding(&record.panel_id);
        Ok(())
    }

    /// Open a new panel. Returns `None` if the type is unavailable for the
    /// current capability and plugin set.
    pub fn open_panel(&mut self, panel_type: &str, options: OpenOptions) -> Option<PanelId> {
        let availability = self.host.registry().borrow().availability(panel_type);
        if !availability.is_available() {
            tracing::debug!(
                message = "workspace.open_unavailable",
                panel_type,
                reason = %availability,
            );
            return None;
        }

        let OpenOptions {
            focus,
            placement,
            target_panel_id,
            binding,
            state,
        } = options;
        let panel_id = self.allocate_panel_id(panel_type);
        if let Err(err) = self.place_in_tree(
            panel_id.clone(),
            target_panel_id.as_ref(),
            placement.unwrap_or_default(),
        ) {
            tracing::warn!(message = "workspace.open_failed", panel_type, error = %err);
            return None;
        }

        let mut record = PanelRecord::new(panel_id.clone(), panel_type);
        record.state = state;
        if let Err(err) = self.mount_record(&mut record, binding) {
            tracing::warn!(message = "workspace.open_failed", panel_type, error = %err);
            let _ = self.tree.apply(LayoutOperation::Remove { panel: panel_id });
            return None;
        }
        let _ = self.records.insert(panel_id.clone(), record);
        tracing::debug!(message = "workspace.panel_opened", panel_id = %panel_id, panel_type);

        if focus {
            let _ = self.activate_panel(&panel_id);
        } else {
            self.sync_visibility();
            self.persist();
        }
        Some(panel_id)
    }

    fn detach(&mut self, panel_id: &PanelId, containment: Containment) -> Result<(), LayoutOperationError> {
        match containment {
            Containment::Tree => {
                let _ = self.tree.apply(LayoutOperation::Remove {
                    panel: panel_id.clone(),
                })?;
            }
            Containment::Header => {
                self.header.retain(|p| p != panel_id);
                if self.header_popover.as_ref() == Some(panel_id) {
                    self.header_popover = None;
                }
            }
            Containment::Modal => self.modal = None,
        }
        Ok(())
    }

    /// Close a panel, collapsing its split and unmounting it.
    pub fn close_panel(&mut self, panel_id: &PanelId) -> bool {
        let Some(containment) = self.containment(panel_id) else {
            return false;
        };
        if let Err(err) = self.detach(panel_id, containment) {
            tracing::warn!(message = "workspace.close_failed", panel_id = %panel_id, error = %err);
            return false;
        }
        let _ = self.records.remove(panel_id);
        let _ = self.host.unmount_panel(panel_id);
        let _ = self.history.remove(panel_id);
        tracing::debug!(message = "workspace.panel_closed", panel_id = %panel_id);

        if self.active.as_ref() == Some(panel_id) {
            self.active = None;
            self.activate_fallback();
        } else {
            self.sync_visibility();
            self.persist();
        }
        true
    }

    fn activate_fallback(&mut self) {
        let next = self
            .history
            .most_recent(|id| {
                matches!(
                    self.containment(id),
                    Some(Containment::Tree | Containment::Modal)
                )
            })
            .cloned()
            .or_else(|| self.modal.clone())
            .or_else(|| self.tree.visible_panel_ids().into_iter().next());
        match next {
            Some(panel_id) => {
                let _ = self.activate_panel(&panel_id);
            }
            None => {
                self.host.set_context(ACTIVE_PANEL_KEY, Value::Null);
                self.sync_visibility();
                self.persist();
            }
        }
    }

    /// Replace a tree panel with an `empty` placeholder, keeping the split
    /// shape. Panels outside the tree are simply closed.
    pub fn close_panel_to_placeholder(&mut self, panel_id: &PanelId) -> Option<PanelId> {
        match self.containment(panel_id) {
            Some(Containment::Tree) => self
                .replace_panel(panel_id, EMPTY_PANEL_TYPE, InitialBinding::Default)
                .ok(),
            Some(_) => {
                let _ = self.close_panel(panel_id);
                None
            }
            None => None,
        }
    }

    /// Swap a panel for a fresh panel of `panel_type` in the same place.
    pub fn replace_panel(
        &mut self,
        panel_id: &PanelId,
        panel_type: &str,
        binding: InitialBinding,
    ) -> Result<PanelId, WorkspaceError> {
        let containment = self
            .containment(panel_id)
            .ok_or_else(|| WorkspaceError::UnknownPanel {
                panel_id: panel_id.clone(),
            })?;
        if !self.host.registry().borrow().is_available(panel_type) {
            return Err(WorkspaceError::Unavailable {
                panel_type: panel_type.to_owned(),
            });
        }

        let new_id = self.allocate_panel_id(panel_type);
        match containment {
            Containment::Tree => {
                let _ = self.tree.apply(LayoutOperation::Replace {
                    old: panel_id.clone(),
                    new: new_id.clone(),
                })?;
            }
            Containment::Header => {
                for slot in self.header.iter_mut().filter(|p| *p == panel_id) {
                    *slot = new_id.clone();
                }
                if self.header_popover.as_ref() == Some(panel_id) {
                    self.header_popover = Some(new_id.clone());
                }
            }
            Containment::Modal => self.modal = Some(new_id.clone()),
        }

        let _ = self.records.remove(panel_id);
        let _ = self.host.unmount_panel(panel_id);
        let mut record = PanelRecord::new(new_id.clone(), panel_type);
        self.mount_record(&mut record, binding)?;
        let _ = self.records.insert(new_id.clone(), record);
        self.history.rename(panel_id, new_id.clone());
        tracing::debug!(
            message = "workspace.panel_replaced",
            panel_id = %panel_id,
            replacement = %new_id,
            panel_type,
        );

        if self.active.as_ref() == Some(panel_id) {
            self.active = None;
            let _ = self.activate_panel(&new_id);
        } else {
            self.sync_visibility();
            self.persist();
        }
        Ok(new_id)
    }

    // ---------------------------------------------------------------------
    // Activation
    // ---------------------------------------------------------------------

    /// Make `panel_id` the active panel and publish it to the context store.
    ///
    /// Tree panels become the active tab of their stack; header panels open
    /// in the header popover.
    pub fn activate_panel(&mut self, panel_id: &PanelId) -> bool {
        self.activate(panel_id, true)
    }

    /// `reveal` brings the panel into view (active tab, header popover);
    /// restoring a stored layout skips it so the stored shape is kept as is.
    fn activate(&mut self, panel_id: &PanelId, reveal: bool) -> bool {
        let Some(containment) = self.containment(panel_id) else {
            tracing::debug!(message = "workspace.activate_unknown", panel_id = %panel_id);
            return false;
        };
        match containment {
            Containment::Tree if reveal => {
                let _ = self.tree.apply(LayoutOperation::FocusTab {
                    panel: panel_id.clone(),
                });
            }
            Containment::Header if reveal => {
                self.header_popover = Some(panel_id.clone());
            }
            _ => {}
        }

        if let Some(previous) = self.active.replace(panel_id.clone())
            && &previous != panel_id
        {
            self.host.set_panel_focus(&previous, false);
        }
        self.host.set_panel_focus(panel_id, true);
        self.history.record(panel_id.clone());
        self.host
            .set_context(ACTIVE_PANEL_KEY, Value::String(panel_id.to_string()));
        tracing::debug!(message = "workspace.panel_activated", panel_id = %panel_id);
        self.sync_visibility();
        self.persist();
        true
    }

    // ---------------------------------------------------------------------
    // Structural mutations
    // ---------------------------------------------------------------------

    /// Move a panel next to `target` (which must be in the tree). Header and
    /// modal panels move into the tree.
    pub fn move_panel(
        &mut self,
        panel_id: &PanelId,
        target: &PanelId,
        region: Region,
    ) -> Result<(), WorkspaceError> {
        let containment = self
            .containment(panel_id)
            .ok_or_else(|| WorkspaceError::UnknownPanel {
                panel_id: panel_id.clone(),
            })?;
        if !self.tree.contains_panel(target) {
            return Err(WorkspaceError::NotInTree {
                panel_id: target.clone(),
            });
        }
        match containment {
            Containment::Tree => {
                let _ = self.tree.apply(LayoutOperation::Move {
                    panel: panel_id.clone(),
                    target: target.clone(),
                    attach: region.attach(),
                })?;
            }
            Containment::Header | Containment::Modal => {
                let _ = self.tree.apply(LayoutOperation::Insert {
                    target: Some(target.clone()),
                    panel: panel_id.clone(),
                    attach: region.attach(),
                })?;
                self.detach(panel_id, containment)?;
            }
        }
        tracing::debug!(message = "workspace.panel_moved", panel_id = %panel_id, target = %target);
        self.sync_visibility();
        self.persist();
        Ok(())
    }

    /// Flip the split-view mode of the panel's tab stack.
    pub fn toggle_split_view_mode_for_panel_id(&mut self, panel_id: &PanelId) -> bool {
        let toggled = self
            .tree
            .apply(LayoutOperation::ToggleSplitView {
                panel: panel_id.clone(),
            })
            .is_ok();
        if toggled {
            self.sync_visibility();
            self.persist();
        }
        toggled
    }

    /// Rotate the active tab of the panel's stack; returns the new active
    /// tab. The active panel follows when it was in that stack.
    pub fn cycle_tab(&mut self, panel_id: &PanelId, forward: bool) -> Option<PanelId> {
        let follows = self
            .active
            .as_ref()
            .is_some_and(|active| self.tree.stack_of(active) == self.tree.stack_of(panel_id));
        self.tree
            .apply(LayoutOperation::CycleTab {
                panel: panel_id.clone(),
                forward,
            })
            .ok()?;
        let current = self
            .tree
            .stack_for_panel(panel_id)
            .and_then(|stack| stack.active_panel())
            .cloned()?;
        if follows {
            let _ = self.activate_panel(&current);
        } else {
            self.sync_visibility();
            self.persist();
        }
        Some(current)
    }

    /// Open or close the header popover for a header panel. Returns whether
    /// the popover now shows `panel_id`.
    pub fn toggle_header_panel_by_id(&mut self, panel_id: &PanelId) -> bool {
        if !self.header.contains(panel_id) {
            tracing::debug!(message = "workspace.toggle_not_header", panel_id = %panel_id);
            return false;
        }
        let open = if self.header_popover.as_ref() == Some(panel_id) {
            self.header_popover = None;
            false
        } else {
            self.header_popover = Some(panel_id.clone());
            true
        };
        self.sync_visibility();
        open
    }

    /// Close the header popover, if open.
    pub fn close_header_popover(&mut self) -> Option<PanelId> {
        let closed = self.header_popover.take();
        if closed.is_some() {
            self.sync_visibility();
        }
        closed
    }

    /// Pin a tree or modal panel into the header dock.
    pub fn pin_panel_by_id(&mut self, panel_id: &PanelId) -> bool {
        let containment = match self.containment(panel_id) {
            Some(Containment::Header) | None => return false,
            Some(containment) => containment,
        };
        if let Err(err) = self.detach(panel_id, containment) {
            tracing::warn!(message = "workspace.pin_failed", panel_id = %panel_id, error = %err);
            return false;
        }
        self.header.push(panel_id.clone());
        tracing::debug!(message = "workspace.panel_pinned", panel_id = %panel_id);
        self.sync_visibility();
        self.persist();
        true
    }

    /// Return a header panel to the tree next to the active panel.
    pub fn unpin_panel_by_id(&mut self, panel_id: &PanelId, region: Region) -> bool {
        if !self.header.contains(panel_id) {
            return false;
        }
        if let Err(err) = self.place_in_tree(panel_id.clone(), None, region) {
            tracing::warn!(message = "workspace.unpin_failed", panel_id = %panel_id, error = %err);
            return false;
        }
        self.header.retain(|p| p != panel_id);
        if self.header_popover.as_ref() == Some(panel_id) {
            self.header_popover = None;
        }
        self.sync_visibility();
        self.persist();
        true
    }

    /// Promote a tree or header panel to the modal overlay. A panel already
    /// in the overlay returns to the tree first.
    pub fn open_modal_panel(&mut self, panel_id: &PanelId) -> bool {
        let containment = match self.containment(panel_id) {
            Some(Containment::Modal) => return true,
            Some(containment) => containment,
            None => return false,
        };
        if self.modal.is_some() && self.close_modal_panel().is_none() {
            return false;
        }
        if let Err(err) = self.detach(panel_id, containment) {
            tracing::warn!(message = "workspace.modal_failed", panel_id = %panel_id, error = %err);
            return false;
        }
        self.modal = Some(panel_id.clone());
        tracing::debug!(message = "workspace.modal_opened", panel_id = %panel_id);
        self.sync_visibility();
        self.persist();
        true
    }

    /// Return the modal panel to the tree next to the active panel.
    pub fn close_modal_panel(&mut self) -> Option<PanelId> {
        let panel_id = self.modal.take()?;
        if let Err(err) = self.place_in_tree(panel_id.clone(), None, Region::Right) {
            tracing::warn!(message = "workspace.modal_close_failed", panel_id = %panel_id, error = %err);
            self.modal = Some(panel_id);
            return None;
        }
        self.sync_visibility();
        self.persist();
        Some(panel_id)
    }

    // ---------------------------------------------------------------------
    // Bindings and state
    // ---------------------------------------------------------------------

    /// Change a panel's binding through the host and persist it.
    pub fn set_panel_binding(
        &mut self,
        panel_id: &PanelId,
        binding: Option<PanelBinding>,
    ) -> Result<BindingChange, HostError> {
        let change = self.host.set_panel_binding(panel_id, binding)?;
        if let Some(record) = self.records.get_mut(panel_id) {
            record.binding = change.current.clone();
        }
        self.persist();
        Ok(change)
    }

    /// Replace a panel's persisted state.
    pub fn set_panel_state(&mut self, panel_id: &PanelId, state: Value) -> bool {
        let Some(record) = self.records.get_mut(panel_id) else {
            return false;
        };
        record.state = state;
        self.persist();
        true
    }

    fn sync_visibility(&mut self) {
        let mut visible: BTreeSet<PanelId> = self.tree.visible_panel_ids().into_iter().collect();
        visible.extend(self.modal.iter().cloned());
        visible.extend(self.header_popover.iter().cloned());
        let ids: Vec<PanelId> = self.records.keys().cloned().collect();
        for panel_id in ids {
            let shown = visible.contains(&panel_id);
            self.host.set_panel_visibility(&panel_id, shown);
        }
    }
}

/// Rectangles solved against the current viewport; nothing before the
/// first [`WorkspaceController::resize`].
impl GeometrySource for WorkspaceController {
    fn panel_rect(&self, panel_id: &PanelId) -> Option<Rect> {
        let area = self.viewport?;
        self.tree.solve_layout(area).remove(panel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use paneldeck_core::storage::{KeyValueStore, MemoryStore, SafeStore};
    use paneldeck_host::testing::{CallLog, ModuleCall, RecordingModule};
    use paneldeck_host::{ContextStore, NullSink, PanelManifest, PanelRegistry};
    use serde_json::json;

    fn controller(log: &CallLog) -> WorkspaceController {
        let mut registry = PanelRegistry::new();
        for panel_type in ["chat", "notes", "sessions", "lists"] {
            registry.register(PanelManifest::new(panel_type, panel_type), RecordingModule::factory(log));
        }
        registry.register_manifest(PanelManifest::new("boards", "Boards").with_plugin("kanban"));
        let host = PanelHostController::new(registry.shared(), ContextStore::new(), Rc::new(NullSink));
        WorkspaceController::new(host, WorkspaceConfig::default())
    }

    #[test]
    fn first_panel_becomes_root_and_active() {
        let log = CallLog::default();
        let mut ws = controller(&log);
        let id = ws.open_panel("chat", OpenOptions::default()).unwrap();
        assert_eq!(ws.visible_panel_ids(), vec![id.clone()]);
        assert_eq!(ws.active_panel_id(), Some(&id));
        assert_eq!(
            ws.host().get_context(ACTIVE_PANEL_KEY),
            Some(json!(id.as_str()))
        );
        ws.check_invariants().unwrap();
    }

    #[test]
    fn unavailable_type_opens_nothing() {
        let log = CallLog::default();
        let mut ws = controller(&log);
        assert_eq!(ws.open_panel("boards", OpenOptions::default()), None);
        assert_eq!(ws.open_panel("nope", OpenOptions::default()), None);
        assert!(ws.panel_ids().is_empty());
    }

    #[test]
    fn regions_control_document_order() {
        let log = CallLog::default();
        let mut ws = controller(&log);
        let a = ws.open_panel("chat", OpenOptions::default()).unwrap();
        let b = ws.open_panel("notes", OpenOptions::default().at(Region::Left)).unwrap();
        assert_eq!(ws.visible_panel_ids(), vec![b.clone(), a.clone()]);
        let c = ws
            .open_panel("lists", OpenOptions::default().at(Region::Center).next_to(a.clone()))
            .unwrap();
        assert_eq!(ws.visible_panel_ids(), vec![b, c]);
        assert!(!ws.host().is_visible(&a));
    }

    #[test]
    fn closing_collapses_split_and_activates_previous() {
        let log = CallLog::default();
        let mut ws = controller(&log);
        let a = ws.open_panel("chat", OpenOptions::default()).unwrap();
        let b = ws.open_panel("notes", OpenOptions::default()).unwrap();
        assert!(ws.close_panel(&b));
        assert_eq!(ws.visible_panel_ids(), vec![a.clone()]);
        assert_eq!(ws.active_panel_id(), Some(&a));
        assert!(!ws.host().is_mounted(&b));
        assert!(!ws.close_panel(&b));
    }

    #[test]
    fn closing_last_panel_clears_active_context() {
        let log = CallLog::default();
        let mut ws = controller(&log);
        let a = ws.open_panel("chat", OpenOptions::default()).unwrap();
        assert!(ws.close_panel(&a));
        assert!(ws.tree().is_empty());
        assert_eq!(ws.active_panel_id(), None);
        assert_eq!(ws.host().get_context(ACTIVE_PANEL_KEY), Some(Value::Null));
    }

    #[test]
    fn placeholder_close_keeps_layout_shape() {
        let log = CallLog::default();
        let mut ws = controller(&log);
        let a = ws.open_panel("chat", OpenOptions::default()).unwrap();
        let b = ws.open_panel("notes", OpenOptions::default()).unwrap();
        let placeholder = ws.close_panel_to_placeholder(&b).unwrap();
        assert_eq!(ws.visible_panel_ids(), vec![a, placeholder.clone()]);
        assert_eq!(ws.panel_type(&placeholder), Some(EMPTY_PANEL_TYPE));
        assert_eq!(ws.active_panel_id(), Some(&placeholder));
        assert_eq!(log.calls_for(&b).last(), Some(&ModuleCall::Unmount));
        ws.check_invariants().unwrap();
    }

    #[test]
    fn pin_unpin_and_modal_round_trip() {
        let log = CallLog::default();
        let mut ws = controller(&log);
        let a = ws.open_panel("chat", OpenOptions::default()).unwrap();
        let b = ws.open_panel("notes", OpenOptions::default()).unwrap();

        assert!(ws.pin_panel_by_id(&b));
        assert_eq!(ws.containment(&b), Some(Containment::Header));
        assert_eq!(ws.list_header_panel_ids(), vec![b.clone()]);
        assert!(!ws.pin_panel_by_id(&b));
        ws.check_invariants().unwrap();

        assert!(ws.open_modal_panel(&b));
        assert_eq!(ws.containment(&b), Some(Containment::Modal));
        assert!(ws.list_header_panel_ids().is_empty());
        ws.check_invariants().unwrap();

        assert_eq!(ws.close_modal_panel(), Some(b.clone()));
        assert_eq!(ws.containment(&b), Some(Containment::Tree));
        assert!(ws.pin_panel_by_id(&a));
        assert!(ws.unpin_panel_by_id(&a, Region::Left));
        assert_eq!(ws.visible_panel_ids(), vec![a, b]);
        ws.check_invariants().unwrap();
    }

    #[test]
    fn header_popover_toggles_visibility() {
        let log = CallLog::default();
        let mut ws = controller(&log);
        let _a = ws.open_panel("chat", OpenOptions::default()).unwrap();
        let b = ws.open_panel("notes", OpenOptions::default()).unwrap();
        assert!(ws.pin_panel_by_id(&b));
        assert!(!ws.host().is_visible(&b));
        assert!(ws.toggle_header_panel_by_id(&b));
        assert!(ws.host().is_visible(&b));
        assert!(!ws.toggle_header_panel_by_id(&b));
        assert!(!ws.host().is_visible(&b));
    }

    #[test]
    fn tabs_cycle_and_split_view() {
        let log = CallLog::default();
        let mut ws = controller(&log);
        let a = ws.open_panel("chat", OpenOptions::default()).unwrap();
        let b = ws.open_panel("notes", OpenOptions::default().at(Region::Center)).unwrap();
        assert_eq!(ws.visible_panel_ids(), vec![b.clone()]);

        assert_eq!(ws.cycle_tab(&b, true), Some(a.clone()));
        assert_eq!(ws.active_panel_id(), Some(&a));

        assert!(ws.toggle_split_view_mode_for_panel_id(&a));
        assert_eq!(ws.visible_panel_ids(), vec![a, b]);
    }

    #[test]
    fn move_rejects_targets_outside_tree() {
        let log = CallLog::default();
        let mut ws = controller(&log);
        let a = ws.open_panel("chat", OpenOptions::default()).unwrap();
        let b = ws.open_panel("notes", OpenOptions::default()).unwrap();
        assert!(ws.pin_panel_by_id(&b));
        assert_eq!(
            ws.move_panel(&a, &b, Region::Left),
            Err(WorkspaceError::NotInTree { panel_id: b.clone() })
        );
        ws.move_panel(&b, &a, Region::Left).unwrap();
        assert_eq!(ws.visible_panel_ids(), vec![b, a]);
    }

    #[test]
    fn detached_workspace_stops_writing() {
        let log = CallLog::default();
        let mem = MemoryStore::new();
        let storage = LayoutStorage::new(SafeStore::new(mem.shared()), "0", WorkspaceKeys::default());
        let mut ws = controller(&log).with_storage(storage);
        let _ = ws.restore();
        let saved = mem.get("paneldeck.layout:0").unwrap();
        assert!(saved.is_some());

        assert!(ws.detach_storage().is_some());
        assert!(ws.detach_storage().is_none());
        assert!(ws.open_panel("notes", OpenOptions::default()).is_some());
        assert_eq!(mem.get("paneldeck.layout:0").unwrap(), saved);
    }

    #[test]
    fn restore_round_trips_through_storage() {
        let log = CallLog::default();
        let mem = MemoryStore::new();
        let storage = LayoutStorage::new(SafeStore::new(mem.shared()), "0", WorkspaceKeys::default());

        let mut ws = controller(&log).with_storage(storage.clone());
        assert_eq!(ws.restore(), RestoreOutcome::DefaultLayout { reason: None });
        let opened = ws.visible_panel_ids();
        assert_eq!(opened.len(), 2);
        let notes = ws.open_panel("notes", OpenOptions::default()).unwrap();
        assert!(ws.pin_panel_by_id(&notes));

        let mut again = controller(&log).with_storage(storage);
        assert_eq!(again.restore(), RestoreOutcome::Restored { panels: 3 });
        assert_eq!(again.visible_panel_ids(), opened);
        assert_eq!(again.list_header_panel_ids(), vec![notes]);
        again.check_invariants().unwrap();

        // Fresh ids never collide with restored ones.
        let next = again.open_panel("notes", OpenOptions::default()).unwrap();
        assert!(!opened.contains(&next));
    }

    #[test]
    fn binding_changes_are_recorded() {
        let log = CallLog::default();
        let mut ws = controller(&log);
        let id = ws
            .open_panel("chat", OpenOptions::default().with_binding(Some(PanelBinding::fixed("s1"))))
            .unwrap();
        assert_eq!(ws.record(&id).unwrap().binding, Some(PanelBinding::fixed("s1")));
        ws.set_panel_binding(&id, None).unwrap();
        assert_eq!(ws.record(&id).unwrap().binding, None);
    }
}
