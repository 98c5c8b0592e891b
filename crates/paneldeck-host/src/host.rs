#![forbid(unsafe_code)]

//! Panel Host Controller: owns mounted panel instances and brokers session
//! bindings, metadata, shared context and panel event traffic.
//!
//! # Failure semantics
//!
//! Only [`PanelHostController::mount_panel`] with an id that is already
//! mounted returns an error the caller must treat as a bug. Panels that
//! cannot be constructed (unknown type, missing capability or plugin,
//! factory error) are replaced by a [`PlaceholderPanel`]; every other
//! operation on an absent panel is a logged no-op.
//!
//! # Invariants
//!
//! - A mounted panel's stored binding is always `coerce_binding(type, _)`:
//!   non-bindable panel types are never bound.
//! - `on_session_change` fires at mount and then only when the resolved
//!   session id actually changes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use paneldeck_core::binding::{
    PanelBinding, coerce_binding, is_session_bindable, resolved_session_id,
};
use paneldeck_core::geometry::Rect;
use paneldeck_core::ids::PanelId;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::context::{ContextStore, SESSION_KEY_PREFIX, panel_session_key, session_key};
use crate::events::{
    LifecycleState, OutboundMessage, OutboundSink, PanelBindingEvent, PanelEvent,
    PanelLifecycleEvent,
};
use crate::module::{
    MountOptions, PanelContainer, PanelError, PanelHostHandle, PanelModule, PlaceholderPanel,
    outbound_event,
};
use crate::registry::{Availability, SharedRegistry};
use crate::subscription::{Subscribers, Subscription};

// =========================================================================
// Requests and results
// =========================================================================

/// Binding a panel starts with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InitialBinding {
    /// Apply the manifest's default binding policy.
    #[default]
    Default,
    /// Use this binding (coerced for non-bindable types).
    Explicit(Option<PanelBinding>),
}

/// Arguments of [`PanelHostController::mount_panel`].
#[derive(Debug, Clone)]
pub struct MountRequest {
    pub panel_id: PanelId,
    pub panel_type: String,
    pub container: PanelContainer,
    pub binding: InitialBinding,
    pub state: Value,
    pub focus: bool,
}

impl MountRequest {
    #[must_use]
    pub fn new(panel_id: PanelId, panel_type: impl Into<String>) -> Self {
        Self {
            panel_id,
            panel_type: panel_type.into(),
            container: PanelContainer::new(),
            binding: InitialBinding::Default,
            state: Value::Null,
            focus: false,
        }
    }

    #[must_use]
    pub fn with_container(mut self, container: PanelContainer) -> Self {
        self.container = container;
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

    #[must_use]
    pub fn focused(mut self, focus: bool) -> Self {
        self.focus = focus;
        self
    }
}

/// Why a placeholder was mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderReason {
    Unavailable(Availability),
    ConstructionFailed(PanelError),
}

impl fmt::Display for PlaceholderReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(availability) => write!(f, "{availability}"),
            Self::ConstructionFailed(err) => write!(f, "{}", err.message),
        }
    }
}

/// Text rendered by the placeholder substituted for `panel_type`.
#[must_use]
pub fn placeholder_message(panel_type: &str, reason: &PlaceholderReason) -> String {
    format!("Panel \"{panel_type}\" is unavailable: {reason}.")
}

/// Outcome of a successful mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountStatus {
    Mounted,
    Placeholder(PlaceholderReason),
}

impl MountStatus {
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

/// Binding transition reported by [`PanelHostController::set_panel_binding`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingChange {
    pub previous: Option<PanelBinding>,
    pub current: Option<PanelBinding>,
    pub session_changed: bool,
}

/// Status decorations shown on a panel's frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
}

/// Host controller errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// Mount of an id that is already mounted. Caller bug.
    AlreadyMounted { panel_id: PanelId },
    UnknownPanel { panel_id: PanelId },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyMounted { panel_id } => write!(f, "panel {panel_id} is already mounted"),
            Self::UnknownPanel { panel_id } => write!(f, "panel {panel_id} is not mounted"),
        }
    }
}

impl std::error::Error for HostError {}

/// Collaborator told about every binding change.
pub type BindingObserver = Box<dyn Fn(&PanelId, Option<&PanelBinding>)>;

// =========================================================================
// Controller
// =========================================================================

struct MountedPanel {
    panel_type: String,
    binding: Rc<RefCell<Option<PanelBinding>>>,
    metadata: PanelMetadata,
    module: Box<dyn PanelModule>,
    container: PanelContainer,
    placeholder: bool,
    visible: bool,
    focused: bool,
    size: Option<Rect>,
}

impl MountedPanel {
    fn resolved_session(&self) -> Option<String> {
        resolved_session_id(self.binding.borrow().as_ref()).map(str::to_owned)
    }
}

/// Owner of mounted panel instances.
pub struct PanelHostController {
    registry: SharedRegistry,
    context: ContextStore,
    outbound: Rc<dyn OutboundSink>,
    window_id: Option<String>,
    panels: BTreeMap<PanelId, MountedPanel>,
    binding_subscribers: BTreeMap<PanelId, Rc<Subscribers<Option<PanelBinding>>>>,
    metadata_subscribers: Rc<Subscribers<(PanelId, PanelMetadata)>>,
    binding_observer: Option<BindingObserver>,
}

impl fmt::Debug for PanelHostController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelHostController")
            .field("panels", &self.panels.keys().collect::<Vec<_>>())
            .field("window_id", &self.window_id)
            .finish_non_exhaustive()
    }
}

impl PanelHostController {
    #[must_use]
    pub fn new(registry: SharedRegistry, context: ContextStore, outbound: Rc<dyn OutboundSink>) -> Self {
        Self {
            registry,
            context,
            outbound,
            window_id: None,
            panels: BTreeMap::new(),
            binding_subscribers: BTreeMap::new(),
            metadata_subscribers: Rc::new(Subscribers::new()),
            binding_observer: None,
        }
    }

    /// Window id stamped on outbound envelopes.
    pub fn set_window_id(&mut self, window_id: Option<String>) {
        self.window_id = window_id;
    }

    #[must_use]
    pub fn window_id(&self) -> Option<&str> {
        self.window_id.as_deref()
    }

    #[must_use]
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    #[must_use]
    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    // ---------------------------------------------------------------------
    // Mount / unmount
    // ---------------------------------------------------------------------

    /// Mount a panel instance.
    ///
    /// Unavailable types and factory failures mount a placeholder instead.
    pub fn mount_panel(&mut self, request: MountRequest) -> Result<MountStatus, HostError> {
        let MountRequest {
            panel_id,
            panel_type,
            container,
            binding,
            state,
            focus,
        } = request;

        if self.panels.contains_key(&panel_id) {
            return Err(HostError::AlreadyMounted { panel_id });
        }

        let (availability, defaults_to_global, factory) = {
            let registry = self.registry.borrow();
            (
                registry.availability(&panel_type),
                registry
                    .manifest(&panel_type)
                    .is_some_and(|m| m.defaults_to_global()),
                registry.factory(&panel_type),
            )
        };

        let binding = match binding {
            InitialBinding::Default => {
                (is_session_bindable(&panel_type) && defaults_to_global)
                    .then_some(PanelBinding::Global)
            }
            InitialBinding::Explicit(binding) => coerce_binding(&panel_type, binding),
        };
        let binding = Rc::new(RefCell::new(binding));

        let handle = PanelHostHandle::new(
            panel_id.clone(),
            panel_type.clone(),
            Rc::clone(&binding),
            self.context.clone(),
            Rc::clone(&self.outbound),
            self.window_id.clone(),
        );
        let options = MountOptions { state, focus };

        let constructed = match factory {
            Some(factory) if availability.is_available() => {
                factory(&container, &handle, &options)
                    .map_err(PlaceholderReason::ConstructionFailed)
            }
            _ => Err(PlaceholderReason::Unavailable(availability)),
        };
        let (module, status) = match constructed {
            Ok(module) => (module, MountStatus::Mounted),
            Err(reason) => {
                tracing::warn!(
                    message = "panel.placeholder",
                    panel_id = %panel_id,
                    panel_type = %panel_type,
                    reason = %reason,
                );
                container.clear();
                let module: Box<dyn PanelModule> = Box::new(PlaceholderPanel::mount(
                    &container,
                    &placeholder_message(&panel_type, &reason),
                ));
                (module, MountStatus::Placeholder(reason))
            }
        };

        let panel = MountedPanel {
            panel_type: panel_type.clone(),
            binding,
            metadata: PanelMetadata::default(),
            module,
            container,
            placeholder: status.is_placeholder(),
            visible: true,
            focused: false,
            size: None,
        };
        let session = panel.resolved_session();
        let _ = self.panels.insert(panel_id.clone(), panel);

        tracing::debug!(
            message = "panel.mounted",
            panel_id = %panel_id,
            panel_type = %panel_type,
            session_id = session.as_deref().unwrap_or(""),
        );
        self.outbound
            .send(OutboundMessage::PanelLifecycle(PanelLifecycleEvent {
                panel_id: panel_id.clone(),
                panel_type,
                state: LifecycleState::Opened,
                session_id: session.clone(),
                window_id: self.window_id.clone(),
            }));

        if let Some(panel) = self.panels.get_mut(&panel_id) {
            panel.module.on_session_change(session.as_deref());
        }
        self.publish_panel_session(&panel_id, session.as_deref());

        if focus {
            self.set_panel_focus(&panel_id, true);
        }
        Ok(status)
    }

    /// Unmount a panel. Returns `false` if it was not mounted.
    pub fn unmount_panel(&mut self, panel_id: &PanelId) -> bool {
        let Some(mut panel) = self.panels.remove(panel_id) else {
            return false;
        };
        self.outbound
            .send(OutboundMessage::PanelLifecycle(PanelLifecycleEvent {
                panel_id: panel_id.clone(),
                panel_type: panel.panel_type.clone(),
                state: LifecycleState::Closed,
                session_id: panel.resolved_session(),
                window_id: self.window_id.clone(),
            }));
        panel.module.unmount();
        let _ = self.binding_subscribers.remove(panel_id);
        tracing::debug!(
            message = "panel.unmounted",
            panel_id = %panel_id,
            panel_type = %panel.panel_type,
        );
        true
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn is_mounted(&self, panel_id: &PanelId) -> bool {
        self.panels.contains_key(panel_id)
    }

    /// Mounted panel ids in id order.
    #[must_use]
    pub fn panel_ids(&self) -> Vec<PanelId> {
        self.panels.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.panels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    #[must_use]
    pub fn panel_type(&self, panel_id: &PanelId) -> Option<&str> {
        self.panels.get(panel_id).map(|p| p.panel_type.as_str())
    }

    #[must_use]
    pub fn is_placeholder(&self, panel_id: &PanelId) -> bool {
        self.panels.get(panel_id).is_some_and(|p| p.placeholder)
    }

    #[must_use]
    pub fn container(&self, panel_id: &PanelId) -> Option<&PanelContainer> {
        self.panels.get(panel_id).map(|p| &p.container)
    }

    #[must_use]
    pub fn is_visible(&self, panel_id: &PanelId) -> bool {
        self.panels.get(panel_id).is_some_and(|p| p.visible)
    }

    #[must_use]
    pub fn is_focused(&self, panel_id: &PanelId) -> bool {
        self.panels.get(panel_id).is_some_and(|p| p.focused)
    }

    #[must_use]
    pub fn panel_size(&self, panel_id: &PanelId) -> Option<Rect> {
        self.panels.get(panel_id).and_then(|p| p.size)
    }

    // ---------------------------------------------------------------------
    // Bindings
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn get_panel_binding(&self, panel_id: &PanelId) -> Option<PanelBinding> {
        self.panels
            .get(panel_id)
            .and_then(|p| p.binding.borrow().clone())
    }

    /// Session the panel currently resolves to (`Global` resolves to none).
    #[must_use]
    pub fn resolved_session(&self, panel_id: &PanelId) -> Option<String> {
        self.panels.get(panel_id).and_then(MountedPanel::resolved_session)
    }

    /// Register the collaborator told about every binding change.
    pub fn on_panel_binding_change(&mut self, observer: BindingObserver) {
        self.binding_observer = Some(observer);
    }

    /// Subscribe to binding changes of one panel.
    pub fn subscribe_panel_binding(
        &mut self,
        panel_id: &PanelId,
        handler: impl Fn(&Option<PanelBinding>) + 'static,
    ) -> Subscription {
        self.binding_subscribers
            .entry(panel_id.clone())
            .or_default()
            .subscribe(handler)
    }

    /// Change a panel's binding.
    ///
    /// Non-bindable panel types are forced to unbound. The module's
    /// `on_session_change` fires only when the resolved session changes.
    pub fn set_panel_binding(
        &mut self,
        panel_id: &PanelId,
        binding: Option<PanelBinding>,
    ) -> Result<BindingChange, HostError> {
        let Some(panel) = self.panels.get(panel_id) else {
            tracing::debug!(message = "panel.binding.unknown", panel_id = %panel_id);
            return Err(HostError::UnknownPanel {
                panel_id: panel_id.clone(),
            });
        };
        let panel_type = panel.panel_type.clone();
        let current = coerce_binding(&panel_type, binding);
        let previous = panel.binding.replace(current.clone());
        let previous_session = resolved_session_id(previous.as_ref()).map(str::to_owned);
        let current_session = resolved_session_id(current.as_ref()).map(str::to_owned);
        let session_changed = previous_session != current_session;

        tracing::debug!(
            message = "panel.binding.changed",
            panel_id = %panel_id,
            panel_type = %panel_type,
            session_id = current_session.as_deref().unwrap_or(""),
            session_changed,
        );

        if let Some(observer) = &self.binding_observer {
            observer(panel_id, current.as_ref());
        }
        if let Some(subs) = self.binding_subscribers.get(panel_id).cloned() {
            let _ = subs.notify(&current);
        }
        self.outbound
            .send(OutboundMessage::PanelBinding(PanelBindingEvent {
                panel_id: panel_id.clone(),
                panel_type,
                binding: current.clone(),
                window_id: self.window_id.clone(),
            }));

        if session_changed {
            if let Some(panel) = self.panels.get_mut(panel_id) {
                panel.module.on_session_change(current_session.as_deref());
            }
            self.publish_panel_session(panel_id, current_session.as_deref());
        }

        Ok(BindingChange {
            previous,
            current,
            session_changed,
        })
    }

    // ---------------------------------------------------------------------
    // Metadata
    // ---------------------------------------------------------------------

    /// Replace a panel's metadata and notify metadata subscribers.
    pub fn set_panel_metadata(&mut self, panel_id: &PanelId, metadata: PanelMetadata) -> bool {
        let Some(panel) = self.panels.get_mut(panel_id) else {
            return false;
        };
        if panel.metadata == metadata {
            return true;
        }
        panel.metadata = metadata.clone();
        let _ = self
            .metadata_subscribers
            .notify(&(panel_id.clone(), metadata));
        true
    }

    #[must_use]
    pub fn get_panel_metadata(&self, panel_id: &PanelId) -> Option<&PanelMetadata> {
        self.panels.get(panel_id).map(|p| &p.metadata)
    }

    pub fn subscribe_panel_metadata(
        &self,
        handler: impl Fn(&(PanelId, PanelMetadata)) + 'static,
    ) -> Subscription {
        self.metadata_subscribers.subscribe(handler)
    }

    // ---------------------------------------------------------------------
    // Shared context
    // ---------------------------------------------------------------------

    /// Store a context value. `session.*` keys also refresh every panel's
    /// derived session context.
    pub fn set_context(&mut self, key: &str, value: Value) {
        self.context.set(key, value);
        if key.starts_with(SESSION_KEY_PREFIX) {
            self.rebroadcast_session_context();
        }
    }

    #[must_use]
    pub fn get_context(&self, key: &str) -> Option<Value> {
        self.context.get(key)
    }

    pub fn subscribe_context(&self, key: &str, handler: impl Fn(&Value) + 'static) -> Subscription {
        self.context.subscribe(key, handler)
    }

    /// Re-publish `panel.session.<id>` for every mounted panel.
    pub fn rebroadcast_session_context(&self) {
        let entries: Vec<(PanelId, Option<String>)> = self
            .panels
            .iter()
            .map(|(id, panel)| (id.clone(), panel.resolved_session()))
            .collect();
        for (panel_id, session) in entries {
            self.publish_panel_session(&panel_id, session.as_deref());
        }
    }

    fn publish_panel_session(&self, panel_id: &PanelId, session_id: Option<&str>) {
        let summary = session_id
            .and_then(|id| self.context.get(&session_key(id)))
            .unwrap_or(Value::Null);
        self.context.set(
            &panel_session_key(panel_id.as_str()),
            json!({ "sessionId": session_id, "summary": summary }),
        );
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    /// Route an inbound panel event. Returns the number of panels reached.
    pub fn dispatch_panel_event(&mut self, event: &PanelEvent) -> usize {
        if event.is_broadcast() {
            let filter = event.session_filter();
            let mut delivered = 0;
            for panel in self.panels.values_mut() {
                if panel.panel_type != event.panel_type {
                    continue;
                }
                if !filter.matches(panel.resolved_session().as_deref()) {
                    continue;
                }
                panel.module.on_event(event);
                delivered += 1;
            }
            tracing::debug!(
                message = "panel_event.broadcast",
                panel_type = %event.panel_type,
                session_id = event.session_id.as_deref().unwrap_or(""),
                delivered,
            );
            return delivered;
        }

        match self.panels.get_mut(&event.panel_id) {
            None => {
                tracing::debug!(
                    message = "panel_event.unknown_panel",
                    panel_id = %event.panel_id,
                    panel_type = %event.panel_type,
                );
                0
            }
            Some(panel) if panel.panel_type != event.panel_type => {
                tracing::debug!(
                    message = "panel_event.type_mismatch",
                    panel_id = %event.panel_id,
                    expected = %panel.panel_type,
                    found = %event.panel_type,
                );
                0
            }
            Some(panel) => {
                panel.module.on_event(event);
                1
            }
        }
    }

    /// Send a panel event to the server on behalf of `panel_id`.
    pub fn send_panel_event(&self, panel_id: &PanelId, payload: Value) -> bool {
        let Some(panel) = self.panels.get(panel_id) else {
            return false;
        };
        let event = outbound_event(
            panel_id,
            &panel.panel_type,
            panel.binding.borrow().as_ref(),
            self.window_id.as_deref(),
            payload,
        );
        self.outbound.send(OutboundMessage::PanelEvent(event));
        true
    }

    // ---------------------------------------------------------------------
    // Lifecycle hooks
    // ---------------------------------------------------------------------

    pub fn set_panel_visibility(&mut self, panel_id: &PanelId, visible: bool) {
        if let Some(panel) = self.panels.get_mut(panel_id)
            && panel.visible != visible
        {
            panel.visible = visible;
            panel.module.on_visibility_change(visible);
        }
    }

    pub fn set_panel_focus(&mut self, panel_id: &PanelId, focused: bool) {
        if let Some(panel) = self.panels.get_mut(panel_id)
            && panel.focused != focused
        {
            panel.focused = focused;
            if focused {
                panel.module.on_focus();
            } else {
                panel.module.on_blur();
            }
        }
    }

    pub fn set_panel_size(&mut self, panel_id: &PanelId, size: Rect) {
        if let Some(panel) = self.panels.get_mut(panel_id)
            && panel.size != Some(size)
        {
            panel.size = Some(size);
            panel.module.on_resize(size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ACTIVE_PANEL_KEY;
    use crate::module::factory;
    use crate::registry::{PanelManifest, PanelRegistry, SessionScope};
    use crate::testing::{CallLog, ModuleCall, RecordingModule, RecordingSink};

    fn setup() -> (PanelHostController, CallLog, RecordingSink) {
        let log = CallLog::default();
        let mut registry = PanelRegistry::new();
        registry.register(PanelManifest::new("chat", "Chat"), RecordingModule::factory(&log));
        registry.register(PanelManifest::new("notes", "Notes"), RecordingModule::factory(&log));
        registry.register(
            PanelManifest::new("session-info", "Session")
                .with_session_scope(SessionScope::Global),
            RecordingModule::factory(&log),
        );
        let sink = RecordingSink::default();
        let host = PanelHostController::new(
            registry.shared(),
            ContextStore::new(),
            Rc::new(sink.clone()),
        );
        (host, log, sink)
    }

    fn p(id: &str) -> PanelId {
        PanelId::from(id)
    }

    #[test]
    fn duplicate_mount_is_an_error() {
        let (mut host, _, _) = setup();
        host.mount_panel(MountRequest::new(p("a"), "chat")).unwrap();
        assert_eq!(
            host.mount_panel(MountRequest::new(p("a"), "notes")),
            Err(HostError::AlreadyMounted { panel_id: p("a") })
        );
        assert_eq!(host.panel_type(&p("a")), Some("chat"));
    }

    #[test]
    fn mount_emits_opened_and_session_change() {
        let (mut host, log, sink) = setup();
        host.mount_panel(MountRequest::new(p("a"), "chat").with_binding(Some(PanelBinding::fixed("s1"))))
            .unwrap();
        assert_eq!(sink.kinds(), vec!["panel_lifecycle"]);
        assert_eq!(
            log.calls_for(&p("a")),
            vec![ModuleCall::SessionChange(Some("s1".into()))]
        );
        assert_eq!(
            host.get_context("panel.session.a").unwrap()["sessionId"],
            json!("s1")
        );
    }

    #[test]
    fn default_policy_binds_global_scoped_types() {
        let (mut host, _, _) = setup();
        host.mount_panel(MountRequest::new(p("info"), "session-info"))
            .unwrap();
        host.mount_panel(MountRequest::new(p("chat"), "chat")).unwrap();
        assert_eq!(host.get_panel_binding(&p("info")), Some(PanelBinding::Global));
        assert_eq!(host.get_panel_binding(&p("chat")), None);
    }

    #[test]
    fn non_bindable_types_are_coerced() {
        let (mut host, _, _) = setup();
        host.mount_panel(MountRequest::new(p("n"), "notes").with_binding(Some(PanelBinding::fixed("s1"))))
            .unwrap();
        assert_eq!(host.get_panel_binding(&p("n")), None);
        let change = host
            .set_panel_binding(&p("n"), Some(PanelBinding::Global))
            .unwrap();
        assert_eq!(change.current, None);
        assert!(!change.session_changed);
    }

    #[test]
    fn session_change_fires_only_on_actual_change() {
        let (mut host, log, _) = setup();
        host.mount_panel(MountRequest::new(p("a"), "chat")).unwrap();
        log.clear();

        host.set_panel_binding(&p("a"), Some(PanelBinding::Global))
            .unwrap();
        assert!(log.calls_for(&p("a")).is_empty());

        host.set_panel_binding(&p("a"), Some(PanelBinding::fixed("s2")))
            .unwrap();
        host.set_panel_binding(&p("a"), Some(PanelBinding::fixed("s2")))
            .unwrap();
        assert_eq!(
            log.calls_for(&p("a")),
            vec![ModuleCall::SessionChange(Some("s2".into()))]
        );
    }

    #[test]
    fn binding_subscribers_and_observer_are_notified() {
        let (mut host, _, sink) = setup();
        host.mount_panel(MountRequest::new(p("a"), "chat")).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let observed = Rc::new(RefCell::new(Vec::new()));
        let _guard = {
            let seen = Rc::clone(&seen);
            host.subscribe_panel_binding(&p("a"), move |b| seen.borrow_mut().push(b.clone()))
        };
        {
            let observed = Rc::clone(&observed);
            host.on_panel_binding_change(Box::new(move |id, b| {
                observed.borrow_mut().push((id.clone(), b.cloned()));
            }));
        }
        host.set_panel_binding(&p("a"), Some(PanelBinding::fixed("s1")))
            .unwrap();
        assert_eq!(*seen.borrow(), vec![Some(PanelBinding::fixed("s1"))]);
        assert_eq!(
            *observed.borrow(),
            vec![(p("a"), Some(PanelBinding::fixed("s1")))]
        );
        assert_eq!(sink.kinds().last(), Some(&"panel_binding"));
    }

    #[test]
    fn unknown_panel_binding_is_reported() {
        let (mut host, _, _) = setup();
        assert_eq!(
            host.set_panel_binding(&p("ghost"), None),
            Err(HostError::UnknownPanel { panel_id: p("ghost") })
        );
    }

    #[test]
    fn factory_error_mounts_placeholder() {
        let (mut host, _, _) = setup();
        host.registry().borrow_mut().register(
            PanelManifest::new("broken", "Broken"),
            factory(|_, _, _| Err(PanelError::new("boom"))),
        );
        let status = host.mount_panel(MountRequest::new(p("b"), "broken")).unwrap();
        assert!(status.is_placeholder());
        assert!(host.is_placeholder(&p("b")));
        assert_eq!(
            host.container(&p("b")).unwrap().text(),
            "Panel \"broken\" is unavailable: boom."
        );
    }

    #[test]
    fn direct_event_requires_matching_type() {
        let (mut host, log, _) = setup();
        host.mount_panel(MountRequest::new(p("a"), "chat")).unwrap();
        log.clear();
        let wrong = PanelEvent::to_panel(p("a"), "notes", json!(1));
        assert_eq!(host.dispatch_panel_event(&wrong), 0);
        let right = PanelEvent::to_panel(p("a"), "chat", json!(2));
        assert_eq!(host.dispatch_panel_event(&right), 1);
        assert_eq!(log.calls_for(&p("a")), vec![ModuleCall::Event(right)]);
        let missing = PanelEvent::to_panel(p("zzz"), "chat", json!(3));
        assert_eq!(host.dispatch_panel_event(&missing), 0);
    }

    #[test]
    fn send_panel_event_carries_resolved_session() {
        let (mut host, _, sink) = setup();
        host.set_window_id(Some("2".into()));
        host.mount_panel(MountRequest::new(p("a"), "chat").with_binding(Some(PanelBinding::fixed("s9"))))
            .unwrap();
        sink.take();
        assert!(host.send_panel_event(&p("a"), json!({"k": 1})));
        let messages = sink.messages();
        let OutboundMessage::PanelEvent(event) = &messages[0] else {
            panic!("expected panel_event");
        };
        assert_eq!(event.session_id.as_deref(), Some("s9"));
        assert_eq!(event.window_id.as_deref(), Some("2"));
        assert!(!host.send_panel_event(&p("missing"), Value::Null));
    }

    #[test]
    fn lifecycle_hooks_forward_once_per_change() {
        let (mut host, log, _) = setup();
        host.mount_panel(MountRequest::new(p("a"), "notes")).unwrap();
        log.clear();
        host.set_panel_focus(&p("a"), true);
        host.set_panel_focus(&p("a"), true);
        host.set_panel_focus(&p("a"), false);
        host.set_panel_visibility(&p("a"), false);
        host.set_panel_size(&p("a"), Rect::new(0.0, 0.0, 10.0, 10.0));
        host.set_panel_focus(&p("ghost"), true);
        assert_eq!(
            log.calls_for(&p("a")),
            vec![
                ModuleCall::Focus,
                ModuleCall::Blur,
                ModuleCall::Visibility(false),
                ModuleCall::Resize(Rect::new(0.0, 0.0, 10.0, 10.0)),
            ]
        );
    }

    #[test]
    fn session_context_rebroadcasts_to_bound_panels() {
        let (mut host, _, _) = setup();
        host.mount_panel(MountRequest::new(p("a"), "chat").with_binding(Some(PanelBinding::fixed("s1"))))
            .unwrap();
        host.set_context("session.s1", json!({"name": "Planning"}));
        assert_eq!(
            host.get_context("panel.session.a").unwrap()["summary"]["name"],
            json!("Planning")
        );
        host.set_context(ACTIVE_PANEL_KEY, json!("a"));
        assert_eq!(host.get_context(ACTIVE_PANEL_KEY), Some(json!("a")));
    }

    #[test]
    fn metadata_updates_notify() {
        let (mut host, _, _) = setup();
        host.mount_panel(MountRequest::new(p("a"), "chat")).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _guard = {
            let seen = Rc::clone(&seen);
            host.subscribe_panel_metadata(move |(id, m)| seen.borrow_mut().push((id.clone(), m.badge.clone())))
        };
        let metadata = PanelMetadata {
            status: None,
            badge: Some("3".into()),
        };
        assert!(host.set_panel_metadata(&p("a"), metadata.clone()));
        assert!(host.set_panel_metadata(&p("a"), metadata));
        assert_eq!(*seen.borrow(), vec![(p("a"), Some("3".to_owned()))]);
        assert!(!host.set_panel_metadata(&p("zzz"), PanelMetadata::default()));
    }

    #[test]
    fn unmount_emits_closed_then_unmounts() {
        let (mut host, log, sink) = setup();
        host.mount_panel(MountRequest::new(p("a"), "chat")).unwrap();
        sink.take();
        assert!(host.unmount_panel(&p("a")));
        assert!(!host.unmount_panel(&p("a")));
        assert_eq!(sink.kinds(), vec!["panel_lifecycle"]);
        assert_eq!(log.calls_for(&p("a")).last(), Some(&ModuleCall::Unmount));
        assert!(!host.is_mounted(&p("a")));
    }
}
