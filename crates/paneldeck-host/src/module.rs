#![forbid(unsafe_code)]

//! Panel module contract.
//!
//! A panel type is a factory registered under a string tag. Mounting calls
//! the factory with the panel's container, a host handle and init options;
//! the factory returns a boxed [`PanelModule`]. Every lifecycle hook except
//! [`PanelModule::unmount`] is optional and defaults to a no-op.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use paneldeck_core::binding::{PanelBinding, resolved_session_id};
use paneldeck_core::geometry::Rect;
use paneldeck_core::ids::PanelId;
use serde_json::Value;

use crate::context::ContextStore;
use crate::events::{OutboundMessage, OutboundSink, PanelEvent};

/// Rendering surface handed to a panel. Clones share the same content.
#[derive(Debug, Clone, Default)]
pub struct PanelContainer {
    text: Rc<RefCell<String>>,
}

impl PanelContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the container's content.
    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.borrow_mut() = text.into();
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.text.borrow().clone()
    }

    pub fn clear(&self) {
        self.text.borrow_mut().clear();
    }
}

/// Lifecycle hooks of a mounted panel.
pub trait PanelModule {
    fn on_visibility_change(&mut self, _visible: bool) {}
    fn on_focus(&mut self) {}
    fn on_blur(&mut self) {}
    fn on_resize(&mut self, _size: Rect) {}
    fn on_session_change(&mut self, _session_id: Option<&str>) {}
    fn on_event(&mut self, _event: &PanelEvent) {}
    fn unmount(&mut self);
}

/// Options passed to a panel factory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MountOptions {
    pub state: Value,
    pub focus: bool,
}

/// Capability handle a panel module keeps to talk back to the host.
#[derive(Clone)]
pub struct PanelHostHandle {
    panel_id: PanelId,
    panel_type: String,
    binding: Rc<RefCell<Option<PanelBinding>>>,
    context: ContextStore,
    outbound: Rc<dyn OutboundSink>,
    window_id: Option<String>,
}

impl fmt::Debug for PanelHostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelHostHandle")
            .field("panel_id", &self.panel_id)
            .field("panel_type", &self.panel_type)
            .finish_non_exhaustive()
    }
}

impl PanelHostHandle {
    pub(crate) fn new(
        panel_id: PanelId,
        panel_type: String,
        binding: Rc<RefCell<Option<PanelBinding>>>,
        context: ContextStore,
        outbound: Rc<dyn OutboundSink>,
        window_id: Option<String>,
    ) -> Self {
        Self {
            panel_id,
            panel_type,
            binding,
            context,
            outbound,
            window_id,
        }
    }

    #[must_use]
    pub fn panel_id(&self) -> &PanelId {
        &self.panel_id
    }

    #[must_use]
    pub fn panel_type(&self) -> &str {
        &self.panel_type
    }

    /// Current binding of this panel.
    #[must_use]
    pub fn binding(&self) -> Option<PanelBinding> {
        self.binding.borrow().clone()
    }

    /// The shared context store.
    #[must_use]
    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    /// Send a panel event to the server on behalf of this panel.
    pub fn send_event(&self, payload: Value) {
        self.outbound
            .send(OutboundMessage::PanelEvent(outbound_event(
                &self.panel_id,
                &self.panel_type,
                self.binding.borrow().as_ref(),
                self.window_id.as_deref(),
                payload,
            )));
    }
}

/// Build an outbound `panel_event` carrying the panel's resolved session.
pub(crate) fn outbound_event(
    panel_id: &PanelId,
    panel_type: &str,
    binding: Option<&PanelBinding>,
    window_id: Option<&str>,
    payload: Value,
) -> PanelEvent {
    PanelEvent {
        panel_id: panel_id.clone(),
        panel_type: panel_type.to_owned(),
        payload,
        session_id: resolved_session_id(binding).map(str::to_owned),
        window_id: window_id.map(str::to_owned),
    }
}

/// Panel construction failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelError {
    pub message: String,
}

impl PanelError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for PanelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panel construction failed: {}", self.message)
    }
}

impl std::error::Error for PanelError {}

/// Factory producing a panel module.
pub type PanelFactory = Rc<
    dyn Fn(&PanelContainer, &PanelHostHandle, &MountOptions) -> Result<Box<dyn PanelModule>, PanelError>,
>;

/// Wrap a closure as a [`PanelFactory`].
pub fn factory<F>(f: F) -> PanelFactory
where
    F: Fn(&PanelContainer, &PanelHostHandle, &MountOptions) -> Result<Box<dyn PanelModule>, PanelError>
        + 'static,
{
    Rc::new(f)
}

// =========================================================================
// Built-in modules
// =========================================================================

/// Stand-in rendered when a panel type cannot be constructed.
#[derive(Debug)]
pub struct PlaceholderPanel {
    container: PanelContainer,
}

impl PlaceholderPanel {
    /// Render `message` into `container`.
    #[must_use]
    pub fn mount(container: &PanelContainer, message: &str) -> Self {
        container.set_text(message);
        Self {
            container: container.clone(),
        }
    }
}

impl PanelModule for PlaceholderPanel {
    fn unmount(&mut self) {
        self.container.clear();
    }
}

/// The `empty` panel type: keeps a layout slot occupied.
#[derive(Debug, Default)]
pub struct EmptyPanel;

impl PanelModule for EmptyPanel {
    fn unmount(&mut self) {}
}
