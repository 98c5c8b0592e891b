#![forbid(unsafe_code)]

//! In-memory doubles for exercising the host without a server or DOM.

use std::cell::RefCell;
use std::rc::Rc;

use paneldeck_core::geometry::Rect;
use paneldeck_core::ids::PanelId;

use crate::events::{OutboundMessage, OutboundSink, PanelEvent};
use crate::module::{PanelError, PanelFactory, PanelModule, factory};

/// Outbound sink that records every message. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    messages: Rc<RefCell<Vec<OutboundMessage>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.borrow().clone()
    }

    /// Drain and return everything recorded so far.
    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.messages.borrow_mut())
    }

    /// Wire `type` tags in send order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.messages.borrow().iter().map(OutboundMessage::kind).collect()
    }
}

impl OutboundSink for RecordingSink {
    fn send(&self, message: OutboundMessage) {
        self.messages.borrow_mut().push(message);
    }
}

/// One hook invocation on a [`RecordingModule`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleCall {
    Visibility(bool),
    Focus,
    Blur,
    Resize(Rect),
    SessionChange(Option<String>),
    Event(PanelEvent),
    Unmount,
}

/// Shared log of module calls keyed by panel id.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Rc<RefCell<Vec<(PanelId, ModuleCall)>>>,
}

impl CallLog {
    fn push(&self, panel_id: &PanelId, call: ModuleCall) {
        self.calls.borrow_mut().push((panel_id.clone(), call));
    }

    #[must_use]
    pub fn calls_for(&self, panel_id: &PanelId) -> Vec<ModuleCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|(id, _)| id == panel_id)
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Panels that received an event, in delivery order.
    #[must_use]
    pub fn event_recipients(&self) -> Vec<PanelId> {
        self.calls
            .borrow()
            .iter()
            .filter(|(_, call)| matches!(call, ModuleCall::Event(_)))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

/// Panel module that records every hook call.
#[derive(Debug)]
pub struct RecordingModule {
    panel_id: PanelId,
    log: CallLog,
}

impl RecordingModule {
    /// Factory producing recording modules that write `"<type> ready"` into
    /// their container.
    #[must_use]
    pub fn factory(log: &CallLog) -> PanelFactory {
        let log = log.clone();
        factory(move |container, host, _| {
            container.set_text(format!("{} ready", host.panel_type()));
            Ok(Box::new(RecordingModule {
                panel_id: host.panel_id().clone(),
                log: log.clone(),
            }))
        })
    }

    /// Factory whose construction always fails.
    #[must_use]
    pub fn failing_factory(message: &'static str) -> PanelFactory {
        factory(move |_, _, _| Err(PanelError::new(message)))
    }
}

impl PanelModule for RecordingModule {
    fn on_visibility_change(&mut self, visible: bool) {
        self.log.push(&self.panel_id, ModuleCall::Visibility(visible));
    }

    fn on_focus(&mut self) {
        self.log.push(&self.panel_id, ModuleCall::Focus);
    }

    fn on_blur(&mut self) {
        self.log.push(&self.panel_id, ModuleCall::Blur);
    }

    fn on_resize(&mut self, size: Rect) {
        self.log.push(&self.panel_id, ModuleCall::Resize(size));
    }

    fn on_session_change(&mut self, session_id: Option<&str>) {
        self.log
            .push(&self.panel_id, ModuleCall::SessionChange(session_id.map(str::to_owned)));
    }

    fn on_event(&mut self, event: &PanelEvent) {
        self.log.push(&self.panel_id, ModuleCall::Event(event.clone()));
    }

    fn unmount(&mut self) {
        self.log.push(&self.panel_id, ModuleCall::Unmount);
    }
}
