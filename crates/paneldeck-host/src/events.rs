#![forbid(unsafe_code)]

//! Panel event envelopes exchanged with the server connection.
//!
//! Inbound and outbound panel events share one wire shape:
//!
//! ```json
//! {"type":"panel_event","panelId":"chat-1","panelType":"chat",
//!  "payload":{},"sessionId":"s1","windowId":"0"}
//! ```
//!
//! A `panelId` of `"*"` is a broadcast addressed by `panelType`, filtered by
//! `sessionId` (see [`SessionFilter`]).

use paneldeck_core::binding::PanelBinding;
use paneldeck_core::ids::PanelId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A `panel_event` envelope (without the `type` tag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelEvent {
    pub panel_id: PanelId,
    pub panel_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
}

impl PanelEvent {
    /// Event addressed to one panel.
    #[must_use]
    pub fn to_panel(panel_id: PanelId, panel_type: impl Into<String>, payload: Value) -> Self {
        Self {
            panel_id,
            panel_type: panel_type.into(),
            payload,
            session_id: None,
            window_id: None,
        }
    }

    /// Broadcast to every panel of `panel_type`.
    #[must_use]
    pub fn broadcast(panel_type: impl Into<String>, payload: Value) -> Self {
        Self::to_panel(PanelId::broadcast(), panel_type, payload)
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn with_window(mut self, window_id: impl Into<String>) -> Self {
        self.window_id = Some(window_id.into());
        self
    }

    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.panel_id.is_broadcast()
    }

    /// Which panels a broadcast reaches, by resolved session.
    #[must_use]
    pub fn session_filter(&self) -> SessionFilter<'_> {
        match self.session_id.as_deref() {
            Some("*") => SessionFilter::All,
            None | Some("") => SessionFilter::Unbound,
            Some(id) => SessionFilter::Session(id),
        }
    }
}

/// Broadcast session filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFilter<'a> {
    /// `sessionId: "*"`: every panel.
    All,
    /// Absent or empty `sessionId`: panels resolving to no session.
    Unbound,
    /// Panels resolving to this session.
    Session(&'a str),
}

impl SessionFilter<'_> {
    /// Whether a panel resolving to `resolved` matches.
    #[must_use]
    pub fn matches(self, resolved: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Unbound => resolved.is_none(),
            Self::Session(id) => resolved == Some(id),
        }
    }
}

/// Panel lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Opened,
    Closed,
}

/// `panel_lifecycle` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelLifecycleEvent {
    pub panel_id: PanelId,
    pub panel_type: String,
    pub state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
}

/// `panel_binding` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelBindingEvent {
    pub panel_id: PanelId,
    pub panel_type: String,
    pub binding: Option<PanelBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
}

/// Messages the core sends to the server connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    PanelEvent(PanelEvent),
    PanelLifecycle(PanelLifecycleEvent),
    PanelBinding(PanelBindingEvent),
}

impl OutboundMessage {
    /// Wire `type` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PanelEvent(_) => "panel_event",
            Self::PanelLifecycle(_) => "panel_lifecycle",
            Self::PanelBinding(_) => "panel_binding",
        }
    }

    /// JSON text for the transport.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Outbound half of the server connection.
pub trait OutboundSink {
    fn send(&self, message: OutboundMessage);
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl OutboundSink for NullSink {
    fn send(&self, message: OutboundMessage) {
        tracing::trace!(message = "outbound.dropped", kind = message.kind());
    }
}
