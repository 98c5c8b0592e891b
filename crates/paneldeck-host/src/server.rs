#![forbid(unsafe_code)]

//! Inbound server message handling.
//!
//! The connection delivers parsed messages one at a time in arrival order.
//! Panel events are routed through the host; session summaries are
//! published into the shared context. Malformed or unknown messages are
//! logged and dropped without touching mounted panels.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::session_key;
use crate::events::PanelEvent;
use crate::host::PanelHostController;

/// Context key holding the ordered session list.
pub const SESSION_LIST_KEY: &str = "session.list";

/// Summary of one backend session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    /// Fields the core does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionSummary {
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            name: None,
            pinned: false,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundMessage {
    PanelEvent(PanelEvent),
    SessionList { sessions: Vec<SessionSummary> },
    SessionUpdated { session: SessionSummary },
}

const KNOWN_TYPES: &[&str] = &["panel_event", "session_list", "session_updated"];

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerOutcome {
    /// A panel event reached this many panels.
    Dispatched(usize),
    /// A session list with this many entries was published.
    SessionsPublished(usize),
    SessionUpdated(String),
    /// Event addressed to another window.
    OtherWindow,
    /// Well-formed message of a type the core does not handle.
    Ignored(String),
    Malformed,
}

/// Routes inbound server messages into the host controller.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServerMessageHandler;

impl ServerMessageHandler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Handle one raw JSON message.
    pub fn handle_text(&self, host: &mut PanelHostController, raw: &str) -> ServerOutcome {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => self.handle_value(host, value),
            Err(err) => {
                tracing::warn!(message = "server.malformed", error = %err);
                ServerOutcome::Malformed
            }
        }
    }

    /// Handle one parsed message.
    pub fn handle_value(&self, host: &mut PanelHostController, value: Value) -> ServerOutcome {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let Some(kind) = kind else {
            tracing::warn!(message = "server.malformed", error = "missing type");
            return ServerOutcome::Malformed;
        };
        if !KNOWN_TYPES.contains(&kind.as_str()) {
            tracing::debug!(message = "server.ignored", kind = %kind);
            return ServerOutcome::Ignored(kind);
        }

        let message = match serde_json::from_value::<InboundMessage>(value) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(message = "server.malformed", kind = %kind, error = %err);
                return ServerOutcome::Malformed;
            }
        };

        match message {
            InboundMessage::PanelEvent(event) => {
                if let (Some(target), Some(own)) = (event.window_id.as_deref(), host.window_id())
                    && target != own
                {
                    tracing::debug!(
                        message = "server.panel_event.other_window",
                        window_id = target,
                    );
                    return ServerOutcome::OtherWindow;
                }
                ServerOutcome::Dispatched(host.dispatch_panel_event(&event))
            }
            InboundMessage::SessionList { sessions } => {
                let count = sessions.len();
                for session in &sessions {
                    host.context().set(
                        &session_key(&session.session_id),
                        serde_json::to_value(session).unwrap_or(Value::Null),
                    );
                }
                host.set_context(
                    SESSION_LIST_KEY,
                    serde_json::to_value(&sessions).unwrap_or(Value::Null),
                );
                ServerOutcome::SessionsPublished(count)
            }
            InboundMessage::SessionUpdated { session } => {
                let id = session.session_id.clone();
                host.set_context(
                    &session_key(&id),
                    serde_json::to_value(&session).unwrap_or(Value::Null),
                );
                ServerOutcome::SessionUpdated(id)
            }
        }
    }
}
