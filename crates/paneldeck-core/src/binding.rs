#![forbid(unsafe_code)]

//! Panel-to-session bindings.
//!
//! A panel is either bound to one session ([`PanelBinding::Fixed`]), bound to
//! no particular session ([`PanelBinding::Global`]), or unbound (`None` at the
//! use site). Only the [`SESSION_BINDABLE_TYPES`] may hold a binding at all;
//! every other panel type is coerced to unbound.

use serde::{Deserialize, Serialize};

/// Panel types that may carry a session binding.
pub const SESSION_BINDABLE_TYPES: &[&str] = &["chat", "session-info", "terminal"];

/// Whether `panel_type` may hold a session binding.
#[must_use]
pub fn is_session_bindable(panel_type: &str) -> bool {
    SESSION_BINDABLE_TYPES.contains(&panel_type)
}

/// Association of a panel with a session.
///
/// Wire shape: `{"mode":"fixed","sessionId":"s1"}` or `{"mode":"global"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PanelBinding {
    /// Exclusively bound to one session.
    Fixed {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    /// Not session-scoped.
    Global,
}

impl PanelBinding {
    /// Build a fixed binding.
    #[must_use]
    pub fn fixed(session_id: impl Into<String>) -> Self {
        Self::Fixed {
            session_id: session_id.into(),
        }
    }

    /// Session id this binding resolves to. Global bindings resolve to none.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Fixed { session_id } => Some(session_id),
            Self::Global => None,
        }
    }
}

/// Resolve an optional binding to its session id.
#[must_use]
pub fn resolved_session_id(binding: Option<&PanelBinding>) -> Option<&str> {
    binding.and_then(PanelBinding::session_id)
}

/// Coerce `binding` according to the bindable set: non-bindable panel types
/// always end up unbound.
#[must_use]
pub fn coerce_binding(panel_type: &str, binding: Option<PanelBinding>) -> Option<PanelBinding> {
    if is_session_bindable(panel_type) {
        binding
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_matches_protocol() {
        let fixed = PanelBinding::fixed("s1");
        assert_eq!(
            serde_json::to_value(&fixed).unwrap(),
            serde_json::json!({"mode": "fixed", "sessionId": "s1"})
        );
        let global: PanelBinding = serde_json::from_str(r#"{"mode":"global"}"#).unwrap();
        assert_eq!(global, PanelBinding::Global);
    }

    #[test]
    fn global_resolves_to_no_session() {
        assert_eq!(resolved_session_id(Some(&PanelBinding::Global)), None);
        assert_eq!(resolved_session_id(Some(&PanelBinding::fixed("a"))), Some("a"));
        assert_eq!(resolved_session_id(None), None);
    }

    #[test]
    fn non_bindable_types_are_coerced() {
        assert_eq!(coerce_binding("notes", Some(PanelBinding::fixed("s"))), None);
        assert_eq!(coerce_binding("lists", Some(PanelBinding::Global)), None);
        assert_eq!(
            coerce_binding("terminal", Some(PanelBinding::Global)),
            Some(PanelBinding::Global)
        );
    }
}
