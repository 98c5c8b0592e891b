#![forbid(unsafe_code)]

//! Panel identifiers.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Wildcard panel id used by broadcast panel events.
pub const BROADCAST_PANEL_ID: &str = "*";

/// Opaque panel instance identifier.
///
/// Generated by the workspace at open time and unique for the lifetime of
/// the workspace document. The wire format is a bare string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelId(String);

impl PanelId {
    /// Wrap a raw identifier.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The broadcast wildcard `"*"`.
    #[must_use]
    pub fn broadcast() -> Self {
        Self(BROADCAST_PANEL_ID.to_owned())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the broadcast wildcard.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.0 == BROADCAST_PANEL_ID
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PanelId {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl From<String> for PanelId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl Borrow<str> for PanelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_bare_string() {
        let id = PanelId::new("chat-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"chat-1\"");
    }

    #[test]
    fn wildcard_detection() {
        assert!(PanelId::from("*").is_broadcast());
        assert!(!PanelId::from("notes-2").is_broadcast());
    }
}
