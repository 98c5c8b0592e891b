#![forbid(unsafe_code)]

//! Storage key layout for window slots.
//!
//! Per-slot state lives under `<base>:<slotId>`. The slot registry itself
//! (slot list, liveness leases, display names) is shared by every window.

use serde::{Deserialize, Serialize};

/// The permanent default slot.
pub const DEFAULT_SLOT_ID: &str = "0";

/// Append the slot namespace to `base`.
#[must_use]
pub fn namespaced_key(base: &str, slot_id: &str) -> String {
    format!("{base}:{slot_id}")
}

/// Storage keys used by the slot manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlotKeys {
    /// JSON list of slot ids.
    pub slots: String,
    /// JSON map `{slotId: {ownerId, lastSeen}}`.
    pub active: String,
    /// JSON map `{slotId: name}`.
    pub names: String,
    /// Per-tab owner id (durable in single-instance mode).
    pub owner: String,
    /// Per-tab record of the last claimed slot.
    pub current: String,
    /// Set once legacy un-namespaced state has been copied into slot 0.
    pub migration_marker: String,
    /// Base keys of per-slot state, removed with the slot and migrated.
    pub scoped: Vec<String>,
}

impl Default for SlotKeys {
    fn default() -> Self {
        Self {
            slots: "paneldeck.windowSlots".into(),
            active: "paneldeck.windowSlots.active".into(),
            names: "paneldeck.windowSlots.names".into(),
            owner: "paneldeck.windowOwnerId".into(),
            current: "paneldeck.windowSlot".into(),
            migration_marker: "paneldeck.windowSlots.migrated".into(),
            scoped: vec![
                "paneldeck.layout".into(),
                "paneldeck.layoutVersion".into(),
                "paneldeck.focusHistory".into(),
                "paneldeck.globalQuery".into(),
            ],
        }
    }
}

impl SlotKeys {
    /// Add a per-slot base key if not already present.
    #[must_use]
    pub fn with_scoped(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        if !self.scoped.contains(&base) {
            self.scoped.push(base);
        }
        self
    }
}

/// Numeric ordering for slot ids; non-numeric ids sort last.
pub(crate) fn slot_order(id: &str) -> (u64, String) {
    (id.parse::<u64>().unwrap_or(u64::MAX), id.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespacing_appends_slot() {
        assert_eq!(namespaced_key("paneldeck.layout", "3"), "paneldeck.layout:3");
    }

    #[test]
    fn slots_sort_numerically() {
        let mut ids = vec!["10", "2", "0", "x"];
        ids.sort_by_key(|id| slot_order(id));
        assert_eq!(ids, vec!["0", "2", "10", "x"]);
    }

    #[test]
    fn scoped_keys_are_deduplicated() {
        let keys = SlotKeys::default().with_scoped("paneldeck.layout");
        assert_eq!(keys.scoped.len(), SlotKeys::default().scoped.len());
    }
}
