#![forbid(unsafe_code)]

//! Slot-namespaced layout storage.
//!
//! The layout document lives at `<layout>:<slot>` with a parallel integer
//! stamp at `<layout_version>:<slot>`. A stamp that does not match
//! [`LAYOUT_SCHEMA_VERSION`] rejects the stored document so the caller can
//! fall back to a default layout.

use paneldeck_core::ids::PanelId;
use paneldeck_core::storage::SafeStore;
use paneldeck_layout::{LAYOUT_SCHEMA_VERSION, LayoutSnapshot, LayoutTree, LayoutValidationError};
use serde::{Deserialize, Serialize};

/// Base storage keys for per-slot workspace state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkspaceKeys {
    pub layout: String,
    pub layout_version: String,
    pub focus_history: String,
}

impl Default for WorkspaceKeys {
    fn default() -> Self {
        Self {
            layout: "paneldeck.layout".into(),
            layout_version: "paneldeck.layoutVersion".into(),
            focus_history: "paneldeck.focusHistory".into(),
        }
    }
}

/// Result of reading the stored layout.
#[derive(Debug)]
pub enum StoredLayout {
    /// Nothing stored for this slot.
    Missing,
    Loaded(Box<LayoutSnapshot>, LayoutTree),
    /// Stored but unusable.
    Rejected(LayoutValidationError),
}

/// Layout storage bound to one window slot.
#[derive(Debug, Clone)]
pub struct LayoutStorage {
    store: SafeStore,
    slot_id: String,
    keys: WorkspaceKeys,
}

impl LayoutStorage {
    #[must_use]
    pub fn new(store: SafeStore, slot_id: impl Into<String>, keys: WorkspaceKeys) -> Self {
        Self {
            store,
            slot_id: slot_id.into(),
            keys,
        }
    }

    #[must_use]
    pub fn slot_id(&self) -> &str {
        &self.slot_id
    }

    fn key(&self, base: &str) -> String {
        format!("{base}:{}", self.slot_id)
    }

    #[must_use]
    pub fn layout_key(&self) -> String {
        self.key(&self.keys.layout)
    }

    #[must_use]
    pub fn version_key(&self) -> String {
        self.key(&self.keys.layout_version)
    }

    #[must_use]
    pub fn focus_history_key(&self) -> String {
        self.key(&self.keys.focus_history)
    }

    /// Read and validate the stored layout.
    #[must_use]
    pub fn load(&self) -> StoredLayout {
        let Some(raw) = self.store.get(&self.layout_key()) else {
            return StoredLayout::Missing;
        };
        if let Some(stamp) = self.store.get(&self.version_key()) {
            match stamp.trim().parse::<u16>() {
                Ok(found) if found == LAYOUT_SCHEMA_VERSION => {}
                Ok(found) => {
                    return StoredLayout::Rejected(LayoutValidationError::UnsupportedVersion {
                        found,
                        expected: LAYOUT_SCHEMA_VERSION,
                    });
                }
                Err(err) => {
                    return StoredLayout::Rejected(LayoutValidationError::Malformed {
                        reason: format!("layout version stamp {stamp:?}: {err}"),
                    });
                }
            }
        }
        match LayoutSnapshot::decode(&raw) {
            Ok((snapshot, tree)) => StoredLayout::Loaded(Box::new(snapshot), tree),
            Err(err) => StoredLayout::Rejected(err),
        }
    }

    /// Write the layout document and its version stamp.
    pub fn save(&self, snapshot: &LayoutSnapshot) {
        match snapshot.encode() {
            Ok(raw) => {
                self.store.set(&self.layout_key(), &raw);
                self.store
                    .set(&self.version_key(), &snapshot.schema_version.to_string());
            }
            Err(err) => tracing::warn!(message = "workspace.save_failed", error = %err),
        }
    }

    /// Remove this slot's layout and version stamp.
    pub fn clear(&self) {
        self.store.remove(&self.layout_key());
        self.store.remove(&self.version_key());
    }

    #[must_use]
    pub fn load_focus_history(&self) -> Vec<PanelId> {
        self.store
            .get_json(&self.focus_history_key())
            .unwrap_or_default()
    }

    pub fn save_focus_history<'a>(&self, entries: impl Iterator<Item = &'a PanelId>) {
        let entries: Vec<&PanelId> = entries.collect();
        self.store.set_json(&self.focus_history_key(), &entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paneldeck_core::storage::{KeyValueStore, MemoryStore};
    use paneldeck_layout::PanelRecord;

    fn storage(mem: &MemoryStore) -> LayoutStorage {
        LayoutStorage::new(SafeStore::new(mem.shared()), "3", WorkspaceKeys::default())
    }

    fn document() -> LayoutSnapshot {
        let id = PanelId::from("chat-1");
        let mut snapshot = LayoutSnapshot::new(&LayoutTree::singleton(id.clone()));
        snapshot.panels.push(PanelRecord::new(id, "chat"));
        snapshot
    }

    #[test]
    fn keys_are_slot_namespaced() {
        let mem = MemoryStore::new();
        let s = storage(&mem);
        assert_eq!(s.layout_key(), "paneldeck.layout:3");
        assert_eq!(s.version_key(), "paneldeck.layoutVersion:3");
    }

    #[test]
    fn save_then_load() {
        let mem = MemoryStore::new();
        let s = storage(&mem);
        assert!(matches!(s.load(), StoredLayout::Missing));
        s.save(&document());
        assert_eq!(mem.get("paneldeck.layoutVersion:3").unwrap().as_deref(), Some("1"));
        let StoredLayout::Loaded(snapshot, tree) = s.load() else {
            panic!("expected stored layout");
        };
        assert_eq!(snapshot.panels.len(), 1);
        assert_eq!(tree.panel_ids(), vec![PanelId::from("chat-1")]);
    }

    #[test]
    fn unknown_version_stamp_is_rejected() {
        let mem = MemoryStore::new();
        let s = storage(&mem);
        s.save(&document());
        mem.set("paneldeck.layoutVersion:3", "99").unwrap();
        assert!(matches!(
            s.load(),
            StoredLayout::Rejected(LayoutValidationError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let mem = MemoryStore::new();
        mem.set("paneldeck.layout:3", "{not json").unwrap();
        assert!(matches!(storage(&mem).load(), StoredLayout::Rejected(_)));
    }
}
