#![forbid(unsafe_code)]

//! Key/value persistence seam.
//!
//! Browser `localStorage` / `sessionStorage` sit behind [`KeyValueStore`].
//! Controllers never talk to a raw store directly: they go through
//! [`SafeStore`], which swallows storage failures (quota, privacy mode) and
//! degrades to ephemeral in-memory values for the rest of the document's
//! lifetime.
//!
//! # Invariants
//!
//! - [`SafeStore`] never returns an error.
//! - Cloning a [`MemoryStore`] yields a handle to the **same** map, so two
//!   simulated windows can share one "localStorage".

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a store.
pub type SharedStore = Rc<dyn KeyValueStore>;

/// Storage failures reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Storage is not accessible (privacy mode, sandboxed frame).
    Unavailable(String),
    /// Write rejected for lack of space.
    QuotaExceeded { key: String },
    /// A stored value could not be encoded or decoded.
    Serialization { key: String, detail: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(detail) => write!(f, "storage unavailable: {detail}"),
            Self::QuotaExceeded { key } => write!(f, "storage quota exceeded writing {key}"),
            Self::Serialization { key, detail } => {
                write!(f, "failed to (de)serialize {key}: {detail}")
            }
        }
    }
}

impl std::error::Error for StorageError {}

/// Narrow key/value store contract.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =========================================================================
// In-memory store
// =========================================================================

/// In-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap in a [`SharedStore`] handle that shares this store's map.
    #[must_use]
    pub fn shared(&self) -> SharedStore {
        Rc::new(self.clone())
    }

    /// Snapshot of every key currently stored.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _ = self
            .entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _ = self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// A store where every call fails, simulating privacy-mode browsers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }

    fn set(&self, key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::QuotaExceeded { key: key.to_owned() })
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }
}

/// A store that reads fine but rejects every write, like a full
/// `localStorage`. Removals go through.
#[derive(Debug, Clone, Default)]
pub struct QuotaExceededStore {
    entries: MemoryStore,
}

impl QuotaExceededStore {
    /// Start from the contents of `seed` (shared, not copied).
    #[must_use]
    pub fn over(seed: MemoryStore) -> Self {
        Self { entries: seed }
    }
}

impl KeyValueStore for QuotaExceededStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.entries.get(key)
    }

    fn set(&self, key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::QuotaExceeded { key: key.to_owned() })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key)
    }
}

// =========================================================================
// Failure-swallowing wrapper
// =========================================================================

/// Store wrapper that never fails.
///
/// Values whose writes failed are kept in an ephemeral overlay that shadows
/// the backend for those keys until a later write to the key succeeds.
#[derive(Clone)]
pub struct SafeStore {
    inner: SharedStore,
    fallback: MemoryStore,
}

impl fmt::Debug for SafeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeStore")
            .field("fallback_entries", &self.fallback.len())
            .finish()
    }
}

impl SafeStore {
    #[must_use]
    pub fn new(inner: SharedStore) -> Self {
        Self {
            inner,
            fallback: MemoryStore::new(),
        }
    }

    /// Read a value. The ephemeral overlay wins over the backend.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        if let Ok(Some(value)) = self.fallback.get(key) {
            return Some(value);
        }
        match self.inner.get(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(message = "storage.get_failed", key, error = %err);
                None
            }
        }
    }

    /// Write a value. Failures keep the value in the ephemeral overlay.
    pub fn set(&self, key: &str, value: &str) {
        match self.inner.set(key, value) {
            Ok(()) => {
                let _ = self.fallback.remove(key);
            }
            Err(err) => {
                tracing::warn!(message = "storage.set_failed", key, error = %err);
                let _ = self.fallback.set(key, value);
            }
        }
    }

    /// Whether `key` is currently served from the ephemeral overlay.
    #[must_use]
    pub fn is_ephemeral(&self, key: &str) -> bool {
        matches!(self.fallback.get(key), Ok(Some(_)))
    }

    pub fn remove(&self, key: &str) {
        if let Err(err) = self.inner.remove(key) {
            tracing::warn!(message = "storage.remove_failed", key, error = %err);
        }
        let _ = self.fallback.remove(key);
    }

    /// Read and decode a JSON value. Undecodable values read as absent.
    #[must_use]
    pub fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(message = "storage.decode_failed", key, error = %err);
                None
            }
        }
    }

    /// Encode and write a JSON value.
    pub fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw),
            Err(err) => tracing::warn!(message = "storage.encode_failed", key, error = %err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_clones_share_entries() {
        let a = MemoryStore::new();
        let b = a.clone();
        a.set("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap().as_deref(), Some("v"));
        b.remove("k").unwrap();
        assert!(a.is_empty());
    }

    #[test]
    fn safe_store_passes_through() {
        let mem = MemoryStore::new();
        let safe = SafeStore::new(mem.shared());
        safe.set("x", "1");
        assert_eq!(mem.get("x").unwrap().as_deref(), Some("1"));
        assert_eq!(safe.get("x").as_deref(), Some("1"));
    }

    #[test]
    fn safe_store_degrades_to_ephemeral() {
        let safe = SafeStore::new(Rc::new(FailingStore));
        assert_eq!(safe.get("layout"), None);
        safe.set("layout", "{}");
        assert_eq!(safe.get("layout").as_deref(), Some("{}"));
        safe.remove("layout");
        assert_eq!(safe.get("layout"), None);
    }

    #[test]
    fn rejected_write_shadows_stale_backend_value() {
        let seed = MemoryStore::new();
        seed.set("slots", "[\"0\"]").unwrap();
        let safe = SafeStore::new(Rc::new(QuotaExceededStore::over(seed.clone())));

        safe.set("slots", "[\"0\",\"1\"]");
        assert_eq!(safe.get("slots").as_deref(), Some("[\"0\",\"1\"]"));
        assert!(safe.is_ephemeral("slots"));
        assert_eq!(seed.get("slots").unwrap().as_deref(), Some("[\"0\"]"));

        safe.remove("slots");
        assert_eq!(safe.get("slots"), None);
        assert!(!safe.is_ephemeral("slots"));
    }

    /// Backend whose writes fail only while `full` is set.
    struct Flaky {
        entries: MemoryStore,
        full: std::cell::Cell<bool>,
    }

    impl KeyValueStore for Flaky {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.entries.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.full.get() {
                return Err(StorageError::QuotaExceeded { key: key.to_owned() });
            }
            self.entries.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.entries.remove(key)
        }
    }

    #[test]
    fn successful_write_clears_overlay() {
        let backend = Rc::new(Flaky {
            entries: MemoryStore::new(),
            full: std::cell::Cell::new(true),
        });
        let safe = SafeStore::new(backend.clone());
        safe.set("k", "ephemeral");
        assert!(safe.is_ephemeral("k"));

        backend.full.set(false);
        safe.set("k", "durable");
        assert!(!safe.is_ephemeral("k"));
        assert_eq!(safe.get("k").as_deref(), Some("durable"));
        assert_eq!(backend.entries.get("k").unwrap().as_deref(), Some("durable"));
    }

    #[test]
    fn json_helpers_tolerate_garbage() {
        let mem = MemoryStore::new();
        mem.set("list", "not json").unwrap();
        let safe = SafeStore::new(mem.shared());
        assert_eq!(safe.get_json::<Vec<String>>("list"), None);
        safe.set_json("list", &vec!["0".to_string(), "1".to_string()]);
        assert_eq!(
            safe.get_json::<Vec<String>>("list"),
            Some(vec!["0".to_string(), "1".to_string()])
        );
    }
}
