#![forbid(unsafe_code)]

//! Shared context store: a per-document key/value blackboard.
//!
//! Panels and collaborators publish cross-panel state (active panel, session
//! summaries, plugin manifests) under string keys. Subscribers are notified
//! synchronously in the same call that changes the value; there is no
//! debouncing.
//!
//! # Invariants
//!
//! - `subscribe` replays the current value (if any) before returning.
//! - Cloning a [`ContextStore`] yields a handle to the same store.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use crate::subscription::{Subscribers, Subscription};

/// Context key holding the active panel id.
pub const ACTIVE_PANEL_KEY: &str = "panel.active";

/// Prefix for session summaries (`session.<id>`, `session.list`).
pub const SESSION_KEY_PREFIX: &str = "session.";

/// Prefix for the per-panel derived session context (`panel.session.<panelId>`).
pub const PANEL_SESSION_KEY_PREFIX: &str = "panel.session.";

/// Key of the derived session context for `panel_id`.
#[must_use]
pub fn panel_session_key(panel_id: &str) -> String {
    format!("{PANEL_SESSION_KEY_PREFIX}{panel_id}")
}

/// Key of the summary for `session_id`.
#[must_use]
pub fn session_key(session_id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{session_id}")
}

#[derive(Default)]
struct ContextInner {
    values: BTreeMap<String, Value>,
    keyed: BTreeMap<String, Rc<Subscribers<Value>>>,
    prefixed: Vec<(String, Rc<Subscribers<(String, Value)>>)>,
}

/// Shared key/value store with per-key subscribers.
#[derive(Clone, Default)]
pub struct ContextStore {
    inner: Rc<RefCell<ContextInner>>,
}

impl std::fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ContextStore")
            .field("keys", &inner.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ContextStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key` and notify subscribers.
    pub fn set(&self, key: &str, value: Value) {
        let (keyed, prefixed) = {
            let mut inner = self.inner.borrow_mut();
            let _ = inner.values.insert(key.to_owned(), value.clone());
            let keyed = inner.keyed.get(key).cloned();
            let prefixed: Vec<_> = inner
                .prefixed
                .iter()
                .filter(|(prefix, _)| key.starts_with(prefix.as_str()))
                .map(|(_, subs)| Rc::clone(subs))
                .collect();
            (keyed, prefixed)
        };
        tracing::trace!(message = "context.set", key);
        if let Some(subs) = keyed {
            let _ = subs.notify(&value);
        }
        if !prefixed.is_empty() {
            let entry = (key.to_owned(), value);
            for subs in prefixed {
                let _ = subs.notify(&entry);
            }
        }
    }

    /// Current value under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.borrow().values.get(key).cloned()
    }

    /// Keys starting with `prefix`, in order.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.inner
            .borrow()
            .values
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Subscribe to `key`. The current value, if any, is replayed at once.
    pub fn subscribe(&self, key: &str, handler: impl Fn(&Value) + 'static) -> Subscription {
        let (subs, current) = {
            let mut inner = self.inner.borrow_mut();
            let subs = Rc::clone(inner.keyed.entry(key.to_owned()).or_default());
            (subs, inner.values.get(key).cloned())
        };
        if let Some(value) = &current {
            handler(value);
        }
        subs.subscribe(handler)
    }

    /// Subscribe to every key starting with `prefix`. No replay.
    pub fn subscribe_prefix(
        &self,
        prefix: &str,
        handler: impl Fn(&(String, Value)) + 'static,
    ) -> Subscription {
        let subs = Rc::new(Subscribers::new());
        let guard = subs.subscribe(handler);
        self.inner
            .borrow_mut()
            .prefixed
            .push((prefix.to_owned(), subs));
        guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribe_replays_current_value() {
        let store = ContextStore::new();
        store.set("theme", json!("dark"));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _guard = {
            let seen = Rc::clone(&seen);
            store.subscribe("theme", move |v| seen.borrow_mut().push(v.clone()))
        };
        store.set("theme", json!("light"));
        assert_eq!(*seen.borrow(), vec![json!("dark"), json!("light")]);
    }

    #[test]
    fn subscribe_without_value_does_not_replay() {
        let store = ContextStore::new();
        let hits = Rc::new(RefCell::new(0));
        let _guard = {
            let hits = Rc::clone(&hits);
            store.subscribe("missing", move |_| *hits.borrow_mut() += 1)
        };
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn prefix_subscribers_see_matching_keys() {
        let store = ContextStore::new();
        let keys = Rc::new(RefCell::new(Vec::new()));
        let _guard = {
            let keys = Rc::clone(&keys);
            store.subscribe_prefix(SESSION_KEY_PREFIX, move |(k, _)| {
                keys.borrow_mut().push(k.clone());
            })
        };
        store.set("session.s1", json!({"name": "one"}));
        store.set("panel.active", json!("chat-1"));
        assert_eq!(*keys.borrow(), vec!["session.s1".to_owned()]);
        assert_eq!(store.keys_with_prefix("session."), vec!["session.s1"]);
    }

    #[test]
    fn subscriber_may_write_other_keys() {
        let store = ContextStore::new();
        let _guard = {
            let store2 = store.clone();
            store.subscribe("a", move |v| store2.set("b", v.clone()))
        };
        store.set("a", json!(1));
        assert_eq!(store.get("b"), Some(json!(1)));
    }
}
