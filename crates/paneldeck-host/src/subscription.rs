#![forbid(unsafe_code)]

//! Subscriber lists with RAII unsubscribe guards.
//!
//! Callbacks are held strongly by the returned [`Subscription`] and weakly
//! by the list, so dropping the guard unsubscribes. Dead entries are pruned
//! on the next [`Subscribers::notify`].
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. No internal borrow is held while a callback runs, so callbacks may
//!    subscribe or notify re-entrantly.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

/// Ordered list of weakly held callbacks.
pub struct Subscribers<T> {
    entries: RefCell<Vec<CallbackWeak<T>>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }
}

impl<T> std::fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.entries.borrow().len())
            .finish()
    }
}

impl<T: 'static> Subscribers<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`; it stays registered while the guard lives.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        self.entries.borrow_mut().push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Call every live subscriber with `value`. Returns how many ran.
    pub fn notify(&self, value: &T) -> usize {
        let callbacks: Vec<CallbackRc<T>> = {
            let mut entries = self.entries.borrow_mut();
            entries.retain(|w| w.strong_count() > 0);
            entries.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in &callbacks {
            callback(value);
        }
        callbacks.len()
    }

    /// Live subscriber count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// RAII guard for a subscriber callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
