#![forbid(unsafe_code)]

//! Single-flight assignment with last-request-wins semantics.
//!
//! While an assignment is being applied, further requests (including
//! re-entrant ones from inside the apply step or its subscribers) overwrite
//! one pending slot instead of recursing. The outer call drains the slot in
//! a loop, so only the newest request queued during a flight is applied.

use std::cell::{Cell, RefCell};

use crate::subscription::{Subscribers, Subscription};

/// Re-entrancy guard with one pending slot.
#[derive(Debug)]
pub struct SingleFlight<T> {
    in_flight: Cell<bool>,
    pending: RefCell<Option<T>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            in_flight: Cell::new(false),
            pending: RefCell::new(None),
        }
    }
}

impl<T> SingleFlight<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.get()
    }

    /// Apply `value` now, or queue it if an assignment is already running.
    ///
    /// Returns `true` if this call ran the drain loop.
    pub fn run(&self, value: T, mut apply: impl FnMut(T)) -> bool {
        if self.in_flight.get() {
            *self.pending.borrow_mut() = Some(value);
            return false;
        }
        self.in_flight.set(true);
        let mut next = Some(value);
        while let Some(value) = next {
            apply(value);
            next = self.pending.borrow_mut().take();
        }
        self.in_flight.set(false);
        true
    }
}

/// The session the chat input currently targets.
#[derive(Debug, Default)]
pub struct InputSessionTarget {
    current: RefCell<Option<String>>,
    flight: SingleFlight<Option<String>>,
    subscribers: Subscribers<Option<String>>,
}

impl InputSessionTarget {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    /// Set the target session. Re-entrant calls are queued, newest wins.
    pub fn set(&self, session_id: Option<String>) {
        let _ = self.flight.run(session_id, |value| {
            if *self.current.borrow() == value {
                return;
            }
            tracing::debug!(
                message = "input_session.set",
                session_id = value.as_deref().unwrap_or(""),
            );
            *self.current.borrow_mut() = value.clone();
            let _ = self.subscribers.notify(&value);
        });
    }

    pub fn subscribe(&self, handler: impl Fn(&Option<String>) + 'static) -> Subscription {
        self.subscribers.subscribe(handler)
    }
}
