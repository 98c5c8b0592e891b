#![forbid(unsafe_code)]

//! Window slot coordination for paneldeck.
//!
//! Multiple windows of the same origin share one durable store. Each window
//! claims a numbered slot, keeps it alive by heartbeat, and namespaces its
//! persisted state (layout, focus history, filters) by slot id.

pub mod keys;
pub mod manager;

pub use keys::{DEFAULT_SLOT_ID, SlotKeys, namespaced_key};
pub use manager::{
    DEFAULT_HEARTBEAT_INTERVAL_MS, DEFAULT_SLOT_TTL_MS, Heartbeat, SlotConfig, SlotLease,
    SlotRefusal, WindowSlotInfo, WindowSlotManager,
};
