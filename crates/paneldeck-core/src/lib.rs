#![forbid(unsafe_code)]

//! Host-agnostic primitives shared by every paneldeck crate.
//!
//! Nothing in here touches a DOM. Browser adapters implement the narrow
//! traits ([`storage::KeyValueStore`], [`geometry::GeometrySource`],
//! [`clock::Clock`]) and the controllers stay testable with the in-memory
//! doubles shipped alongside them.

pub mod binding;
pub mod clock;
pub mod event;
pub mod geometry;
pub mod ids;
pub mod logging;
pub mod prefs;
pub mod storage;

pub use binding::{PanelBinding, SESSION_BINDABLE_TYPES, is_session_bindable};
pub use clock::{Clock, ManualClock, SystemClock};
pub use event::{KeyCode, KeyEvent, Modifiers, Platform};
pub use geometry::{GeometrySource, Rect, StaticGeometry};
pub use ids::PanelId;
pub use prefs::{PreferenceKey, Preferences};
pub use storage::{
    FailingStore, KeyValueStore, MemoryStore, QuotaExceededStore, SafeStore, SharedStore,
    StorageError,
};
