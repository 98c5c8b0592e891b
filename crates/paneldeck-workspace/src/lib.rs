#![forbid(unsafe_code)]

//! Panel workspace for paneldeck.
//!
//! - [`controller`]: the Panel Workspace Controller (open, close, move,
//!   replace, pin, modal promotion, activation).
//! - [`persistence`]: slot-namespaced layout storage with version stamps.
//! - [`focus_history`]: most-recent-first activation history.

pub mod controller;
pub mod focus_history;
pub mod persistence;

pub use controller::{
    OpenOptions, RestoreOutcome, WorkspaceConfig, WorkspaceController, WorkspaceError,
};
pub use focus_history::{DEFAULT_FOCUS_HISTORY_DEPTH, FocusHistory};
pub use paneldeck_layout::{Containment, Region};
pub use persistence::{LayoutStorage, StoredLayout, WorkspaceKeys};
