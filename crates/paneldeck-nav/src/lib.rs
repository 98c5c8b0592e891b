#![forbid(unsafe_code)]

//! Keyboard navigation for paneldeck.
//!
//! - [`controller`]: the Keyboard Navigation Controller state machine.
//! - [`spatial`]: nearest-neighbor search over panel rectangles.
//! - [`paging`]: nine-per-page digit numbering.
//! - [`shortcuts`]: chord registry with a shared enable gate.
//! - [`focus`]: focus zones, the session sidebar and the dialog seam.

pub mod controller;
pub mod focus;
pub mod paging;
pub mod shortcuts;
pub mod spatial;

pub use controller::{
    Badge, HeaderNavState, KeyContext, KeyboardNavController, LayoutNavState, NavEffect, NavMode,
    NavOverlay, NavResponse, NavWorkspace,
};
pub use focus::{ConfirmDialog, DialogManager, FocusZone, NoDialogs, SessionSidebar};
pub use paging::PAGE_SIZE;
pub use shortcuts::{EnabledPredicate, KeyChord, NavCommand, Shortcut, ShortcutRegistry};
pub use spatial::{Direction, find_spatial_neighbor};
