#![forbid(unsafe_code)]

//! Layout model for the panel workspace.
//!
//! - [`tree`]: the spatial split tree whose leaves are tab stacks of panels.
//! - [`region`]: named placement regions and how they map onto tree
//!   attachments.
//! - [`snapshot`]: the persisted, versioned layout document (tree + header
//!   dock + modal + panel records) and its reachability validation.

pub mod region;
pub mod snapshot;
pub mod tree;

pub use paneldeck_core::geometry::Rect;
pub use paneldeck_core::ids::PanelId;
pub use region::{Attach, Placement, Region};
pub use snapshot::{
    Containment, LAYOUT_SCHEMA_VERSION, LayoutSnapshot, LayoutValidationError, PanelRecord,
};
pub use tree::{
    LAYOUT_TREE_SCHEMA_VERSION, LayoutError, LayoutOperation, LayoutOperationError,
    LayoutOperationKind, LayoutOutcome, LayoutTree, LayoutTreeSnapshot, NodeId, NodeKind,
    NodeRecord, PanelStack, Split, SplitAxis, SplitRatio,
};
