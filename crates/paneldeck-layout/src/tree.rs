#![forbid(unsafe_code)]

//! Spatial split tree of panel tab stacks.
//!
//! The tree is a set of node records with explicit parent/child links:
//!
//! - a **stack** leaf holds an ordered, non-empty list of panel ids (tabs),
//!   the index of the active tab, and whether the stack shows every tab side
//!   by side (split-view mode);
//! - a **split** node holds an axis, a weight ratio and exactly two children.
//!
//! An empty tree has no root and no nodes.
//!
//! # Invariants
//!
//! 1. Every node is reachable from the root exactly once (no cycles, no
//!    orphans) and its `parent` link matches the split that references it.
//! 2. A panel id appears in at most one stack, at most once.
//! 3. Stacks are never empty and `active < tabs.len()`.
//! 4. `next_id` is greater than every allocated node id.
//!
//! All mutations go through [`LayoutTree::apply`], which runs the operation
//! on a working copy and only commits it if the result validates.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use paneldeck_core::geometry::Rect;
use paneldeck_core::ids::PanelId;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::region::{Attach, Placement};

/// Current layout tree schema version.
pub const LAYOUT_TREE_SCHEMA_VERSION: u16 = 1;

/// Stable identifier for tree nodes. `0` is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Lowest valid node id.
    pub const MIN: Self = Self(1);

    /// Create a node id, rejecting 0.
    pub fn new(raw: u64) -> Result<Self, LayoutError> {
        if raw == 0 {
            return Err(LayoutError::ZeroNodeId);
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Return the next id, or an error on overflow.
    pub fn checked_next(self) -> Result<Self, LayoutError> {
        let Some(next) = self.0.checked_add(1) else {
            return Err(LayoutError::NodeIdOverflow);
        };
        Self::new(next)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::MIN
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Orientation of a split node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitAxis {
    /// Children side by side (left | right).
    Horizontal,
    /// Children stacked (top / bottom).
    Vertical,
}

/// Weight pair between split children, stored in reduced form.
///
/// `3:2` assigns `3 / (3 + 2)` of the available space to the first child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SplitRatio {
    first: u32,
    second: u32,
}

impl SplitRatio {
    /// Equal weights.
    pub const EVEN: Self = Self {
        first: 1,
        second: 1,
    };

    /// Create and normalize a ratio.
    pub fn new(first: u32, second: u32) -> Result<Self, LayoutError> {
        if first == 0 || second == 0 {
            return Err(LayoutError::InvalidSplitRatio { first, second });
        }
        let gcd = gcd_u32(first, second);
        Ok(Self {
            first: first / gcd,
            second: second / gcd,
        })
    }

    #[must_use]
    pub const fn first(self) -> u32 {
        self.first
    }

    #[must_use]
    pub const fn second(self) -> u32 {
        self.second
    }

    /// Fraction of the available space given to the first child.
    #[must_use]
    pub fn first_share(self) -> f64 {
        f64::from(self.first) / (f64::from(self.first) + f64::from(self.second))
    }
}

impl Default for SplitRatio {
    fn default() -> Self {
        Self::EVEN
    }
}

fn gcd_u32(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

/// Leaf payload: an ordered tab stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelStack {
    pub tabs: Vec<PanelId>,
    #[serde(default)]
    pub active: usize,
    #[serde(default)]
    pub split_view: bool,
}

impl PanelStack {
    /// Stack holding a single panel.
    #[must_use]
    pub fn single(panel_id: PanelId) -> Self {
        Self {
            tabs: vec![panel_id],
            active: 0,
            split_view: false,
        }
    }

    /// The active tab.
    #[must_use]
    pub fn active_panel(&self) -> Option<&PanelId> {
        self.tabs.get(self.active)
    }

    /// Panels currently shown: every tab in split-view mode, else the active
    /// tab only.
    pub fn visible(&self) -> impl Iterator<Item = &PanelId> {
        let (skip, take) = if self.split_view {
            (0, self.tabs.len())
        } else {
            (self.active, 1)
        };
        self.tabs.iter().skip(skip).take(take)
    }

    fn position(&self, panel_id: &PanelId) -> Option<usize> {
        self.tabs.iter().position(|p| p == panel_id)
    }
}

/// Split payload with child references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub axis: SplitAxis,
    pub ratio: SplitRatio,
    pub first: NodeId,
    pub second: NodeId,
}

/// Node payload variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Stack(PanelStack),
    Split(Split),
}

/// Serializable node record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl NodeRecord {
    #[must_use]
    pub fn stack(id: NodeId, parent: Option<NodeId>, stack: PanelStack) -> Self {
        Self {
            id,
            parent,
            kind: NodeKind::Stack(stack),
        }
    }

    #[must_use]
    pub fn split(id: NodeId, parent: Option<NodeId>, split: Split) -> Self {
        Self {
            id,
            parent,
            kind: NodeKind::Split(split),
        }
    }
}

/// Canonical serialized tree shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutTreeSnapshot {
    #[serde(default = "default_tree_version")]
    pub schema_version: u16,
    #[serde(default)]
    pub root: Option<NodeId>,
    pub next_id: NodeId,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
}

fn default_tree_version() -> u16 {
    LAYOUT_TREE_SCHEMA_VERSION
}

impl LayoutTreeSnapshot {
    /// Sort node records by id for deterministic serialization.
    pub fn canonicalize(&mut self) {
        self.nodes.sort_by_key(|node| node.id);
    }
}

// =========================================================================
// Operations
// =========================================================================

/// Structural tree operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LayoutOperation {
    /// Insert a new panel. `target: None` is only valid on an empty tree and
    /// makes the panel the root.
    Insert {
        target: Option<PanelId>,
        panel: PanelId,
        attach: Attach,
    },
    /// Remove a panel; an emptied stack is dropped and its parent split
    /// collapses into the surviving sibling.
    Remove { panel: PanelId },
    /// Detach a panel and re-attach it next to `target`.
    Move {
        panel: PanelId,
        target: PanelId,
        attach: Attach,
    },
    /// Swap a panel id in place, keeping its leaf and tab position.
    Replace { old: PanelId, new: PanelId },
    /// Rotate the active tab of the panel's stack.
    CycleTab { panel: PanelId, forward: bool },
    /// Make `panel` the active tab of its stack.
    FocusTab { panel: PanelId },
    /// Flip split-view mode on the panel's stack.
    ToggleSplitView { panel: PanelId },
    /// Set the ratio of a split node.
    SetSplitRatio { split: NodeId, ratio: SplitRatio },
}

impl LayoutOperation {
    #[must_use]
    pub const fn kind(&self) -> LayoutOperationKind {
        match self {
            Self::Insert { .. } => LayoutOperationKind::Insert,
            Self::Remove { .. } => LayoutOperationKind::Remove,
            Self::Move { .. } => LayoutOperationKind::Move,
            Self::Replace { .. } => LayoutOperationKind::Replace,
            Self::CycleTab { .. } => LayoutOperationKind::CycleTab,
            Self::FocusTab { .. } => LayoutOperationKind::FocusTab,
            Self::ToggleSplitView { .. } => LayoutOperationKind::ToggleSplitView,
            Self::SetSplitRatio { .. } => LayoutOperationKind::SetSplitRatio,
        }
    }
}

/// Stable operation discriminator used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutOperationKind {
    Insert,
    Remove,
    Move,
    Replace,
    CycleTab,
    FocusTab,
    ToggleSplitView,
    SetSplitRatio,
}

/// Successful operation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutOutcome {
    pub kind: LayoutOperationKind,
    pub before_hash: u64,
    pub after_hash: u64,
}

impl LayoutOutcome {
    /// Whether the operation changed the tree.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.before_hash != self.after_hash
    }
}

/// Failed operation; the tree is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutOperationError {
    pub kind: LayoutOperationKind,
    pub reason: LayoutError,
}

impl fmt::Display for LayoutOperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} failed: {}", self.kind, self.reason)
    }
}

impl std::error::Error for LayoutOperationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}

// =========================================================================
// Tree
// =========================================================================

/// Validated layout tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayoutTree {
    root: Option<NodeId>,
    next_id: NodeId,
    nodes: BTreeMap<NodeId, NodeRecord>,
}

impl LayoutTree {
    /// Empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree with one stack holding `panel_id`.
    #[must_use]
    pub fn singleton(panel_id: PanelId) -> Self {
        let root = NodeId::MIN;
        let mut nodes = BTreeMap::new();
        let _ = nodes.insert(
            root,
            NodeRecord::stack(root, None, PanelStack::single(panel_id)),
        );
        Self {
            root: Some(root),
            next_id: root.checked_next().unwrap_or(root),
            nodes,
        }
    }

    /// Construct and validate from a snapshot.
    pub fn from_snapshot(mut snapshot: LayoutTreeSnapshot) -> Result<Self, LayoutError> {
        if snapshot.schema_version != LAYOUT_TREE_SCHEMA_VERSION {
            return Err(LayoutError::UnsupportedSchemaVersion {
                found: snapshot.schema_version,
                expected: LAYOUT_TREE_SCHEMA_VERSION,
            });
        }
        snapshot.canonicalize();
        let mut nodes = BTreeMap::new();
        for node in snapshot.nodes {
            let node_id = node.id;
            if nodes.insert(node_id, node).is_some() {
                return Err(LayoutError::DuplicateNodeId { node_id });
            }
        }
        let tree = Self {
            root: snapshot.root,
            next_id: snapshot.next_id,
            nodes,
        };
        tree.validate()?;
        Ok(tree)
    }

    /// Export to canonical snapshot form.
    #[must_use]
    pub fn to_snapshot(&self) -> LayoutTreeSnapshot {
        LayoutTreeSnapshot {
            schema_version: LAYOUT_TREE_SCHEMA_VERSION,
            root: self.root,
            next_id: self.next_id,
            nodes: self.nodes.values().cloned().collect(),
        }
    }

    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    /// Iterate nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.values()
    }

    /// Leaf node holding `panel_id`.
    #[must_use]
    pub fn stack_of(&self, panel_id: &PanelId) -> Option<NodeId> {
        self.nodes.values().find_map(|node| match &node.kind {
            NodeKind::Stack(stack) if stack.tabs.contains(panel_id) => Some(node.id),
            _ => None,
        })
    }

    /// The stack payload holding `panel_id`.
    #[must_use]
    pub fn stack_for_panel(&self, panel_id: &PanelId) -> Option<&PanelStack> {
        let id = self.stack_of(panel_id)?;
        match &self.nodes.get(&id)?.kind {
            NodeKind::Stack(stack) => Some(stack),
            NodeKind::Split(_) => None,
        }
    }

    #[must_use]
    pub fn contains_panel(&self, panel_id: &PanelId) -> bool {
        self.stack_of(panel_id).is_some()
    }

    /// Leaf ids in document order (depth-first, first child before second).
    #[must_use]
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(|node| {
            if matches!(node.kind, NodeKind::Stack(_)) {
                out.push(node.id);
            }
        });
        out
    }

    /// Every panel in the tree in document order, hidden tabs included.
    #[must_use]
    pub fn panel_ids(&self) -> Vec<PanelId> {
        let mut out = Vec::new();
        self.walk(|node| {
            if let NodeKind::Stack(stack) = &node.kind {
                out.extend(stack.tabs.iter().cloned());
            }
        });
        out
    }

    /// Panels currently shown, in document order.
    #[must_use]
    pub fn visible_panel_ids(&self) -> Vec<PanelId> {
        let mut out = Vec::new();
        self.walk(|node| {
            if let NodeKind::Stack(stack) = &node.kind {
                out.extend(stack.visible().cloned());
            }
        });
        out
    }

    fn walk<'a>(&'a self, mut visit: impl FnMut(&'a NodeRecord)) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![root];
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            visit(node);
            if let NodeKind::Split(split) = &node.kind {
                stack.push(split.second);
                stack.push(split.first);
            }
        }
    }

    /// Compute rectangles for every visible panel inside `area`.
    ///
    /// Split-view stacks divide their rectangle into equal columns.
    #[must_use]
    pub fn solve_layout(&self, area: Rect) -> BTreeMap<PanelId, Rect> {
        let mut rects = BTreeMap::new();
        if let Some(root) = self.root {
            self.solve_node(root, area, &mut rects, 0);
        }
        rects
    }

    fn solve_node(
        &self,
        node_id: NodeId,
        area: Rect,
        rects: &mut BTreeMap<PanelId, Rect>,
        depth: usize,
    ) {
        if depth > self.nodes.len() {
            return;
        }
        let Some(node) = self.nodes.get(&node_id) else {
            return;
        };
        match &node.kind {
            NodeKind::Stack(stack) => {
                let visible: Vec<&PanelId> = stack.visible().collect();
                let columns = visible.len().max(1) as f64;
                let width = area.width / columns;
                for (i, panel_id) in visible.into_iter().enumerate() {
                    let rect = Rect::new(area.left + width * i as f64, area.top, width, area.height);
                    let _ = rects.insert(panel_id.clone(), rect);
                }
            }
            NodeKind::Split(split) => {
                let share = split.ratio.first_share();
                let (first, second) = match split.axis {
                    SplitAxis::Horizontal => area.split_horizontally(share),
                    SplitAxis::Vertical => area.split_vertically(share),
                };
                self.solve_node(split.first, first, rects, depth + 1);
                self.solve_node(split.second, second, rects, depth + 1);
            }
        }
    }

    /// Deterministic FNV-1a hash of the canonical snapshot.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0001_0000_01b3;

        let bytes = serde_json::to_vec(&self.to_snapshot()).unwrap_or_default();
        bytes.iter().fold(OFFSET_BASIS, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
        })
    }

    // ---------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------

    /// Check every structural invariant.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let Some(root) = self.root else {
            if let Some(node_id) = self.nodes.keys().next() {
                return Err(LayoutError::UnreachableNode { node_id: *node_id });
            }
            return Ok(());
        };

        let root_node = self
            .nodes
            .get(&root)
            .ok_or(LayoutError::MissingNode { node_id: root })?;
        if let Some(parent) = root_node.parent {
            return Err(LayoutError::RootHasParent { root, parent });
        }

        let mut visited = BTreeSet::new();
        let mut panels = FxHashSet::default();
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                return Err(LayoutError::CycleDetected { node_id: id });
            }
            if id >= self.next_id {
                return Err(LayoutError::NextIdNotGreater {
                    node_id: id,
                    next_id: self.next_id,
                });
            }
            let node = self
                .nodes
                .get(&id)
                .ok_or(LayoutError::MissingNode { node_id: id })?;
            match &node.kind {
                NodeKind::Stack(stack) => {
                    if stack.tabs.is_empty() {
                        return Err(LayoutError::EmptyStack { node_id: id });
                    }
                    if stack.active >= stack.tabs.len() {
                        return Err(LayoutError::ActiveTabOutOfRange {
                            node_id: id,
                            active: stack.active,
                            len: stack.tabs.len(),
                        });
                    }
                    for panel_id in &stack.tabs {
                        if !panels.insert(panel_id.clone()) {
                            return Err(LayoutError::DuplicatePanel {
                                panel_id: panel_id.clone(),
                            });
                        }
                    }
                }
                NodeKind::Split(split) => {
                    if split.first == split.second {
                        return Err(LayoutError::DuplicateChild {
                            parent: id,
                            child: split.first,
                        });
                    }
                    for child in [split.first, split.second] {
                        let child_node = self.nodes.get(&child).ok_or(LayoutError::MissingChild {
                            parent: id,
                            child,
                        })?;
                        if child_node.parent != Some(id) {
                            return Err(LayoutError::ParentMismatch {
                                node_id: child,
                                expected: Some(id),
                                found: child_node.parent,
                            });
                        }
                        pending.push(child);
                    }
                }
            }
        }

        if let Some(orphan) = self.nodes.keys().find(|id| !visited.contains(id)) {
            return Err(LayoutError::UnreachableNode { node_id: *orphan });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    /// Apply one operation atomically.
    ///
    /// The operation runs on a cloned working tree; on success the clone
    /// replaces `self`, on failure `self` is unchanged.
    pub fn apply(&mut self, operation: LayoutOperation) -> Result<LayoutOutcome, LayoutOperationError> {
        let kind = operation.kind();
        let before_hash = self.state_hash();
        let mut working = self.clone();
        working
            .apply_inner(operation)
            .and_then(|()| working.validate())
            .map_err(|reason| LayoutOperationError { kind, reason })?;
        let after_hash = working.state_hash();
        *self = working;
        Ok(LayoutOutcome {
            kind,
            before_hash,
            after_hash,
        })
    }

    fn apply_inner(&mut self, operation: LayoutOperation) -> Result<(), LayoutError> {
        match operation {
            LayoutOperation::Insert {
                target,
                panel,
                attach,
            } => self.insert_panel(target.as_ref(), panel, attach),
            LayoutOperation::Remove { panel } => self.remove_panel(&panel),
            LayoutOperation::Move {
                panel,
                target,
                attach,
            } => {
                if panel == target {
                    return Err(LayoutError::SamePanel { panel_id: panel });
                }
                if !self.contains_panel(&target) {
                    return Err(LayoutError::PanelNotFound { panel_id: target });
                }
                self.remove_panel(&panel)?;
                self.insert_panel(Some(&target), panel, attach)
            }
            LayoutOperation::Replace { old, new } => {
                if self.contains_panel(&new) {
                    return Err(LayoutError::DuplicatePanel { panel_id: new });
                }
                let (stack, index) = self.locate_mut(&old)?;
                stack.tabs[index] = new;
                Ok(())
            }
            LayoutOperation::CycleTab { panel, forward } => {
                let (stack, _) = self.locate_mut(&panel)?;
                let len = stack.tabs.len();
                if len > 1 {
                    stack.active = if forward {
                        (stack.active + 1) % len
                    } else {
                        (stack.active + len - 1) % len
                    };
                }
                Ok(())
            }
            LayoutOperation::FocusTab { panel } => {
                let (stack, index) = self.locate_mut(&panel)?;
                stack.active = index;
                Ok(())
            }
            LayoutOperation::ToggleSplitView { panel } => {
                let (stack, _) = self.locate_mut(&panel)?;
                stack.split_view = !stack.split_view;
                Ok(())
            }
            LayoutOperation::SetSplitRatio { split, ratio } => {
                let node = self
                    .nodes
                    .get_mut(&split)
                    .ok_or(LayoutError::MissingNode { node_id: split })?;
                match &mut node.kind {
                    NodeKind::Split(payload) => {
                        payload.ratio = ratio;
                        Ok(())
                    }
                    NodeKind::Stack(_) => Err(LayoutError::NotASplit { node_id: split }),
                }
            }
        }
    }

    fn locate_mut(&mut self, panel_id: &PanelId) -> Result<(&mut PanelStack, usize), LayoutError> {
        let node_id = self.stack_of(panel_id).ok_or_else(|| LayoutError::PanelNotFound {
            panel_id: panel_id.clone(),
        })?;
        match self.nodes.get_mut(&node_id).map(|n| &mut n.kind) {
            Some(NodeKind::Stack(stack)) => {
                let index = stack
                    .position(panel_id)
                    .ok_or_else(|| LayoutError::PanelNotFound {
                        panel_id: panel_id.clone(),
                    })?;
                Ok((stack, index))
            }
            _ => Err(LayoutError::MissingNode { node_id }),
        }
    }

    fn allocate_node_id(&mut self) -> Result<NodeId, LayoutError> {
        let id = self.next_id;
        self.next_id = id.checked_next()?;
        Ok(id)
    }

    fn insert_panel(
        &mut self,
        target: Option<&PanelId>,
        panel: PanelId,
        attach: Attach,
    ) -> Result<(), LayoutError> {
        if self.contains_panel(&panel) {
            return Err(LayoutError::DuplicatePanel { panel_id: panel });
        }

        let Some(target) = target else {
            if self.root.is_some() {
                return Err(LayoutError::TargetRequired);
            }
            let id = self.allocate_node_id()?;
            let _ = self
                .nodes
                .insert(id, NodeRecord::stack(id, None, PanelStack::single(panel)));
            self.root = Some(id);
            return Ok(());
        };

        let target_leaf = self
            .stack_of(target)
            .ok_or_else(|| LayoutError::PanelNotFound {
                panel_id: target.clone(),
            })?;

        match attach {
            Attach::Tab => {
                let (stack, _) = self.locate_mut(target)?;
                stack.tabs.push(panel);
                stack.active = stack.tabs.len() - 1;
                Ok(())
            }
            Attach::Split {
                axis,
                placement,
                ratio,
            } => self.split_leaf(target_leaf, panel, axis, placement, ratio),
        }
    }

    fn split_leaf(
        &mut self,
        target: NodeId,
        panel: PanelId,
        axis: SplitAxis,
        placement: Placement,
        ratio: SplitRatio,
    ) -> Result<(), LayoutError> {
        let target_parent = self
            .nodes
            .get(&target)
            .ok_or(LayoutError::MissingNode { node_id: target })?
            .parent;

        let split_id = self.allocate_node_id()?;
        let leaf_id = self.allocate_node_id()?;
        let (first, second) = placement.ordered(target, leaf_id);

        if let Some(target_node) = self.nodes.get_mut(&target) {
            target_node.parent = Some(split_id);
        }
        let _ = self.nodes.insert(
            leaf_id,
            NodeRecord::stack(leaf_id, Some(split_id), PanelStack::single(panel)),
        );
        let _ = self.nodes.insert(
            split_id,
            NodeRecord::split(
                split_id,
                target_parent,
                Split {
                    axis,
                    ratio,
                    first,
                    second,
                },
            ),
        );

        match target_parent {
            Some(parent) => self.replace_child(parent, target, split_id),
            None => {
                self.root = Some(split_id);
                Ok(())
            }
        }
    }

    fn remove_panel(&mut self, panel_id: &PanelId) -> Result<(), LayoutError> {
        let leaf_id = self
            .stack_of(panel_id)
            .ok_or_else(|| LayoutError::PanelNotFound {
                panel_id: panel_id.clone(),
            })?;

        let emptied = {
            let (stack, index) = self.locate_mut(panel_id)?;
            let _ = stack.tabs.remove(index);
            if index < stack.active || stack.active >= stack.tabs.len() {
                stack.active = stack.active.saturating_sub(1);
            }
            stack.tabs.is_empty()
        };
        if emptied {
            self.detach_leaf(leaf_id)?;
        }
        Ok(())
    }

    /// Remove a leaf and promote its sibling into the parent's slot.
    fn detach_leaf(&mut self, leaf_id: NodeId) -> Result<(), LayoutError> {
        let parent = self
            .nodes
            .remove(&leaf_id)
            .ok_or(LayoutError::MissingNode { node_id: leaf_id })?
            .parent;

        let Some(parent_id) = parent else {
            self.root = None;
            return Ok(());
        };

        let parent_node = self
            .nodes
            .remove(&parent_id)
            .ok_or(LayoutError::MissingNode { node_id: parent_id })?;
        let NodeKind::Split(split) = parent_node.kind else {
            return Err(LayoutError::NotASplit { node_id: parent_id });
        };
        let sibling = if split.first == leaf_id {
            split.second
        } else {
            split.first
        };
        let grandparent = parent_node.parent;
        if let Some(sibling_node) = self.nodes.get_mut(&sibling) {
            sibling_node.parent = grandparent;
        }
        match grandparent {
            Some(grandparent_id) => self.replace_child(grandparent_id, parent_id, sibling),
            None => {
                self.root = Some(sibling);
                Ok(())
            }
        }
    }

    fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> Result<(), LayoutError> {
        let node = self
            .nodes
            .get_mut(&parent)
            .ok_or(LayoutError::MissingNode { node_id: parent })?;
        let NodeKind::Split(split) = &mut node.kind else {
            return Err(LayoutError::NotASplit { node_id: parent });
        };
        if split.first == old {
            split.first = new;
        } else if split.second == old {
            split.second = new;
        } else {
            return Err(LayoutError::ParentMismatch {
                node_id: old,
                expected: Some(parent),
                found: None,
            });
        }
        Ok(())
    }
}

// =========================================================================
// Errors
// =========================================================================

/// Layout model errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    ZeroNodeId,
    NodeIdOverflow,
    InvalidSplitRatio {
        first: u32,
        second: u32,
    },
    UnsupportedSchemaVersion {
        found: u16,
        expected: u16,
    },
    DuplicateNodeId {
        node_id: NodeId,
    },
    MissingNode {
        node_id: NodeId,
    },
    MissingChild {
        parent: NodeId,
        child: NodeId,
    },
    DuplicateChild {
        parent: NodeId,
        child: NodeId,
    },
    NotASplit {
        node_id: NodeId,
    },
    RootHasParent {
        root: NodeId,
        parent: NodeId,
    },
    ParentMismatch {
        node_id: NodeId,
        expected: Option<NodeId>,
        found: Option<NodeId>,
    },
    CycleDetected {
        node_id: NodeId,
    },
    UnreachableNode {
        node_id: NodeId,
    },
    NextIdNotGreater {
        node_id: NodeId,
        next_id: NodeId,
    },
    EmptyStack {
        node_id: NodeId,
    },
    ActiveTabOutOfRange {
        node_id: NodeId,
        active: usize,
        len: usize,
    },
    DuplicatePanel {
        panel_id: PanelId,
    },
    PanelNotFound {
        panel_id: PanelId,
    },
    SamePanel {
        panel_id: PanelId,
    },
    /// Insert without a target into a non-empty tree.
    TargetRequired,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroNodeId => write!(f, "node id 0 is reserved"),
            Self::NodeIdOverflow => write!(f, "node id space exhausted"),
            Self::InvalidSplitRatio { first, second } => {
                write!(f, "invalid split ratio {first}:{second}")
            }
            Self::UnsupportedSchemaVersion { found, expected } => {
                write!(f, "unsupported layout tree schema {found} (expected {expected})")
            }
            Self::DuplicateNodeId { node_id } => write!(f, "duplicate {node_id}"),
            Self::MissingNode { node_id } => write!(f, "{node_id} not found"),
            Self::MissingChild { parent, child } => {
                write!(f, "{parent} references missing child {child}")
            }
            Self::DuplicateChild { parent, child } => {
                write!(f, "{parent} references {child} twice")
            }
            Self::NotASplit { node_id } => write!(f, "{node_id} is not a split"),
            Self::RootHasParent { root, parent } => {
                write!(f, "root {root} has parent {parent}")
            }
            Self::ParentMismatch {
                node_id,
                expected,
                found,
            } => write!(
                f,
                "{node_id} parent mismatch: expected {expected:?}, found {found:?}"
            ),
            Self::CycleDetected { node_id } => write!(f, "cycle detected at {node_id}"),
            Self::UnreachableNode { node_id } => write!(f, "{node_id} is unreachable from root"),
            Self::NextIdNotGreater { node_id, next_id } => {
                write!(f, "{node_id} is not below next id {next_id}")
            }
            Self::EmptyStack { node_id } => write!(f, "{node_id} has no tabs"),
            Self::ActiveTabOutOfRange {
                node_id,
                active,
                len,
            } => write!(f, "{node_id} active tab {active} out of range ({len} tabs)"),
            Self::DuplicatePanel { panel_id } => {
                write!(f, "panel {panel_id} appears more than once")
            }
            Self::PanelNotFound { panel_id } => write!(f, "panel {panel_id} not in layout"),
            Self::SamePanel { panel_id } => {
                write!(f, "panel {panel_id} cannot be moved relative to itself")
            }
            Self::TargetRequired => write!(f, "insert into a non-empty layout needs a target"),
        }
    }
}

impl std::error::Error for LayoutError {}
