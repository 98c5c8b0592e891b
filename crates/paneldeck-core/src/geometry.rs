#![forbid(unsafe_code)]

//! Geometric primitives and the geometry source seam.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::PanelId;

/// A bounding rectangle in CSS pixels (origin at top-left).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    #[must_use]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    #[inline]
    #[must_use]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    #[inline]
    #[must_use]
    pub fn center_x(&self) -> f64 {
        self.left + self.width / 2.0
    }

    #[inline]
    #[must_use]
    pub fn center_y(&self) -> f64 {
        self.top + self.height / 2.0
    }

    /// Zero or negative area.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Whether the vertical extents of the two rectangles intersect.
    #[must_use]
    pub fn overlaps_vertically(&self, other: &Rect) -> bool {
        self.top < other.bottom() && other.top < self.bottom()
    }

    /// Whether the horizontal extents of the two rectangles intersect.
    #[must_use]
    pub fn overlaps_horizontally(&self, other: &Rect) -> bool {
        self.left < other.right() && other.left < self.right()
    }

    /// Split into two rectangles along the horizontal axis, giving `share`
    /// (0.0..=1.0) of the width to the first.
    #[must_use]
    pub fn split_horizontally(&self, share: f64) -> (Rect, Rect) {
        let first_width = self.width * share.clamp(0.0, 1.0);
        (
            Rect::new(self.left, self.top, first_width, self.height),
            Rect::new(
                self.left + first_width,
                self.top,
                self.width - first_width,
                self.height,
            ),
        )
    }

    /// Split into two rectangles along the vertical axis, giving `share` of
    /// the height to the first.
    #[must_use]
    pub fn split_vertically(&self, share: f64) -> (Rect, Rect) {
        let first_height = self.height * share.clamp(0.0, 1.0);
        (
            Rect::new(self.left, self.top, self.width, first_height),
            Rect::new(
                self.left,
                self.top + first_height,
                self.width,
                self.height - first_height,
            ),
        )
    }
}

/// Source of live panel bounding rectangles.
///
/// In a browser this wraps `getBoundingClientRect()` on each panel frame. A
/// panel whose frame is not in the document yields `None`.
pub trait GeometrySource {
    fn panel_rect(&self, panel_id: &PanelId) -> Option<Rect>;
}

/// Fixed table of rectangles, for tests and headless hosts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticGeometry {
    rects: BTreeMap<PanelId, Rect>,
}

impl StaticGeometry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, panel_id: impl Into<PanelId>, rect: Rect) -> Self {
        self.insert(panel_id, rect);
        self
    }

    pub fn insert(&mut self, panel_id: impl Into<PanelId>, rect: Rect) {
        let _ = self.rects.insert(panel_id.into(), rect);
    }

    pub fn remove(&mut self, panel_id: &PanelId) {
        let _ = self.rects.remove(panel_id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PanelId, &Rect)> {
        self.rects.iter()
    }
}

impl FromIterator<(PanelId, Rect)> for StaticGeometry {
    fn from_iter<I: IntoIterator<Item = (PanelId, Rect)>>(iter: I) -> Self {
        Self {
            rects: iter.into_iter().collect(),
        }
    }
}

impl GeometrySource for StaticGeometry {
    fn panel_rect(&self, panel_id: &PanelId) -> Option<Rect> {
        self.rects.get(panel_id).copied()
    }
}
