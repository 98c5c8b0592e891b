#![forbid(unsafe_code)]

//! Spatial navigation between panels based on live bounding rectangles.
//!
//! # Algorithm
//!
//! Horizontal moves (`Left`/`Right`):
//!
//! 1. Candidates lie entirely past the current panel's trailing edge.
//! 2. Among candidates that overlap the current panel vertically, pick the
//!    smallest gap; ties go to the smaller top offset, then the smaller
//!    vertical-center offset.
//! 3. With no vertically overlapping candidate, pick the smallest top offset,
//!    then the smallest horizontal-center distance.
//!
//! Vertical moves (`Up`/`Down`) only consider candidates that overlap the
//! current panel horizontally: smallest gap, then smallest left-edge offset,
//! then smallest horizontal-center distance.
//!
//! # Invariants
//!
//! - Deterministic: the same rectangles always yield the same answer; exact
//!   ties keep the earlier candidate in document order.
//! - `None` when no rectangle satisfies the directional predicate.

use std::cmp::Ordering;

use paneldeck_core::event::KeyCode;
use paneldeck_core::geometry::{GeometrySource, Rect};
use paneldeck_core::ids::PanelId;
use serde::{Deserialize, Serialize};

/// Slack for edges that touch after sub-pixel rounding.
pub const EDGE_TOLERANCE_PX: f64 = 1.0;

/// Arrow direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Direction of an arrow key.
    #[must_use]
    pub const fn from_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Left => Some(Self::Left),
            KeyCode::Right => Some(Self::Right),
            KeyCode::Up => Some(Self::Up),
            KeyCode::Down => Some(Self::Down),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }
}

/// Ranking key; compared lexicographically, smaller wins.
type Score = [f64; 3];

fn compare(a: &Score, b: &Score) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.total_cmp(y))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Gap from `current` to `candidate` in `direction`, or `None` if the
/// candidate is not past the trailing edge.
fn gap(current: &Rect, candidate: &Rect, direction: Direction) -> Option<f64> {
    let raw = match direction {
        Direction::Right => candidate.left - current.right(),
        Direction::Left => current.left - candidate.right(),
        Direction::Down => candidate.top - current.bottom(),
        Direction::Up => current.top - candidate.bottom(),
    };
    (raw >= -EDGE_TOLERANCE_PX).then_some(raw.max(0.0))
}

/// Nearest panel from `current` in `direction` among `candidates`.
///
/// Panels without a rectangle (not in the document) are skipped; if the
/// current panel has none the result is `None`.
#[must_use]
pub fn find_spatial_neighbor(
    current: &PanelId,
    candidates: &[PanelId],
    geometry: &dyn GeometrySource,
    direction: Direction,
) -> Option<PanelId> {
    let origin = geometry.panel_rect(current)?;

    let mut aligned: Option<(Score, &PanelId)> = None;
    let mut fallback: Option<(Score, &PanelId)> = None;

    for candidate in candidates.iter().filter(|id| *id != current) {
        let Some(rect) = geometry.panel_rect(candidate) else {
            continue;
        };
        let Some(distance) = gap(&origin, &rect, direction) else {
            continue;
        };

        let (slot, score) = if direction.is_horizontal() {
            if origin.overlaps_vertically(&rect) {
                let score = [
                    distance,
                    (rect.top - origin.top).abs(),
                    (rect.center_y() - origin.center_y()).abs(),
                ];
                (&mut aligned, score)
            } else {
                let score = [
                    (rect.top - origin.top).abs(),
                    (rect.center_x() - origin.center_x()).abs(),
                    0.0,
                ];
                (&mut fallback, score)
            }
        } else {
            if !origin.overlaps_horizontally(&rect) {
                continue;
            }
            let score = [
                distance,
                (rect.left - origin.left).abs(),
                (rect.center_x() - origin.center_x()).abs(),
            ];
            (&mut aligned, score)
        };

        if slot
            .as_ref()
            .is_none_or(|(best, _)| compare(&score, best).is_lt())
        {
            *slot = Some((score, candidate));
        }
    }

    aligned.or(fallback).map(|(_, id)| id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use paneldeck_core::geometry::StaticGeometry;

    fn ids(raw: &[&str]) -> Vec<PanelId> {
        raw.iter().map(|s| PanelId::from(*s)).collect()
    }

    fn row() -> StaticGeometry {
        StaticGeometry::new()
            .with("left", Rect::new(0.0, 0.0, 100.0, 300.0))
            .with("center", Rect::new(100.0, 0.0, 100.0, 300.0))
            .with("right", Rect::new(200.0, 0.0, 100.0, 300.0))
    }

    #[test]
    fn arrow_right_walks_a_row() {
        let geo = row();
        let all = ids(&["left", "center", "right"]);
        let step = |from: &str| find_spatial_neighbor(&PanelId::from(from), &all, &geo, Direction::Right);
        assert_eq!(step("left"), Some(PanelId::from("center")));
        assert_eq!(step("center"), Some(PanelId::from("right")));
        assert_eq!(step("right"), None);
    }

    #[test]
    fn aligned_candidate_beats_closer_unaligned_one() {
        // `low` starts nearer but does not share any rows with `origin`.
        let geo = StaticGeometry::new()
            .with("origin", Rect::new(0.0, 0.0, 100.0, 100.0))
            .with("low", Rect::new(110.0, 200.0, 100.0, 100.0))
            .with("far", Rect::new(400.0, 50.0, 100.0, 100.0));
        let all = ids(&["origin", "low", "far"]);
        assert_eq!(
            find_spatial_neighbor(&PanelId::from("origin"), &all, &geo, Direction::Right),
            Some(PanelId::from("far"))
        );
    }

    #[test]
    fn unaligned_fallback_prefers_top_offset() {
        let geo = StaticGeometry::new()
            .with("origin", Rect::new(0.0, 0.0, 100.0, 100.0))
            .with("near_top", Rect::new(300.0, 120.0, 100.0, 100.0))
            .with("far_top", Rect::new(110.0, 400.0, 100.0, 100.0));
        let all = ids(&["origin", "far_top", "near_top"]);
        assert_eq!(
            find_spatial_neighbor(&PanelId::from("origin"), &all, &geo, Direction::Right),
            Some(PanelId::from("near_top"))
        );
    }

    #[test]
    fn vertical_moves_require_horizontal_overlap() {
        let geo = StaticGeometry::new()
            .with("top", Rect::new(0.0, 0.0, 100.0, 100.0))
            .with("below_left", Rect::new(0.0, 100.0, 50.0, 100.0))
            .with("below_right", Rect::new(50.0, 100.0, 50.0, 100.0))
            .with("diagonal", Rect::new(200.0, 100.0, 100.0, 100.0));
        let all = ids(&["top", "below_right", "below_left", "diagonal"]);
        assert_eq!(
            find_spatial_neighbor(&PanelId::from("top"), &all, &geo, Direction::Down),
            Some(PanelId::from("below_left"))
        );
        assert_eq!(
            find_spatial_neighbor(&PanelId::from("diagonal"), &all, &geo, Direction::Up),
            None
        );
    }

    #[test]
    fn missing_rects_are_skipped() {
        let geo = StaticGeometry::new().with("a", Rect::new(0.0, 0.0, 10.0, 10.0));
        let all = ids(&["a", "ghost"]);
        assert_eq!(
            find_spatial_neighbor(&PanelId::from("a"), &all, &geo, Direction::Right),
            None
        );
        assert_eq!(
            find_spatial_neighbor(&PanelId::from("ghost"), &all, &geo, Direction::Left),
            None
        );
    }

    #[test]
    fn sole_panel_has_no_neighbor() {
        let geo = StaticGeometry::new().with("only", Rect::new(0.0, 0.0, 10.0, 10.0));
        let all = ids(&["only"]);
        for direction in [Direction::Left, Direction::Right, Direction::Up, Direction::Down] {
            assert_eq!(
                find_spatial_neighbor(&PanelId::from("only"), &all, &geo, direction),
                None
            );
        }
    }
}
