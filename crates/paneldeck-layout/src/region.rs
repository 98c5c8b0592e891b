#![forbid(unsafe_code)]

//! Named placement regions.
//!
//! A region describes where a new or moved panel lands relative to a target
//! panel: on one of its four sides (wrapping the target in a split) or in its
//! center (joining the target's tab stack).

use serde::{Deserialize, Serialize};

use crate::tree::{SplitAxis, SplitRatio};

/// Named region relative to a target panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Left,
    #[default]
    Right,
    Top,
    Bottom,
    Center,
}

impl Region {
    /// Parse a region name (`"left"`, `"right"`, ...).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "top" => Some(Self::Top),
            "bottom" => Some(Self::Bottom),
            "center" => Some(Self::Center),
            _ => None,
        }
    }

    /// Tree attachment for this region.
    #[must_use]
    pub const fn attach(self) -> Attach {
        match self {
            Self::Left => Attach::Split {
                axis: SplitAxis::Horizontal,
                placement: Placement::IncomingFirst,
                ratio: SplitRatio::EVEN,
            },
            Self::Right => Attach::Split {
                axis: SplitAxis::Horizontal,
                placement: Placement::ExistingFirst,
                ratio: SplitRatio::EVEN,
            },
            Self::Top => Attach::Split {
                axis: SplitAxis::Vertical,
                placement: Placement::IncomingFirst,
                ratio: SplitRatio::EVEN,
            },
            Self::Bottom => Attach::Split {
                axis: SplitAxis::Vertical,
                placement: Placement::ExistingFirst,
                ratio: SplitRatio::EVEN,
            },
            Self::Center => Attach::Tab,
        }
    }
}

/// Which child of a new split the incoming panel occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Existing node stays first (left/top); incoming goes second.
    ExistingFirst,
    /// Incoming node goes first (left/top); existing goes second.
    IncomingFirst,
}

impl Placement {
    /// Order `(existing, incoming)` into `(first, second)`.
    #[must_use]
    pub fn ordered<T>(self, existing: T, incoming: T) -> (T, T) {
        match self {
            Self::ExistingFirst => (existing, incoming),
            Self::IncomingFirst => (incoming, existing),
        }
    }
}

/// How a panel attaches to a target leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "attach", rename_all = "snake_case")]
pub enum Attach {
    /// Wrap the target leaf in a new split.
    Split {
        axis: SplitAxis,
        placement: Placement,
        ratio: SplitRatio,
    },
    /// Join the target's tab stack as the active tab.
    Tab,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sides_control_orientation_and_order() {
        assert!(matches!(
            Region::Left.attach(),
            Attach::Split {
                axis: SplitAxis::Horizontal,
                placement: Placement::IncomingFirst,
                ..
            }
        ));
        assert!(matches!(
            Region::Bottom.attach(),
            Attach::Split {
                axis: SplitAxis::Vertical,
                placement: Placement::ExistingFirst,
                ..
            }
        ));
        assert_eq!(Region::Center.attach(), Attach::Tab);
    }

    #[test]
    fn parse_names() {
        assert_eq!(Region::parse("top"), Some(Region::Top));
        assert_eq!(Region::parse("middle"), None);
    }

    #[test]
    fn placement_orders_pairs() {
        assert_eq!(Placement::ExistingFirst.ordered(1, 2), (1, 2));
        assert_eq!(Placement::IncomingFirst.ordered(1, 2), (2, 1));
    }
}
