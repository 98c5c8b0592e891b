#![forbid(unsafe_code)]

//! Most-recent-first record of activated panels.
//!
//! # Invariants
//!
//! 1. No panel id appears twice.
//! 2. `len() <= max_depth` after every operation; the oldest entry is evicted.

use std::collections::VecDeque;

use paneldeck_core::ids::PanelId;

/// Default number of remembered activations.
pub const DEFAULT_FOCUS_HISTORY_DEPTH: usize = 20;

/// Bounded MRU list of panel ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusHistory {
    entries: VecDeque<PanelId>,
    max_depth: usize,
}

impl Default for FocusHistory {
    fn default() -> Self {
        Self::new(DEFAULT_FOCUS_HISTORY_DEPTH)
    }
}

impl FocusHistory {
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Rebuild from persisted entries, dropping duplicates and overflow.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = PanelId>, max_depth: usize) -> Self {
        let mut history = Self::new(max_depth);
        for panel_id in entries {
            if !history.entries.contains(&panel_id) && history.entries.len() < history.max_depth {
                history.entries.push_back(panel_id);
            }
        }
        history
    }

    /// Move `panel_id` to the front.
    pub fn record(&mut self, panel_id: PanelId) {
        self.entries.retain(|p| p != &panel_id);
        self.entries.push_front(panel_id);
        self.entries.truncate(self.max_depth);
    }

    /// Forget `panel_id`. Returns whether it was present.
    pub fn remove(&mut self, panel_id: &PanelId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|p| p != panel_id);
        self.entries.len() != before
    }

    /// Swap `old` for `new` in place.
    pub fn rename(&mut self, old: &PanelId, new: PanelId) {
        if let Some(slot) = self.entries.iter_mut().find(|p| *p == old) {
            *slot = new;
        }
    }

    /// Most recent entry accepted by `keep`.
    #[must_use]
    pub fn most_recent(&self, keep: impl Fn(&PanelId) -> bool) -> Option<&PanelId> {
        self.entries.iter().find(|p| keep(p))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PanelId> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
