#![forbid(unsafe_code)]

//! Focus zones, the session sidebar pointer, and the dialog collaborator.
//!
//! # Invariants
//!
//! - The sidebar pointer is `None` whenever the input zone has focus.
//! - When set, the pointer indexes an existing session item.

use serde::{Deserialize, Serialize};

/// The two Tab-cycled focus zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusZone {
    Sidebar,
    Input,
}

impl FocusZone {
    /// Zone reached by Tab from `current`; no zone enters the sidebar.
    #[must_use]
    pub const fn next(current: Option<Self>) -> Self {
        match current {
            Some(Self::Sidebar) => Self::Input,
            Some(Self::Input) | None => Self::Sidebar,
        }
    }
}

/// Confirmation dialogs the sidebar can request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmDialog {
    DeleteSession { session_id: String },
    ClearHistory { session_id: String },
}

/// Modal dialog collaborator.
///
/// An open dialog vetoes all shortcut dispatch.
pub trait DialogManager {
    fn has_open_dialog(&self) -> bool;

    /// Open a confirmation dialog.
    fn confirm(&self, dialog: ConfirmDialog);
}

/// Dialog manager that never shows anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDialogs;

impl DialogManager for NoDialogs {
    fn has_open_dialog(&self) -> bool {
        false
    }

    fn confirm(&self, dialog: ConfirmDialog) {
        tracing::debug!(message = "nav.confirm_dropped", dialog = ?dialog);
    }
}

/// Session list shown in the sidebar plus the keyboard pointer into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSidebar {
    sessions: Vec<String>,
    active_session: Option<String>,
    focused: Option<usize>,
}

impl SessionSidebar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session list, keeping the pointer on the same session
    /// when it survives.
    pub fn set_sessions(&mut self, sessions: Vec<String>) {
        let keep = self.focused_session().map(str::to_owned);
        self.sessions = sessions;
        self.focused = match keep {
            Some(id) => self.sessions.iter().position(|s| *s == id).or_else(|| {
                (!self.sessions.is_empty()).then_some(0)
            }),
            None => None,
        };
    }

    pub fn set_active_session(&mut self, session_id: Option<String>) {
        self.active_session = session_id;
    }

    #[must_use]
    pub fn sessions(&self) -> &[String] {
        &self.sessions
    }

    #[must_use]
    pub fn active_session(&self) -> Option<&str> {
        self.active_session.as_deref()
    }

    #[must_use]
    pub fn focused_index(&self) -> Option<usize> {
        self.focused
    }

    #[must_use]
    pub fn focused_session(&self) -> Option<&str> {
        self.focused
            .and_then(|i| self.sessions.get(i))
            .map(String::as_str)
    }

    /// Point at the active session, or the first item.
    pub fn enter(&mut self) -> Option<&str> {
        self.focused = self
            .active_session
            .as_ref()
            .and_then(|active| self.sessions.iter().position(|s| s == active))
            .or_else(|| (!self.sessions.is_empty()).then_some(0));
        self.focused_session()
    }

    pub fn leave(&mut self) {
        self.focused = None;
    }

    /// Move the pointer by one with wraparound; returns the newly pointed
    /// session.
    pub fn step(&mut self, forward: bool) -> Option<&str> {
        let len = self.sessions.len();
        if len == 0 {
            return None;
        }
        let next = match self.focused {
            None if forward => 0,
            None => len - 1,
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
        };
        self.focused = Some(next);
        self.focused_session()
    }
}
