#![forbid(unsafe_code)]

//! Canonical keyboard events.
//!
//! Browser adapters convert `KeyboardEvent` into [`KeyEvent`] with
//! [`KeyEvent::from_dom`]; everything downstream matches on [`KeyCode`] and
//! [`Modifiers`] only.
//!
//! # Design Notes
//!
//! - `Modifiers` use bitflags for easy combination.
//! - Shift+Tab is reported as [`KeyCode::BackTab`] so handlers never need to
//!   inspect the shift bit to tell the two apart.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A keyboard key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// The key code that was pressed.
    pub code: KeyCode,

    /// Modifier keys held during the event.
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// Create a new key event with no modifiers.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
        }
    }

    /// Create a key event with modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Character key shorthand.
    #[must_use]
    pub const fn char(c: char) -> Self {
        Self::new(KeyCode::Char(c))
    }

    /// Build from the DOM `KeyboardEvent.key` value and modifier flags.
    ///
    /// Returns `None` for keys the workspace never binds (function keys,
    /// media keys, bare modifiers).
    #[must_use]
    pub fn from_dom(key: &str, ctrl: bool, shift: bool, alt: bool, meta: bool) -> Option<Self> {
        let mut modifiers = Modifiers::NONE;
        modifiers.set(Modifiers::CTRL, ctrl);
        modifiers.set(Modifiers::SHIFT, shift);
        modifiers.set(Modifiers::ALT, alt);
        modifiers.set(Modifiers::SUPER, meta);

        let code = match key {
            "Enter" => KeyCode::Enter,
            "Escape" | "Esc" => KeyCode::Escape,
            "Backspace" => KeyCode::Backspace,
            "Delete" => KeyCode::Delete,
            "Tab" if shift => KeyCode::BackTab,
            "Tab" => KeyCode::Tab,
            "ArrowUp" => KeyCode::Up,
            "ArrowDown" => KeyCode::Down,
            "ArrowLeft" => KeyCode::Left,
            "ArrowRight" => KeyCode::Right,
            "Home" => KeyCode::Home,
            "End" => KeyCode::End,
            other => {
                let mut chars = other.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                KeyCode::Char(c.to_ascii_lowercase())
            }
        };
        Some(Self { code, modifiers })
    }

    /// Digit value for `0`-`9` character keys.
    #[must_use]
    pub fn digit(&self) -> Option<u8> {
        match self.code {
            KeyCode::Char(c) => c.to_digit(10).and_then(|d| u8::try_from(d).ok()),
            _ => None,
        }
    }

    /// True if no command modifier (Ctrl/Alt/Super) is held.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        !self
            .modifiers
            .intersects(Modifiers::CTRL | Modifiers::ALT | Modifiers::SUPER)
    }
}

/// Key codes the workspace recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A regular character key, lowercased.
    Char(char),
    Enter,
    Escape,
    Backspace,
    Delete,
    Tab,
    /// Shift+Tab.
    BackTab,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
}

bitflags! {
    /// Modifier keys that can be held during a key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0b0000;
        /// Shift key.
        const SHIFT = 0b0001;
        /// Alt/Option key.
        const ALT   = 0b0010;
        /// Control key.
        const CTRL  = 0b0100;
        /// Super/Meta/Command key.
        const SUPER = 0b1000;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}

/// Host platform, selecting the primary command modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// macOS / iOS: Cmd is the command modifier.
    Mac,
    #[default]
    Other,
}

impl Platform {
    /// Detect from a `navigator.platform` / user-agent string.
    #[must_use]
    pub fn detect(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        if ua.contains("mac") || ua.contains("iphone") || ua.contains("ipad") {
            Self::Mac
        } else {
            Self::Other
        }
    }

    /// Primary command modifier (Cmd on Mac, Ctrl elsewhere).
    #[must_use]
    pub const fn command_modifier(self) -> Modifiers {
        match self {
            Self::Mac => Modifiers::SUPER,
            Self::Other => Modifiers::CTRL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dom_keys_map_to_codes() {
        let ev = KeyEvent::from_dom("ArrowRight", false, false, false, false).unwrap();
        assert_eq!(ev.code, KeyCode::Right);
        let ev = KeyEvent::from_dom("P", true, true, false, false).unwrap();
        assert_eq!(ev.code, KeyCode::Char('p'));
        assert_eq!(ev.modifiers, Modifiers::CTRL | Modifiers::SHIFT);
    }

    #[test]
    fn shift_tab_is_back_tab() {
        let ev = KeyEvent::from_dom("Tab", false, true, false, false).unwrap();
        assert_eq!(ev.code, KeyCode::BackTab);
    }

    #[test]
    fn unbound_keys_are_ignored() {
        assert!(KeyEvent::from_dom("F5", false, false, false, false).is_none());
        assert!(KeyEvent::from_dom("Shift", false, true, false, false).is_none());
    }

    #[test]
    fn digits() {
        assert_eq!(KeyEvent::char('7').digit(), Some(7));
        assert_eq!(KeyEvent::char('x').digit(), None);
        assert_eq!(KeyEvent::new(KeyCode::Enter).digit(), None);
    }

    #[test]
    fn platform_detection() {
        assert_eq!(Platform::detect("MacIntel"), Platform::Mac);
        assert_eq!(Platform::detect("Linux x86_64"), Platform::Other);
        assert_eq!(Platform::Mac.command_modifier(), Modifiers::SUPER);
    }
}
