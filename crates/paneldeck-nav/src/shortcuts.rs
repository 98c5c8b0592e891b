#![forbid(unsafe_code)]

//! Document-level shortcut registry.
//!
//! Every registered shortcut carries an `is_enabled` predicate. Shortcuts
//! registered with [`ShortcutRegistry::register`] share the registry's
//! global gate (shortcuts switched on, no modal dialog open), so the veto
//! is evaluated once per shortcut rather than inside each handler.

use std::fmt;
use std::rc::Rc;

use paneldeck_core::event::{KeyCode, KeyEvent, Modifiers, Platform};

/// Predicate deciding whether a shortcut may fire right now.
pub type EnabledPredicate = Rc<dyn Fn() -> bool>;

/// Exact key + modifier combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl KeyChord {
    #[must_use]
    pub const fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        Self { code, modifiers }
    }

    /// Platform command modifier plus Shift plus `c`.
    #[must_use]
    pub fn command_shift(platform: Platform, c: char) -> Self {
        Self::new(
            KeyCode::Char(c.to_ascii_lowercase()),
            platform.command_modifier() | Modifiers::SHIFT,
        )
    }

    #[must_use]
    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.code == event.code && self.modifiers == event.modifiers
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, label) in [
            (Modifiers::CTRL, "Ctrl+"),
            (Modifiers::SUPER, "Cmd+"),
            (Modifiers::ALT, "Alt+"),
            (Modifiers::SHIFT, "Shift+"),
        ] {
            if self.modifiers.contains(flag) {
                f.write_str(label)?;
            }
        }
        match self.code {
            KeyCode::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Built-in navigation commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavCommand {
    ToggleLayoutNavigation,
    ToggleHeaderNavigation,
}

impl NavCommand {
    pub const ALL: [NavCommand; 2] = [Self::ToggleLayoutNavigation, Self::ToggleHeaderNavigation];

    /// Default chord on `platform`.
    #[must_use]
    pub fn default_chord(self, platform: Platform) -> KeyChord {
        match self {
            Self::ToggleLayoutNavigation => KeyChord::command_shift(platform, 'p'),
            Self::ToggleHeaderNavigation => KeyChord::command_shift(platform, 'h'),
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ToggleLayoutNavigation => "Navigate panels",
            Self::ToggleHeaderNavigation => "Navigate header panels",
        }
    }
}

/// One registered shortcut.
pub struct Shortcut<A> {
    pub action: A,
    pub chord: KeyChord,
    pub description: String,
    is_enabled: EnabledPredicate,
}

impl<A> Shortcut<A> {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        (self.is_enabled)()
    }
}

impl<A: fmt::Debug> fmt::Debug for Shortcut<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shortcut")
            .field("action", &self.action)
            .field("chord", &self.chord)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Ordered list of shortcuts; the first enabled match wins.
pub struct ShortcutRegistry<A> {
    shortcuts: Vec<Shortcut<A>>,
    gate: EnabledPredicate,
}

impl<A: Copy + PartialEq + fmt::Debug> ShortcutRegistry<A> {
    /// Registry whose default predicate is `gate`.
    #[must_use]
    pub fn new(gate: EnabledPredicate) -> Self {
        Self {
            shortcuts: Vec::new(),
            gate,
        }
    }

    /// The registry-wide predicate.
    #[must_use]
    pub fn gate_open(&self) -> bool {
        (self.gate)()
    }

    /// Register under the global gate.
    pub fn register(&mut self, action: A, chord: KeyChord, description: impl Into<String>) {
        let gate = Rc::clone(&self.gate);
        self.register_with(action, chord, description, gate);
    }

    /// Register with a custom predicate.
    pub fn register_with(
        &mut self,
        action: A,
        chord: KeyChord,
        description: impl Into<String>,
        is_enabled: EnabledPredicate,
    ) {
        if let Some(existing) = self.shortcuts.iter().find(|s| s.chord == chord) {
            tracing::warn!(
                message = "nav.shortcut_shadowed",
                chord = %chord,
                existing = ?existing.action,
                action = ?action
            );
        }
        self.shortcuts.push(Shortcut {
            action,
            chord,
            description: description.into(),
            is_enabled,
        });
    }

    /// Remove every shortcut bound to `action`. Returns how many were removed.
    pub fn unregister(&mut self, action: A) -> usize {
        let before = self.shortcuts.len();
        self.shortcuts.retain(|s| s.action != action);
        before - self.shortcuts.len()
    }

    /// Action for `event`, if a matching shortcut is enabled.
    #[must_use]
    pub fn resolve(&self, event: &KeyEvent) -> Option<A> {
        self.shortcuts
            .iter()
            .find(|s| s.chord.matches(event) && s.is_enabled())
            .map(|s| s.action)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Shortcut<A>> {
        self.shortcuts.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shortcuts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shortcuts.is_empty()
    }
}
