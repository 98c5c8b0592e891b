#![forbid(unsafe_code)]

//! User preferences persisted one key per preference.
//!
//! Boolean preferences are stored as the strings `'true'` / `'false'`.
//! Anything else (missing key, garbage, storage failure) reads as the
//! preference's default.

use crate::storage::SafeStore;

/// Known preference keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceKey {
    AudioResponsesEnabled,
    KeyboardShortcutsEnabled,
    AutoFocusChat,
    AutoScroll,
    ShowContext,
    IncludePanelContext,
    BriefMode,
    ListInsertAtTop,
}

impl PreferenceKey {
    pub const ALL: [PreferenceKey; 8] = [
        Self::AudioResponsesEnabled,
        Self::KeyboardShortcutsEnabled,
        Self::AutoFocusChat,
        Self::AutoScroll,
        Self::ShowContext,
        Self::IncludePanelContext,
        Self::BriefMode,
        Self::ListInsertAtTop,
    ];

    /// Storage key.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::AudioResponsesEnabled => "audioResponsesEnabled",
            Self::KeyboardShortcutsEnabled => "keyboardShortcutsEnabled",
            Self::AutoFocusChat => "autoFocusChatInput",
            Self::AutoScroll => "autoScrollEnabled",
            Self::ShowContext => "showContext",
            Self::IncludePanelContext => "includePanelContext",
            Self::BriefMode => "briefMode",
            Self::ListInsertAtTop => "listInsertAtTop",
        }
    }

    /// Value used when nothing valid is stored.
    #[must_use]
    pub const fn default_value(self) -> bool {
        match self {
            Self::KeyboardShortcutsEnabled
            | Self::AutoFocusChat
            | Self::AutoScroll
            | Self::IncludePanelContext => true,
            Self::AudioResponsesEnabled
            | Self::ShowContext
            | Self::BriefMode
            | Self::ListInsertAtTop => false,
        }
    }
}

/// Typed accessor over the preference keys.
#[derive(Debug, Clone)]
pub struct Preferences {
    store: SafeStore,
}

impl Preferences {
    #[must_use]
    pub fn new(store: SafeStore) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn get_bool(&self, key: PreferenceKey) -> bool {
        match self.store.get(key.storage_key()).as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => key.default_value(),
        }
    }

    pub fn set_bool(&self, key: PreferenceKey, value: bool) {
        self.store
            .set(key.storage_key(), if value { "true" } else { "false" });
    }

    /// Free-form string preference stored under `key`.
    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.store.get(key)
    }

    pub fn set_string(&self, key: &str, value: &str) {
        self.store.set(key, value);
    }

    /// Shorthand for the global shortcut switch.
    #[must_use]
    pub fn keyboard_shortcuts_enabled(&self) -> bool {
        self.get_bool(PreferenceKey::KeyboardShortcutsEnabled)
    }
}
