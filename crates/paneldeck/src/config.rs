#![forbid(unsafe_code)]

//! Workbench configuration.
//!
//! Load order: [`WorkbenchConfig::default`], then a JSON document
//! ([`WorkbenchConfig::from_json`]), then `PANELDECK_*` environment
//! overrides ([`WorkbenchConfig::with_env`]), then
//! [`WorkbenchConfig::validated`].
//!
//! # Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `PANELDECK_PLATFORM` | `platform` (`mac` / `other`) |
//! | `PANELDECK_SLOT_TTL_MS` | `slot_ttl_ms` |
//! | `PANELDECK_HEARTBEAT_MS` | `heartbeat_interval_ms` |
//! | `PANELDECK_SINGLE_INSTANCE` | `single_instance` (`1` / `true`) |
//! | `PANELDECK_DEFAULT_PANELS` | `workspace.default_panel_types` (comma list) |
//! | `PANELDECK_FOCUS_HISTORY_DEPTH` | `workspace.focus_history_depth` |

use std::fmt;

use paneldeck_core::event::Platform;
use paneldeck_slots::{
    DEFAULT_HEARTBEAT_INTERVAL_MS, DEFAULT_SLOT_TTL_MS, SlotConfig, SlotKeys,
};
use paneldeck_workspace::WorkspaceConfig;
use serde::{Deserialize, Serialize};

/// Smallest accepted heartbeat period.
pub const MIN_HEARTBEAT_INTERVAL_MS: u64 = 1_000;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PANELDECK_";

/// A configuration document could not be read.
#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid workbench config: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
        }
    }
}

/// Settings for a [`crate::Workbench`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkbenchConfig {
    /// Selects Cmd (mac) or Ctrl chords.
    pub platform: Platform,
    pub slot_ttl_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Packaged single-window runtime.
    pub single_instance: bool,
    pub slot_keys: SlotKeys,
    pub workspace: WorkspaceConfig,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            slot_ttl_ms: DEFAULT_SLOT_TTL_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            single_instance: false,
            slot_keys: SlotKeys::default(),
            workspace: WorkspaceConfig::default(),
        }
    }
}

impl WorkbenchConfig {
    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(ConfigError::Json)
    }

    /// Defaults with process environment overrides, validated.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default()
            .with_env(|name| std::env::var(name).ok())
            .validated()
    }

    /// Apply `PANELDECK_*` overrides read through `lookup`. Unparsable
    /// values are ignored.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

        if let Some(val) = var("PLATFORM") {
            match val.trim().to_ascii_lowercase().as_str() {
                "mac" => self.platform = Platform::Mac,
                "other" => self.platform = Platform::Other,
                other => tracing::warn!(message = "config.bad_platform", value = other),
            }
        }
        if let Some(val) = var("SLOT_TTL_MS")
            && let Ok(ms) = val.trim().parse::<u64>()
        {
            self.slot_ttl_ms = ms;
        }
        if let Some(val) = var("HEARTBEAT_MS")
            && let Ok(ms) = val.trim().parse::<u64>()
        {
            self.heartbeat_interval_ms = ms;
        }
        if let Some(val) = var("SINGLE_INSTANCE") {
            self.single_instance = val == "1" || val.eq_ignore_ascii_case("true");
        }
        if let Some(val) = var("DEFAULT_PANELS") {
            self.workspace.default_panel_types = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(val) = var("FOCUS_HISTORY_DEPTH")
            && let Ok(depth) = val.trim().parse::<usize>()
        {
            self.workspace.focus_history_depth = depth;
        }
        self
    }

    /// Clamp to safe values:
    /// - heartbeat at least [`MIN_HEARTBEAT_INTERVAL_MS`]
    /// - TTL at least twice the heartbeat
    /// - focus history depth at least 1
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.heartbeat_interval_ms = self.heartbeat_interval_ms.max(MIN_HEARTBEAT_INTERVAL_MS);
        self.slot_ttl_ms = self
            .slot_ttl_ms
            .max(self.heartbeat_interval_ms.saturating_mul(2));
        self.workspace.focus_history_depth = self.workspace.focus_history_depth.max(1);
        self
    }

    /// Whether [`Self::validated`] would leave this config unchanged.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.heartbeat_interval_ms >= MIN_HEARTBEAT_INTERVAL_MS
            && self.slot_ttl_ms >= self.heartbeat_interval_ms.saturating_mul(2)
            && self.workspace.focus_history_depth >= 1
    }

    /// Slot manager settings. Every workspace key is registered as per-slot
    /// state so slot removal and legacy migration cover it.
    #[must_use]
    pub fn slot_config(&self) -> SlotConfig {
        let keys = &self.workspace.keys;
        SlotConfig {
            ttl_ms: self.slot_ttl_ms,
            heartbeat_interval_ms: self.heartbeat_interval_ms,
            single_instance: self.single_instance,
            keys: self
                .slot_keys
                .clone()
                .with_scoped(keys.layout.clone())
                .with_scoped(keys.layout_version.clone())
                .with_scoped(keys.focus_history.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = WorkbenchConfig::default();
        assert!(config.is_valid());
        assert_eq!(config.slot_ttl_ms, 15_000);
        assert_eq!(config.heartbeat_interval_ms, 5_000);
    }

    #[test]
    fn json_fills_missing_fields() {
        let config =
            WorkbenchConfig::from_json(r#"{"platform":"mac","workspace":{"defaultPanelTypes":["chat"]}}"#)
                .unwrap();
        assert_eq!(config.platform, Platform::Mac);
        assert_eq!(config.workspace.default_panel_types, vec!["chat".to_string()]);
        assert_eq!(config.slot_ttl_ms, DEFAULT_SLOT_TTL_MS);
        assert!(WorkbenchConfig::from_json("{").is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let config = WorkbenchConfig::default().with_env(env(&[
            ("PANELDECK_PLATFORM", "MAC"),
            ("PANELDECK_HEARTBEAT_MS", "2000"),
            ("PANELDECK_SLOT_TTL_MS", "not a number"),
            ("PANELDECK_SINGLE_INSTANCE", "true"),
            ("PANELDECK_DEFAULT_PANELS", "sessions, chat,,notes"),
        ]));
        assert_eq!(config.platform, Platform::Mac);
        assert_eq!(config.heartbeat_interval_ms, 2_000);
        assert_eq!(config.slot_ttl_ms, DEFAULT_SLOT_TTL_MS);
        assert!(config.single_instance);
        assert_eq!(
            config.workspace.default_panel_types,
            vec!["sessions".to_string(), "chat".to_string(), "notes".to_string()]
        );
    }

    #[test]
    fn validated_clamps() {
        let config = WorkbenchConfig {
            slot_ttl_ms: 100,
            heartbeat_interval_ms: 10,
            ..WorkbenchConfig::default()
        }
        .validated();
        assert_eq!(config.heartbeat_interval_ms, MIN_HEARTBEAT_INTERVAL_MS);
        assert_eq!(config.slot_ttl_ms, 2 * MIN_HEARTBEAT_INTERVAL_MS);
    }

    #[test]
    fn slot_config_scopes_workspace_keys() {
        let slot = WorkbenchConfig::default().slot_config();
        for key in ["paneldeck.layout", "paneldeck.layoutVersion", "paneldeck.focusHistory"] {
            assert_eq!(slot.keys.scoped.iter().filter(|k| *k == key).count(), 1);
        }
    }

    proptest! {
        #[test]
        fn validated_is_always_valid(ttl in any::<u64>(), heartbeat in any::<u64>(), depth in 0usize..64) {
            let mut config = WorkbenchConfig {
                slot_ttl_ms: ttl,
                heartbeat_interval_ms: heartbeat,
                ..WorkbenchConfig::default()
            };
            config.workspace.focus_history_depth = depth;
            let config = config.validated();
            prop_assert!(config.is_valid());
            prop_assert_eq!(config.clone().validated(), config);
        }
    }
}
