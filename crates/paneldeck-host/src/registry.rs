#![forbid(unsafe_code)]

//! Panel registry: panel type tag → manifest + factory.
//!
//! The registry is an explicitly constructed object shared by the host and
//! the workspace; nothing registers panels through ambient globals.
//! Availability depends on the granted capability set and the loaded plugin
//! bundles, both of which can change at runtime.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::module::{EmptyPanel, PanelFactory, factory};

/// Panel type rendered by `close_panel_to_placeholder`.
pub const EMPTY_PANEL_TYPE: &str = "empty";

/// Shared registry handle.
pub type SharedRegistry = Rc<RefCell<PanelRegistry>>;

/// Whether a panel type follows one session or all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionScope {
    #[default]
    Session,
    Global,
}

/// Static description of a panel type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelManifest {
    pub panel_type: String,
    pub title: String,
    #[serde(default)]
    pub session_scope: SessionScope,
    #[serde(default)]
    pub default_session_binding: Option<SessionScope>,
    /// Capabilities the host must grant.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Plugin bundle providing the factory.
    #[serde(default)]
    pub plugin: Option<String>,
    #[serde(default = "default_true")]
    pub multi_instance: bool,
}

fn default_true() -> bool {
    true
}

impl PanelManifest {
    #[must_use]
    pub fn new(panel_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            panel_type: panel_type.into(),
            title: title.into(),
            session_scope: SessionScope::Session,
            default_session_binding: None,
            capabilities: Vec::new(),
            plugin: None,
            multi_instance: true,
        }
    }

    #[must_use]
    pub fn with_session_scope(mut self, scope: SessionScope) -> Self {
        self.session_scope = scope;
        self
    }

    #[must_use]
    pub fn with_default_binding(mut self, scope: SessionScope) -> Self {
        self.default_session_binding = Some(scope);
        self
    }

    #[must_use]
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    #[must_use]
    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    #[must_use]
    pub fn single_instance(mut self) -> Self {
        self.multi_instance = false;
        self
    }

    /// Whether a fresh panel of this type starts with a global binding.
    #[must_use]
    pub fn defaults_to_global(&self) -> bool {
        self.session_scope == SessionScope::Global
            || self.default_session_binding == Some(SessionScope::Global)
    }
}

/// Why a panel type can or cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    MissingManifest,
    MissingCapability(String),
    MissingPlugin(String),
}

impl Availability {
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::MissingManifest => write!(f, "no panel is registered for this type"),
            Self::MissingCapability(cap) => write!(f, "requires the \"{cap}\" capability"),
            Self::MissingPlugin(plugin) => write!(f, "plugin \"{plugin}\" is not loaded"),
        }
    }
}

struct Entry {
    manifest: PanelManifest,
    factory: Option<PanelFactory>,
}

/// Registry of panel types.
pub struct PanelRegistry {
    entries: BTreeMap<String, Entry>,
    capabilities: BTreeSet<String>,
    plugins: BTreeSet<String>,
}

impl fmt::Debug for PanelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelRegistry")
            .field("types", &self.entries.keys().collect::<Vec<_>>())
            .field("capabilities", &self.capabilities)
            .field("plugins", &self.plugins)
            .finish()
    }
}

impl Default for PanelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelRegistry {
    /// Registry holding only the built-in `empty` type.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            entries: BTreeMap::new(),
            capabilities: BTreeSet::new(),
            plugins: BTreeSet::new(),
        };
        registry.register(
            PanelManifest::new(EMPTY_PANEL_TYPE, "Empty"),
            factory(|_, _, _| Ok(Box::new(EmptyPanel))),
        );
        registry
    }

    /// Wrap in a shared handle.
    #[must_use]
    pub fn shared(self) -> SharedRegistry {
        Rc::new(RefCell::new(self))
    }

    /// Register (or replace) a panel type with its factory.
    pub fn register(&mut self, manifest: PanelManifest, factory: PanelFactory) {
        tracing::debug!(
            message = "registry.register",
            panel_type = %manifest.panel_type,
        );
        let _ = self.entries.insert(
            manifest.panel_type.clone(),
            Entry {
                manifest,
                factory: Some(factory),
            },
        );
    }

    /// Register a manifest whose factory arrives later with its plugin.
    pub fn register_manifest(&mut self, manifest: PanelManifest) {
        let key = manifest.panel_type.clone();
        let factory = self.entries.remove(&key).and_then(|e| e.factory);
        let _ = self.entries.insert(key, Entry { manifest, factory });
    }

    /// Attach a factory once a plugin bundle has loaded.
    pub fn load_plugin(&mut self, plugin: impl Into<String>, factories: Vec<(String, PanelFactory)>) {
        let plugin = plugin.into();
        for (panel_type, factory) in factories {
            if let Some(entry) = self.entries.get_mut(&panel_type) {
                entry.factory = Some(factory);
            }
        }
        tracing::debug!(message = "registry.plugin_loaded", plugin = %plugin);
        let _ = self.plugins.insert(plugin);
    }

    pub fn grant_capability(&mut self, capability: impl Into<String>) {
        let _ = self.capabilities.insert(capability.into());
    }

    pub fn revoke_capability(&mut self, capability: &str) {
        let _ = self.capabilities.remove(capability);
    }

    #[must_use]
    pub fn manifest(&self, panel_type: &str) -> Option<&PanelManifest> {
        self.entries.get(panel_type).map(|e| &e.manifest)
    }

    /// Registered manifests in type order.
    pub fn manifests(&self) -> impl Iterator<Item = &PanelManifest> {
        self.entries.values().map(|e| &e.manifest)
    }

    /// Availability of `panel_type` under the current capability/plugin set.
    #[must_use]
    pub fn availability(&self, panel_type: &str) -> Availability {
        let Some(entry) = self.entries.get(panel_type) else {
            return Availability::MissingManifest;
        };
        if let Some(missing) = entry
            .manifest
            .capabilities
            .iter()
            .find(|cap| !self.capabilities.contains(*cap))
        {
            return Availability::MissingCapability(missing.clone());
        }
        match (&entry.manifest.plugin, &entry.factory) {
            (Some(plugin), _) if !self.plugins.contains(plugin) => {
                Availability::MissingPlugin(plugin.clone())
            }
            (Some(plugin), None) => Availability::MissingPlugin(plugin.clone()),
            (None, None) => Availability::MissingManifest,
            _ => Availability::Available,
        }
    }

    #[must_use]
    pub fn is_available(&self, panel_type: &str) -> bool {
        self.availability(panel_type).is_available()
    }

    /// Factory for `panel_type`, if available.
    #[must_use]
    pub fn factory(&self, panel_type: &str) -> Option<PanelFactory> {
        if !self.is_available(panel_type) {
            return None;
        }
        self.entries.get(panel_type).and_then(|e| e.factory.clone())
    }
}
