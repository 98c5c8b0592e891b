#![forbid(unsafe_code)]

//! paneldeck public facade crate.
//!
//! Re-exports the controller crates and adds the pieces that span them: the
//! unified [`Error`] with its [`Recovery`] classification, the layered
//! [`WorkbenchConfig`], and the [`Workbench`] that wires a window's slot
//! lease, workspace, navigation and server message handling together.

pub mod config;
pub mod error;
pub mod workbench;

pub use config::{ConfigError, WorkbenchConfig};
pub use error::{Error, Recovery, Result};
pub use workbench::{Environment, Workbench};

pub use paneldeck_core as core;
pub use paneldeck_host as host;
pub use paneldeck_layout as layout;
pub use paneldeck_nav as nav;
pub use paneldeck_slots as slots;
pub use paneldeck_workspace as workspace;

/// Common imports for embedding hosts.
pub mod prelude {
    pub use crate::{Environment, Error, Recovery, Result, Workbench, WorkbenchConfig};
    pub use paneldeck_core::{
        Clock, GeometrySource, KeyCode, KeyEvent, KeyValueStore, ManualClock, MemoryStore,
        Modifiers, PanelBinding, PanelId, Platform, Rect, SafeStore, SystemClock,
    };
    pub use paneldeck_host::{
        OutboundMessage, OutboundSink, PanelEvent, PanelManifest, PanelModule, PanelRegistry,
        factory,
    };
    pub use paneldeck_nav::{
        DialogManager, FocusZone, KeyContext, NavEffect, NavMode, NavResponse, NoDialogs,
    };
    pub use paneldeck_slots::Heartbeat;
    pub use paneldeck_workspace::{OpenOptions, Region};
}
