#![forbid(unsafe_code)]

//! Unified error model and recovery classification.
//!
//! Each subsystem keeps its own typed error. [`Error`] wraps them so a host
//! can propagate with `?` and then ask [`Error::recovery`] what to do:
//!
//! | Failure | Recovery |
//! |---------|----------|
//! | duplicate mount, inconsistent workspace | [`Recovery::Fatal`] |
//! | panel type unavailable, construction failed | [`Recovery::Placeholder`] |
//! | malformed server message, rejected stored layout | [`Recovery::Drop`] |
//! | storage failure | [`Recovery::Ephemeral`] |
//! | navigation or slot request that cannot apply | [`Recovery::NoOp`] |

use std::fmt;

use paneldeck_core::storage::StorageError;
use paneldeck_host::{HostError, PanelError};
use paneldeck_layout::LayoutValidationError;
use paneldeck_slots::SlotRefusal;
use paneldeck_workspace::WorkspaceError;

use crate::config::ConfigError;

/// Top-level error type for paneldeck hosts.
#[derive(Debug)]
pub enum Error {
    Storage(StorageError),
    Host(HostError),
    Panel(PanelError),
    Workspace(WorkspaceError),
    /// A stored layout document was unusable.
    StoredLayout(LayoutValidationError),
    Slot(SlotRefusal),
    /// An inbound server message could not be parsed.
    Protocol { detail: String },
    Config(ConfigError),
}

/// Standard result type for paneldeck APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// What the host should do with an error instead of crashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Internal bug; surface it.
    Fatal,
    /// Mount a placeholder panel in place of the failed one.
    Placeholder,
    /// Discard the offending input and continue.
    Drop,
    /// Keep going with in-memory state for this session.
    Ephemeral,
    /// Leave state unchanged.
    NoOp,
}

impl Error {
    /// Recovery action for this error.
    #[must_use]
    pub fn recovery(&self) -> Recovery {
        match self {
            Self::Storage(_) => Recovery::Ephemeral,
            Self::Host(err) => host_recovery(err),
            Self::Panel(_) => Recovery::Placeholder,
            Self::Workspace(err) => match err {
                WorkspaceError::Unavailable { .. } => Recovery::Placeholder,
                WorkspaceError::Host(err) => host_recovery(err),
                WorkspaceError::NotMounted { .. } | WorkspaceError::Inconsistent(_) => {
                    Recovery::Fatal
                }
                WorkspaceError::UnknownPanel { .. }
                | WorkspaceError::NotInTree { .. }
                | WorkspaceError::Layout(_) => Recovery::NoOp,
            },
            Self::StoredLayout(_) | Self::Protocol { .. } => Recovery::Drop,
            Self::Slot(_) => Recovery::NoOp,
            Self::Config(_) => Recovery::Fatal,
        }
    }

    /// Error type label for tracing fields.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Storage(_) => "storage",
            Self::Host(_) => "host",
            Self::Panel(_) => "panel",
            Self::Workspace(_) => "workspace",
            Self::StoredLayout(_) => "stored_layout",
            Self::Slot(_) => "slot",
            Self::Protocol { .. } => "protocol",
            Self::Config(_) => "config",
        }
    }

    /// Whether the host can carry on after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.recovery() != Recovery::Fatal
    }
}

fn host_recovery(err: &HostError) -> Recovery {
    match err {
        HostError::AlreadyMounted { .. } => Recovery::Fatal,
        HostError::UnknownPanel { .. } => Recovery::NoOp,
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::Host(err) => write!(f, "{err}"),
            Self::Panel(err) => write!(f, "{err}"),
            Self::Workspace(err) => write!(f, "{err}"),
            Self::StoredLayout(err) => write!(f, "stored layout rejected: {err}"),
            Self::Slot(err) => write!(f, "window slot: {err}"),
            Self::Protocol { detail } => write!(f, "malformed server message: {detail}"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Host(err) => Some(err),
            Self::Panel(err) => Some(err),
            Self::Workspace(err) => Some(err),
            Self::StoredLayout(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Slot(_) | Self::Protocol { .. } => None,
        }
    }
}

impl fmt::Display for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::Placeholder => write!(f, "placeholder"),
            Self::Drop => write!(f, "drop"),
            Self::Ephemeral => write!(f, "ephemeral"),
            Self::NoOp => write!(f, "no_op"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<HostError> for Error {
    fn from(err: HostError) -> Self {
        Self::Host(err)
    }
}

impl From<PanelError> for Error {
    fn from(err: PanelError) -> Self {
        Self::Panel(err)
    }
}

impl From<WorkspaceError> for Error {
    fn from(err: WorkspaceError) -> Self {
        Self::Workspace(err)
    }
}

impl From<LayoutValidationError> for Error {
    fn from(err: LayoutValidationError) -> Self {
        Self::StoredLayout(err)
    }
}

impl From<SlotRefusal> for Error {
    fn from(err: SlotRefusal) -> Self {
        Self::Slot(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}
