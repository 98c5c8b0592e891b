#![forbid(unsafe_code)]

//! Persisted layout document with schema versioning.
//!
//! A [`LayoutSnapshot`] carries the split tree, the header dock, the modal
//! slot and one [`PanelRecord`] per panel instance.
//!
//! # Invariants
//!
//! - Every panel record is contained in exactly one of {tree, header dock,
//!   modal}.
//! - Every panel id referenced by the tree, header dock or modal has a
//!   record.
//!
//! # Schema versioning
//!
//! Additive fields go into `extensions` without a version bump. Anything else
//! bumps [`LAYOUT_SCHEMA_VERSION`]; decoders reject unknown versions so the
//! caller can fall back to a default layout.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use paneldeck_core::binding::PanelBinding;
use paneldeck_core::ids::PanelId;
use serde::{Deserialize, Serialize};

use crate::tree::{LayoutError, LayoutTree, LayoutTreeSnapshot};

/// Current layout document schema version.
pub const LAYOUT_SCHEMA_VERSION: u16 = 1;

/// Where a panel lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Containment {
    Tree,
    Header,
    Modal,
}

/// Persisted panel instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRecord {
    pub panel_id: PanelId,
    pub panel_type: String,
    #[serde(default)]
    pub binding: Option<PanelBinding>,
    #[serde(default)]
    pub state: serde_json::Value,
}

impl PanelRecord {
    #[must_use]
    pub fn new(panel_id: PanelId, panel_type: impl Into<String>) -> Self {
        Self {
            panel_id,
            panel_type: panel_type.into(),
            binding: None,
            state: serde_json::Value::Null,
        }
    }
}

/// Persisted layout document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    #[serde(default = "default_layout_version")]
    pub schema_version: u16,
    pub tree: LayoutTreeSnapshot,
    /// Header-docked panels in display order.
    #[serde(default)]
    pub header: Vec<PanelId>,
    #[serde(default)]
    pub modal: Option<PanelId>,
    #[serde(default)]
    pub panels: Vec<PanelRecord>,
    #[serde(default)]
    pub active_panel_id: Option<PanelId>,
    /// Sequence used to allocate the next panel id.
    #[serde(default)]
    pub next_panel_seq: u64,
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
}

fn default_layout_version() -> u16 {
    LAYOUT_SCHEMA_VERSION
}

impl LayoutSnapshot {
    /// Snapshot of a tree with no header, modal or records.
    #[must_use]
    pub fn new(tree: &LayoutTree) -> Self {
        Self {
            schema_version: LAYOUT_SCHEMA_VERSION,
            tree: tree.to_snapshot(),
            header: Vec::new(),
            modal: None,
            panels: Vec::new(),
            active_panel_id: None,
            next_panel_seq: 0,
            extensions: BTreeMap::new(),
        }
    }

    /// Decode and validate a stored document.
    pub fn decode(raw: &str) -> Result<(Self, LayoutTree), LayoutValidationError> {
        let snapshot: Self = serde_json::from_str(raw).map_err(|err| {
            LayoutValidationError::Malformed {
                reason: err.to_string(),
            }
        })?;
        let tree = snapshot.validate()?;
        Ok((snapshot, tree))
    }

    /// Encode as JSON.
    pub fn encode(&self) -> Result<String, LayoutValidationError> {
        serde_json::to_string(self).map_err(|err| LayoutValidationError::Malformed {
            reason: err.to_string(),
        })
    }

    /// Validate schema and containment; returns the rebuilt tree.
    pub fn validate(&self) -> Result<LayoutTree, LayoutValidationError> {
        if self.schema_version != LAYOUT_SCHEMA_VERSION {
            return Err(LayoutValidationError::UnsupportedVersion {
                found: self.schema_version,
                expected: LAYOUT_SCHEMA_VERSION,
            });
        }
        let tree = LayoutTree::from_snapshot(self.tree.clone())?;

        let mut records = BTreeSet::new();
        for record in &self.panels {
            if !records.insert(&record.panel_id) {
                return Err(LayoutValidationError::DuplicateRecord {
                    panel_id: record.panel_id.clone(),
                });
            }
        }

        let mut placed: BTreeMap<&PanelId, Containment> = BTreeMap::new();
        let tree_ids = tree.panel_ids();
        let contained = tree_ids
            .iter()
            .map(|id| (id, Containment::Tree))
            .chain(self.header.iter().map(|id| (id, Containment::Header)))
            .chain(self.modal.iter().map(|id| (id, Containment::Modal)));
        for (panel_id, containment) in contained {
            if let Some(previous) = placed.insert(panel_id, containment) {
                return Err(LayoutValidationError::MultiplyContained {
                    panel_id: panel_id.clone(),
                    first: previous,
                    second: containment,
                });
            }
            if !records.contains(panel_id) {
                return Err(LayoutValidationError::MissingRecord {
                    panel_id: panel_id.clone(),
                });
            }
        }

        if let Some(orphan) = records.iter().find(|id| !placed.contains_key(*id)) {
            return Err(LayoutValidationError::Uncontained {
                panel_id: (*orphan).clone(),
            });
        }

        if let Some(active) = &self.active_panel_id
            && !placed.contains_key(active)
        {
            return Err(LayoutValidationError::ActivePanelNotFound {
                panel_id: active.clone(),
            });
        }

        Ok(tree)
    }

    /// Record for `panel_id`.
    #[must_use]
    pub fn record(&self, panel_id: &PanelId) -> Option<&PanelRecord> {
        self.panels.iter().find(|r| &r.panel_id == panel_id)
    }
}

// =========================================================================
// Validation errors
// =========================================================================

/// Errors from decoding or validating a layout document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutValidationError {
    /// Not valid JSON for this schema.
    Malformed { reason: String },
    UnsupportedVersion { found: u16, expected: u16 },
    /// The split tree failed structural validation.
    Tree(LayoutError),
    DuplicateRecord { panel_id: PanelId },
    /// A container references a panel with no record.
    MissingRecord { panel_id: PanelId },
    /// A record is not referenced by any container.
    Uncontained { panel_id: PanelId },
    MultiplyContained {
        panel_id: PanelId,
        first: Containment,
        second: Containment,
    },
    ActivePanelNotFound { panel_id: PanelId },
}

impl fmt::Display for LayoutValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { reason } => write!(f, "malformed layout document: {reason}"),
            Self::UnsupportedVersion { found, expected } => write!(
                f,
                "unsupported layout schema version {found} (expected {expected})"
            ),
            Self::Tree(err) => write!(f, "layout tree invalid: {err}"),
            Self::DuplicateRecord { panel_id } => {
                write!(f, "panel {panel_id} has more than one record")
            }
            Self::MissingRecord { panel_id } => write!(f, "panel {panel_id} has no record"),
            Self::Uncontained { panel_id } => {
                write!(f, "panel {panel_id} is not in the tree, header or modal")
            }
            Self::MultiplyContained {
                panel_id,
                first,
                second,
            } => write!(
                f,
                "panel {panel_id} is contained twice ({first:?} and {second:?})"
            ),
            Self::ActivePanelNotFound { panel_id } => {
                write!(f, "active panel {panel_id} is not placed")
            }
        }
    }
}

impl std::error::Error for LayoutValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tree(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LayoutError> for LayoutValidationError {
    fn from(err: LayoutError) -> Self {
        Self::Tree(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use crate::tree::LayoutOperation;

    fn p(id: &str) -> PanelId {
        PanelId::from(id)
    }

    fn sample() -> LayoutSnapshot {
        let mut tree = LayoutTree::singleton(p("chat-1"));
        tree.apply(LayoutOperation::Insert {
            target: Some(p("chat-1")),
            panel: p("notes-2"),
            attach: Region::Right.attach(),
        })
        .unwrap();
        let mut snapshot = LayoutSnapshot::new(&tree);
        snapshot.header = vec![p("lists-3")];
        snapshot.panels = vec![
            PanelRecord::new(p("chat-1"), "chat"),
            PanelRecord::new(p("notes-2"), "notes"),
            PanelRecord::new(p("lists-3"), "lists"),
        ];
        snapshot.active_panel_id = Some(p("chat-1"));
        snapshot.next_panel_seq = 4;
        snapshot
    }

    #[test]
    fn valid_document_round_trips() {
        let snapshot = sample();
        let raw = snapshot.encode().unwrap();
        let (decoded, tree) = LayoutSnapshot::decode(&raw).unwrap();
        assert_eq!(decoded, snapshot);
        assert_eq!(tree.panel_ids(), vec![p("chat-1"), p("notes-2")]);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut snapshot = sample();
        snapshot.schema_version = 7;
        assert!(matches!(
            snapshot.validate(),
            Err(LayoutValidationError::UnsupportedVersion { found: 7, .. })
        ));
    }

    #[test]
    fn panel_in_tree_and_header_is_rejected() {
        let mut snapshot = sample();
        snapshot.header.push(p("chat-1"));
        assert!(matches!(
            snapshot.validate(),
            Err(LayoutValidationError::MultiplyContained { .. })
        ));
    }

    #[test]
    fn record_without_container_is_rejected() {
        let mut snapshot = sample();
        snapshot.panels.push(PanelRecord::new(p("ghost-9"), "notes"));
        assert_eq!(
            snapshot.validate().unwrap_err(),
            LayoutValidationError::Uncontained {
                panel_id: p("ghost-9")
            }
        );
    }

    #[test]
    fn container_without_record_is_rejected() {
        let mut snapshot = sample();
        snapshot.modal = Some(p("modal-5"));
        assert_eq!(
            snapshot.validate().unwrap_err(),
            LayoutValidationError::MissingRecord {
                panel_id: p("modal-5")
            }
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            LayoutSnapshot::decode("{not json"),
            Err(LayoutValidationError::Malformed { .. })
        ));
    }
}
