//! Bundles: snapshots of existing bundles, targets into their file trees,
//! and the run bundle produced by the builder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::MetadataValue;

/// Lifecycle state of a bundle.
///
/// The builder only ever emits [`BundleState::Created`]; every later
/// transition belongs to the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BundleState {
    Created,
    Staged,
    Running,
    Ready,
    Failed,
    Killed,
}

impl BundleState {
    /// Whether the execution engine may move a bundle from `self` to `to`.
    ///
    /// Created → Staged → Running → {Ready, Failed}; Killed is reachable
    /// from Staged or Running.
    pub fn may_transition(self, to: Self) -> bool {
        use BundleState::{Created, Failed, Killed, Ready, Running, Staged};
        matches!(
            (self, to),
            (Created, Staged)
                | (Staged, Running | Killed)
                | (Running, Ready | Failed | Killed)
        )
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::Killed)
    }
}

/// A snapshot of an existing bundle, as returned by the collaborator.
///
/// Resolved fresh on every interpretation pass and never cached across
/// calls: worksheet content can change between calls and permissions are
/// caller-specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleInfo {
    pub uuid: Uuid,

    /// e.g. `"run"`, `"dataset"`, `"program"`.
    pub bundle_type: String,

    pub state: BundleState,

    /// Loosely-typed metadata as stored; the schema layer types it at the
    /// editing boundary, not here.
    pub metadata: BTreeMap<String, serde_json::Value>,

    pub owner_name: Option<String>,

    /// Permission string already formatted by the external permission layer.
    pub permission: Option<String>,

    pub data_hash: Option<String>,
}

/// A summary of a worksheet, as returned by worksheet search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetSummary {
    pub uuid: Uuid,
    pub name: String,
    pub title: Option<String>,
    pub owner_name: Option<String>,
}

/// A (bundle identity, sub-path) pair pointing into a bundle's file tree.
/// An empty path means the bundle root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub bundle: String,
    pub path: String,
}

impl Target {
    pub fn new(bundle: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bundle: bundle.into(),
            path: path.into(),
        }
    }
}

/// What kind of node a target points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetKind {
    File,
    Directory,
    Link,
}

/// A node in a bundle's file tree, as described by the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub name: String,
    pub kind: TargetKind,
    pub size: Option<u64>,

    /// Child nodes, populated to the depth the caller asked for.
    pub contents: Option<Vec<TargetInfo>>,
}

/// One dependency of a run bundle on a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    /// Where the target is mounted inside the run. Unique across the
    /// dependency list; the empty key means "the whole bundle maps to one
    /// single input".
    pub child_path: String,

    pub parent_uuid: String,
    pub parent_path: String,
}

/// A bundle whose content will be produced by executing a command against
/// resolved input targets.
///
/// Built once by [`crate::run::construct`] and handed to the execution
/// engine; this crate never mutates one after returning it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunBundle {
    pub uuid: Uuid,

    /// Always `"run"`.
    pub bundle_type: String,

    /// The command to execute. Non-empty.
    pub command: String,

    /// Dependencies in input order, child paths unique.
    pub dependencies: Vec<Dependency>,

    /// Validated metadata: every non-generated field present, generated
    /// fields initialized to their type defaults.
    pub metadata: BTreeMap<String, MetadataValue>,

    pub owner_id: String,

    /// Always [`BundleState::Created`] when emitted by the builder.
    pub state: BundleState,

    /// `None` until the bundle store materializes content.
    pub data_hash: Option<String>,
}
