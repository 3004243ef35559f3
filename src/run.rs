//! Run-bundle construction: a command, a set of input targets, and
//! requested metadata become a validated, dependency-linked execution unit.
//!
//! The builder is strict where the interpreter is lenient: any validation
//! failure aborts construction and no partially-built bundle ever escapes.
//! The result is handed to the execution engine in [`BundleState::Created`];
//! this module never transitions state further.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::model::{BundleState, Dependency, RunBundle, Target};
use crate::schema::{self, SchemaError};

/// One requested input: where to mount it (`key`) and what to mount
/// (a bundle spec plus a path into its tree).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTarget {
    /// Mount point inside the run. Empty means "the whole bundle maps to
    /// one single input" — allowed for at most one target, and only when
    /// it is the only one.
    pub key: String,

    pub target: Target,
}

impl RunTarget {
    pub fn new(key: impl Into<String>, bundle: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            target: Target::new(bundle, path),
        }
    }
}

/// Why construction was rejected.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("must specify keys when packaging multiple targets")]
    MissingTargetKeys,

    #[error("duplicate target key: {0:?}")]
    DuplicateTargetKey(String),

    #[error("a run bundle requires a non-empty command")]
    EmptyCommand,

    /// Metadata failed schema validation; the field-level errors are inside.
    #[error(transparent)]
    InvalidMetadata(#[from] SchemaError),
}

/// Build a run bundle from targets, a command, and proposed metadata.
///
/// Dependencies are built in one pass over `targets`, preserving input
/// order. Metadata is validated against the run schema (so generated and
/// unknown fields reject), filled out for every non-generated field, and
/// the generated execution-result fields are initialized to their type
/// defaults.
pub fn construct(
    targets: &[RunTarget],
    command: &str,
    metadata: &serde_json::Map<String, serde_json::Value>,
    owner_id: &str,
) -> Result<RunBundle, UsageError> {
    if command.trim().is_empty() {
        return Err(UsageError::EmptyCommand);
    }
    if targets.len() > 1 && targets.iter().any(|t| t.key.is_empty()) {
        return Err(UsageError::MissingTargetKeys);
    }

    let mut seen = BTreeSet::new();
    let mut dependencies = Vec::with_capacity(targets.len());
    for target in targets {
        if !seen.insert(target.key.as_str()) {
            return Err(UsageError::DuplicateTargetKey(target.key.clone()));
        }
        dependencies.push(Dependency {
            child_path: target.key.clone(),
            parent_uuid: target.target.bundle.clone(),
            parent_path: target.target.path.clone(),
        });
    }

    let specs = schema::run_specs();
    let accepted = schema::validate(&specs, metadata)?;
    let mut filled = schema::fill_missing(&specs, &accepted, &BTreeMap::new());
    filled.extend(schema::generated_defaults(&specs));

    let uuid = Uuid::new_v4();
    debug!(%uuid, dependencies = dependencies.len(), "constructed run bundle");

    Ok(RunBundle {
        uuid,
        bundle_type: "run".to_string(),
        command: command.to_string(),
        dependencies,
        metadata: filled,
        owner_id: owner_id.to_string(),
        state: BundleState::Created,
        data_hash: None,
    })
}
