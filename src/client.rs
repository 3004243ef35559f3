//! The collaborator boundary: everything this crate needs from the bundle
//! service but does not implement.
//!
//! Transport, auth, persistence, and the bundle store all live behind
//! [`BundleClient`]. The interpreter treats any error from these calls the
//! same way it treats a failed resolution: the affected item degrades and
//! the rest of the worksheet renders.

use thiserror::Error;
use uuid::Uuid;

use crate::model::{BundleInfo, Target, TargetInfo, WorksheetItem, WorksheetSummary};

/// Failure reported by a collaborator call.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Timeouts and connection failures. Timeouts are enforced by the
    /// collaborator, not here.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// The bundle-service operations this crate consumes.
///
/// Calls may block; the interpreter makes them one item at a time. `spec`
/// arguments accept a UUID literal or a bare name resolved in the caller's
/// namespace — positional specs (`^N`) are resolved before reaching the
/// client.
pub trait BundleClient {
    /// A fresh snapshot of a bundle, or `None` when the spec names nothing.
    fn get_bundle_info(&self, spec: &str) -> Result<Option<BundleInfo>, ClientError>;

    /// Search the bundle index.
    fn search_bundles(&self, keywords: &[String]) -> Result<Vec<BundleInfo>, ClientError>;

    /// Search worksheets.
    fn search_worksheets(&self, keywords: &[String]) -> Result<Vec<WorksheetSummary>, ClientError>;

    /// Bounded read of a file's leading lines, still transport-encoded as
    /// raw bytes. `None` when the target does not exist.
    fn head_target(
        &self,
        target: &Target,
        max_lines: usize,
    ) -> Result<Option<Vec<Vec<u8>>>, ClientError>;

    /// Describe a node of a bundle's file tree, to the given depth.
    fn get_target_info(
        &self,
        target: &Target,
        depth: usize,
    ) -> Result<Option<TargetInfo>, ClientError>;

    /// Replace a worksheet's stored raw items.
    fn persist_worksheet_items(
        &self,
        worksheet_uuid: Uuid,
        items: &[WorksheetItem],
    ) -> Result<(), ClientError>;

    /// Display name for an owner id.
    fn resolve_owner_name(&self, owner_id: &str) -> Result<Option<String>, ClientError>;
}
