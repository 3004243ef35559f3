//! Core data model for Galley.
//!
//! Two families of types: what the parser produces from raw worksheet
//! markup (items, directives, display properties) and what the interpreter
//! and run-bundle builder hand back to callers (interpreted items, position
//! maps, bundle snapshots, run bundles).

mod bundle;
mod interpreted;
mod item;

use serde::{Deserialize, Serialize};

pub use bundle::{
    BundleInfo, BundleState, Dependency, RunBundle, Target, TargetInfo, TargetKind,
    WorksheetSummary,
};
pub use interpreted::{
    InterpretedItem, Mode, Payload, PositionMap, RecordField, Resolution, ResolvedRef, TableBlock,
    TableColumn,
};
pub use item::{Directive, DisplayMode, DisplayProperties, ItemKind, WorksheetItem};

/// A contiguous, half-open range of raw worksheet lines.
///
/// Spans partition the raw document: every raw line belongs to exactly one
/// item's span, with no gaps or overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSpan {
    /// First raw line of the span (0-based).
    pub start: usize,

    /// One past the last raw line of the span.
    pub end: usize,
}

impl RawSpan {
    /// A span covering lines `start..end`.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Whether the span contains the given raw line.
    pub fn contains(&self, line: usize) -> bool {
        self.start <= line && line < self.end
    }

    /// Number of raw lines covered.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span covers no lines.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}
