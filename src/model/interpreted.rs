//! Interpreted items: the rendering-ready expansion of worksheet items,
//! plus the bidirectional position mapping back to the raw source.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::Formatting;

use super::{BundleInfo, RawSpan, WorksheetSummary};

/// How an interpreted item should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Markdown,
    Contents,
    Html,
    Table,
    BundleInfo,
    Search,
    Record,
}

/// One rendering-ready item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretedItem {
    /// How to render the payload.
    pub mode: Mode,

    /// What to render. `Payload::Error` when interpretation of this item
    /// degraded; the rest of the worksheet is unaffected.
    pub payload: Payload,

    /// The raw lines this item was derived from.
    pub span: RawSpan,
}

/// The payload of an interpreted item. Shape depends on the mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "payload", rename_all = "camelCase")]
pub enum Payload {
    /// Raw text, unchanged. Rendering markdown is the caller's job.
    Markdown { text: String },

    /// Decoded leading lines of a target file (contents/html modes).
    /// `None` means the target was missing; the renderer substitutes a
    /// placeholder, not this crate.
    Lines { lines: Option<Vec<String>> },

    /// A metadata projection: fixed columns, one row per bundle.
    Table(TableBlock),

    /// Resolved (or explicitly unresolved) bundle references.
    BundleInfo { refs: Vec<ResolvedRef> },

    /// Bundle search results.
    Bundles { results: Vec<BundleInfo> },

    /// Worksheet search results.
    Worksheets { results: Vec<WorksheetSummary> },

    /// A single bundle's metadata as (field, value) pairs.
    Record { fields: Vec<RecordField> },

    /// This item failed to interpret; the message replaces the payload.
    Error { message: String },
}

/// A metadata table: column headers with formatting hints, and uniform rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableBlock {
    pub columns: Vec<TableColumn>,

    /// One map per bundle, keyed by column name. Every declared column is
    /// present in every row; missing fields hold the missing-value sentinel.
    pub rows: Vec<BTreeMap<String, serde_json::Value>>,
}

/// A table column header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn {
    pub name: String,

    /// Rendering hint for values in this column. Tagged here, applied by
    /// the renderer.
    pub formatting: Formatting,
}

/// One field of a record display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordField {
    pub name: String,
    pub value: serde_json::Value,
    pub formatting: Formatting,
}

/// A bundle reference together with its resolution outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRef {
    /// The spec exactly as written in the worksheet. Kept so an unresolved
    /// reference is never silently dropped.
    pub spec: String,

    /// Path into the bundle's file tree, when the reference carried one.
    pub sub_path: Option<String>,

    /// What resolution produced.
    pub resolution: Resolution,
}

/// The outcome of resolving one bundle spec.
///
/// Resolution failure is a value, not an error: one bad reference must never
/// block rendering of the rest of the worksheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Resolution {
    /// The spec resolved to a bundle; `info` is a fresh snapshot.
    ///
    /// Boxed to keep variant sizes balanced.
    Resolved { uuid: Uuid, info: Box<BundleInfo> },

    /// The spec could not be resolved (unknown, denied, transport failure).
    Unresolved { reason: String },
}

/// Bidirectional mapping between raw lines and interpreted item positions.
///
/// The two maps are exact inverses restricted to non-null entries: for any
/// raw line with `raw_to_interpreted[line] == Some(idx)`, the span
/// `interpreted_to_raw[idx]` contains `line`. Lines with no rendered
/// counterpart (blank break lines, schema-directive preamble) map to `None`
/// but still belong to exactly one span.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionMap {
    /// Raw line index → interpreted item index, or `None` when the line has
    /// no rendered counterpart.
    pub raw_to_interpreted: Vec<Option<usize>>,

    /// Interpreted item index → raw line span.
    pub interpreted_to_raw: Vec<RawSpan>,
}

impl PositionMap {
    /// The interpreted item covering the given raw line, if it has one.
    pub fn item_at_line(&self, line: usize) -> Option<usize> {
        self.raw_to_interpreted.get(line).copied().flatten()
    }

    /// The raw span an interpreted item was derived from.
    pub fn span_of(&self, item: usize) -> Option<RawSpan> {
        self.interpreted_to_raw.get(item).copied()
    }
}
