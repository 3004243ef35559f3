//! Parsed worksheet items: what one logical block of markup means.
//!
//! Items are produced by [`crate::parse`] in a single forward pass and are
//! immutable from then on. Each item records the raw lines it was parsed
//! from, so a worksheet can be persisted back without loss.

use serde::{Deserialize, Serialize};

use super::RawSpan;

/// One logical line or block of worksheet source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetItem {
    /// What the block means.
    pub kind: ItemKind,

    /// The raw lines this item was parsed from, covering `span` exactly.
    /// Includes property continuations and trailing blank break lines.
    pub raw: Vec<String>,

    /// Where the item sits in the raw document.
    pub span: RawSpan,
}

/// The meaning of a parsed block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ItemKind {
    /// Free text, rendered as markdown. Blank lines break consecutive
    /// blocks; `lines` holds only the non-blank content lines.
    Text { lines: Vec<String> },

    /// A reference to a bundle: `{spec}`, `{spec}/sub/path`, `{spec}[key]`.
    BundleRef {
        /// The bundle spec as written: a UUID, a name, or `^`/`^N`.
        spec: String,

        /// Path into the bundle's file tree, when given after the spec.
        sub_path: Option<String>,

        /// Dependency key, when the reference is written `{spec}[key]`.
        key: Option<String>,

        /// Display properties from indented continuation lines.
        properties: DisplayProperties,
    },

    /// A `%` directive, consuming a single line.
    Directive { directive: Directive },

    /// A `#` section header.
    Section { title: String, level: u8 },
}

/// A one-line `%` directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "directive", rename_all = "camelCase")]
pub enum Directive {
    /// `% schema <name> <col,col,...>` — register a named column list for
    /// later table or record displays. Renders nothing itself.
    Schema { name: String, columns: Vec<String> },

    /// `% search <keywords...>` — search the bundle index.
    Search { keywords: Vec<String> },

    /// `% wsearch <keywords...>` — search worksheets.
    WorksheetSearch { keywords: Vec<String> },
}

/// How a bundle reference asks to be displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisplayMode {
    /// Project metadata columns of the target into a table.
    Table,

    /// Project metadata fields of the target as (field, value) pairs.
    Record,

    /// Head of the target file, rendered as preformatted text.
    Contents,

    /// Head of the target file, rendered as inline HTML.
    Html,
}

/// Display properties gathered from the indented continuation lines that
/// follow a reference line.
///
/// The block closes implicitly at the first non-indented line or at end of
/// input; an unterminated block is not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayProperties {
    /// `display: table|record|contents|html`. Absent means bundle-info.
    pub display: Option<DisplayMode>,

    /// `columns: a, b, c` — explicit columns for table/record display.
    pub columns: Vec<String>,

    /// `schema: <name>` — use a column list registered by `% schema`.
    pub schema: Option<String>,
}

impl DisplayProperties {
    /// Whether any property was actually declared.
    pub fn is_empty(&self) -> bool {
        self.display.is_none() && self.columns.is_empty() && self.schema.is_none()
    }
}
