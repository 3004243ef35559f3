//! Item interpretation: expand parsed worksheet items into rendering-ready
//! interpreted items, building the bidirectional position mapping as it
//! goes.
//!
//! Interpretation is total: a failed resolution, a bad display declaration,
//! or a collaborator error degrades the one affected item into
//! [`Payload::Error`] and the pass continues. The position-map invariants
//! hold for every input:
//!
//! - interpreted spans are contiguous, non-overlapping, and cover the raw
//!   document exactly;
//! - `raw_to_interpreted` and `interpreted_to_raw` are exact inverses
//!   restricted to non-null entries.
//!
//! Raw lines with no rendered counterpart (blank break lines, `% schema`
//! directive lines) map to `None` but still belong to exactly one span:
//! schema directives emit nothing and their lines fold as preamble into the
//! next emitted item's span.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::BundleClient;
use crate::format;
use crate::model::{
    BundleInfo, Directive, DisplayMode, DisplayProperties, InterpretedItem, ItemKind, Mode,
    Payload, PositionMap, RawSpan, RecordField, Resolution, ResolvedRef, TableBlock, TableColumn,
    Target, WorksheetItem,
};
use crate::resolve;
use crate::schema::{self, MetadataSpec};

/// Interpretation settings.
#[derive(Debug, Clone)]
pub struct InterpretConfig {
    /// Maximum number of leading lines fetched for contents/html displays.
    pub max_head_lines: usize,

    /// Columns used for table/record displays that declare none.
    pub default_columns: Vec<String>,
}

impl Default for InterpretConfig {
    fn default() -> Self {
        Self {
            max_head_lines: 100,
            default_columns: vec![
                "name".to_string(),
                "uuid".to_string(),
                "state".to_string(),
            ],
        }
    }
}

/// The result of one interpretation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpretation {
    pub items: Vec<InterpretedItem>,
    pub position_map: PositionMap,
}

/// Expand parsed items into interpreted items plus the position mapping.
///
/// Synchronous and side-effect-free apart from collaborator calls; the same
/// items and the same collaborator responses yield identical output.
pub fn interpret(
    client: &dyn BundleClient,
    config: &InterpretConfig,
    items: &[WorksheetItem],
) -> Interpretation {
    let total = items.last().map_or(0, |item| item.span.end);
    let specs = schema::run_specs();

    let mut out = Vec::new();
    let mut map = MapBuilder::new(total);

    // Pass-local context: named column lists and the identity of each
    // reference seen so far (for `^N` specs).
    let mut schemas: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut prior_refs: Vec<Option<Uuid>> = Vec::new();

    for item in items {
        match &item.kind {
            ItemKind::Text { lines } => {
                map.emit(
                    item,
                    &mut out,
                    Mode::Markdown,
                    Payload::Markdown {
                        text: lines.join("\n"),
                    },
                );
            }

            ItemKind::Section { .. } => {
                // The raw heading line is already markdown.
                let heading = item.raw.first().cloned().unwrap_or_default();
                map.emit(
                    item,
                    &mut out,
                    Mode::Markdown,
                    Payload::Markdown { text: heading },
                );
            }

            ItemKind::Directive { directive } => match directive {
                Directive::Schema { name, columns } => {
                    // Renders nothing; lines fold into the next item's span.
                    debug!(schema = name.as_str(), "registered worksheet schema");
                    schemas.insert(name.clone(), columns.clone());
                }
                Directive::Search { keywords } => {
                    let (mode, payload) = match client.search_bundles(keywords) {
                        Ok(results) => (Mode::Search, Payload::Bundles { results }),
                        Err(e) => degraded(item, Mode::Search, &e.to_string()),
                    };
                    map.emit(item, &mut out, mode, payload);
                }
                Directive::WorksheetSearch { keywords } => {
                    let (mode, payload) = match client.search_worksheets(keywords) {
                        Ok(results) => (Mode::Search, Payload::Worksheets { results }),
                        Err(e) => degraded(item, Mode::Search, &e.to_string()),
                    };
                    map.emit(item, &mut out, mode, payload);
                }
            },

            ItemKind::BundleRef {
                spec,
                sub_path,
                properties,
                ..
            } => {
                let resolution = resolve::resolve(client, spec, &prior_refs);
                prior_refs.push(match &resolution {
                    Resolution::Resolved { uuid, .. } => Some(*uuid),
                    Resolution::Unresolved { .. } => None,
                });

                let (mode, payload) = interpret_reference(
                    client,
                    config,
                    &specs,
                    &schemas,
                    item,
                    spec,
                    sub_path.as_deref(),
                    properties,
                    resolution,
                );
                map.emit(item, &mut out, mode, payload);
            }
        }
    }

    let position_map = map.finish(&mut out);
    Interpretation {
        items: out,
        position_map,
    }
}

/// Expand one bundle reference according to its display properties.
#[allow(clippy::too_many_arguments)]
fn interpret_reference(
    client: &dyn BundleClient,
    config: &InterpretConfig,
    specs: &[MetadataSpec],
    schemas: &BTreeMap<String, Vec<String>>,
    item: &WorksheetItem,
    spec: &str,
    sub_path: Option<&str>,
    properties: &DisplayProperties,
    resolution: Resolution,
) -> (Mode, Payload) {
    // Declared columns imply a table even without an explicit display.
    let display = properties.display.or_else(|| {
        (!properties.columns.is_empty() || properties.schema.is_some()).then_some(DisplayMode::Table)
    });

    let Some(display) = display else {
        // Plain reference: the snapshot (or the explicit unresolved marker
        // with the original spec text — never silently dropped).
        return (
            Mode::BundleInfo,
            Payload::BundleInfo {
                refs: vec![ResolvedRef {
                    spec: spec.to_string(),
                    sub_path: sub_path.map(ToString::to_string),
                    resolution,
                }],
            },
        );
    };

    let mode = match display {
        DisplayMode::Table => Mode::Table,
        DisplayMode::Record => Mode::Record,
        DisplayMode::Contents => Mode::Contents,
        DisplayMode::Html => Mode::Html,
    };

    // Every display mode needs a resolved target.
    let (uuid, info) = match resolution {
        Resolution::Resolved { uuid, info } => (uuid, info),
        Resolution::Unresolved { reason } => {
            return degraded(item, mode, &format!("could not resolve {spec}: {reason}"));
        }
    };

    match display {
        DisplayMode::Table | DisplayMode::Record => {
            let columns = match declared_columns(config, schemas, properties) {
                Ok(columns) => columns,
                Err(message) => return degraded(item, mode, &message),
            };

            if display == DisplayMode::Table {
                let columns: Vec<TableColumn> = columns
                    .iter()
                    .map(|name| TableColumn {
                        name: name.clone(),
                        formatting: schema::formatting_of(specs, name),
                    })
                    .collect();
                let row = project_row(&columns, &info);
                (mode, Payload::Table(TableBlock {
                    columns,
                    rows: vec![row],
                }))
            } else {
                let fields = columns
                    .iter()
                    .map(|name| RecordField {
                        name: name.clone(),
                        value: field_value(name, &info),
                        formatting: schema::formatting_of(specs, name),
                    })
                    .collect();
                (mode, Payload::Record { fields })
            }
        }

        DisplayMode::Contents | DisplayMode::Html => {
            let target = Target::new(uuid.to_string(), sub_path.unwrap_or(""));
            match client.head_target(&target, config.max_head_lines) {
                Ok(lines) => (
                    mode,
                    Payload::Lines {
                        lines: lines.map(decode_lines),
                    },
                ),
                Err(e) => degraded(item, mode, &e.to_string()),
            }
        }
    }
}

/// The column list a table/record display asked for: explicit `columns:`,
/// then a registered `schema:` name, then the configured default.
fn declared_columns(
    config: &InterpretConfig,
    schemas: &BTreeMap<String, Vec<String>>,
    properties: &DisplayProperties,
) -> Result<Vec<String>, String> {
    if !properties.columns.is_empty() {
        return Ok(properties.columns.clone());
    }
    if let Some(name) = &properties.schema {
        return schemas
            .get(name)
            .cloned()
            .ok_or_else(|| format!("unknown schema: {name}"));
    }
    Ok(config.default_columns.clone())
}

/// Project a bundle snapshot onto declared columns. Every column is present
/// in the row; a field absent on the bundle holds the missing-value
/// sentinel, so row width stays uniform.
fn project_row(
    columns: &[TableColumn],
    info: &BundleInfo,
) -> BTreeMap<String, serde_json::Value> {
    columns
        .iter()
        .map(|column| (column.name.clone(), field_value(&column.name, info)))
        .collect()
}

fn field_value(name: &str, info: &BundleInfo) -> serde_json::Value {
    match name {
        "uuid" => serde_json::Value::String(info.uuid.to_string()),
        "state" => serde_json::to_value(info.state).unwrap_or_default(),
        _ => info
            .metadata
            .get(name)
            .cloned()
            .unwrap_or_else(|| serde_json::Value::String(format::contents_str(None))),
    }
}

/// Decode transport-encoded byte lines for display.
fn decode_lines(lines: Vec<Vec<u8>>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| String::from_utf8_lossy(&line).into_owned())
        .collect()
}

/// Convert one item's failure into a degraded interpreted item. Never
/// aborts the pass.
fn degraded(item: &WorksheetItem, mode: Mode, message: &str) -> (Mode, Payload) {
    warn!(
        span_start = item.span.start,
        message, "worksheet item degraded"
    );
    (
        mode,
        Payload::Error {
            message: message.to_string(),
        },
    )
}

/// Builds the position maps incrementally as items are emitted.
struct MapBuilder {
    raw_to_interpreted: Vec<Option<usize>>,
    interpreted_to_raw: Vec<RawSpan>,

    /// First raw line not yet covered by an emitted span. Trails behind
    /// when a schema directive emits nothing; the gap folds into the next
    /// span as preamble.
    pending_start: usize,

    total: usize,
}

impl MapBuilder {
    fn new(total: usize) -> Self {
        Self {
            raw_to_interpreted: vec![None; total],
            interpreted_to_raw: Vec::new(),
            pending_start: 0,
            total,
        }
    }

    /// Emit one interpreted item for `item`, covering any pending preamble.
    ///
    /// Lines of the item's own parser span map to the new index unless
    /// blank; preamble lines stay `None`.
    fn emit(
        &mut self,
        item: &WorksheetItem,
        out: &mut Vec<InterpretedItem>,
        mode: Mode,
        payload: Payload,
    ) {
        let idx = out.len();
        let span = RawSpan::new(self.pending_start, item.span.end);

        for line in item.span.start..item.span.end {
            if !item.raw[line - item.span.start].trim().is_empty() {
                self.raw_to_interpreted[line] = Some(idx);
            }
        }

        self.interpreted_to_raw.push(span);
        out.push(InterpretedItem {
            mode,
            payload,
            span,
        });
        self.pending_start = item.span.end;
    }

    /// Close out the maps. Trailing lines that emitted nothing (a schema
    /// directive at end of input) extend the last span; a document that
    /// emitted nothing at all becomes one empty markdown item.
    fn finish(mut self, out: &mut Vec<InterpretedItem>) -> PositionMap {
        if self.pending_start < self.total {
            if let (Some(span), Some(last)) = (self.interpreted_to_raw.last_mut(), out.last_mut())
            {
                span.end = self.total;
                last.span.end = self.total;
            } else {
                let span = RawSpan::new(0, self.total);
                self.interpreted_to_raw.push(span);
                out.push(InterpretedItem {
                    mode: Mode::Markdown,
                    payload: Payload::Markdown {
                        text: String::new(),
                    },
                    span,
                });
            }
        }

        PositionMap {
            raw_to_interpreted: self.raw_to_interpreted,
            interpreted_to_raw: self.interpreted_to_raw,
        }
    }
}
