//! Galley turns worksheet markup into renderable documents and run
//! requests into executable bundles.
//!
//! A worksheet is a line-oriented text document mixing markdown prose,
//! directives, and references to bundles (immutable data or execution
//! artifacts). This crate parses that text, resolves every reference
//! through a [`client::BundleClient`] collaborator, and produces an
//! interpreted view plus bidirectional line/item position maps. It also
//! builds run bundles: validated, dependency-linked execution units with
//! schema-checked metadata.
//!
//! Transport, persistence, and any command-line surface live in the
//! collaborator behind the [`client::BundleClient`] trait; this crate is
//! pure interpretation and construction logic.

pub mod client;
pub mod format;
pub mod interpret;
pub mod model;
pub mod parse;
pub mod resolve;
pub mod run;
pub mod schema;
pub mod worksheet;

pub use client::{BundleClient, ClientError};
pub use interpret::{InterpretConfig, Interpretation};
pub use model::{
    BundleInfo, BundleState, Dependency, InterpretedItem, ItemKind, Mode, Payload, PositionMap,
    RawSpan, Resolution, RunBundle, Target, TargetInfo, TargetKind, WorksheetItem,
    WorksheetSummary,
};
pub use resolve::BundleSpec;
pub use run::{RunTarget, UsageError, construct};
pub use schema::{MetadataSpec, MetadataValue, SchemaError};
pub use worksheet::{
    ContentsEntry, ContentsSummary, WorksheetView, bundle_contents_summary, parse_and_interpret,
    parse_and_save,
};
