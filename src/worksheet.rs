//! The worksheet facade: what callers above this crate actually invoke.
//!
//! Ties the parser, interpreter, and collaborator together: raw text in,
//! a renderable view with position maps out; or raw text parsed and
//! persisted back through the collaborator.

use tracing::debug;
use uuid::Uuid;

use crate::client::{BundleClient, ClientError};
use crate::format;
use crate::interpret::{self, InterpretConfig};
use crate::model::{InterpretedItem, RawSpan, Target, TargetKind};
use crate::parse;

/// A fully interpreted worksheet, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct WorksheetView {
    pub items: Vec<InterpretedItem>,
    pub raw_to_interpreted: Vec<Option<usize>>,
    pub interpreted_to_raw: Vec<RawSpan>,

    /// Set when interpretation could not begin at all. Per-item failures
    /// degrade in place instead and never land here.
    pub error: Option<String>,
}

/// Parse raw worksheet text and interpret every item.
pub fn parse_and_interpret(
    client: &dyn BundleClient,
    config: &InterpretConfig,
    raw_text: &str,
    worksheet_uuid: Uuid,
) -> WorksheetView {
    debug!(%worksheet_uuid, "interpreting worksheet");

    let lines: Vec<&str> = raw_text.lines().collect();
    let items = parse::parse(&lines);
    let interpretation = interpret::interpret(client, config, &items);

    WorksheetView {
        items: interpretation.items,
        raw_to_interpreted: interpretation.position_map.raw_to_interpreted,
        interpreted_to_raw: interpretation.position_map.interpreted_to_raw,
        error: None,
    }
}

/// Parse raw worksheet text and replace the stored items.
pub fn parse_and_save(
    client: &dyn BundleClient,
    raw_text: &str,
    worksheet_uuid: Uuid,
) -> Result<(), ClientError> {
    let lines: Vec<&str> = raw_text.lines().collect();
    let items = parse::parse(&lines);
    debug!(%worksheet_uuid, items = items.len(), "saving worksheet");
    client.persist_worksheet_items(worksheet_uuid, &items)
}

/// A quick look at what a bundle produced.
///
/// Single-file bundles show the head of the file; directory bundles show
/// the heads of `stdout` and `stderr` when present, plus a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentsSummary {
    pub kind: TargetKind,

    /// Head of the file, for single-file bundles.
    pub file_contents: Option<String>,

    pub stdout: Option<String>,
    pub stderr: Option<String>,

    /// Top-level listing, for directory bundles.
    pub entries: Vec<ContentsEntry>,
}

/// One entry of a directory bundle's listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentsEntry {
    pub name: String,
    pub kind: TargetKind,
    pub size: Option<u64>,

    /// Human-rendered size, when known.
    pub size_str: Option<String>,
}

/// Summarize a bundle's contents for display.
pub fn bundle_contents_summary(
    client: &dyn BundleClient,
    uuid: Uuid,
    max_lines: usize,
) -> Result<ContentsSummary, ClientError> {
    let root = Target::new(uuid.to_string(), "");
    let Some(info) = client.get_target_info(&root, 2)? else {
        return Err(ClientError::NotFound(format!("bundle contents: {uuid}")));
    };

    if info.kind == TargetKind::File {
        let contents = head_text(client, &root, max_lines)?;
        return Ok(ContentsSummary {
            kind: TargetKind::File,
            file_contents: Some(contents),
            stdout: None,
            stderr: None,
            entries: Vec::new(),
        });
    }

    let mut stdout = None;
    let mut stderr = None;
    let mut entries = Vec::new();
    for child in info.contents.unwrap_or_default() {
        if child.name == "stdout" || child.name == "stderr" {
            let target = Target::new(uuid.to_string(), child.name.as_str());
            let text = head_text(client, &target, max_lines)?;
            if child.name == "stdout" {
                stdout = Some(text);
            } else {
                stderr = Some(text);
            }
        }
        entries.push(ContentsEntry {
            size_str: child.size.map(format::size_str),
            name: child.name,
            kind: child.kind,
            size: child.size,
        });
    }

    Ok(ContentsSummary {
        kind: info.kind,
        file_contents: None,
        stdout,
        stderr,
        entries,
    })
}

/// Head of a target as display text, with the absent-output sentinel.
fn head_text(
    client: &dyn BundleClient,
    target: &Target,
    max_lines: usize,
) -> Result<String, ClientError> {
    let decoded = client.head_target(target, max_lines)?.map(|lines| {
        lines
            .iter()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect::<Vec<_>>()
            .join("\n")
    });
    Ok(format::verbose_contents_str(decoded.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use crate::model::{
        BundleInfo, BundleState, ItemKind, Mode, TargetInfo, WorksheetItem, WorksheetSummary,
    };

    /// A collaborator for facade tests: one known bundle, a small file
    /// tree, and a record of what was persisted.
    struct FakeClient {
        bundle: Option<BundleInfo>,
        tree: Option<TargetInfo>,
        files: Vec<(Target, Vec<Vec<u8>>)>,
        persisted: RefCell<Vec<WorksheetItem>>,
    }

    impl FakeClient {
        fn empty() -> Self {
            Self {
                bundle: None,
                tree: None,
                files: Vec::new(),
                persisted: RefCell::new(Vec::new()),
            }
        }
    }

    impl BundleClient for FakeClient {
        fn get_bundle_info(&self, spec: &str) -> Result<Option<BundleInfo>, ClientError> {
            Ok(self.bundle.clone().filter(|b| {
                b.uuid.to_string() == spec
                    || b.metadata.get("name").and_then(|v| v.as_str()) == Some(spec)
            }))
        }

        fn search_bundles(&self, _: &[String]) -> Result<Vec<BundleInfo>, ClientError> {
            Ok(vec![])
        }

        fn search_worksheets(&self, _: &[String]) -> Result<Vec<WorksheetSummary>, ClientError> {
            Ok(vec![])
        }

        fn head_target(
            &self,
            target: &Target,
            max_lines: usize,
        ) -> Result<Option<Vec<Vec<u8>>>, ClientError> {
            Ok(self
                .files
                .iter()
                .find(|(t, _)| t == target)
                .map(|(_, lines)| lines.iter().take(max_lines).cloned().collect()))
        }

        fn get_target_info(
            &self,
            _: &Target,
            _: usize,
        ) -> Result<Option<TargetInfo>, ClientError> {
            Ok(self.tree.clone())
        }

        fn persist_worksheet_items(
            &self,
            _: Uuid,
            items: &[WorksheetItem],
        ) -> Result<(), ClientError> {
            self.persisted.borrow_mut().extend(items.iter().cloned());
            Ok(())
        }

        fn resolve_owner_name(&self, _: &str) -> Result<Option<String>, ClientError> {
            Ok(None)
        }
    }

    fn known_bundle(name: &str) -> BundleInfo {
        BundleInfo {
            uuid: Uuid::new_v4(),
            bundle_type: "run".to_string(),
            state: BundleState::Ready,
            metadata: BTreeMap::from([(
                "name".to_string(),
                serde_json::Value::String(name.to_string()),
            )]),
            owner_name: None,
            permission: None,
            data_hash: None,
        }
    }

    #[test]
    fn parse_and_interpret_produces_a_full_view() {
        let mut client = FakeClient::empty();
        client.bundle = Some(known_bundle("exp1"));

        let view = parse_and_interpret(
            &client,
            &InterpretConfig::default(),
            "# Title\n{exp1}",
            Uuid::new_v4(),
        );

        assert!(view.error.is_none());
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.items[0].mode, Mode::Markdown);
        assert_eq!(view.items[1].mode, Mode::BundleInfo);
        assert_eq!(view.raw_to_interpreted, vec![Some(0), Some(1)]);
        assert_eq!(view.interpreted_to_raw.len(), 2);
    }

    #[test]
    fn parse_and_save_persists_parsed_items() {
        let client = FakeClient::empty();

        parse_and_save(&client, "# Title\n\nnotes\n{b}", Uuid::new_v4()).unwrap();

        let persisted = client.persisted.borrow();
        assert_eq!(persisted.len(), 3);
        assert!(matches!(persisted[0].kind, ItemKind::Section { .. }));
        assert!(matches!(persisted[1].kind, ItemKind::Text { .. }));
        assert!(matches!(persisted[2].kind, ItemKind::BundleRef { .. }));
    }

    #[test]
    fn file_bundle_summary_shows_file_head() {
        let mut client = FakeClient::empty();
        let uuid = Uuid::new_v4();
        client.tree = Some(TargetInfo {
            name: String::new(),
            kind: TargetKind::File,
            size: Some(12),
            contents: None,
        });
        client
            .files
            .push((Target::new(uuid.to_string(), ""), vec![b"hello".to_vec()]));

        let summary = bundle_contents_summary(&client, uuid, 10).unwrap();

        assert_eq!(summary.kind, TargetKind::File);
        assert_eq!(summary.file_contents.as_deref(), Some("hello"));
        assert!(summary.entries.is_empty());
    }

    #[test]
    fn directory_bundle_summary_reads_output_streams_and_sizes() {
        let mut client = FakeClient::empty();
        let uuid = Uuid::new_v4();
        client.tree = Some(TargetInfo {
            name: String::new(),
            kind: TargetKind::Directory,
            size: None,
            contents: Some(vec![
                TargetInfo {
                    name: "stdout".to_string(),
                    kind: TargetKind::File,
                    size: Some(2048),
                    contents: None,
                },
                TargetInfo {
                    name: "output".to_string(),
                    kind: TargetKind::Directory,
                    size: None,
                    contents: None,
                },
            ]),
        });
        client.files.push((
            Target::new(uuid.to_string(), "stdout"),
            vec![b"line".to_vec()],
        ));

        let summary = bundle_contents_summary(&client, uuid, 10).unwrap();

        assert_eq!(summary.stdout.as_deref(), Some("line"));
        // stderr missing on disk: sentinel, not an error.
        assert!(summary.stderr.is_none());
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.entries[0].size_str.as_deref(), Some("2k"));
        assert!(summary.entries[1].size_str.is_none());
    }

    #[test]
    fn missing_bundle_summary_is_not_found() {
        let client = FakeClient::empty();

        let err = bundle_contents_summary(&client, Uuid::new_v4(), 10).unwrap_err();

        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[test]
    fn absent_stream_head_reads_as_no_output() {
        let mut client = FakeClient::empty();
        let uuid = Uuid::new_v4();
        client.tree = Some(TargetInfo {
            name: String::new(),
            kind: TargetKind::Directory,
            size: None,
            contents: Some(vec![TargetInfo {
                name: "stderr".to_string(),
                kind: TargetKind::File,
                size: Some(0),
                contents: None,
            }]),
        });
        // No file registered for stderr: head_target returns None.

        let summary = bundle_contents_summary(&client, uuid, 10).unwrap();

        assert_eq!(summary.stderr.as_deref(), Some("(no output)"));
    }
}
