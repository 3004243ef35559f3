//! Worksheet markup parser: raw lines in, typed items out.
//!
//! The grammar is line-oriented and parsed in a single forward pass with no
//! backtracking:
//!
//! - `# Title` — section header (level = number of `#`).
//! - `% schema|search|wsearch ...` — directive, one line.
//! - `{spec}`, `{spec}/sub/path`, `{spec}[key]` — bundle reference, followed
//!   by optional indented `key: value` property continuations.
//! - blank line — significant break between consecutive text blocks.
//! - anything else — text.
//!
//! The parser is deliberately lenient: malformed directives and references
//! parse as text, and a property block closes implicitly at the first
//! non-indented line or at end of input. Hand-edited worksheets should
//! always parse; what they mean is the interpreter's problem.

use crate::model::{Directive, DisplayMode, DisplayProperties, ItemKind, RawSpan, WorksheetItem};

/// Parse raw worksheet lines into an ordered item sequence.
///
/// Every raw line lands in exactly one item's span; trailing blank lines
/// attach to the span of the item they follow.
pub fn parse(lines: &[&str]) -> Vec<WorksheetItem> {
    let mut items: Vec<WorksheetItem> = Vec::new();
    let mut text: Option<TextBlock> = None;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        if line.trim().is_empty() {
            // A blank line breaks the current text block but stays in the
            // span of whatever it follows.
            match (&mut text, items.last_mut()) {
                (Some(block), _) => {
                    block.raw.push(line.to_string());
                    block.sealed = true;
                }
                (None, Some(prev)) => {
                    prev.raw.push(line.to_string());
                    prev.span.end += 1;
                }
                (None, None) => {
                    text = Some(TextBlock::opening_blank(i, line));
                }
            }
            i += 1;
            continue;
        }

        if line.starts_with('#') {
            flush(&mut text, &mut items);
            items.push(section_item(line, i));
            i += 1;
            continue;
        }

        if line.starts_with('%')
            && let Some(directive) = parse_directive(line)
        {
            flush(&mut text, &mut items);
            items.push(WorksheetItem {
                kind: ItemKind::Directive { directive },
                raw: vec![line.to_string()],
                span: RawSpan::new(i, i + 1),
            });
            i += 1;
            continue;
        }

        if line.starts_with('{')
            && let Some((spec, sub_path, key)) = parse_reference(line)
        {
            flush(&mut text, &mut items);
            let (properties, raw, end) = consume_properties(lines, i, line);
            items.push(WorksheetItem {
                kind: ItemKind::BundleRef {
                    spec,
                    sub_path,
                    key,
                    properties,
                },
                raw,
                span: RawSpan::new(i, end),
            });
            i = end;
            continue;
        }

        // Plain text (including malformed sigil lines).
        match &mut text {
            Some(block) if !block.sealed => block.push(line),
            _ => {
                flush(&mut text, &mut items);
                text = Some(TextBlock::starting_at(i, line));
            }
        }
        i += 1;
    }

    flush(&mut text, &mut items);
    items
}

/// A text block being accumulated: content lines plus break lines.
struct TextBlock {
    start: usize,
    raw: Vec<String>,
    content: Vec<String>,

    /// Set once a blank line lands; the next content line opens a new block.
    sealed: bool,
}

impl TextBlock {
    fn starting_at(start: usize, line: &str) -> Self {
        Self {
            start,
            raw: vec![line.to_string()],
            content: vec![line.to_string()],
            sealed: false,
        }
    }

    /// A block opened by a blank line with nothing before it to attach to.
    fn opening_blank(start: usize, line: &str) -> Self {
        Self {
            start,
            raw: vec![line.to_string()],
            content: Vec::new(),
            sealed: true,
        }
    }

    fn push(&mut self, line: &str) {
        self.raw.push(line.to_string());
        self.content.push(line.to_string());
    }
}

fn flush(text: &mut Option<TextBlock>, items: &mut Vec<WorksheetItem>) {
    if let Some(block) = text.take() {
        let end = block.start + block.raw.len();
        items.push(WorksheetItem {
            kind: ItemKind::Text {
                lines: block.content,
            },
            raw: block.raw,
            span: RawSpan::new(block.start, end),
        });
    }
}

fn section_item(line: &str, at: usize) -> WorksheetItem {
    let level = line.chars().take_while(|c| *c == '#').count();
    let title = line.trim_start_matches('#').trim().to_string();
    WorksheetItem {
        kind: ItemKind::Section {
            title,
            level: u8::try_from(level).unwrap_or(u8::MAX),
        },
        raw: vec![line.to_string()],
        span: RawSpan::new(at, at + 1),
    }
}

/// Parse a one-line `%` directive. `None` means the line is text.
fn parse_directive(line: &str) -> Option<Directive> {
    let body = line.strip_prefix('%')?.trim();
    let mut tokens = body.split_whitespace();

    match tokens.next()? {
        "schema" => {
            let name = tokens.next()?.to_string();
            let columns: Vec<String> = tokens
                .flat_map(|t| t.split(','))
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(ToString::to_string)
                .collect();
            if columns.is_empty() {
                return None;
            }
            Some(Directive::Schema { name, columns })
        }
        "search" => keywords(tokens).map(|keywords| Directive::Search { keywords }),
        "wsearch" => keywords(tokens).map(|keywords| Directive::WorksheetSearch { keywords }),
        _ => None,
    }
}

fn keywords<'a>(tokens: impl Iterator<Item = &'a str>) -> Option<Vec<String>> {
    let keywords: Vec<String> = tokens.map(ToString::to_string).collect();
    if keywords.is_empty() {
        None
    } else {
        Some(keywords)
    }
}

/// Parse `{spec}`, `{spec}/sub/path`, `{spec}[key]` (and combinations).
/// `None` means the line is text.
fn parse_reference(line: &str) -> Option<(String, Option<String>, Option<String>)> {
    let inner = line.strip_prefix('{')?;
    let close = inner.find('}')?;
    let spec = &inner[..close];
    if spec.is_empty() || spec.chars().any(char::is_whitespace) {
        return None;
    }

    let mut rest = inner[close + 1..].trim_end();

    let mut key = None;
    if let Some(open) = rest.find('[') {
        let bracketed = &rest[open + 1..];
        let end = bracketed.find(']')?;
        if !bracketed[end + 1..].trim().is_empty() {
            return None;
        }
        key = Some(bracketed[..end].to_string());
        rest = rest[..open].trim_end();
    }

    let sub_path = if rest.is_empty() {
        None
    } else {
        // Anything after the brace must be a path.
        if !rest.starts_with('/') {
            return None;
        }
        Some(rest.trim_start_matches('/').to_string())
    };

    Some((spec.to_string(), sub_path, key))
}

/// Consume the indented property continuation lines following a reference.
///
/// Returns the gathered properties, the raw lines (reference line included),
/// and the exclusive end line. Unknown property keys are ignored; the block
/// closes at the first non-indented line or end of input.
fn consume_properties(
    lines: &[&str],
    start: usize,
    ref_line: &str,
) -> (DisplayProperties, Vec<String>, usize) {
    let mut properties = DisplayProperties::default();
    let mut raw = vec![ref_line.to_string()];

    let mut i = start + 1;
    while i < lines.len() {
        let line = lines[i];
        let indented = line.starts_with(' ') || line.starts_with('\t');
        if !indented || line.trim().is_empty() {
            break;
        }
        apply_property(&mut properties, line.trim());
        raw.push(line.to_string());
        i += 1;
    }

    (properties, raw, i)
}

fn apply_property(properties: &mut DisplayProperties, line: &str) {
    let Some((name, value)) = line.split_once(':') else {
        return;
    };
    let value = value.trim();

    match name.trim() {
        "display" => {
            properties.display = match value {
                "table" => Some(DisplayMode::Table),
                "record" => Some(DisplayMode::Record),
                "contents" => Some(DisplayMode::Contents),
                "html" => Some(DisplayMode::Html),
                _ => properties.display,
            };
        }
        "columns" => {
            properties.columns = value
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        "schema" => {
            if !value.is_empty() {
                properties.schema = Some(value.to_string());
            }
        }
        _ => {}
    }
}
