//! Protects math and diagram sources from the Markdown grammar.
//!
//! Extraction swaps every formula and diagram fence for an inert token before
//! parsing; restoration swaps each token for rendered markup afterwards. Tokens
//! only use `%`, upper-case ASCII, digits and intraword underscores, so the
//! parser copies them through unchanged.

use std::ops::Range;

use crate::application::render::types::RenderError;

const TOKEN_DELIMITER: &str = "%%";
const KIND_NAMES: [&str; 3] = ["MATH_BLOCK_", "MATH_INLINE_", "DIAGRAM_"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlaceholderKind {
    MathBlock,
    MathInline,
    Diagram,
}

impl PlaceholderKind {
    fn name(self) -> &'static str {
        match self {
            PlaceholderKind::MathBlock => KIND_NAMES[0],
            PlaceholderKind::MathInline => KIND_NAMES[1],
            PlaceholderKind::Diagram => KIND_NAMES[2],
        }
    }

    pub(crate) fn is_block(self) -> bool {
        !matches!(self, PlaceholderKind::MathInline)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlaceholderEntry {
    pub(crate) token: String,
    pub(crate) kind: PlaceholderKind,
    pub(crate) source: String,
}

/// Side table from token to the source it replaced, in extraction order.
#[derive(Debug, Clone, Default)]
pub(crate) struct PlaceholderTable {
    prefix: String,
    entries: Vec<PlaceholderEntry>,
}

impl PlaceholderTable {
    fn with_prefix(prefix: String) -> Self {
        Self {
            prefix,
            entries: Vec::new(),
        }
    }

    fn push(&mut self, kind: PlaceholderKind, source: &str) -> String {
        let token = format!(
            "{}{}{}{}",
            self.prefix,
            kind.name(),
            self.entries.len(),
            TOKEN_DELIMITER
        );
        self.entries.push(PlaceholderEntry {
            token: token.clone(),
            kind,
            source: source.to_string(),
        });
        token
    }

    pub(crate) fn entries(&self) -> &[PlaceholderEntry] {
        &self.entries
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn leftover_in(&self, html: &str) -> Option<String> {
        KIND_NAMES.iter().find_map(|name| {
            let needle = format!("{}{name}", self.prefix);
            html.find(&needle).map(|start| {
                let end = html[start + needle.len()..]
                    .find(TOKEN_DELIMITER)
                    .map(|offset| start + needle.len() + offset + TOKEN_DELIMITER.len())
                    .unwrap_or(html.len());
                html[start..end].to_string()
            })
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Extraction {
    pub(crate) processed: String,
    pub(crate) table: PlaceholderTable,
}

/// Replace block math, then inline math, then diagram fences with tokens.
///
/// Only top-level mermaid fences become diagrams; a mermaid example nested in
/// another fence stays code.
pub(crate) fn extract(markdown: &str) -> Extraction {
    let mut table = PlaceholderTable::with_prefix(token_prefix(markdown));

    let mut pieces = Vec::new();
    let mut cursor = 0;
    for region in code_regions(markdown) {
        pieces.push(Piece::Text(extract_math(
            &markdown[cursor..region.span.start],
            &mut table,
        )));
        pieces.push(match region.diagram_body {
            Some(body) => Piece::Diagram(markdown[body].trim()),
            None => Piece::Text(markdown[region.span.clone()].to_string()),
        });
        cursor = region.span.end;
    }
    pieces.push(Piece::Text(extract_math(&markdown[cursor..], &mut table)));

    let mut processed = String::with_capacity(markdown.len());
    for piece in pieces {
        match piece {
            Piece::Text(text) => processed.push_str(&text),
            Piece::Diagram(source) => {
                let token = table.push(PlaceholderKind::Diagram, source);
                processed.push_str(&format!("\n\n{token}\n\n"));
            }
        }
    }

    Extraction { processed, table }
}

enum Piece<'a> {
    Text(String),
    Diagram(&'a str),
}

/// Replace every token exactly once with the markup produced by `render`.
///
/// Block tokens that the parser wrapped in a paragraph of their own are
/// replaced together with the wrapper. A token that cannot be found, or a
/// token still present afterwards, is an error.
pub(crate) fn restore<F>(
    html: &str,
    table: &PlaceholderTable,
    mut render: F,
) -> Result<String, RenderError>
where
    F: FnMut(&PlaceholderEntry) -> String,
{
    let mut output = html.to_string();

    for entry in table.entries() {
        let replacement = render(entry);
        let wrapped = format!("<p>{}</p>", entry.token);

        if entry.kind.is_block() && output.contains(&wrapped) {
            output = output.replacen(&wrapped, &replacement, 1);
        } else if output.contains(&entry.token) {
            output = output.replacen(&entry.token, &replacement, 1);
        } else {
            return Err(RenderError::Placeholder {
                message: format!("token `{}` was lost during parsing", entry.token),
            });
        }
    }

    if let Some(token) = table.leftover_in(&output) {
        return Err(RenderError::Placeholder {
            message: format!("token `{token}` survived restoration"),
        });
    }

    Ok(output)
}

/// Choose a token prefix that cannot occur in the user's text.
fn token_prefix(markdown: &str) -> String {
    let collides = |prefix: &str| {
        KIND_NAMES
            .iter()
            .any(|name| markdown.contains(&format!("{prefix}{name}")))
    };

    if !collides(TOKEN_DELIMITER) {
        return TOKEN_DELIMITER.to_string();
    }

    (1u32..)
        .map(|salt| format!("{TOKEN_DELIMITER}Q{salt}"))
        .find(|prefix| !markdown.contains(prefix.as_str()))
        .unwrap_or_else(|| TOKEN_DELIMITER.to_string())
}

fn extract_math(segment: &str, table: &mut PlaceholderTable) -> String {
    let with_blocks = extract_block_math(segment, table);
    extract_inline_math(&with_blocks, table)
}

fn extract_block_math(segment: &str, table: &mut PlaceholderTable) -> String {
    let mut output = String::with_capacity(segment.len());
    let mut cursor = 0;
    let mut search = 0;

    while let Some(offset) = segment[search..].find("$$") {
        let open = search + offset;
        let content_start = open + 2;
        // At least one character of content before the closing delimiter.
        let close = segment
            .get(content_start + 1..)
            .and_then(|rest| rest.find("$$"))
            .map(|rel| content_start + 1 + rel);

        match close {
            Some(close) => {
                output.push_str(&segment[cursor..open]);
                let token = table.push(PlaceholderKind::MathBlock, &segment[content_start..close]);
                output.push_str(&token);
                cursor = close + 2;
                search = cursor;
            }
            None => break,
        }
    }

    output.push_str(&segment[cursor..]);
    output
}

fn extract_inline_math(segment: &str, table: &mut PlaceholderTable) -> String {
    let bytes = segment.as_bytes();
    let mut output = String::with_capacity(segment.len());
    let mut cursor = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let opens = bytes[idx] == b'$'
            && (idx == 0 || bytes[idx - 1] != b'$')
            && bytes.get(idx + 1) != Some(&b'$');
        if !opens {
            idx += 1;
            continue;
        }

        let mut close = idx + 1;
        while close < bytes.len() && bytes[close] != b'$' && bytes[close] != b'\n' {
            close += 1;
        }

        let closes = close < bytes.len()
            && bytes[close] == b'$'
            && close > idx + 1
            && bytes.get(close + 1) != Some(&b'$');
        if closes {
            output.push_str(&segment[cursor..idx]);
            let token = table.push(PlaceholderKind::MathInline, &segment[idx + 1..close]);
            output.push_str(&token);
            cursor = close + 1;
            idx = cursor;
        } else {
            idx += 1;
        }
    }

    output.push_str(&segment[cursor..]);
    output
}

/// A span the Markdown grammar treats as code. Closed backtick fences whose
/// info string is `mermaid` also record the byte range of their body.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CodeRegion {
    span: Range<usize>,
    diagram_body: Option<Range<usize>>,
}

impl CodeRegion {
    fn code(span: Range<usize>) -> Self {
        Self {
            span,
            diagram_body: None,
        }
    }
}

struct OpenFence {
    start: usize,
    body_start: usize,
    marker: u8,
    width: usize,
    diagram: bool,
}

/// Fenced code blocks and inline code spans, in order.
fn code_regions(markdown: &str) -> Vec<CodeRegion> {
    let mut regions = Vec::new();
    let mut fence: Option<OpenFence> = None;
    let mut offset = 0;

    for line in markdown.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        match &fence {
            Some(open) => {
                let closes = fence_marker(line).is_some_and(|(marker, width, rest)| {
                    marker == open.marker && width >= open.width && rest.trim().is_empty()
                });
                if closes {
                    regions.push(CodeRegion {
                        span: open.start..offset,
                        diagram_body: open.diagram.then(|| open.body_start..line_start),
                    });
                    fence = None;
                }
            }
            None => {
                if let Some((marker, width, info)) = fence_marker(line) {
                    fence = Some(OpenFence {
                        start: line_start,
                        body_start: offset,
                        marker,
                        width,
                        diagram: marker == b'`' && info.trim().eq_ignore_ascii_case("mermaid"),
                    });
                } else {
                    regions.extend(inline_code_spans(line).into_iter().map(|span| {
                        CodeRegion::code(line_start + span.start..line_start + span.end)
                    }));
                }
            }
        }
    }

    if let Some(open) = fence {
        regions.push(CodeRegion::code(open.start..markdown.len()));
    }

    regions
}

/// Opening or closing fence: up to three spaces, then three or more backticks
/// or tildes. Returns the marker byte, run width and the remainder of the line.
fn fence_marker(line: &str) -> Option<(u8, usize, &str)> {
    let indent = line.bytes().take_while(|b| *b == b' ').count();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let marker = *rest.as_bytes().first()?;
    if marker != b'`' && marker != b'~' {
        return None;
    }
    let width = rest.bytes().take_while(|b| *b == marker).count();
    (width >= 3).then(|| (marker, width, &rest[width..]))
}

fn inline_code_spans(line: &str) -> Vec<Range<usize>> {
    let bytes = line.as_bytes();
    let mut spans = Vec::new();
    let mut idx = 0;

    while idx < bytes.len() {
        if bytes[idx] != b'`' {
            idx += 1;
            continue;
        }
        let open = idx;
        let width = bytes[idx..].iter().take_while(|b| **b == b'`').count();
        idx += width;

        let mut probe = idx;
        let mut matched = None;
        while probe < bytes.len() {
            if bytes[probe] == b'`' {
                let run = bytes[probe..].iter().take_while(|b| **b == b'`').count();
                if run == width {
                    matched = Some(probe + run);
                    break;
                }
                probe += run;
            } else {
                probe += 1;
            }
        }

        if let Some(end) = matched {
            spans.push(open..end);
            idx = end;
        }
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(extraction: &Extraction) -> Vec<PlaceholderKind> {
        extraction.table.entries().iter().map(|e| e.kind).collect()
    }

    #[test]
    fn block_math_is_extracted_before_inline() {
        let extraction = extract("$$a+b$$ and $c$");
        assert_eq!(
            kinds(&extraction),
            vec![PlaceholderKind::MathBlock, PlaceholderKind::MathInline]
        );
        assert_eq!(extraction.table.entries()[0].source, "a+b");
        assert_eq!(extraction.table.entries()[1].source, "c");
        assert_eq!(
            extraction.processed,
            "%%MATH_BLOCK_0%% and %%MATH_INLINE_1%%"
        );
    }

    #[test]
    fn lone_dollar_is_not_math() {
        let extraction = extract("# T\n\nPrice is $5 not math");
        assert!(extraction.table.is_empty());
        assert_eq!(extraction.processed, "# T\n\nPrice is $5 not math");
    }

    #[test]
    fn inline_math_does_not_cross_lines() {
        let extraction = extract("cost $5\nand $6");
        assert!(extraction.table.is_empty());
    }

    #[test]
    fn multiline_block_math_is_one_token() {
        let extraction = extract("$$\nE = mc^2\n$$\n");
        assert_eq!(kinds(&extraction), vec![PlaceholderKind::MathBlock]);
        assert_eq!(extraction.table.entries()[0].source, "\nE = mc^2\n");
    }

    #[test]
    fn diagram_fence_content_is_not_math() {
        let markdown = "```mermaid\ngraph TD\n  A[$x$] --> B\n```\n\n$y$";
        let extraction = extract(markdown);
        assert_eq!(
            kinds(&extraction),
            vec![PlaceholderKind::MathInline, PlaceholderKind::Diagram]
        );
        let diagram = &extraction.table.entries()[1];
        assert_eq!(diagram.source, "graph TD\n  A[$x$] --> B");
        assert!(!extraction.processed.contains("mermaid"));
    }

    #[test]
    fn mermaid_example_inside_tilde_fence_stays_code() {
        let markdown = "~~~text\n```mermaid\ngraph TD\n```\n~~~\n";
        let extraction = extract(markdown);
        assert!(extraction.table.is_empty());
        assert_eq!(extraction.processed, markdown);
    }

    #[test]
    fn mermaid_example_inside_wider_backtick_fence_stays_code() {
        let markdown = "````markdown\n```mermaid\ngraph TD\n```\n````\n\n```Mermaid\ngraph LR\n```\n";
        let extraction = extract(markdown);
        assert_eq!(kinds(&extraction), vec![PlaceholderKind::Diagram]);
        assert_eq!(extraction.table.entries()[0].source, "graph LR");
        assert!(extraction.processed.starts_with("````markdown\n```mermaid\ngraph TD\n```\n````\n"));
    }

    #[test]
    fn unclosed_mermaid_fence_is_not_a_diagram() {
        let extraction = extract("```mermaid\ngraph TD\n");
        assert!(extraction.table.is_empty());
    }

    #[test]
    fn code_spans_and_fences_keep_dollars() {
        let markdown = "Use `$HOME` here\n\n```sh\necho $PATH $USER\n```\n";
        let extraction = extract(markdown);
        assert!(extraction.table.is_empty());
        assert_eq!(extraction.processed, markdown);
    }

    #[test]
    fn colliding_input_gets_salted_prefix() {
        let extraction = extract("literal %%MATH_INLINE_0%% and $x$");
        let token = &extraction.table.entries()[0].token;
        assert_eq!(token, "%%Q1MATH_INLINE_0%%");
        assert!(extraction.processed.contains("literal %%MATH_INLINE_0%%"));
    }

    #[test]
    fn restore_replaces_each_token_once() {
        let extraction = extract("$$x$$\n\ninline $y$ text");
        let html = "<p>%%MATH_BLOCK_0%%</p>\n<p>inline %%MATH_INLINE_1%% text</p>\n";
        let restored = restore(html, &extraction.table, |entry| match entry.kind {
            PlaceholderKind::MathBlock => format!("<div>{}</div>", entry.source),
            _ => format!("<span>{}</span>", entry.source),
        })
        .expect("restores");

        assert_eq!(restored, "<div>x</div>\n<p>inline <span>y</span> text</p>\n");
    }

    #[test]
    fn restore_reports_lost_tokens() {
        let extraction = extract("$y$");
        let err = restore("<p>nothing</p>", &extraction.table, |_| String::new())
            .expect_err("token is missing");
        assert!(matches!(err, RenderError::Placeholder { .. }));
    }

    #[test]
    fn restore_reports_duplicated_tokens() {
        let extraction = extract("$y$");
        let html = "<p>%%MATH_INLINE_0%% %%MATH_INLINE_0%%</p>";
        let err = restore(html, &extraction.table, |_| "ok".to_string())
            .expect_err("second copy survives");
        assert!(err.to_string().contains("survived"));
    }

    #[test]
    fn interleaved_content_restores_without_leftovers() {
        let markdown = "Intro $a$ and $$b$$\n\n```mermaid\ngraph LR\nA-->B\n```\n\nthen $c$ and $$\nd\n$$";
        let extraction = extract(markdown);
        assert_eq!(extraction.table.entries().len(), 5);

        let restored = restore(&extraction.processed, &extraction.table, |entry| {
            format!("[{}]", entry.source.trim())
        })
        .expect("every token restored");
        for entry in extraction.table.entries() {
            assert!(!restored.contains(&entry.token));
        }
        assert!(restored.contains("[graph LR\nA-->B]"));
    }
}
