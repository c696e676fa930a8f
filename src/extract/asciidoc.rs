// src/extract/asciidoc.rs
// =============================================================================
// Links and anchors in AsciiDoc documents.
//
// There is no AsciiDoc parser in our stack, so documents are scanned line by
// line with regular expressions:
//
//   https://example.com[text], mailto:a@example.com[]  -> hyperlink
//   link:https://example.com[text]                     -> hyperlink
//   link:downloads/report.pdf[text]                    -> external reference
//   image::diagram.png[] / image:icon.png[]            -> image
//   xref:other.adoc#setup[text], <<other.adoc#setup>>  -> external reference
//   xref:setup[text], <<setup>>, <<setup,text>>        -> internal reference
//
// Internal references become `#id` so the local checker resolves them
// against the document itself. `////` comment blocks and `//` comment lines
// are skipped.
//
// Anchors (what a `#fragment` may point at) are `[[id]]`, `[[[id]]]`,
// `[#id]`, `anchor:id[]` and the ids Asciidoctor generates for section
// titles (`== Getting Started` -> `_getting_started`).
// =============================================================================

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::link::{target_of, LinkNode, NodeKind, Point, Position, Target};

const EXTENSIONS: &[&str] = &["adoc", "asciidoc", "asc"];

/// Whether `path` is an AsciiDoc document, judged by its extension.
pub fn is_asciidoc(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

fn macros() -> &'static Regex {
    static MACROS: OnceLock<Regex> = OnceLock::new();
    MACROS.get_or_init(|| {
        Regex::new(r"\b(?P<kind>link:|xref:|image::?)(?P<target>[^\s\[\]]+)\[(?P<text>[^\]]*)\]")
            .expect("valid regex")
    })
}

fn cross_references() -> &'static Regex {
    static XREFS: OnceLock<Regex> = OnceLock::new();
    XREFS.get_or_init(|| Regex::new(r"<<(?P<target>[^,>]+)(?:,\s*(?P<text>[^>]*))?>>").expect("valid regex"))
}

fn urls() -> &'static Regex {
    static URLS: OnceLock<Regex> = OnceLock::new();
    URLS.get_or_init(|| {
        Regex::new(
            r"(?P<url>(?:https?|ftp|irc|file)://[^\s\[\]<>]*[^\s.,\[\]<>)]|mailto:[^\s\[\]<>]*[^\s.,\[\]<>)])(?:\[(?P<text>[^\]]*)\])?",
        )
        .expect("valid regex")
    })
}

fn anchors() -> &'static Regex {
    static ANCHORS: OnceLock<Regex> = OnceLock::new();
    ANCHORS.get_or_init(|| {
        Regex::new(r"\[\[(?P<block>[^\[\],\]]+)(?:,[^\]]*)?\]\]|\[#(?P<short>[^\]\.%,\s]+)[^\]]*\]|anchor:(?P<inline>[^\[\s]+)\[")
            .expect("valid regex")
    })
}

fn section_title() -> &'static Regex {
    static SECTIONS: OnceLock<Regex> = OnceLock::new();
    SECTIONS.get_or_init(|| Regex::new(r"^={2,6}\s+(?P<title>\S.*?)\s*$").expect("valid regex"))
}

// Lines that count, with their 1-based number and byte offset.
fn content_lines(text: &str) -> impl Iterator<Item = (usize, usize, &str)> {
    let mut in_comment = false;
    let mut offset = 0;
    text.split_inclusive('\n')
        .enumerate()
        .filter_map(move |(index, raw)| {
            let start = offset;
            offset += raw.len();
            let line = raw.trim_end_matches(['\n', '\r']);
            if line.starts_with("////") {
                in_comment = !in_comment;
                return None;
            }
            if in_comment || line.starts_with("//") {
                return None;
            }
            Some((index + 1, start, line))
        })
}

fn position(line: &str, number: usize, line_start: usize, span: &Range<usize>) -> Position {
    let point = |at: usize| Point {
        line: number,
        column: line[..at].chars().count() + 1,
        offset: line_start + at,
    };
    Position {
        start: point(span.start),
        end: point(span.end),
    }
}

fn is_html(path: &str) -> bool {
    let path = path.to_ascii_lowercase();
    path.ends_with(".html") || path.ends_with(".htm")
}

fn link_target(target: &str) -> (String, NodeKind) {
    if target_of(target) != Target::Local {
        return (target.to_string(), NodeKind::Hyperlink);
    }
    // anchors of generated HTML pages are not in the sources
    match target.split_once('#') {
        Some((path, _)) if is_html(path) => (path.to_string(), NodeKind::ExternalReference),
        _ => (target.to_string(), NodeKind::ExternalReference),
    }
}

fn reference_target(target: &str) -> (String, NodeKind) {
    let target = target.trim();
    if let Some(id) = target.strip_prefix('#') {
        return (format!("#{id}"), NodeKind::InternalReference);
    }
    let path = target.split_once('#').map_or(target, |(path, _)| path);
    if target.contains('#') || is_asciidoc(Path::new(path)) {
        (target.to_string(), NodeKind::ExternalReference)
    } else {
        (format!("#{target}"), NodeKind::InternalReference)
    }
}

fn title(text: Option<regex::Match<'_>>) -> Option<String> {
    text.map(|m| m.as_str().trim().to_string())
}

/// Extracts every link from AsciiDoc text, ordered by position.
pub fn extract_asciidoc_links(text: &str) -> Vec<LinkNode> {
    let mut nodes = Vec::new();

    for (number, line_start, line) in content_lines(text) {
        // spans already claimed by a macro, so bare URLs inside are skipped
        let mut taken: Vec<Range<usize>> = Vec::new();

        for caps in macros().captures_iter(line) {
            let (Some(whole), Some(kind), Some(target)) = (caps.get(0), caps.name("kind"), caps.name("target")) else {
                continue;
            };
            let (url, node_kind) = match kind.as_str() {
                "link:" => link_target(target.as_str()),
                "xref:" => reference_target(target.as_str()),
                _ => (target.as_str().to_string(), NodeKind::Image),
            };
            let span = whole.range();
            nodes.push(
                LinkNode::new(url, node_kind, Some(position(line, number, line_start, &span)))
                    .with_title(title(caps.name("text"))),
            );
            taken.push(span);
        }

        for caps in cross_references().captures_iter(line) {
            let (Some(whole), Some(target)) = (caps.get(0), caps.name("target")) else {
                continue;
            };
            let (url, node_kind) = reference_target(target.as_str());
            let span = whole.range();
            nodes.push(
                LinkNode::new(url, node_kind, Some(position(line, number, line_start, &span)))
                    .with_title(title(caps.name("text"))),
            );
            taken.push(span);
        }

        for caps in urls().captures_iter(line) {
            let (Some(whole), Some(url)) = (caps.get(0), caps.name("url")) else {
                continue;
            };
            if taken.iter().any(|span| span.contains(&url.start())) {
                continue;
            }
            nodes.push(
                LinkNode::new(
                    url.as_str(),
                    NodeKind::Hyperlink,
                    Some(position(line, number, line_start, &whole.range())),
                )
                .with_title(title(caps.name("text"))),
            );
        }
    }

    nodes.sort_by_key(|node| node.position.map(|p| (p.start.line, p.start.column)));
    nodes
}

/// The id Asciidoctor generates for a section title with the default
/// `_` prefix and separator.
pub fn section_id(title: &str) -> String {
    let mut id = String::from("_");
    let mut separated = false;
    for c in title.to_lowercase().chars() {
        if c.is_alphanumeric() || c == '_' {
            id.push(c);
            separated = false;
        } else if matches!(c, ' ' | '.' | '-') {
            if !separated {
                id.push('_');
            }
            separated = true;
        }
    }
    if id.len() > 1 && id.ends_with('_') {
        id.pop();
    }
    id
}

/// All anchors a `#fragment` may point at in an AsciiDoc document.
pub fn asciidoc_anchors(text: &str) -> HashSet<String> {
    let mut found = HashSet::new();
    let mut generated: HashMap<String, usize> = HashMap::new();
    // a section directly below `[[id]]` / `[#id]` uses that id instead
    let mut explicit_id = false;

    for (_, _, line) in content_lines(text) {
        let mut defines_anchor = false;
        for caps in anchors().captures_iter(line) {
            if let Some(id) = caps.name("block").or(caps.name("short")).or(caps.name("inline")) {
                found.insert(id.as_str().trim().to_string());
                defines_anchor = true;
            }
        }

        if let Some(caps) = section_title().captures(line) {
            if !explicit_id {
                let base = section_id(caps.name("title").map_or("", |m| m.as_str()));
                let seen = generated.entry(base.clone()).or_insert(0);
                *seen += 1;
                let id = if *seen == 1 { base } else { format!("{base}_{seen}") };
                found.insert(id);
            }
        }

        let trimmed = line.trim();
        explicit_id = defines_anchor && trimmed.starts_with('[') && trimmed.ends_with(']');
    }

    found
}
