// src/extract/markdown.rs
// =============================================================================
// This module extracts links from Markdown text, together with where they
// appear in the document.
//
// We use the `pulldown-cmark` crate which:
// - Parses Markdown into events (heading, paragraph, link, etc.)
// - Follows the CommonMark specification
// - Can report the byte range of every event (`into_offset_iter`), which we
//   turn into line/column positions
//
// What counts as a link:
// - [text](url), <https://autolinks>, [text][ref]   -> hyperlink / reference
// - <someone@example.com>                             -> hyperlink (mailto:)
// - ![alt](image.png)                                 -> image
// - [ref]: url "title"                                -> definition
// - <a href="..."> / <img src="..."> in raw HTML      -> hyperlink / image
//
// Unlike a plain "find http links" pass, nothing is filtered here: relative
// paths, #fragments and mailto: links are all returned. Deciding what to do
// with them is the checker's job.
// =============================================================================

use std::sync::OnceLock;

use pulldown_cmark::{Event, LinkType, Options, Parser, Tag};
use regex::Regex;

use super::html::extract_html_links;
use crate::link::{is_remote, LinkNode, NodeKind, Point, Position};

/// Parser options shared by link extraction and anchor collection.
pub fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
}

// Maps byte offsets to 1-based line/column positions
struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        LineIndex { text, line_starts }
    }

    fn point(&self, offset: usize) -> Point {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        };
        let start = self.line_starts.get(line).copied().unwrap_or(0);
        let column = self
            .text
            .get(start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - start)
            + 1;
        Point {
            line: line + 1,
            column,
            offset,
        }
    }

    fn position(&self, range: &std::ops::Range<usize>) -> Position {
        Position {
            start: self.point(range.start),
            end: self.point(range.end),
        }
    }
}

// A link whose text is still being collected
struct OpenLink {
    url: String,
    kind: NodeKind,
    position: Position,
    title: String,
    text: String,
}

fn link_kind(link_type: LinkType, url: &str) -> NodeKind {
    match link_type {
        LinkType::Reference
        | LinkType::ReferenceUnknown
        | LinkType::Collapsed
        | LinkType::CollapsedUnknown
        | LinkType::Shortcut
        | LinkType::ShortcutUnknown => {
            if is_remote(url) {
                NodeKind::ExternalReference
            } else {
                NodeKind::InternalReference
            }
        }
        _ => NodeKind::Hyperlink,
    }
}

/// Extracts every link from Markdown text.
///
/// Example input:
///   "Check out [Rust](https://www.rust-lang.org)!"
///
/// Example output:
///   one hyperlink node, url "https://www.rust-lang.org", line 1, column 11
pub fn extract_markdown_links(markdown: &str) -> Vec<LinkNode> {
    let index = LineIndex::new(markdown);
    let mut links = Vec::new();
    // Links can nest images (a badge inside a link), so keep a stack
    let mut open: Vec<OpenLink> = Vec::new();

    let parser = Parser::new_ext(markdown, markdown_options()).into_offset_iter();

    for (event, range) in parser {
        match event {
            Event::Start(Tag::Link(link_type, dest, title)) => {
                let url = if link_type == LinkType::Email && !dest.starts_with("mailto:") {
                    format!("mailto:{dest}")
                } else {
                    dest.to_string()
                };
                open.push(OpenLink {
                    kind: link_kind(link_type, &url),
                    url,
                    position: index.position(&range),
                    title: title.to_string(),
                    text: String::new(),
                });
            }

            Event::End(Tag::Link(..)) => {
                if let Some(link) = open.pop() {
                    let title = if link.title.is_empty() { link.text } else { link.title };
                    links.push(
                        LinkNode::new(link.url, link.kind, Some(link.position))
                            .with_title(Some(title)),
                    );
                }
            }

            Event::Start(Tag::Image(_link_type, dest, title)) => {
                links.push(
                    LinkNode::new(dest.to_string(), NodeKind::Image, Some(index.position(&range)))
                        .with_title(Some(title.to_string())),
                );
            }

            Event::Text(text) | Event::Code(text) => {
                if let Some(link) = open.last_mut() {
                    link.text.push_str(&text);
                }
            }

            Event::Html(html) => {
                let position = index.position(&range);
                for (url, kind) in extract_html_links(&html) {
                    links.push(LinkNode::new(url, kind, Some(position)));
                }
            }

            // We don't care about other events (headings, paragraphs, etc.)
            _ => {}
        }
    }

    links.extend(extract_definitions(markdown, &index));
    links
}

fn definition_pattern() -> &'static Regex {
    static DEFINITION: OnceLock<Regex> = OnceLock::new();
    DEFINITION.get_or_init(|| {
        Regex::new(r#"^( {0,3})\[([^\]^][^\]]*)\]:[ \t]*(<[^>]*>|\S+)(?:[ \t]+(?:"([^"]*)"|'([^']*)'|\(([^)]*)\)))?[ \t]*$"#)
            .expect("valid regex")
    })
}

// Link reference definitions never show up as parser events, so they are
// found with a line scan that skips fenced code blocks.
fn extract_definitions(markdown: &str, index: &LineIndex) -> Vec<LinkNode> {
    let mut definitions = Vec::new();
    let mut fence: Option<&str> = None;

    for (line_no, line) in markdown.lines().enumerate() {
        let trimmed = line.trim_start();
        for marker in ["```", "~~~"] {
            if trimmed.starts_with(marker) {
                fence = match fence {
                    Some(open) if open == marker => None,
                    None => Some(marker),
                    other => other,
                };
            }
        }
        if fence.is_some() {
            continue;
        }

        let Some(caps) = definition_pattern().captures(line) else {
            continue;
        };
        let url = caps[3].trim_start_matches('<').trim_end_matches('>').to_string();
        let title = caps
            .get(4)
            .or_else(|| caps.get(5))
            .or_else(|| caps.get(6))
            .map(|m| m.as_str().to_string());

        let line_start = index.line_starts.get(line_no).copied().unwrap_or(0);
        let indent = caps[1].len();
        let position = Position {
            start: index.point(line_start + indent),
            end: index.point(line_start + line.len()),
        };
        definitions.push(LinkNode::new(url, NodeKind::Definition, Some(position)).with_title(title));
    }

    definitions
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why byte offsets?
//    - pulldown-cmark reports where each event starts and ends as a byte range
//    - LineIndex remembers where every line starts, so a binary search turns
//      an offset into a line number
//    - Columns count characters, not bytes, so "é" counts as one column
//
// 2. Why a stack for open links?
//    - A link is several events: Start(Link), Text..., End(Link)
//    - We only know the link text once End(Link) arrives
//    - An image inside a link is reported on its own, right away
//
// 3. Why are definitions found separately?
//    - `[ref]: https://example.com` is consumed by the parser to resolve
//      `[text][ref]`; it does not produce an event of its own
//    - A definition nobody uses would otherwise never be checked
// -----------------------------------------------------------------------------
