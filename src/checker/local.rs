// src/checker/local.rs
// =============================================================================
// Checks links that point into the repository instead of the web:
//
//   guide.md                 -> does the file exist?
//   guide.md#installation    -> does the file have that section?
//   #installation            -> does *this* document have that section?
//   main.rs#L10-L20          -> does the file have at least 20 lines?
//
// Relative paths are resolved against the referencing document's folder.
// Paths starting with `/` are resolved against the working directory.
//
// Anchors are collected from headings (GitHub-style slugs), `{#custom-id}`
// heading attributes and HTML `id=` / `<a name=>` attributes. AsciiDoc
// targets use their own anchors (`[[id]]`, `[#id]`, section ids). Every
// target file is parsed at most once per run.
// =============================================================================

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use percent_encoding::percent_decode_str;
use pulldown_cmark::{Event, Parser, Tag};
use regex::Regex;
use tracing::debug;

use super::slug::Slugger;
use crate::extract::{anchor_ids, asciidoc_anchors, is_asciidoc, markdown_options};
use crate::link::{LinkNode, LinkStatus};

// What we know about a target file after parsing it once
#[derive(Debug, Default)]
struct ParsedTarget {
    anchors: HashSet<String>,
    line_count: usize,
}

#[derive(Debug)]
pub struct LocalChecker {
    root: PathBuf,
    parsed: HashMap<PathBuf, Arc<ParsedTarget>>,
}

fn line_reference() -> &'static Regex {
    static LINES: OnceLock<Regex> = OnceLock::new();
    LINES.get_or_init(|| Regex::new(r"^L(\d+)(?:-L(\d+))?$").expect("valid regex"))
}

fn decode(text: &str) -> String {
    percent_decode_str(text).decode_utf8_lossy().into_owned()
}

impl LocalChecker {
    /// `root` is where absolute (`/docs/x.md`) links are resolved from.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalChecker {
            root: root.into(),
            parsed: HashMap::new(),
        }
    }

    /// Checks one local link found in `document`.
    pub fn check(&mut self, node: &LinkNode, document: &Path) -> LinkStatus {
        let (path_part, fragment) = match node.url.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment).filter(|f| !f.is_empty())),
            None => (node.url.as_str(), None),
        };
        // query strings mean nothing on disk
        let path_part = path_part.split('?').next().unwrap_or_default();

        let target = self.resolve(path_part, document);
        if !target.exists() {
            return LinkStatus::error(node, Some(404), format!("Cannot find: {}.", node.url));
        }

        let Some(fragment) = fragment else {
            return LinkStatus::alive(node, 200);
        };

        let parsed = match self.parse(&target) {
            Ok(parsed) => parsed,
            Err(e) => {
                return LinkStatus::error(
                    node,
                    None,
                    format!("Cannot read {} to look for #{}: {}", target.display(), fragment, e),
                )
            }
        };
        let fragment = decode(fragment);

        if let Some(caps) = line_reference().captures(&fragment) {
            let end = caps.get(2).or_else(|| caps.get(1)).map_or("", |m| m.as_str());
            let end_line: usize = end.parse().unwrap_or(usize::MAX);
            if end_line > parsed.line_count {
                let file = if path_part.is_empty() {
                    document.display().to_string()
                } else {
                    path_part.to_string()
                };
                return LinkStatus::error(
                    node,
                    Some(404),
                    format!(
                        "Cannot find Line {} in file: {}. The file has {} lines.",
                        end,
                        file,
                        parsed.line_count
                    ),
                );
            }
            return LinkStatus::alive(node, 200);
        }

        if parsed.anchors.contains(&fragment) || parsed.anchors.contains(&fragment.to_lowercase()) {
            LinkStatus::alive(node, 200)
        } else {
            LinkStatus::error(
                node,
                Some(404),
                format!("Cannot find section: {} in file: {}.", fragment, node.url),
            )
        }
    }

    fn resolve(&self, path_part: &str, document: &Path) -> PathBuf {
        let path_part = decode(path_part);
        let own_name = document.file_name().and_then(|n| n.to_str());

        if path_part.is_empty() || own_name == Some(path_part.as_str()) {
            return document.to_path_buf();
        }
        if let Some(from_root) = path_part.strip_prefix('/') {
            return self.root.join(from_root);
        }
        document
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(path_part)
    }

    fn parse(&mut self, target: &Path) -> std::io::Result<Arc<ParsedTarget>> {
        if let Some(parsed) = self.parsed.get(target) {
            return Ok(Arc::clone(parsed));
        }

        let content = std::fs::read_to_string(target)?;
        let anchors = if is_asciidoc(target) {
            asciidoc_anchors(&content)
        } else {
            collect_anchors(&content)
        };
        let parsed = Arc::new(ParsedTarget {
            anchors,
            line_count: content.lines().count(),
        });
        debug!(file = %target.display(), anchors = parsed.anchors.len(), "parsed anchor target");

        self.parsed.insert(target.to_path_buf(), Arc::clone(&parsed));
        Ok(parsed)
    }
}

/// All anchors a `#fragment` may point at in a Markdown document.
fn collect_anchors(markdown: &str) -> HashSet<String> {
    let mut anchors = HashSet::new();
    let mut slugger = Slugger::default();
    // text of the heading being read
    let mut heading: Option<String> = None;

    for event in Parser::new_ext(markdown, markdown_options()) {
        match event {
            Event::Start(Tag::Heading(_level, id, _classes)) => {
                if let Some(id) = id {
                    anchors.insert(id.to_string());
                }
                heading = Some(String::new());
            }
            Event::End(Tag::Heading(..)) => {
                if let Some(text) = heading.take() {
                    if !text.trim().is_empty() {
                        anchors.insert(slugger.slug(&text));
                    }
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(heading) = heading.as_mut() {
                    heading.push_str(&text);
                }
            }
            Event::Html(html) => anchors.extend(anchor_ids(&html)),
            _ => {}
        }
    }

    anchors
}
