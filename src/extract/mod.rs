// src/extract/mod.rs
// =============================================================================
// Turns documents into link nodes for the checker.
//
// Submodules:
// - markdown: finds links (with positions) in Markdown text
// - asciidoc: finds links and anchors in AsciiDoc text
// - html:     finds links and anchors in raw HTML snippets
// - rewrite:  applies ignore / replacement patterns and the base URL
// =============================================================================

mod asciidoc;
mod html;
mod markdown;
mod rewrite;

use std::path::Path;

pub use asciidoc::{asciidoc_anchors, extract_asciidoc_links, is_asciidoc};
pub use html::anchor_ids;
pub use markdown::{extract_markdown_links, markdown_options};
pub use rewrite::Rewriter;

use crate::checker::LinkSource;
use crate::error::{Error, Result};
use crate::link::LinkNode;

/// Reads Markdown and AsciiDoc documents from disk and applies the
/// configured rewrites. AsciiDoc is recognized by extension (`adoc`,
/// `asciidoc`, `asc`), everything else is read as Markdown.
#[derive(Debug, Clone, Default)]
pub struct DocumentSource {
    rewriter: Rewriter,
}

impl DocumentSource {
    pub fn new(rewriter: Rewriter) -> Self {
        DocumentSource { rewriter }
    }
}

impl LinkSource for DocumentSource {
    fn produce_links(&self, document: &Path) -> Result<Vec<LinkNode>> {
        let content = std::fs::read_to_string(document).map_err(|source| Error::DocumentRead {
            path: document.to_path_buf(),
            source,
        })?;
        let links = if is_asciidoc(document) {
            extract_asciidoc_links(&content)
        } else {
            extract_markdown_links(&content)
        };
        Ok(self.rewriter.apply(links))
    }
}
