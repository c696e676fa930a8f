// src/extract/rewrite.rs
// =============================================================================
// Applies the configured URL rewrites before anything is checked:
//
// 1. drop links matching any `ignore_patterns` entry
// 2. prefix `base_url` to links starting with `/`
// 3. run every `replacement_patterns` entry, in order
//
// The rewritten URL is the one that gets checked and reported.
// =============================================================================

use regex::Regex;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::link::LinkNode;

#[derive(Debug, Clone, Default)]
pub struct Rewriter {
    ignore: Vec<Regex>,
    replacements: Vec<(Regex, String)>,
    base_url: Option<String>,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

impl Rewriter {
    pub fn from_config(config: &Config) -> Result<Self> {
        let ignore = config
            .ignore_patterns
            .iter()
            .map(|p| compile(&p.pattern))
            .collect::<Result<Vec<_>>>()?;

        let replacements = config
            .replacement_patterns
            .iter()
            .map(|p| Ok((compile(&p.pattern)?, p.replacement.clone())))
            .collect::<Result<Vec<_>>>()?;

        Ok(Rewriter {
            ignore,
            replacements,
            base_url: config.base_url.clone(),
        })
    }

    pub fn is_ignored(&self, url: &str) -> bool {
        self.ignore.iter().any(|re| re.is_match(url))
    }

    pub fn rewrite(&self, url: &str) -> String {
        let mut url = match &self.base_url {
            Some(base) if url.starts_with('/') => format!("{}{}", base.trim_end_matches('/'), url),
            _ => url.to_string(),
        };
        for (pattern, replacement) in &self.replacements {
            url = pattern.replace(&url, replacement.as_str()).into_owned();
        }
        url
    }

    /// Drops ignored links and rewrites the rest in place.
    pub fn apply(&self, nodes: Vec<LinkNode>) -> Vec<LinkNode> {
        nodes
            .into_iter()
            .filter(|node| !self.is_ignored(&node.url))
            .map(|mut node| {
                node.url = self.rewrite(&node.url);
                node
            })
            .collect()
    }
}
