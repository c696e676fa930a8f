// src/checker/slug.rs
// Heading text -> anchor slug, the way GitHub renders heading anchors.

use std::collections::HashMap;

/// Lowercases, turns every whitespace character into `-` and drops
/// punctuation. Letters, digits, `-` and `_` are kept (including non-ASCII
/// letters).
pub fn slugify(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                Some(c)
            } else if c.is_whitespace() {
                Some('-')
            } else {
                None
            }
        })
        .collect()
}

/// Slugs for a whole document: repeated headings get `-1`, `-2`, ...
#[derive(Debug, Default)]
pub struct Slugger {
    seen: HashMap<String, usize>,
}

impl Slugger {
    pub fn slug(&mut self, text: &str) -> String {
        let base = slugify(text);
        let mut slug = base.clone();

        while let Some(count) = self.seen.get_mut(&slug) {
            *count += 1;
            slug = format!("{base}-{count}");
        }
        // the base keeps its counter, the new slug is reserved as well
        let taken = self.seen.get(&base).copied().unwrap_or(0);
        self.seen.insert(base.clone(), taken);
        self.seen.insert(slug.clone(), 0);
        slug
    }
}
