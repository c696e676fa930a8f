// src/checker/dedup.rs
// =============================================================================
// Reduces a document's links to the first occurrence of every distinct URL.
//
// - URLs are compared exactly (case-sensitive, no normalization)
// - `mailto:` links are never merged; each one passes through
// - `#section` and `other.md#section` are different URLs and both survive
// - links with an empty URL are dropped
// =============================================================================

use std::collections::HashSet;

use crate::link::LinkNode;

pub fn unique_links(nodes: &[LinkNode]) -> Vec<&LinkNode> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut unique = Vec::new();

    for node in nodes {
        if node.url.is_empty() {
            continue;
        }
        if node.is_mailto() || seen.insert(node.url.as_str()) {
            unique.push(node);
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::NodeKind;

    fn node(url: &str) -> LinkNode {
        LinkNode::new(url, NodeKind::Hyperlink, None)
    }

    fn urls(nodes: &[&LinkNode]) -> Vec<String> {
        nodes.iter().map(|n| n.url.clone()).collect()
    }

    #[test]
    fn test_keeps_first_occurrence_in_order() {
        let nodes = vec![
            node("https://b.example"),
            node("https://a.example"),
            node("https://b.example"),
            node("https://c.example"),
            node("https://a.example"),
        ];
        assert_eq!(
            urls(&unique_links(&nodes)),
            vec!["https://b.example", "https://a.example", "https://c.example"]
        );
    }

    #[test]
    fn test_is_case_sensitive() {
        let nodes = vec![node("https://example.com/Page"), node("https://example.com/page")];
        assert_eq!(unique_links(&nodes).len(), 2);
    }

    #[test]
    fn test_mailto_links_are_not_merged() {
        let nodes = vec![
            node("mailto:a@example.com"),
            node("mailto:a@example.com"),
            node("https://a.example"),
        ];
        assert_eq!(unique_links(&nodes).len(), 3);
    }

    #[test]
    fn test_fragment_links_are_separate_from_file_links() {
        let nodes = vec![
            node("#intro"),
            node("README.md#intro"),
            node("#intro"),
            node("README.md"),
        ];
        assert_eq!(urls(&unique_links(&nodes)), vec!["#intro", "README.md#intro", "README.md"]);
    }

    #[test]
    fn test_empty_urls_are_dropped() {
        let nodes = vec![node(""), node("https://a.example")];
        assert_eq!(urls(&unique_links(&nodes)), vec!["https://a.example"]);
    }
}
