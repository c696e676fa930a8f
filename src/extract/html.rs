// src/extract/html.rs
// =============================================================================
// Pulls links and anchors out of raw HTML embedded in Markdown.
//
// Markdown documents often contain snippets like:
//
//   <a name="install"></a>
//   <h2 id="usage">Usage</h2>
//   <a href="https://example.com">Example</a>
//   <img src="docs/logo.png">
//
// We use the `scraper` crate (built on html5ever) to parse those snippets as
// fragments and query them with CSS selectors:
// - `[id]` and `a[name]` give explicit anchors a `#fragment` can point at
// - `a[href]` and `img[src]` are links that need checking
// =============================================================================

use scraper::{Html, Selector};

use crate::link::NodeKind;

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Every `id="..."` and `<a name="...">` value in an HTML snippet.
pub fn anchor_ids(html: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let mut anchors = Vec::new();

    if let Some(with_id) = selector("[id]") {
        for element in fragment.select(&with_id) {
            if let Some(id) = element.value().attr("id") {
                anchors.push(id.to_string());
            }
        }
    }

    if let Some(named) = selector("a[name]") {
        for element in fragment.select(&named) {
            if let Some(name) = element.value().attr("name") {
                anchors.push(name.to_string());
            }
        }
    }

    anchors
}

/// Link targets in an HTML snippet, in document order per kind:
/// `<a href>` as hyperlinks, then `<img src>` as images.
pub fn extract_html_links(html: &str) -> Vec<(String, NodeKind)> {
    let fragment = Html::parse_fragment(html);
    let mut links = Vec::new();

    for (css, attr, kind) in [
        ("a[href]", "href", NodeKind::Hyperlink),
        ("img[src]", "src", NodeKind::Image),
    ] {
        let Some(sel) = selector(css) else { continue };
        for element in fragment.select(&sel) {
            if let Some(target) = element.value().attr(attr) {
                let target = target.trim();
                if !target.is_empty() {
                    links.push((target.to_string(), kind));
                }
            }
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_from_name_attribute() {
        assert_eq!(anchor_ids(r#"<a name="install"></a>"#), vec!["install"]);
    }

    #[test]
    fn test_anchor_from_id_attribute() {
        let anchors = anchor_ids(r#"<h2 id="usage">Usage</h2><div id="notes"></div>"#);
        assert_eq!(anchors, vec!["usage", "notes"]);
    }

    #[test]
    fn test_unclosed_tag_still_yields_anchor() {
        assert_eq!(anchor_ids(r#"<a name="top">"#), vec!["top"]);
    }

    #[test]
    fn test_extract_href_and_src() {
        let links = extract_html_links(
            r#"<p><a href="https://www.rust-lang.org">Rust</a> <img src="logo.png"></p>"#,
        );
        assert_eq!(
            links,
            vec![
                ("https://www.rust-lang.org".to_string(), NodeKind::Hyperlink),
                ("logo.png".to_string(), NodeKind::Image),
            ]
        );
    }

    #[test]
    fn test_empty_href_is_ignored() {
        assert!(extract_html_links(r#"<a href="  ">nothing</a>"#).is_empty());
    }
}
