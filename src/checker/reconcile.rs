// src/checker/reconcile.rs
// =============================================================================
// Puts removed duplicates back.
//
// The engine checks every distinct URL once. This module walks the original
// list of links and gives every occurrence its own copy of the status, with
// that occurrence's line, position and title. The final list is sorted by
// line, then column, so the order never depends on which network request
// happened to finish first.
// =============================================================================

use std::collections::HashMap;

use crate::link::{LinkNode, LinkStatus};

/// Missing positions sort as if they were at the very start of line 1.
fn sort_key(status: &LinkStatus) -> (usize, usize) {
    match status.position {
        Some(position) => (position.start.line, position.start.column),
        None => (status.line_number.unwrap_or(1), 0),
    }
}

/// One status per link occurrence, sorted by position.
///
/// `checked` holds one resolved status per distinct URL. Links without an
/// entry (and every `mailto:` link) are reported as skipped.
pub fn reconcile(nodes: &[LinkNode], checked: &[LinkStatus]) -> Vec<LinkStatus> {
    let by_url: HashMap<&str, &LinkStatus> = checked
        .iter()
        .rev()
        .map(|status| (status.link.as_str(), status))
        .collect();

    let mut results: Vec<LinkStatus> = nodes
        .iter()
        .filter(|node| !node.url.is_empty())
        .map(|node| {
            if node.is_mailto() {
                return LinkStatus::email(node);
            }
            match by_url.get(node.url.as_str()) {
                Some(status) if status.status.is_some() => status.at(node),
                _ => LinkStatus::skipped(node, None, "Link was not checked"),
            }
        })
        .collect();

    // stable, so equal positions keep document order
    results.sort_by_key(sort_key);
    results
}
