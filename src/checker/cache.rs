// src/checker/cache.rs
// =============================================================================
// Run-scoped cache of remote link results.
//
// The same URL is often linked from many documents. The cache remembers the
// status of every remote URL checked so far so it is verified only once per
// run.
//
// Policy: insert only while there is room. Nothing is ever evicted,
// replaced or expired. Once the cache is full, URLs already in it stay hits
// for the rest of the run and every new URL is checked live each time it
// is requested.
// =============================================================================

use std::collections::HashMap;

use tracing::debug;

use crate::link::LinkStatus;

#[derive(Debug, Default)]
pub struct ResultCache {
    entries: HashMap<String, LinkStatus>,
    enabled: bool,
    /// 0 means unbounded
    capacity: usize,
}

impl ResultCache {
    pub fn new(enabled: bool, capacity: usize) -> Self {
        ResultCache {
            entries: HashMap::new(),
            enabled,
            capacity,
        }
    }

    pub fn get(&self, url: &str) -> Option<&LinkStatus> {
        if !self.enabled {
            return None;
        }
        self.entries.get(url)
    }

    /// Stores `status` under its link if the cache is enabled, has room and
    /// does not know the URL yet. Returns whether it was stored.
    pub fn insert(&mut self, status: &LinkStatus) -> bool {
        if !self.enabled || self.entries.contains_key(&status.link) {
            return false;
        }
        if self.capacity != 0 && self.entries.len() >= self.capacity {
            debug!(url = %status.link, capacity = self.capacity, "cache full, not storing");
            return false;
        }
        self.entries.insert(status.link.clone(), status.clone());
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
