// src/checker/mod.rs
// =============================================================================
// The link checking engine.
//
// For every document, in order:
//
//   1. ask the LinkSource for the document's link nodes
//   2. drop repeated URLs (dedup)
//   3. route every unique link by target:
//        mailto:      -> skipped, never checked
//        http/https:  -> result cache, else the two-phase HTTP verifier
//        local path:  -> file / section / line-range checker
//        other:       -> skipped
//   4. store fresh remote results in the cache
//   5. copy results back onto every occurrence (reconcile) and sort them
//
// Documents are processed one at a time and handed out as a stream, so a
// report can be printed as soon as its document is done.
//
// Submodules:
// - fetch:     HEAD probe and browser-like page load over reqwest
// - http:      two-phase verifier (probe, then batched fallback with retries)
// - local:     file existence, section anchors and line ranges
// - headers:   per-URL header rules with ${ENV} substitution
// - cache:     per-run result cache
// - dedup:     first-occurrence deduplication
// - reconcile: fan results back out to every occurrence
// - slug:      heading text -> anchor id
// =============================================================================

mod cache;
mod dedup;
mod fetch;
mod headers;
mod http;
mod local;
mod reconcile;
#[cfg(test)]
mod scripted;
mod slug;

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, Stream};
use tracing::{debug, info, warn};

pub use fetch::{Fetcher, HttpFetcher};
pub use headers::HeaderRules;

use cache::ResultCache;
use dedup::unique_links;
use http::Verifier;
use local::LocalChecker;
use reconcile::reconcile;

use crate::config::Config;
use crate::error::Result;
use crate::link::{target_of, LinkNode, LinkStatus, Target};

/// Anything that can turn a document into link nodes.
pub trait LinkSource {
    fn produce_links(&self, document: &Path) -> Result<Vec<LinkNode>>;
}

/// Settings the engine needs, resolved from the configuration.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub alive_status_codes: Vec<u16>,
    pub headers: HeaderRules,
    pub follow_redirects: bool,
    pub use_cache: bool,
    /// 0 means unbounded
    pub max_cache_size: usize,
    pub batch_size: usize,
    pub retry_count: u32,
    pub timeout: Duration,
}

impl Default for CheckOptions {
    fn default() -> Self {
        CheckOptions {
            alive_status_codes: Vec::new(),
            headers: HeaderRules::default(),
            follow_redirects: true,
            use_cache: true,
            max_cache_size: 0,
            batch_size: 100,
            retry_count: 3,
            timeout: Duration::from_secs(30),
        }
    }
}

impl CheckOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(CheckOptions {
            alive_status_codes: config.alive_status_codes.clone(),
            headers: HeaderRules::compile(&config.http_headers)?,
            follow_redirects: config.follow_redirects,
            use_cache: config.use_cache,
            max_cache_size: config.max_cache_size,
            batch_size: config.batch_size,
            retry_count: config.retry_count,
            timeout: Duration::from_secs(config.timeout),
        })
    }
}

/// Results for one document, sorted by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReport {
    pub document: PathBuf,
    pub results: Vec<LinkStatus>,
}

pub struct Engine<F> {
    verifier: Verifier<F>,
    local: LocalChecker,
    cache: ResultCache,
}

impl Engine<HttpFetcher> {
    /// Engine that checks remote links over the network. `root` is where
    /// `/absolute` local links are resolved from.
    pub fn new(options: CheckOptions, root: impl Into<PathBuf>) -> Result<Self> {
        let fetcher = HttpFetcher::new(options.timeout, options.follow_redirects)?;
        Ok(Self::with_fetcher(fetcher, options, root))
    }
}

impl<F: Fetcher> Engine<F> {
    pub fn with_fetcher(fetcher: F, options: CheckOptions, root: impl Into<PathBuf>) -> Self {
        let cache = ResultCache::new(options.use_cache, options.max_cache_size);
        Engine {
            verifier: Verifier::new(fetcher, options),
            local: LocalChecker::new(root),
            cache,
        }
    }

    /// Checks the links of one document. Returns one status per node that
    /// has a URL, sorted by position.
    pub async fn check_document(&mut self, document: &Path, nodes: &[LinkNode]) -> Vec<LinkStatus> {
        let mut checked = Vec::new();
        let mut remote = Vec::new();

        for node in unique_links(nodes) {
            match target_of(&node.url) {
                // the reconciler answers these itself
                Target::Email => {}
                Target::Unsupported => {
                    checked.push(LinkStatus::skipped(node, None, "Links with this scheme are not checked"));
                }
                Target::Local => checked.push(self.local.check(node, document)),
                Target::Remote => match self.cache.get(&node.url) {
                    Some(hit) => {
                        debug!(url = %node.url, "cache hit");
                        checked.push(hit.clone());
                    }
                    None => {
                        debug!(url = %node.url, kind = ?node.kind, "queued for verification");
                        remote.push(node);
                    }
                },
            }
        }

        let verified = self.verifier.verify(&remote).await;
        for status in &verified {
            self.cache.insert(status);
        }
        checked.extend(verified);
        debug!(document = %document.display(), cached = self.cache.len(), "document checked");

        reconcile(nodes, &checked)
    }

    /// Processes `documents` one after another, yielding each document's
    /// report as soon as it is complete.
    ///
    /// A document the source cannot read is reported with no results.
    pub fn run<S: LinkSource>(self, source: S, documents: Vec<PathBuf>) -> impl Stream<Item = DocumentReport> {
        stream::unfold(
            (self, source, documents.into_iter()),
            |(mut engine, source, mut documents)| async move {
                let document = documents.next()?;

                let results = match source.produce_links(&document) {
                    Ok(nodes) => {
                        info!(document = %document.display(), links = nodes.len(), "checking document");
                        engine.check_document(&document, &nodes).await
                    }
                    Err(e) => {
                        warn!(document = %document.display(), error = %e, "skipping document");
                        Vec::new()
                    }
                };

                Some((DocumentReport { document, results }, (engine, source, documents)))
            },
        )
    }

    #[cfg(test)]
    fn fetcher(&self) -> &F {
        self.verifier.fetcher()
    }
}
