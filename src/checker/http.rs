// src/checker/http.rs
// =============================================================================
// Decides whether remote (http/https) links are alive.
//
// Phase 1 (probe): a HEAD request for every link, up to 50 in flight.
//   Most links are settled here.
// Phase 2 (fallback): links whose probe failed or returned an unacceptable
//   status get a browser-like page load, in sequential batches of
//   `batch_size` (all links of a batch run at once). Transport failures are
//   retried up to `retry_count` times; a redirect loop is not retried.
//
// Each link moves through an explicit state machine:
//
//   Unchecked -> ProbeFailed -> Fallback { attempt 1..=retry_count } -> Resolved
//        \__________________________________________________________/^
//                      (probe settled the link directly)
//
// Results come back in the order the links were given, never in completion
// order.
// =============================================================================

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tracing::debug;

use super::fetch::{Exchange, FetchError, Fetcher};
use super::CheckOptions;
use crate::link::{LinkNode, LinkStatus, Status};

/// Probes in flight at once during phase 1.
const PROBE_CONCURRENCY: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkState {
    Unchecked,
    ProbeFailed { reason: String },
    Fallback { attempt: u32, last_error: Option<String> },
    Resolved(LinkStatus),
}

impl LinkState {
    fn label(&self) -> &'static str {
        match self {
            LinkState::Unchecked => "unchecked",
            LinkState::ProbeFailed { .. } => "probe-failed",
            LinkState::Fallback { .. } => "fallback",
            LinkState::Resolved(_) => "resolved",
        }
    }
}

// What one response means for a link
enum Verdict {
    Settled(LinkStatus),
    Unacceptable { code: u16, message: String },
}

fn is_redirect_code(code: u16) -> bool {
    matches!(code, 301 | 302 | 307 | 308)
}

pub struct Verifier<F> {
    fetcher: F,
    options: CheckOptions,
}

impl<F: Fetcher> Verifier<F> {
    pub fn new(fetcher: F, options: CheckOptions) -> Self {
        Verifier { fetcher, options }
    }

    #[cfg(test)]
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Checks every link and returns one resolved status per link, in input order.
    pub async fn verify(&self, links: &[&LinkNode]) -> Vec<LinkStatus> {
        if links.is_empty() {
            return Vec::new();
        }

        // Phase 1
        let probed: Vec<(usize, LinkState)> = stream::iter(links.iter().copied().enumerate())
            .map(|(index, node)| async move { (index, self.advance(node, LinkState::Unchecked).await) })
            .buffer_unordered(PROBE_CONCURRENCY)
            .collect()
            .await;

        let mut states = vec![LinkState::Unchecked; links.len()];
        for (index, state) in probed {
            states[index] = state;
        }

        // Phase 2
        let failed: Vec<usize> = states
            .iter()
            .enumerate()
            .filter(|(_, state)| matches!(state, LinkState::ProbeFailed { .. }))
            .map(|(index, _)| index)
            .collect();
        if !failed.is_empty() {
            debug!(count = failed.len(), "falling back to page loads");
        }

        for batch in failed.chunks(self.options.batch_size.max(1)) {
            let pending: Vec<(usize, LinkState)> = batch
                .iter()
                .map(|&index| (index, std::mem::replace(&mut states[index], LinkState::Unchecked)))
                .collect();

            let settled = join_all(
                pending
                    .into_iter()
                    .map(|(index, state)| async move { (index, self.settle(links[index], state).await) }),
            )
            .await;

            for (index, state) in settled {
                states[index] = state;
            }
        }

        states
            .into_iter()
            .zip(links)
            .map(|(state, node)| match state {
                LinkState::Resolved(status) => status,
                other => LinkStatus::error(node, None, format!("Check stopped while {}", other.label())),
            })
            .collect()
    }

    // Runs the fallback until the link is resolved.
    async fn settle(&self, node: &LinkNode, mut state: LinkState) -> LinkState {
        while !matches!(state, LinkState::Resolved(_)) {
            state = self.advance(node, state).await;
        }
        state
    }

    // One transition of the state machine.
    async fn advance(&self, node: &LinkNode, state: LinkState) -> LinkState {
        let headers = self.options.headers.for_url(&node.url);

        let next = match state {
            LinkState::Unchecked => match self.fetcher.probe(&node.url, &headers).await {
                Ok(exchange) => match self.judge(node, &exchange) {
                    Verdict::Settled(status) => LinkState::Resolved(status),
                    Verdict::Unacceptable { message, .. } => LinkState::ProbeFailed { reason: message },
                },
                Err(e) => LinkState::ProbeFailed { reason: e.to_string() },
            },

            LinkState::ProbeFailed { .. } => LinkState::Fallback {
                attempt: 1,
                last_error: None,
            },

            LinkState::Fallback { attempt, last_error } if attempt > self.options.retry_count => {
                let message = last_error.unwrap_or_else(|| "No attempt was made".to_string());
                LinkState::Resolved(LinkStatus::error(node, None, message))
            }

            LinkState::Fallback { attempt, .. } => {
                match self.fetcher.load_page(&node.url, &headers).await {
                    Ok(exchange) => LinkState::Resolved(match self.judge(node, &exchange) {
                        Verdict::Settled(status) => status,
                        Verdict::Unacceptable { code, message } => LinkStatus::error(node, Some(code), message),
                    }),
                    // a redirect loop comes back the same every time
                    Err(e @ FetchError::TooManyRedirects) => {
                        LinkState::Resolved(LinkStatus::error(node, None, e.to_string()))
                    }
                    Err(e) => {
                        debug!(url = %node.url, attempt, error = %e, "page load failed");
                        LinkState::Fallback {
                            attempt: attempt + 1,
                            last_error: Some(e.to_string()),
                        }
                    }
                }
            }

            resolved @ LinkState::Resolved(_) => resolved,
        };

        match &next {
            LinkState::ProbeFailed { reason } => debug!(url = %node.url, reason, "probe failed"),
            other => debug!(url = %node.url, state = other.label(), "link state"),
        }
        next
    }

    // Same rules for both phases.
    fn judge(&self, node: &LinkNode, exchange: &Exchange) -> Verdict {
        if !self.options.follow_redirects {
            let redirect = match exchange.redirects.first() {
                Some(redirect) => Some((redirect.status, redirect.location.clone())),
                None if is_redirect_code(exchange.status) => Some((exchange.status, None)),
                None => None,
            };
            if let Some((code, location)) = redirect {
                let location = location.unwrap_or_else(|| "an unknown location".to_string());
                return Verdict::Settled(LinkStatus::error(
                    node,
                    Some(code),
                    format!(
                        "{} redirected to {}, but follow_redirects is set to false.",
                        node.url, location
                    ),
                ));
            }
        }

        if exchange.is_success() {
            let message = (!exchange.redirects.is_empty()).then(|| format!("redirected to {}", exchange.final_url));
            return Verdict::Settled(LinkStatus::pending(node).resolve(
                Status::Alive,
                Some(exchange.status),
                message,
            ));
        }

        if self.options.alive_status_codes.contains(&exchange.status) {
            return Verdict::Settled(LinkStatus::pending(node).resolve(
                Status::AssumedAlive,
                Some(exchange.status),
                None,
            ));
        }

        Verdict::Unacceptable {
            code: exchange.status,
            message: format!("HTTP error {}: {}", exchange.status, exchange.reason()),
        }
    }
}
