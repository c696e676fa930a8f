// src/checker/scripted.rs
// =============================================================================
// In-memory `Fetcher` for tests.
//
// Every URL gets a script of replies per request kind. Replies are consumed
// in order and the last one repeats forever. Calls are counted so tests can
// assert how many live checks really happened. Page loads yield once while
// "in flight", which lets tests see how many overlap.
// =============================================================================

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use reqwest::header::HeaderMap;

use super::fetch::{Exchange, FetchError, Fetcher, Redirect};

type Reply = Result<Exchange, FetchError>;

#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    probes: Mutex<HashMap<String, VecDeque<Reply>>>,
    loads: Mutex<HashMap<String, VecDeque<Reply>>>,
    probe_calls: Mutex<HashMap<String, usize>>,
    load_calls: Mutex<HashMap<String, usize>>,
    headers: Mutex<HashMap<String, HeaderMap>>,
    loads_in_flight: AtomicUsize,
    peak_loads: AtomicUsize,
}

/// A direct response.
pub fn reply(url: &str, status: u16) -> Exchange {
    Exchange {
        status,
        final_url: url.to_string(),
        redirects: Vec::new(),
    }
}

/// A response reached through one redirect.
pub fn redirected(redirect_status: u16, target: &str, final_status: u16) -> Exchange {
    Exchange {
        status: final_status,
        final_url: target.to_string(),
        redirects: vec![Redirect {
            status: redirect_status,
            location: Some(target.to_string()),
        }],
    }
}

fn next_reply(script: &Mutex<HashMap<String, VecDeque<Reply>>>, url: &str, unscripted: Reply) -> Reply {
    let mut script = script.lock().unwrap();
    match script.get_mut(url) {
        Some(replies) if replies.len() > 1 => replies.pop_front().unwrap_or(unscripted),
        Some(replies) => replies.front().cloned().unwrap_or(unscripted),
        None => unscripted,
    }
}

fn count(calls: &Mutex<HashMap<String, usize>>, url: &str) {
    *calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
}

impl ScriptedFetcher {
    pub fn on_probe(self, url: &str, reply: Reply) -> Self {
        self.probes.lock().unwrap().entry(url.to_string()).or_default().push_back(reply);
        self
    }

    pub fn on_load(self, url: &str, reply: Reply) -> Self {
        self.loads.lock().unwrap().entry(url.to_string()).or_default().push_back(reply);
        self
    }

    pub fn probes(&self, url: &str) -> usize {
        self.probe_calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn loads(&self, url: &str) -> usize {
        self.load_calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Most page loads that were ever in flight at the same time.
    pub fn peak_loads(&self) -> usize {
        self.peak_loads.load(Ordering::SeqCst)
    }

    pub fn headers_sent(&self, url: &str) -> HeaderMap {
        self.headers.lock().unwrap().get(url).cloned().unwrap_or_default()
    }
}

impl Fetcher for ScriptedFetcher {
    async fn probe(&self, url: &str, headers: &HeaderMap) -> Result<Exchange, FetchError> {
        count(&self.probe_calls, url);
        self.headers.lock().unwrap().insert(url.to_string(), headers.clone());
        next_reply(&self.probes, url, Err(FetchError::Request(format!("no probe scripted for {url}"))))
    }

    async fn load_page(&self, url: &str, headers: &HeaderMap) -> Result<Exchange, FetchError> {
        count(&self.load_calls, url);
        self.headers.lock().unwrap().insert(url.to_string(), headers.clone());

        let in_flight = self.loads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_loads.fetch_max(in_flight, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.loads_in_flight.fetch_sub(1, Ordering::SeqCst);

        next_reply(&self.loads, url, Ok(reply(url, 404)))
    }
}
