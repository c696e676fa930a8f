// src/checker/fetch.rs
// =============================================================================
// The network side of link checking.
//
// Two kinds of request are made:
// - probe:     a HEAD request (lightweight, no body download)
// - load_page: a GET that behaves like a browser opening the page - browser
//              user agent and Accept headers, the document itself read -
//              but without fetching any images, scripts, styles, fonts or
//              media
//
// Redirects are followed by hand (the reqwest client itself never follows
// them) so that every hop is recorded. That lets the verifier answer both
// "where did we end up?" and "what was the first redirect status?".
// Configured headers belong to the URL they were configured for: they are
// only sent while a redirect chain stays on the requested origin.
//
// A page load reads at most `MAX_PAGE_BYTES` of an HTML body and nothing
// of any other body; the status is all the verifier needs.
//
// The `Fetcher` trait is the seam the verifier talks to, so tests can swap
// in a scripted fetcher without touching the network.
// =============================================================================

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION, USER_AGENT};
use reqwest::{Client, Method, Response, StatusCode};
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// Give up after this many hops (a redirect loop never ends otherwise).
pub const MAX_REDIRECTS: usize = 10;

/// Upper bound on the HTML read during a page load.
pub const MAX_PAGE_BYTES: usize = 1024 * 1024;

/// User agent for the page-load fallback; some sites refuse non-browsers.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

const PROBE_USER_AGENT: &str = concat!("link-sentry/", env!("CARGO_PKG_VERSION"));

/// Transport failures. These are the retryable ones: the verifier turns
/// them into an `error` status only after the last attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Too many redirects (more than {MAX_REDIRECTS})")]
    TooManyRedirects,
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("{0}")]
    Request(String),
}

// "error sending request: ...: dns error: ..." instead of just the outer text
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout
        } else if error.is_connect() {
            FetchError::Connect(error_chain(&error))
        } else if error.is_redirect() {
            FetchError::TooManyRedirects
        } else {
            FetchError::Request(error_chain(&error))
        }
    }
}

/// One redirect response: its status and the absolute URL it points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub status: u16,
    pub location: Option<String>,
}

/// What happened when a URL was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// Status of the last response received
    pub status: u16,
    /// URL of the last response received
    pub final_url: String,
    /// Redirect responses seen on the way, in order
    pub redirects: Vec<Redirect>,
}

impl Exchange {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn reason(&self) -> &'static str {
        StatusCode::from_u16(self.status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown")
    }
}

/// Anything that can probe and load URLs.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    /// Lightweight request (HEAD).
    async fn probe(&self, url: &str, headers: &HeaderMap) -> Result<Exchange, FetchError>;

    /// Browser-like page load (GET, document read, subresources blocked).
    async fn load_page(&self, url: &str, headers: &HeaderMap) -> Result<Exchange, FetchError>;
}

/// `Fetcher` backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    follow_redirects: bool,
}

/// Statuses treated as redirects even when the server omits `Location`.
fn is_redirect_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 307 | 308)
}

impl HttpFetcher {
    /// Builds the shared client. Redirects are never followed by reqwest
    /// itself; see `exchange`.
    pub fn new(timeout: Duration, follow_redirects: bool) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(PROBE_USER_AGENT)
            .build()?;

        Ok(HttpFetcher {
            client,
            follow_redirects,
        })
    }

    // Sends `method` to `url`, walking redirects by hand when allowed.
    // `defaults` go with every request, `configured` only to the origin of
    // `url`. Returns the final response (body unread) with the recorded
    // exchange.
    async fn exchange(
        &self,
        method: Method,
        url: &str,
        defaults: &HeaderMap,
        configured: &HeaderMap,
    ) -> Result<(Exchange, Response), FetchError> {
        let start = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let origin = start.origin();
        let mut current = start;
        let mut redirects = Vec::new();

        loop {
            let mut request = self
                .client
                .request(method.clone(), current.clone())
                .headers(defaults.clone());
            if current.origin() == origin {
                request = request.headers(configured.clone());
            }
            let response = request.send().await?;

            let status = response.status();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| current.join(value).ok());

            let redirected = is_redirect_status(status) || (status.is_redirection() && location.is_some());
            if !redirected {
                let exchange = Exchange {
                    status: status.as_u16(),
                    final_url: current.to_string(),
                    redirects,
                };
                return Ok((exchange, response));
            }

            redirects.push(Redirect {
                status: status.as_u16(),
                location: location.as_ref().map(Url::to_string),
            });

            // Not following: report the redirect response itself
            let next = match location {
                Some(next) if self.follow_redirects => next,
                _ => {
                    let exchange = Exchange {
                        status: status.as_u16(),
                        final_url: current.to_string(),
                        redirects,
                    };
                    return Ok((exchange, response));
                }
            };

            if redirects.len() > MAX_REDIRECTS {
                return Err(FetchError::TooManyRedirects);
            }
            debug!(from = %current, to = %next, status = status.as_u16(), "following redirect");
            current = next;
        }
    }
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("html"))
}

// Reads the body chunk by chunk and stops once `limit` bytes are in.
async fn read_prefix(response: &mut Response, limit: usize) -> Result<Vec<u8>, FetchError> {
    let mut body = Vec::new();
    while body.len() < limit {
        let Some(chunk) = response.chunk().await? else {
            break;
        };
        let room = limit - body.len();
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
    Ok(body)
}

impl Fetcher for HttpFetcher {
    async fn probe(&self, url: &str, headers: &HeaderMap) -> Result<Exchange, FetchError> {
        let (exchange, _response) = self.exchange(Method::HEAD, url, &HeaderMap::new(), headers).await?;
        Ok(exchange)
    }

    async fn load_page(&self, url: &str, headers: &HeaderMap) -> Result<Exchange, FetchError> {
        let mut browser = HeaderMap::new();
        browser.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        browser.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        browser.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let (exchange, mut response) = self.exchange(Method::GET, url, &browser, headers).await?;

        // Downloads, archives and images are never read
        if !is_html(&response) {
            debug!(url, status = exchange.status, "page loaded without body");
            return Ok(exchange);
        }

        let body = read_prefix(&mut response, MAX_PAGE_BYTES).await?;
        let skipped = blocked_subresources(&String::from_utf8_lossy(&body));
        debug!(url, status = exchange.status, bytes = body.len(), skipped, "page loaded");

        Ok(exchange)
    }
}

/// Subresource categories a page can pull in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Document,
    Image,
    Media,
    Font,
    Script,
    Stylesheet,
    Other,
}

impl ResourceKind {
    /// Everything except documents is irrelevant to whether a page exists.
    pub fn is_blocked(self) -> bool {
        !matches!(self, ResourceKind::Document)
    }
}

fn subresource_kind(tag: &str, rel: Option<&str>, as_attr: Option<&str>) -> ResourceKind {
    match (tag, rel, as_attr) {
        ("img", ..) | ("picture", ..) => ResourceKind::Image,
        ("video", ..) | ("audio", ..) | ("source", ..) | ("track", ..) => ResourceKind::Media,
        ("script", ..) => ResourceKind::Script,
        ("iframe", ..) | ("frame", ..) => ResourceKind::Document,
        ("link", Some(rel), _) if rel.contains("stylesheet") => ResourceKind::Stylesheet,
        ("link", _, Some("font")) => ResourceKind::Font,
        ("link", _, Some("image")) => ResourceKind::Image,
        ("link", _, Some("script")) => ResourceKind::Script,
        ("link", _, Some("style")) => ResourceKind::Stylesheet,
        _ => ResourceKind::Other,
    }
}

/// Counts the subresources of a page that a page load does not fetch.
/// Only the top-level document is ever requested.
pub fn blocked_subresources(html: &str) -> usize {
    let Ok(selector) = Selector::parse(
        "img[src], picture, video, audio, source[src], track[src], script[src], iframe[src], frame[src], link[href]",
    ) else {
        return 0;
    };

    Html::parse_document(html)
        .select(&selector)
        .map(|element| {
            let element = element.value();
            subresource_kind(element.name(), element.attr("rel"), element.attr("as"))
        })
        .filter(|kind| kind.is_blocked())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    type Reply = (&'static str, String, String);

    // Minimal HTTP/1.1 server for one test. `route` gets the method, path
    // and raw request text and returns status line, extra headers and body.
    async fn serve<R>(route: R) -> String
    where
        R: Fn(&str, &str, &str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let route = Arc::new(route);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                let route = Arc::clone(&route);
                tokio::spawn(async move {
                    let mut buffer = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buffer.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&buffer).to_string();
                    let mut parts = request.split_whitespace();
                    let method = parts.next().unwrap_or("GET").to_string();
                    let path = parts.next().unwrap_or("/").to_string();

                    let (status, headers, body) = route(&method, &path, &request);
                    let body = if method == "HEAD" { String::new() } else { body };
                    let response = format!(
                        "HTTP/1.1 {status}\r\n{headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{address}")
    }

    fn redirects(_method: &str, path: &str, _request: &str) -> Reply {
        match path {
            "/redirect-permanent" => ("301 Moved Permanently", "Location: /final-destination\r\n".into(), String::new()),
            "/redirect-temporary" => ("302 Found", "Location: /final-destination\r\n".into(), String::new()),
            "/final-destination" => ("200 OK", String::new(), "Final Destination Reached".into()),
            "/redirect-loop1" => ("302 Found", "Location: /redirect-loop2\r\n".into(), String::new()),
            "/redirect-loop2" => ("302 Found", "Location: /redirect-loop1\r\n".into(), String::new()),
            _ => ("404 Not Found", String::new(), "Not Found".into()),
        }
    }

    fn bearer(request: &str) -> bool {
        request.to_lowercase().contains("authorization: bearer secret")
    }

    #[tokio::test]
    async fn test_probe_follows_redirects() {
        let base = serve(redirects).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5), true).unwrap();

        let exchange = fetcher
            .probe(&format!("{base}/redirect-permanent"), &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(exchange.status, 200);
        assert_eq!(exchange.final_url, format!("{base}/final-destination"));
        assert_eq!(exchange.redirects.len(), 1);
        assert_eq!(exchange.redirects[0].status, 301);
    }

    #[tokio::test]
    async fn test_probe_stops_at_redirect_when_not_following() {
        let base = serve(redirects).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5), false).unwrap();

        let exchange = fetcher
            .probe(&format!("{base}/redirect-temporary"), &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(exchange.status, 302);
        assert_eq!(exchange.final_url, format!("{base}/redirect-temporary"));
        assert_eq!(
            exchange.redirects,
            vec![Redirect {
                status: 302,
                location: Some(format!("{base}/final-destination")),
            }]
        );
    }

    #[tokio::test]
    async fn test_redirect_loop_is_an_error() {
        let base = serve(redirects).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5), true).unwrap();

        let result = fetcher.load_page(&format!("{base}/redirect-loop1"), &HeaderMap::new()).await;
        assert_eq!(result, Err(FetchError::TooManyRedirects));
    }

    #[tokio::test]
    async fn test_not_found_is_an_exchange_not_an_error() {
        let base = serve(redirects).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5), true).unwrap();

        let exchange = fetcher.load_page(&format!("{base}/missing"), &HeaderMap::new()).await.unwrap();
        assert_eq!(exchange.status, 404);
        assert_eq!(exchange.reason(), "Not Found");
        assert!(exchange.redirects.is_empty());
    }

    #[tokio::test]
    async fn test_page_load_looks_like_a_browser_and_sends_headers() {
        fn picky(_method: &str, _path: &str, request: &str) -> Reply {
            let request = request.to_lowercase();
            if request.contains("mozilla/5.0") && request.contains("x-token: secret") {
                (
                    "200 OK",
                    "Content-Type: text/html\r\n".into(),
                    "<html><img src=\"a.png\"><script src=\"a.js\"></script></html>".into(),
                )
            } else {
                ("403 Forbidden", String::new(), String::new())
            }
        }
        let base = serve(picky).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5), true).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-token", HeaderValue::from_static("secret"));

        let probed = fetcher.probe(&base, &headers).await.unwrap();
        assert_eq!(probed.status, 403);

        let loaded = fetcher.load_page(&base, &headers).await.unwrap();
        assert_eq!(loaded.status, 200);
    }

    #[tokio::test]
    async fn test_configured_headers_stay_on_the_requested_origin() {
        let elsewhere = serve(|_method: &str, _path: &str, request: &str| -> Reply {
            if bearer(request) {
                ("418 I'm a teapot", String::new(), String::new())
            } else {
                ("200 OK", String::new(), "ok".into())
            }
        })
        .await;
        let target = format!("{elsewhere}/x");
        let base = serve(move |_method: &str, path: &str, request: &str| -> Reply {
            match path {
                "/away" => ("302 Found", format!("Location: {target}\r\n"), String::new()),
                "/here" => ("302 Found", "Location: /private\r\n".into(), String::new()),
                "/private" if bearer(request) => ("200 OK", String::new(), "ok".into()),
                _ => ("401 Unauthorized", String::new(), String::new()),
            }
        })
        .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5), true).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer secret"));

        let away = fetcher.probe(&format!("{base}/away"), &headers).await.unwrap();
        assert_eq!(away.final_url, format!("{elsewhere}/x"));
        assert_eq!(away.status, 200);

        let loaded = fetcher.load_page(&format!("{base}/away"), &headers).await.unwrap();
        assert_eq!(loaded.status, 200);

        // same origin keeps them
        let here = fetcher.probe(&format!("{base}/here"), &headers).await.unwrap();
        assert_eq!(here.status, 200);
        assert_eq!(here.final_url, format!("{base}/private"));
    }

    #[tokio::test]
    async fn test_page_body_is_read_up_to_a_limit() {
        let base = serve(|_method: &str, _path: &str, _request: &str| -> Reply {
            ("200 OK", "Content-Type: text/html\r\n".into(), "x".repeat(64 * 1024))
        })
        .await;

        let mut response = Client::new().get(&base).send().await.unwrap();
        let body = read_prefix(&mut response, 1000).await.unwrap();
        assert_eq!(body.len(), 1000);
    }

    #[tokio::test]
    async fn test_download_is_loaded_without_reading_it() {
        let base = serve(|_method: &str, _path: &str, _request: &str| -> Reply {
            ("200 OK", "Content-Type: application/octet-stream\r\n".into(), "0".repeat(256 * 1024))
        })
        .await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5), true).unwrap();

        let exchange = fetcher.load_page(&format!("{base}/release.iso"), &HeaderMap::new()).await.unwrap();
        assert_eq!(exchange.status, 200);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::new(Duration::from_secs(5), true).unwrap();
        let result = fetcher.probe(&format!("http://{address}/"), &HeaderMap::new()).await;
        assert!(matches!(result, Err(FetchError::Connect(_))), "{result:?}");
    }

    #[test]
    fn test_invalid_url() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let fetcher = HttpFetcher::new(Duration::from_secs(5), true).unwrap();
        let result = runtime.block_on(fetcher.probe("https://", &HeaderMap::new()));
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }

    #[test]
    fn test_blocked_subresources() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="a.css">
            <link rel="preload" as="font" href="f.woff2">
            <link rel="canonical" href="https://example.com">
            <script src="a.js"></script>
        </head><body>
            <img src="a.png"><video src="v.mp4"></video>
            <iframe src="https://embed.example.com"></iframe>
        </body></html>"#;
        // css, font, canonical (other), script, img, video; the iframe is a document
        assert_eq!(blocked_subresources(html), 6);
    }
}
