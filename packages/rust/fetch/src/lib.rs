//! Bounded concurrent page fetching.
//!
//! The pipeline fetches a fixed, small candidate list per request: one GET
//! per URL, issued in parallel under a semaphore and awaited as a group.
//! Individual failures are isolated: a failed page never cancels or fails
//! its siblings.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use grounder_shared::{GrounderError, Result};

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("Grounder/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout for a single page fetch.
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Maximum redirects followed per fetch.
const MAX_REDIRECTS: usize = 5;

/// Upper bound on concurrent in-flight fetches.
const FETCH_CONCURRENCY: usize = 4;

// ---------------------------------------------------------------------------
// RawPage / FetchOutcome
// ---------------------------------------------------------------------------

/// A fetched page before any extraction.
#[derive(Debug, Clone)]
pub struct RawPage {
    /// The URL the page was requested from.
    pub url: Url,
    /// Raw response body.
    pub raw: String,
}

/// Per-URL result of a fan-out fetch. Order matches the input URL list.
#[derive(Debug)]
pub struct FetchOutcome {
    pub url: Url,
    pub result: Result<RawPage>,
}

// ---------------------------------------------------------------------------
// SiteFetcher
// ---------------------------------------------------------------------------

/// HTTP fetcher for candidate pages.
pub struct SiteFetcher {
    client: Client,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_localhost: bool,
}

impl SiteFetcher {
    /// Create a new fetcher with a shared HTTP client.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| GrounderError::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            allow_localhost: false,
        })
    }

    /// Allow fetching localhost/private IPs (for integration tests).
    #[cfg(test)]
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    /// Fetch a single page: one GET, no retry. Non-2xx is a fetch error.
    pub async fn fetch(&self, url: &Url) -> Result<RawPage> {
        if !self.allow_localhost && is_ssrf_target(url) {
            return Err(GrounderError::Fetch(format!("{url}: blocked target")));
        }

        fetch_page(&self.client, url).await
    }

    /// Fetch every URL concurrently (bounded fan-out) and await the group.
    ///
    /// The returned outcomes follow the input order regardless of completion
    /// order, and each failure stays local to its URL.
    pub async fn fetch_all(&self, urls: &[Url]) -> Vec<FetchOutcome> {
        let semaphore = Arc::new(Semaphore::new(FETCH_CONCURRENCY));
        let mut handles = Vec::with_capacity(urls.len());

        for url in urls {
            let client = self.client.clone();
            let allow_localhost = self.allow_localhost;
            let sem = semaphore.clone();
            let url = url.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                let result = if !allow_localhost && is_ssrf_target(&url) {
                    Err(GrounderError::Fetch(format!("{url}: blocked target")))
                } else {
                    fetch_page(&client, &url).await
                };
                FetchOutcome { url, result }
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (handle, url) in handles.into_iter().zip(urls) {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(%url, error = %e, "fetch task panicked");
                    outcomes.push(FetchOutcome {
                        url: url.clone(),
                        result: Err(GrounderError::Fetch(format!("{url}: task failed: {e}"))),
                    });
                }
            }
        }

        outcomes
    }
}

// ---------------------------------------------------------------------------
// Page fetching
// ---------------------------------------------------------------------------

/// Fetch a single page body over HTTP.
async fn fetch_page(client: &Client, url: &Url) -> Result<RawPage> {
    debug!(%url, "fetching page");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| GrounderError::Fetch(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(GrounderError::Fetch(format!("{url}: HTTP {status}")));
    }

    let raw = response
        .text()
        .await
        .map_err(|e| GrounderError::Fetch(format!("{url}: body read failed: {e}")))?;

    Ok(RawPage {
        url: url.clone(),
        raw,
    })
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    // Block private/loopback IPs
    if let Some(host) = url.host_str() {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return is_private_ip(&ip);
        }
        // Block known local hostnames
        if host == "localhost"
            || host == "127.0.0.1"
            || host == "[::1]"
            || host.ends_with(".local")
            || host.ends_with(".internal")
        {
            return true;
        }
    }

    false
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
