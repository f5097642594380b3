//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients with the configured user agent and timeout
//! - GET requests for page content, following up to 10 redirects
//! - HEAD requests used by link validation
//! - Error classification for the retry policy

use crate::crawler::retry::FetchFailure;
use crate::extract::{LinkStatus, ResponseInfo};
use crate::job::JobConfig;
use reqwest::header::{HeaderMap, HeaderName, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::{redirect::Policy, Client};
use std::time::{Duration, Instant};
use url::Url;

const MAX_REDIRECTS: usize = 10;

/// A successful response, read to the end
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    pub response: ResponseInfo,
    pub body: Vec<u8>,
    pub elapsed: Duration,
}

/// Builds an HTTP client for one job
///
/// # Arguments
///
/// * `config` - The job configuration (user agent header and timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &JobConfig) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(config.timeout.max(1));

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and reads its body
///
/// | Outcome | Result |
/// |---------|--------|
/// | 2xx / 3xx after redirects | `Ok(FetchedPage)` |
/// | HTTP status >= 400 | `http_error` |
/// | Timeout | `timeout` |
/// | Connection refused, DNS, TLS | `connection_error` |
/// | Body read failure | classified like the request |
pub async fn fetch_page(client: &Client, url: &Url) -> Result<FetchedPage, FetchFailure> {
    let started = Instant::now();

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| FetchFailure::from_reqwest(&e))?;

    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(FetchFailure::http(status.as_u16()));
    }

    let final_url = response.url().clone();
    let info = response_info(status.as_u16(), response.headers());

    let body = response
        .bytes()
        .await
        .map_err(|e| FetchFailure::from_reqwest(&e))?
        .to_vec();

    let elapsed = started.elapsed();
    tracing::debug!(
        "Fetched {} ({} bytes, {:.2}s)",
        final_url,
        body.len(),
        elapsed.as_secs_f64()
    );

    Ok(FetchedPage {
        final_url,
        response: info,
        body,
        elapsed,
    })
}

/// Checks a link with a HEAD request
///
/// Any status below 400 is valid; errors and other statuses are broken.
pub async fn check_link(client: &Client, url: &str) -> LinkStatus {
    match client.head(url).send().await {
        Ok(response) if response.status().as_u16() < 400 => LinkStatus::Valid,
        Ok(response) => {
            tracing::debug!("Link {} returned {}", url, response.status());
            LinkStatus::Broken
        }
        Err(e) => {
            tracing::debug!("Link {} failed: {}", url, e);
            LinkStatus::Broken
        }
    }
}

fn response_info(status_code: u16, headers: &HeaderMap) -> ResponseInfo {
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    ResponseInfo {
        status_code,
        content_type: header(CONTENT_TYPE),
        last_modified: header(LAST_MODIFIED),
        etag: header(ETAG),
    }
}
