//! Robots.txt handling module
//!
//! Fetches robots.txt once per origin, caches it for a day and answers
//! allow/deny questions for the frontier's admission check.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use reqwest::{Client, StatusCode};

/// Fetches robots.txt for an origin such as `https://example.com`
///
/// | Response | Rules |
/// |----------|-------|
/// | 2xx | parsed body |
/// | 401 / 403 | disallow everything |
/// | other status | allow everything |
/// | network error | allow everything |
pub async fn fetch_robots(client: &Client, origin: &str) -> ParsedRobots {
    let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));

    let response = match client.get(&robots_url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        tracing::info!("{} returned {}, treating site as disallowed", robots_url, status);
        return ParsedRobots::disallow_all();
    }

    if !status.is_success() {
        tracing::debug!("{} returned {}, allowing all", robots_url, status);
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
