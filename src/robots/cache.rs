//! Per-origin robots.txt cache with 24 hour expiry

use crate::robots::{fetch_robots, ParsedRobots};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::collections::HashMap;
use url::Url;

/// Robots rules for one origin and when they were fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub content: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Robots.txt is refetched once a day
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Lazily fetches and caches robots.txt per origin (`scheme://host:port`)
#[derive(Debug)]
pub struct RobotsCache {
    client: Client,
    product_token: String,
    entries: HashMap<String, CachedRobots>,
}

impl RobotsCache {
    /// Creates an empty cache
    ///
    /// `product_token` is the crawler name matched against `User-agent` lines.
    pub fn new(client: Client, product_token: impl Into<String>) -> Self {
        Self {
            client,
            product_token: product_token.into(),
            entries: HashMap::new(),
        }
    }

    /// Checks a URL against its origin's robots.txt, fetching it if needed
    pub async fn is_allowed(&mut self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();

        let needs_fetch = self
            .entries
            .get(&origin)
            .map_or(true, |cached| cached.is_stale());

        if needs_fetch {
            let robots = fetch_robots(&self.client, &origin).await;
            self.entries.insert(origin.clone(), CachedRobots::new(robots));
        }

        self.entries
            .get(&origin)
            .map_or(true, |cached| {
                cached.content.is_allowed(url.as_str(), &self.product_token)
            })
    }

    /// Seeds the cache, bypassing the network
    #[cfg(test)]
    fn insert(&mut self, origin: &str, robots: ParsedRobots) {
        self.entries
            .insert(origin.to_string(), CachedRobots::new(robots));
    }
}
