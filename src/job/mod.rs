//! Crawl job lifecycle
//!
//! This module holds the job-level data carried in the `crawl_jobs` table
//! (configuration snapshot, statistics, progress) and the [`JobManager`]
//! that drives jobs through their state machine.

mod manager;

pub use manager::JobManager;

use crate::config::Config;
use serde::{Deserialize, Serialize};

/// Job type recorded for every crawl started by the orchestrator
pub const FULL_CRAWL: &str = "full_crawl";

/// Snapshot of the configuration a job runs with
///
/// Stored as JSON on the job row so workers in other processes crawl with
/// the same settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub start_urls: Vec<String>,
    pub allowed_domains: Vec<String>,
    pub max_depth: u32,
    pub concurrent_requests: u32,
    /// Milliseconds between batches
    pub delay_between_requests: u64,
    /// Request timeout in seconds
    pub timeout: u64,
    pub retry_attempts: u32,
    /// Retry base delay in milliseconds
    pub retry_delay: u64,
    /// Idle poll interval in milliseconds
    pub poll_interval: u64,
    pub respect_robots_txt: bool,
    pub download_images: bool,
    pub excluded_patterns: Vec<String>,
    /// Full User-Agent header
    pub user_agent: String,
    /// Product token matched against robots.txt groups
    pub crawler_name: String,
}

impl From<&Config> for JobConfig {
    fn from(config: &Config) -> Self {
        Self {
            start_urls: config.site.start_urls.clone(),
            allowed_domains: config.site.allowed_domains.clone(),
            max_depth: config.crawler.max_depth,
            concurrent_requests: config.crawler.concurrent_requests,
            delay_between_requests: config.crawler.delay_between_requests,
            timeout: config.crawler.timeout,
            retry_attempts: config.crawler.retry_attempts,
            retry_delay: config.crawler.retry_delay,
            poll_interval: config.crawler.poll_interval,
            respect_robots_txt: config.crawler.respect_robots_txt,
            download_images: config.crawler.download_images,
            excluded_patterns: config.site.excluded_patterns.clone(),
            user_agent: config.user_agent.header_value(),
            crawler_name: config.user_agent.crawler_name.clone(),
        }
    }
}

impl JobConfig {
    /// How long a claim may stay unsettled before another worker takes the entry over
    ///
    /// `timeout * (retry_attempts + 1)` seconds: a claim covers one fetch
    /// plus the robots.txt lookups made while admitting its links.
    pub fn claim_lease(&self) -> chrono::Duration {
        let seconds = self
            .timeout
            .saturating_mul(u64::from(self.retry_attempts) + 1)
            .min(u64::from(u32::MAX));
        chrono::Duration::seconds(seconds as i64)
    }
}

/// Cumulative counters of a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatistics {
    pub total_urls_discovered: u64,
    pub total_urls_processed: u64,
    pub successfully_scraped: u64,
    pub failed_urls: u64,
    pub duplicate_urls: u64,
    pub total_bytes: u64,
}

/// Live progress of a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Pending entries plus scheduled retries
    pub urls_in_queue: u64,
    pub urls_processing: u64,
    /// `100 * processed / max(1, discovered)`
    pub percentage_complete: f64,
}

/// Increments applied to a job's counters in one update
///
/// Every field is unsigned, so counters can only grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobDelta {
    pub discovered: u64,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub duplicates: u64,
    pub bytes: u64,
}

impl JobDelta {
    pub fn discovered() -> Self {
        Self {
            discovered: 1,
            ..Self::default()
        }
    }

    pub fn duplicate() -> Self {
        Self {
            duplicates: 1,
            ..Self::default()
        }
    }

    /// A URL that was fetched and extracted
    pub fn succeeded(bytes: u64) -> Self {
        Self {
            processed: 1,
            succeeded: 1,
            bytes,
            ..Self::default()
        }
    }

    /// A URL whose retries are exhausted
    pub fn failed() -> Self {
        Self {
            processed: 1,
            failed: 1,
            ..Self::default()
        }
    }

    /// A URL that turned out not to be HTML
    pub fn skipped() -> Self {
        Self {
            processed: 1,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Name given to a job started at `at`
pub fn job_name(at: chrono::DateTime<chrono::Utc>) -> String {
    format!("harvest_{}", at.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_job_name_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(job_name(at), "harvest_20240309_140507");
    }

    #[test]
    fn test_deltas() {
        assert!(JobDelta::default().is_empty());
        assert_eq!(JobDelta::succeeded(512).bytes, 512);
        assert_eq!(JobDelta::failed().processed, 1);
        assert_eq!(JobDelta::skipped().succeeded, 0);
        assert_eq!(JobDelta::skipped().failed, 0);
        assert!(!JobDelta::duplicate().is_empty());
    }

    #[test]
    fn test_job_config_from_config() {
        let config = crate::config::parse_config(
            r#"
[crawler]
max-depth = 2
concurrent-requests = 4

[user-agent]
crawler-name = "HarvestBot"
crawler-version = "1.0"
contact-url = "https://example.com/bot"
contact-email = "bot@example.com"

[output]
database-path = "harvest.db"

[site]
start-urls = ["https://example.com/"]
allowed-domains = ["example.com"]
"#,
        )
        .unwrap();

        let job_config = JobConfig::from(&config);
        assert_eq!(job_config.max_depth, 2);
        assert_eq!(job_config.retry_delay, 10_000);
        assert_eq!(job_config.crawler_name, "HarvestBot");
        assert!(job_config.user_agent.starts_with("HarvestBot/1.0"));
        assert_eq!(
            job_config.claim_lease(),
            chrono::Duration::seconds(job_config.timeout as i64 * 4)
        );
    }
}
