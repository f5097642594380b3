//! Shared URL frontier
//!
//! The frontier is the `url_queue` table. Admission deduplicates on the
//! normalized URL per job, consults robots.txt and the exclusion patterns,
//! and counts every outcome on the job. Claiming is atomic across
//! processes, so any number of workers may drain the same job.

use crate::crawler::retry::{FetchFailure, RetryDecision, RetryPolicy};
use crate::job::{JobConfig, JobDelta};
use crate::robots::RobotsCache;
use crate::state::QueueStatus;
use crate::storage::{
    self, NewJobError, NewQueueEntry, QueueDepth, SharedStorage, Storage, StorageError,
    UrlQueueEntry,
};
use crate::{normalize, ConfigError, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use reqwest::Client;
use tokio::sync::Mutex;
use url::Url;

/// Priority of start URLs
pub const SEED_PRIORITY: u32 = 1;

/// Priority of links found on fetched pages
pub const DISCOVERED_PRIORITY: u32 = 2;

/// How a URL entered the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMethod {
    Seed,
    Link,
}

impl DiscoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryMethod::Seed => "seed",
            DiscoveryMethod::Link => "link",
        }
    }
}

/// One job's view of the shared frontier
pub struct Frontier {
    storage: SharedStorage,
    job_id: i64,
    robots: Option<Mutex<RobotsCache>>,
    excluded: Vec<Regex>,
    retry: RetryPolicy,
    claim_lease: Duration,
}

impl Frontier {
    /// Creates the frontier for a job
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidPattern` if an exclusion pattern is not a valid regex
    pub fn new(storage: SharedStorage, job_id: i64, config: &JobConfig, client: Client) -> Result<Self> {
        let excluded = config
            .excluded_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", pattern, e)))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let robots = config
            .respect_robots_txt
            .then(|| Mutex::new(RobotsCache::new(client, config.crawler_name.clone())));

        Ok(Self {
            storage,
            job_id,
            robots,
            excluded,
            retry: RetryPolicy::from_config(config),
            claim_lease: config.claim_lease(),
        })
    }

    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    /// Offers a URL to the frontier
    ///
    /// Checks, in order: already queued for this job (duplicate), robots.txt
    /// disallow, exclusion patterns. A URL passing every check is inserted as
    /// `pending`.
    ///
    /// # Returns
    ///
    /// `true` if a new entry was inserted
    pub async fn admit(
        &self,
        raw_url: &str,
        depth: u32,
        priority: u32,
        parent_url: Option<&str>,
        method: DiscoveryMethod,
    ) -> Result<bool> {
        let normalized = normalize(raw_url);

        let queued = storage::lock(&self.storage)?.queue_contains(self.job_id, &normalized)?;
        if queued {
            self.count(&JobDelta::duplicate())?;
            tracing::debug!("Duplicate URL {}", raw_url);
            return Ok(false);
        }

        if let Some(robots) = &self.robots {
            let allowed = match Url::parse(raw_url) {
                Ok(url) => robots.lock().await.is_allowed(&url).await,
                Err(_) => true,
            };
            if !allowed {
                tracing::debug!("Blocked by robots.txt: {}", raw_url);
                return Ok(false);
            }
        }

        if let Some(pattern) = self.excluded.iter().find(|p| p.is_match(raw_url)) {
            tracing::debug!("Excluded by pattern {}: {}", pattern, raw_url);
            return Ok(false);
        }

        let entry = NewQueueEntry {
            job_id: self.job_id,
            url: raw_url.to_string(),
            normalized_url: normalized,
            priority,
            parent_url: parent_url.map(str::to_string),
            depth,
            discovery_method: method.as_str().to_string(),
        };

        let inserted = {
            let mut storage = storage::lock(&self.storage)?;
            let inserted = storage.insert_queue_entry(&entry)?;
            let delta = if inserted {
                JobDelta::discovered()
            } else {
                // another worker queued it between the check and the insert
                JobDelta::duplicate()
            };
            storage.apply_job_delta(self.job_id, &delta)?;
            inserted
        };

        if inserted {
            tracing::debug!("Queued {} at depth {}", raw_url, depth);
        }
        Ok(inserted)
    }

    /// Claims up to `max` entries for this process
    ///
    /// Entries whose claim outlived the lease are released first, so work
    /// held by a crashed worker is picked up again.
    pub fn take_batch(&self, max: u32) -> Result<Vec<UrlQueueEntry>> {
        let now = Utc::now();
        let mut storage = storage::lock(&self.storage)?;
        self.release_stale(&mut *storage, now)?;
        let batch = storage.claim_batch(self.job_id, max, now)?;
        Ok(batch)
    }

    /// Claims one specific entry, if it is still claimable
    pub fn claim(&self, entry_id: i64) -> Result<Option<UrlQueueEntry>> {
        let now = Utc::now();
        let mut storage = storage::lock(&self.storage)?;
        self.release_stale(&mut *storage, now)?;
        let entry = storage.claim_entry(entry_id, now)?;
        Ok(entry)
    }

    /// Moves an in-flight entry to `status`
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the entry is no longer in flight or `status`
    /// is not reachable from `processing`
    pub fn mark(&self, entry_id: i64, status: QueueStatus) -> Result<()> {
        let mut storage = storage::lock(&self.storage)?;

        if storage.transition_entry(entry_id, QueueStatus::Processing, status)? {
            return Ok(());
        }

        let from = storage.get_queue_entry(entry_id)?.status;
        Err(StorageError::InvalidTransition {
            entry_id,
            from,
            to: status,
        }
        .into())
    }

    /// Records a failed attempt and reschedules or terminally fails the entry
    pub fn record_failure(
        &self,
        entry: &UrlQueueEntry,
        failure: &FetchFailure,
    ) -> Result<RetryDecision> {
        let decision = self.retry.on_failure(entry, Utc::now());

        let error = NewJobError {
            job_id: self.job_id,
            url: entry.url.clone(),
            error_type: failure.kind.as_str().to_string(),
            message: failure.message.clone(),
            status_code: failure.status_code,
            attempt: decision.attempt(),
        };

        storage::lock(&self.storage)?.record_entry_failure(entry.id, &error, decision.retry_at())?;

        match decision {
            RetryDecision::Retry { retry_at, attempt } => tracing::warn!(
                "Attempt {} for {} failed ({}), retrying at {}",
                attempt,
                entry.url,
                failure.message,
                retry_at
            ),
            RetryDecision::Terminal { attempt } => tracing::warn!(
                "Giving up on {} after {} attempts: {}",
                entry.url,
                attempt,
                failure.message
            ),
        }

        Ok(decision)
    }

    /// Pending (including scheduled retries) and in-flight counts
    pub fn depth(&self) -> Result<QueueDepth> {
        let depth = storage::lock(&self.storage)?.queue_depth(self.job_id)?;
        Ok(depth)
    }

    fn release_stale(&self, storage: &mut impl Storage, now: DateTime<Utc>) -> Result<()> {
        let released = storage.release_stale_claims(self.job_id, now - self.claim_lease)?;
        if released > 0 {
            tracing::warn!(
                "Released {} entries of job {} claimed more than {}s ago",
                released,
                self.job_id,
                self.claim_lease.num_seconds()
            );
        }
        Ok(())
    }

    fn count(&self, delta: &JobDelta) -> Result<()> {
        storage::lock(&self.storage)?.apply_job_delta(self.job_id, delta)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::retry::FailureKind;
    use crate::storage::{share, SqliteStorage};

    fn config() -> JobConfig {
        JobConfig {
            start_urls: vec!["https://example.com/".to_string()],
            allowed_domains: vec!["example.com".to_string()],
            max_depth: 2,
            concurrent_requests: 4,
            delay_between_requests: 0,
            timeout: 5,
            retry_attempts: 2,
            retry_delay: 60_000,
            poll_interval: 10,
            respect_robots_txt: false,
            download_images: false,
            excluded_patterns: vec![r"/admin/".to_string(), r"\?print=1$".to_string()],
            user_agent: "TestBot/1.0".to_string(),
            crawler_name: "TestBot".to_string(),
        }
    }

    fn frontier() -> (Frontier, SharedStorage) {
        let storage = share(SqliteStorage::new_in_memory().unwrap());
        let job_id = storage::lock(&storage)
            .unwrap()
            .create_job("harvest_test", &config(), "hash")
            .unwrap();
        let frontier = Frontier::new(storage.clone(), job_id, &config(), Client::new()).unwrap();
        (frontier, storage)
    }

    fn statistics(storage: &SharedStorage, job_id: i64) -> crate::job::JobStatistics {
        storage::lock(storage).unwrap().get_job(job_id).unwrap().statistics
    }

    #[tokio::test]
    async fn test_admit_deduplicates_normalized_urls() {
        let (frontier, storage) = frontier();

        assert!(frontier
            .admit("https://Example.com/docs/", 0, SEED_PRIORITY, None, DiscoveryMethod::Seed)
            .await
            .unwrap());
        assert!(!frontier
            .admit(
                "https://example.com/docs#intro",
                1,
                DISCOVERED_PRIORITY,
                Some("https://example.com/"),
                DiscoveryMethod::Link
            )
            .await
            .unwrap());

        let stats = statistics(&storage, frontier.job_id());
        assert_eq!(stats.total_urls_discovered, 1);
        assert_eq!(stats.duplicate_urls, 1);
        assert_eq!(frontier.depth().unwrap().pending, 1);
    }

    #[tokio::test]
    async fn test_admit_applies_exclusions() {
        let (frontier, storage) = frontier();

        for url in [
            "https://example.com/admin/users",
            "https://example.com/docs?print=1",
        ] {
            assert!(!frontier
                .admit(url, 1, DISCOVERED_PRIORITY, None, DiscoveryMethod::Link)
                .await
                .unwrap());
        }

        let stats = statistics(&storage, frontier.job_id());
        assert_eq!(stats.total_urls_discovered, 0);
        assert_eq!(stats.duplicate_urls, 0);
        assert!(frontier.depth().unwrap().is_drained());
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let storage = share(SqliteStorage::new_in_memory().unwrap());
        let mut bad = config();
        bad.excluded_patterns = vec!["(unclosed".to_string()];

        let result = Frontier::new(storage, 1, &bad, Client::new());
        assert!(matches!(
            result,
            Err(crate::HarvestError::Config(ConfigError::InvalidPattern(_)))
        ));
    }

    #[tokio::test]
    async fn test_claim_mark_and_fail() {
        let (frontier, storage) = frontier();
        for url in ["https://example.com/a", "https://example.com/b"] {
            frontier
                .admit(url, 0, SEED_PRIORITY, None, DiscoveryMethod::Seed)
                .await
                .unwrap();
        }

        let batch = frontier.take_batch(10).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(frontier.take_batch(10).unwrap().is_empty());

        frontier.mark(batch[0].id, QueueStatus::Completed).unwrap();
        // completed entries are not in flight anymore
        assert!(frontier.mark(batch[0].id, QueueStatus::Skipped).is_err());

        let failure = FetchFailure::http(503);
        let decision = frontier.record_failure(&batch[1], &failure).unwrap();
        assert!(matches!(decision, RetryDecision::Retry { attempt: 1, .. }));
        assert_eq!(frontier.depth().unwrap().pending, 1);

        // force the retry to be due now
        storage::lock(&storage)
            .unwrap()
            .claim_entry(batch[1].id, Utc::now() + Duration::minutes(5))
            .unwrap()
            .unwrap();
        let retried = storage::lock(&storage).unwrap().get_queue_entry(batch[1].id).unwrap();
        let decision = frontier.record_failure(&retried, &failure).unwrap();
        assert_eq!(decision, RetryDecision::Terminal { attempt: 2 });

        let errors = storage::lock(&storage)
            .unwrap()
            .list_job_errors(frontier.job_id())
            .unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].error_type, FailureKind::HttpError.as_str());
        assert_eq!(errors[1].attempt, 2);
        assert_eq!(statistics(&storage, frontier.job_id()).failed_urls, 1);
        assert!(frontier.depth().unwrap().is_drained());
    }

    #[tokio::test]
    async fn test_abandoned_claim_is_taken_over() {
        let (frontier, storage) = frontier();
        frontier
            .admit("https://example.com/", 0, SEED_PRIORITY, None, DiscoveryMethod::Seed)
            .await
            .unwrap();

        // a worker that claimed the seed an hour ago and never settled it
        let abandoned = storage::lock(&storage)
            .unwrap()
            .claim_batch(frontier.job_id(), 1, Utc::now() - Duration::hours(1))
            .unwrap()
            .remove(0);
        assert_eq!(frontier.depth().unwrap().in_flight, 1);

        let batch = frontier.take_batch(10).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, abandoned.id);
        assert_eq!(batch[0].attempts, 0);

        frontier.mark(batch[0].id, QueueStatus::Completed).unwrap();
        assert!(frontier.depth().unwrap().is_drained());
    }

    #[tokio::test]
    async fn test_fresh_claim_is_not_taken_over() {
        let (frontier, _) = frontier();
        frontier
            .admit("https://example.com/", 0, SEED_PRIORITY, None, DiscoveryMethod::Seed)
            .await
            .unwrap();
        let id = frontier.take_batch(1).unwrap()[0].id;

        assert!(frontier.take_batch(10).unwrap().is_empty());
        assert!(frontier.claim(id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_single_entry() {
        let (frontier, _) = frontier();
        frontier
            .admit("https://example.com/", 0, SEED_PRIORITY, None, DiscoveryMethod::Seed)
            .await
            .unwrap();
        let id = frontier.take_batch(1).unwrap()[0].id;

        // already in flight
        assert!(frontier.claim(id).unwrap().is_none());
    }
}
