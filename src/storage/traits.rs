//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::extract::{Link, Page};
use crate::job::{JobConfig, JobDelta};
use crate::state::{JobStatus, QueueStatus};
use crate::storage::{
    ContentStatistics, JobErrorRecord, JobRecord, NewJobError, NewQueueEntry, PageRecord,
    QueueDepth, SearchQuery, SearchResults, SectionSummary, UrlQueueEntry,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Queue entry not found: {0}")]
    EntryNotFound(i64),

    #[error("Invalid queue transition for entry {entry_id}: {from} -> {to}")]
    InvalidTransition {
        entry_id: i64,
        from: QueueStatus,
        to: QueueStatus,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the harvester.
/// Every method that changes more than one row does so in a single
/// transaction, so several processes may share one database.
pub trait Storage {
    // ===== Job Management =====

    /// Creates a new job in the `running` state
    ///
    /// # Returns
    ///
    /// The ID of the newly created job
    fn create_job(&mut self, name: &str, config: &JobConfig, config_hash: &str)
        -> StorageResult<i64>;

    /// Gets a job by ID
    fn get_job(&self, job_id: i64) -> StorageResult<JobRecord>;

    /// Lists jobs, most recently started first
    fn list_jobs(&self, limit: u32) -> StorageResult<Vec<JobRecord>>;

    /// Moves a job to `to` if its current status is one of `from`
    ///
    /// Terminal statuses also stamp the end time.
    ///
    /// # Returns
    ///
    /// `true` if the status changed, `false` if the job was in another status
    fn set_job_status(
        &mut self,
        job_id: i64,
        from: &[JobStatus],
        to: JobStatus,
    ) -> StorageResult<bool>;

    /// Adds `delta` to the job counters and refreshes its progress fields
    fn apply_job_delta(&mut self, job_id: i64, delta: &JobDelta) -> StorageResult<()>;

    /// Recomputes queue depth, in-flight count and percentage complete
    fn refresh_job_progress(&mut self, job_id: i64) -> StorageResult<()>;

    // ===== Error Log =====

    /// Appends to a job's error log
    fn append_job_error(&mut self, error: &NewJobError) -> StorageResult<i64>;

    /// Gets a job's error log, oldest first
    fn list_job_errors(&self, job_id: i64) -> StorageResult<Vec<JobErrorRecord>>;

    // ===== Frontier =====

    /// Checks whether a normalized URL is already queued for a job
    fn queue_contains(&self, job_id: i64, normalized_url: &str) -> StorageResult<bool>;

    /// Inserts a pending entry
    ///
    /// # Returns
    ///
    /// `false` if the (normalized URL, job) pair already exists
    fn insert_queue_entry(&mut self, entry: &NewQueueEntry) -> StorageResult<bool>;

    /// Atomically claims up to `max` claimable entries of a job
    ///
    /// Pending entries and failed entries whose retry time is at or before
    /// `now` are eligible, lowest priority value first, then oldest.
    /// Entries another process claimed first are not returned.
    fn claim_batch(
        &mut self,
        job_id: i64,
        max: u32,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<UrlQueueEntry>>;

    /// Claims a single entry by ID
    ///
    /// # Returns
    ///
    /// `None` if the entry is not claimable at `now`
    fn claim_entry(&mut self, entry_id: i64, now: DateTime<Utc>)
        -> StorageResult<Option<UrlQueueEntry>>;

    /// Returns a job's in-flight entries claimed at or before `claimed_before` to `pending`
    ///
    /// A claim that old belongs to a worker that died or lost its database
    /// connection mid-fetch. Attempts are left unchanged.
    ///
    /// # Returns
    ///
    /// The number of entries released
    fn release_stale_claims(
        &mut self,
        job_id: i64,
        claimed_before: DateTime<Utc>,
    ) -> StorageResult<u64>;

    /// Gets a queue entry by ID
    fn get_queue_entry(&self, entry_id: i64) -> StorageResult<UrlQueueEntry>;

    /// Moves an entry from `from` to `to`
    ///
    /// # Returns
    ///
    /// `false` if the entry was not in `from`
    fn transition_entry(
        &mut self,
        entry_id: i64,
        from: QueueStatus,
        to: QueueStatus,
    ) -> StorageResult<bool>;

    /// Records a failed attempt of an in-flight entry in one transaction
    ///
    /// Appends `error` to the job log and moves the entry to `failed`.
    /// With `retry_at` the entry is rescheduled; without it the failure is
    /// terminal and the job's failed and processed counters grow by one.
    fn record_entry_failure(
        &mut self,
        entry_id: i64,
        error: &NewJobError,
        retry_at: Option<DateTime<Utc>>,
    ) -> StorageResult<()>;

    /// Pending (including scheduled retries) and in-flight counts of a job
    fn queue_depth(&self, job_id: i64) -> StorageResult<QueueDepth>;

    /// Counts a job's entries in `status`
    fn count_entries(&self, job_id: i64, status: QueueStatus) -> StorageResult<u64>;

    // ===== Cleanup =====

    /// Deletes completed, skipped and terminally failed entries discovered before `cutoff`
    fn delete_terminal_entries_before(&mut self, cutoff: DateTime<Utc>) -> StorageResult<u64>;

    /// Deletes error log rows older than `cutoff`
    fn delete_job_errors_before(&mut self, cutoff: DateTime<Utc>) -> StorageResult<u64>;

    // ===== Pages =====

    /// Inserts a page, or replaces the page with the same URL and bumps its version
    ///
    /// # Returns
    ///
    /// The page ID
    fn upsert_page(&mut self, page: &Page) -> StorageResult<i64>;

    /// Gets a page by ID
    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord>;

    /// Gets a page by URL
    fn get_page_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Replaces the links of a page's structured document
    fn update_page_links(&mut self, page_id: i64, links: &[Link]) -> StorageResult<()>;

    // ===== Read-side Queries =====

    /// Keyword search with section, subsection and quality filters
    fn search_pages(&self, query: &SearchQuery) -> StorageResult<SearchResults>;

    /// Page count and average quality per section/subsection
    fn site_structure(&self) -> StorageResult<Vec<SectionSummary>>;

    /// Corpus-wide content statistics
    fn content_statistics(&self) -> StorageResult<ContentStatistics>;
}
