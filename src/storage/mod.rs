//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Crawl job records, statistics and the append-only error log
//! - The shared URL frontier and its atomic claiming
//! - Harvested pages and the full-text index over them
//! - Read-side queries (search, site structure, content statistics)

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::extract::{Page, PageType};
use crate::job::{JobConfig, JobProgress, JobStatistics};
use crate::state::{JobStatus, QueueStatus};
use crate::HarvestError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// One connection shared by every task of a process
///
/// Never hold the guard across an `.await`.
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Wraps a storage for sharing between tasks
pub fn share(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks shared storage, mapping a poisoned lock to a storage error
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Formats a timestamp the way every table stores it
///
/// Fixed-width RFC 3339 with microseconds, so string comparison in SQL
/// orders timestamps correctly.
pub fn db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Represents a crawl job in the database
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: i64,
    pub name: String,
    pub job_type: String,
    pub status: JobStatus,
    pub start_time: String,
    pub end_time: Option<String>,
    pub config: JobConfig,
    pub config_hash: String,
    pub statistics: JobStatistics,
    pub progress: JobProgress,
}

/// Represents one entry of the URL frontier
#[derive(Debug, Clone, PartialEq)]
pub struct UrlQueueEntry {
    pub id: i64,
    pub job_id: i64,
    pub url: String,
    pub normalized_url: String,
    pub status: QueueStatus,
    /// Lower is taken first
    pub priority: u32,
    pub discovered_at: String,
    pub parent_url: Option<String>,
    pub depth: u32,
    pub attempts: u32,
    pub next_retry_at: Option<String>,
    pub discovery_method: String,
    /// When the entry was last claimed by a worker
    pub claimed_at: Option<String>,
}

/// A frontier entry about to be inserted
#[derive(Debug, Clone)]
pub struct NewQueueEntry {
    pub job_id: i64,
    pub url: String,
    pub normalized_url: String,
    pub priority: u32,
    pub parent_url: Option<String>,
    pub depth: u32,
    pub discovery_method: String,
}

/// One row of a job's error log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobErrorRecord {
    pub id: i64,
    pub job_id: i64,
    pub url: String,
    pub error_type: String,
    pub message: String,
    pub status_code: Option<u16>,
    pub timestamp: String,
    pub attempt: u32,
}

/// An error about to be appended to a job's log
#[derive(Debug, Clone)]
pub struct NewJobError {
    pub job_id: i64,
    pub url: String,
    pub error_type: String,
    pub message: String,
    pub status_code: Option<u16>,
    pub attempt: u32,
}

/// Represents a stored page
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub page: Page,
}

/// Pending and in-flight frontier counts for one job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    /// Pending entries plus failed entries with a retry scheduled
    pub pending: u64,
    pub in_flight: u64,
}

impl QueueDepth {
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.in_flight == 0
    }
}

/// Filters and pagination for page search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Keywords matched against title, clean text and keywords
    pub text: Option<String>,
    pub section: Option<String>,
    pub subsection: Option<String>,
    pub min_quality: Option<u32>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: None,
            section: None,
            subsection: None,
            min_quality: None,
            limit: 20,
            offset: 0,
        }
    }
}

/// A page as listed in search results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub section: Option<String>,
    pub subsection: Option<String>,
    pub page_type: PageType,
    pub quality_score: u32,
    pub word_count: u32,
    pub scraped_at: String,
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    /// Matches before pagination
    pub total: u64,
    pub pages: Vec<PageSummary>,
}

/// Page count and average quality of one section/subsection pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionSummary {
    pub section: Option<String>,
    pub subsection: Option<String>,
    pub page_count: u64,
    pub average_quality: f64,
}

/// Corpus-wide content statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentStatistics {
    pub total_pages: u64,
    pub total_words: u64,
    pub average_quality: f64,
    pub average_reading_time: f64,
    /// Page count per page type, most common first
    pub page_types: Vec<(String, u64)>,
    /// Page count per language, most common first
    pub languages: Vec<(String, u64)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_db_timestamp_is_fixed_width() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let later = early + chrono::Duration::microseconds(1);

        assert_eq!(db_timestamp(early), "2024-01-02T03:04:05.000000Z");
        assert!(db_timestamp(early) < db_timestamp(later));
    }

    #[test]
    fn test_queue_depth_drained() {
        assert!(QueueDepth::default().is_drained());
        assert!(!QueueDepth { pending: 1, in_flight: 0 }.is_drained());
        assert!(!QueueDepth { pending: 0, in_flight: 2 }.is_drained());
    }
}
