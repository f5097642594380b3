//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! Claiming runs inside `BEGIN IMMEDIATE` transactions with conditional
//! updates, so independent worker processes can share one database file.

use crate::extract::{Link, Page, PageContent, PageMetadata, PageType, SearchFields};
use crate::job::{JobConfig, JobDelta, JobProgress, JobStatistics, FULL_CRAWL};
use crate::state::{JobStatus, QueueStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    db_timestamp, ContentStatistics, JobErrorRecord, JobRecord, NewJobError, NewQueueEntry,
    PageRecord, PageSummary, QueueDepth, SearchQuery, SearchResults, SectionSummary,
    UrlQueueEntry,
};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior,
};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;

/// How long a connection waits for another process's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const JOB_COLUMNS: &str = "id, name, job_type, status, start_time, end_time, config, config_hash,
     total_urls_discovered, total_urls_processed, successfully_scraped, failed_urls,
     duplicate_urls, total_bytes, urls_in_queue, urls_processing, percentage_complete";

const QUEUE_COLUMNS: &str = "id, job_id, url, normalized_url, status, priority, discovered_at,
     parent_url, depth, attempts, next_retry_at, discovery_method, claimed_at";

const PAGE_COLUMNS: &str = "id, url, title, raw_html, clean_text, structured, content_hash,
     word_count, reading_time, scraped_at, last_updated, last_modified, etag, scraping_job_id,
     response_time, status_code, content_length, language, charset, navigation, seo,
     searchable_text, keywords, tags, categories, status, version, quality_score, accessibility";

/// Entries still owed a fetch: pending, or failed with a retry scheduled
const QUEUED: &str = "(status = 'pending' OR (status = 'failed' AND next_retry_at IS NOT NULL))";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl Storage for SqliteStorage {
    // ===== Job Management =====

    fn create_job(
        &mut self,
        name: &str,
        config: &JobConfig,
        config_hash: &str,
    ) -> StorageResult<i64> {
        let config_json = serde_json::to_string(config)?;
        self.conn.execute(
            "INSERT INTO crawl_jobs (name, job_type, status, start_time, config, config_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                name,
                FULL_CRAWL,
                JobStatus::Running.to_db_string(),
                db_timestamp(Utc::now()),
                config_json,
                config_hash
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_job(&self, job_id: i64) -> StorageResult<JobRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM crawl_jobs WHERE id = ?1", JOB_COLUMNS),
                params![job_id],
                row_to_job,
            )
            .optional()?
            .ok_or(StorageError::JobNotFound(job_id))
    }

    fn list_jobs(&self, limit: u32) -> StorageResult<Vec<JobRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM crawl_jobs ORDER BY start_time DESC, id DESC LIMIT ?1",
            JOB_COLUMNS
        ))?;

        let jobs = stmt
            .query_map(params![limit], row_to_job)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(jobs)
    }

    fn set_job_status(
        &mut self,
        job_id: i64,
        from: &[JobStatus],
        to: JobStatus,
    ) -> StorageResult<bool> {
        if from.is_empty() {
            return Ok(false);
        }

        let placeholders = (0..from.len())
            .map(|i| format!("?{}", i + 4))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE crawl_jobs SET status = ?1, end_time = ?2 WHERE id = ?3 AND status IN ({})",
            placeholders
        );

        let end_time = if to.is_terminal() {
            Value::Text(db_timestamp(Utc::now()))
        } else {
            Value::Null
        };
        let mut values = vec![
            Value::Text(to.to_db_string().to_string()),
            end_time,
            Value::Integer(job_id),
        ];
        values.extend(
            from.iter()
                .map(|status| Value::Text(status.to_db_string().to_string())),
        );

        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(changed == 1)
    }

    fn apply_job_delta(&mut self, job_id: i64, delta: &JobDelta) -> StorageResult<()> {
        apply_delta(&self.conn, job_id, delta)
    }

    fn refresh_job_progress(&mut self, job_id: i64) -> StorageResult<()> {
        apply_delta(&self.conn, job_id, &JobDelta::default())
    }

    // ===== Error Log =====

    fn append_job_error(&mut self, error: &NewJobError) -> StorageResult<i64> {
        insert_job_error(&self.conn, error)
    }

    fn list_job_errors(&self, job_id: i64) -> StorageResult<Vec<JobErrorRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, job_id, url, error_type, message, status_code, timestamp, attempt
             FROM job_errors WHERE job_id = ?1 ORDER BY id ASC",
        )?;

        let errors = stmt
            .query_map(params![job_id], |row| {
                Ok(JobErrorRecord {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    url: row.get(2)?,
                    error_type: row.get(3)?,
                    message: row.get(4)?,
                    status_code: row.get(5)?,
                    timestamp: row.get(6)?,
                    attempt: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(errors)
    }

    // ===== Frontier =====

    fn queue_contains(&self, job_id: i64, normalized_url: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM url_queue WHERE job_id = ?1 AND normalized_url = ?2",
                params![job_id, normalized_url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_queue_entry(&mut self, entry: &NewQueueEntry) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO url_queue
             (job_id, url, normalized_url, status, priority, discovered_at, parent_url, depth,
              attempts, discovery_method)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)
             ON CONFLICT(normalized_url, job_id) DO NOTHING",
            params![
                entry.job_id,
                entry.url,
                entry.normalized_url,
                QueueStatus::Pending.to_db_string(),
                entry.priority,
                db_timestamp(Utc::now()),
                entry.parent_url,
                entry.depth,
                entry.discovery_method
            ],
        )?;
        Ok(inserted == 1)
    }

    fn claim_batch(
        &mut self,
        job_id: i64,
        max: u32,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<UrlQueueEntry>> {
        let now = db_timestamp(now);
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let candidates = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM url_queue
                 WHERE job_id = ?1
                   AND (status = 'pending'
                        OR (status = 'failed' AND next_retry_at IS NOT NULL AND next_retry_at <= ?2))
                 ORDER BY priority ASC, discovered_at ASC, id ASC
                 LIMIT ?3",
                QUEUE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![job_id, now, max], row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut claimed = Vec::with_capacity(candidates.len());
        for entry in candidates {
            if claim_row(&tx, &entry, &now)? {
                claimed.push(into_processing(entry, &now));
            }
        }

        tx.commit()?;
        Ok(claimed)
    }

    fn claim_entry(
        &mut self,
        entry_id: i64,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<UrlQueueEntry>> {
        let now = db_timestamp(now);
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let candidate = tx
            .query_row(
                &format!(
                    "SELECT {} FROM url_queue
                     WHERE id = ?1
                       AND (status = 'pending'
                            OR (status = 'failed' AND next_retry_at IS NOT NULL AND next_retry_at <= ?2))",
                    QUEUE_COLUMNS
                ),
                params![entry_id, now],
                row_to_entry,
            )
            .optional()?;

        let claimed = match candidate {
            Some(entry) if claim_row(&tx, &entry, &now)? => Some(into_processing(entry, &now)),
            _ => None,
        };

        tx.commit()?;
        Ok(claimed)
    }

    fn release_stale_claims(
        &mut self,
        job_id: i64,
        claimed_before: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let released = self.conn.execute(
            "UPDATE url_queue SET status = ?1, claimed_at = NULL
             WHERE job_id = ?2 AND status = ?3
               AND (claimed_at IS NULL OR claimed_at <= ?4)",
            params![
                QueueStatus::Pending.to_db_string(),
                job_id,
                QueueStatus::Processing.to_db_string(),
                db_timestamp(claimed_before)
            ],
        )?;
        Ok(released as u64)
    }

    fn get_queue_entry(&self, entry_id: i64) -> StorageResult<UrlQueueEntry> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM url_queue WHERE id = ?1", QUEUE_COLUMNS),
                params![entry_id],
                row_to_entry,
            )
            .optional()?
            .ok_or(StorageError::EntryNotFound(entry_id))
    }

    fn transition_entry(
        &mut self,
        entry_id: i64,
        from: QueueStatus,
        to: QueueStatus,
    ) -> StorageResult<bool> {
        if !from.can_transition_to(to) {
            return Err(StorageError::InvalidTransition { entry_id, from, to });
        }

        let changed = self.conn.execute(
            "UPDATE url_queue SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![to.to_db_string(), entry_id, from.to_db_string()],
        )?;
        Ok(changed == 1)
    }

    fn record_entry_failure(
        &mut self,
        entry_id: i64,
        error: &NewJobError,
        retry_at: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE url_queue SET status = ?1, attempts = ?2, next_retry_at = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                QueueStatus::Failed.to_db_string(),
                error.attempt,
                retry_at.map(db_timestamp),
                entry_id,
                QueueStatus::Processing.to_db_string()
            ],
        )?;

        if changed == 0 {
            let current: Option<String> = tx
                .query_row(
                    "SELECT status FROM url_queue WHERE id = ?1",
                    params![entry_id],
                    |row| row.get(0),
                )
                .optional()?;
            let from = current
                .as_deref()
                .and_then(QueueStatus::from_db_string)
                .ok_or(StorageError::EntryNotFound(entry_id))?;
            return Err(StorageError::InvalidTransition {
                entry_id,
                from,
                to: QueueStatus::Failed,
            });
        }

        insert_job_error(&tx, error)?;

        let delta = if retry_at.is_some() {
            JobDelta::default()
        } else {
            JobDelta::failed()
        };
        apply_delta(&tx, error.job_id, &delta)?;

        tx.commit()?;
        Ok(())
    }

    fn queue_depth(&self, job_id: i64) -> StorageResult<QueueDepth> {
        let (pending, in_flight): (i64, i64) = self.conn.query_row(
            &format!(
                "SELECT
                    COALESCE(SUM(CASE WHEN {} THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'processing' THEN 1 ELSE 0 END), 0)
                 FROM url_queue WHERE job_id = ?1",
                QUEUED
            ),
            params![job_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(QueueDepth {
            pending: pending as u64,
            in_flight: in_flight as u64,
        })
    }

    fn count_entries(&self, job_id: i64, status: QueueStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM url_queue WHERE job_id = ?1 AND status = ?2",
            params![job_id, status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Cleanup =====

    fn delete_terminal_entries_before(&mut self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let deleted = self.conn.execute(
            "DELETE FROM url_queue
             WHERE discovered_at < ?1
               AND (status IN ('completed', 'skipped')
                    OR (status = 'failed' AND next_retry_at IS NULL))",
            params![db_timestamp(cutoff)],
        )?;
        Ok(deleted as u64)
    }

    fn delete_job_errors_before(&mut self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let deleted = self.conn.execute(
            "DELETE FROM job_errors WHERE timestamp < ?1",
            params![db_timestamp(cutoff)],
        )?;
        Ok(deleted as u64)
    }

    // ===== Pages =====

    fn upsert_page(&mut self, page: &Page) -> StorageResult<i64> {
        let structured = serde_json::to_string(&page.content.structured)?;
        let navigation = serde_json::to_string(&page.navigation)?;
        let seo = serde_json::to_string(&page.seo)?;
        let keywords = serde_json::to_string(&page.search.keywords)?;
        let tags = serde_json::to_string(&page.search.tags)?;
        let categories = serde_json::to_string(&page.search.categories)?;
        let accessibility = serde_json::to_string(&page.accessibility)?;

        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO pages
             (url, title, raw_html, clean_text, structured, content_hash, word_count,
              reading_time, scraped_at, last_updated, last_modified, etag, scraping_job_id,
              response_time, status_code, content_length, language, charset, navigation,
              section, subsection, page_type, seo, searchable_text, keywords, tags, categories,
              status, version, quality_score, accessibility)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31)
             ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                raw_html = excluded.raw_html,
                clean_text = excluded.clean_text,
                structured = excluded.structured,
                content_hash = excluded.content_hash,
                word_count = excluded.word_count,
                reading_time = excluded.reading_time,
                scraped_at = excluded.scraped_at,
                last_updated = excluded.last_updated,
                last_modified = excluded.last_modified,
                etag = excluded.etag,
                scraping_job_id = excluded.scraping_job_id,
                response_time = excluded.response_time,
                status_code = excluded.status_code,
                content_length = excluded.content_length,
                language = excluded.language,
                charset = excluded.charset,
                navigation = excluded.navigation,
                section = excluded.section,
                subsection = excluded.subsection,
                page_type = excluded.page_type,
                seo = excluded.seo,
                searchable_text = excluded.searchable_text,
                keywords = excluded.keywords,
                tags = excluded.tags,
                categories = excluded.categories,
                status = excluded.status,
                version = pages.version + 1,
                quality_score = excluded.quality_score,
                accessibility = excluded.accessibility",
            params![
                page.url,
                page.title,
                page.content.raw_html,
                page.content.clean_text,
                structured,
                page.content.content_hash,
                page.content.word_count,
                page.content.reading_time,
                db_timestamp(page.metadata.scraped_at),
                db_timestamp(page.metadata.last_updated),
                page.metadata.last_modified,
                page.metadata.etag,
                page.metadata.scraping_job_id,
                page.metadata.response_time,
                page.metadata.status_code,
                page.metadata.content_length as i64,
                page.metadata.language,
                page.metadata.charset,
                navigation,
                page.navigation.section,
                page.navigation.subsection,
                page.navigation.page_type.as_str(),
                seo,
                page.search.searchable_text,
                keywords,
                tags,
                categories,
                page.status,
                page.version,
                page.quality_score,
                accessibility
            ],
        )?;

        let page_id: i64 = tx.query_row(
            "SELECT id FROM pages WHERE url = ?1",
            params![page.url],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM pages_fts WHERE rowid = ?1", params![page_id])?;
        tx.execute(
            "INSERT INTO pages_fts (rowid, title, clean_text, keywords) VALUES (?1, ?2, ?3, ?4)",
            params![
                page_id,
                page.title,
                page.content.clean_text,
                page.search.keywords.join(" ")
            ],
        )?;

        tx.commit()?;
        Ok(page_id)
    }

    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS),
                params![page_id],
                row_to_page,
            )
            .optional()?
            .ok_or_else(|| StorageError::PageNotFound(format!("Page ID {}", page_id)))
    }

    fn get_page_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let page = self
            .conn
            .query_row(
                &format!("SELECT {} FROM pages WHERE url = ?1", PAGE_COLUMNS),
                params![url],
                row_to_page,
            )
            .optional()?;
        Ok(page)
    }

    fn update_page_links(&mut self, page_id: i64, links: &[Link]) -> StorageResult<()> {
        let mut record = self.get_page(page_id)?;
        record.page.content.structured.links = links.to_vec();
        let structured = serde_json::to_string(&record.page.content.structured)?;

        self.conn.execute(
            "UPDATE pages SET structured = ?1, last_updated = ?2 WHERE id = ?3",
            params![structured, db_timestamp(Utc::now()), page_id],
        )?;
        Ok(())
    }

    // ===== Read-side Queries =====

    fn search_pages(&self, query: &SearchQuery) -> StorageResult<SearchResults> {
        let mut conditions: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(text) = query.text.as_deref().map(fts_query).filter(|q| !q.is_empty()) {
            values.push(Value::Text(text));
            conditions.push(format!(
                "id IN (SELECT rowid FROM pages_fts WHERE pages_fts MATCH ?{})",
                values.len()
            ));
        }
        if let Some(section) = &query.section {
            values.push(Value::Text(section.clone()));
            conditions.push(format!("section = ?{}", values.len()));
        }
        if let Some(subsection) = &query.subsection {
            values.push(Value::Text(subsection.clone()));
            conditions.push(format!("subsection = ?{}", values.len()));
        }
        if let Some(min_quality) = query.min_quality {
            values.push(Value::Integer(i64::from(min_quality)));
            conditions.push(format!("quality_score >= ?{}", values.len()));
        }

        let where_sql = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM pages {}", where_sql),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let limit_index = values.len() + 1;
        values.push(Value::Integer(i64::from(query.limit)));
        values.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, url, title, section, subsection, page_type, quality_score, word_count,
                    scraped_at
             FROM pages {}
             ORDER BY quality_score DESC, id ASC
             LIMIT ?{} OFFSET ?{}",
            where_sql,
            limit_index,
            limit_index + 1
        ))?;

        let pages = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(PageSummary {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    title: row.get(2)?,
                    section: row.get(3)?,
                    subsection: row.get(4)?,
                    page_type: PageType::from_db_string(&row.get::<_, String>(5)?)
                        .unwrap_or(PageType::Article),
                    quality_score: row.get(6)?,
                    word_count: row.get(7)?,
                    scraped_at: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SearchResults {
            total: total as u64,
            pages,
        })
    }

    fn site_structure(&self) -> StorageResult<Vec<SectionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT section, subsection, COUNT(*), AVG(quality_score)
             FROM pages
             GROUP BY section, subsection
             ORDER BY section, subsection",
        )?;

        let sections = stmt
            .query_map([], |row| {
                Ok(SectionSummary {
                    section: row.get(0)?,
                    subsection: row.get(1)?,
                    page_count: row.get::<_, i64>(2)? as u64,
                    average_quality: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sections)
    }

    fn content_statistics(&self) -> StorageResult<ContentStatistics> {
        let (total_pages, total_words, average_quality, average_reading_time) =
            self.conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(word_count), 0),
                        COALESCE(AVG(quality_score), 0.0), COALESCE(AVG(reading_time), 0.0)
                 FROM pages",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                    ))
                },
            )?;

        Ok(ContentStatistics {
            total_pages: total_pages as u64,
            total_words: total_words as u64,
            average_quality,
            average_reading_time,
            page_types: self.count_grouped("page_type")?,
            languages: self.count_grouped("language")?,
        })
    }
}

impl SqliteStorage {
    /// Page counts grouped by one text column, most common first
    fn count_grouped(&self, column: &str) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {column}, COUNT(*) AS n FROM pages GROUP BY {column} ORDER BY n DESC, {column}"
        ))?;

        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }
}

/// Adds `delta` to a job's counters and refreshes its progress in one UPDATE
fn apply_delta(conn: &Connection, job_id: i64, delta: &JobDelta) -> StorageResult<()> {
    let changed = conn.execute(
        &format!(
            "UPDATE crawl_jobs SET
                total_urls_discovered = total_urls_discovered + ?1,
                total_urls_processed = total_urls_processed + ?2,
                successfully_scraped = successfully_scraped + ?3,
                failed_urls = failed_urls + ?4,
                duplicate_urls = duplicate_urls + ?5,
                total_bytes = total_bytes + ?6,
                percentage_complete = 100.0 * (total_urls_processed + ?2)
                    / MAX(1, total_urls_discovered + ?1),
                urls_in_queue = (SELECT COUNT(*) FROM url_queue WHERE job_id = ?7 AND {}),
                urls_processing = (SELECT COUNT(*) FROM url_queue
                                   WHERE job_id = ?7 AND status = 'processing')
             WHERE id = ?7",
            QUEUED
        ),
        params![
            delta.discovered as i64,
            delta.processed as i64,
            delta.succeeded as i64,
            delta.failed as i64,
            delta.duplicates as i64,
            delta.bytes as i64,
            job_id
        ],
    )?;

    if changed == 0 {
        return Err(StorageError::JobNotFound(job_id));
    }
    Ok(())
}

fn insert_job_error(conn: &Connection, error: &NewJobError) -> StorageResult<i64> {
    conn.execute(
        "INSERT INTO job_errors (job_id, url, error_type, message, status_code, timestamp, attempt)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            error.job_id,
            error.url,
            error.error_type,
            error.message,
            error.status_code,
            db_timestamp(Utc::now()),
            error.attempt
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Flips one claimable row to processing; false if another worker got there first
fn claim_row(conn: &Connection, entry: &UrlQueueEntry, now: &str) -> StorageResult<bool> {
    let changed = conn.execute(
        "UPDATE url_queue SET status = ?1, next_retry_at = NULL, claimed_at = ?2
         WHERE id = ?3 AND status = ?4",
        params![
            QueueStatus::Processing.to_db_string(),
            now,
            entry.id,
            entry.status.to_db_string()
        ],
    )?;
    Ok(changed == 1)
}

fn into_processing(mut entry: UrlQueueEntry, now: &str) -> UrlQueueEntry {
    entry.status = QueueStatus::Processing;
    entry.next_retry_at = None;
    entry.claimed_at = Some(now.to_string());
    entry
}

/// Quotes every whitespace-separated term so user input is never FTS syntax
fn fts_query(text: &str) -> String {
    text.split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        job_type: row.get(2)?,
        status: JobStatus::from_db_string(&row.get::<_, String>(3)?)
            .unwrap_or(JobStatus::Failed),
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        config: json_column(row, 6)?,
        config_hash: row.get(7)?,
        statistics: JobStatistics {
            total_urls_discovered: count_column(row, 8)?,
            total_urls_processed: count_column(row, 9)?,
            successfully_scraped: count_column(row, 10)?,
            failed_urls: count_column(row, 11)?,
            duplicate_urls: count_column(row, 12)?,
            total_bytes: count_column(row, 13)?,
        },
        progress: JobProgress {
            urls_in_queue: count_column(row, 14)?,
            urls_processing: count_column(row, 15)?,
            percentage_complete: row.get(16)?,
        },
    })
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<UrlQueueEntry> {
    Ok(UrlQueueEntry {
        id: row.get(0)?,
        job_id: row.get(1)?,
        url: row.get(2)?,
        normalized_url: row.get(3)?,
        status: QueueStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(QueueStatus::Failed),
        priority: row.get(5)?,
        discovered_at: row.get(6)?,
        parent_url: row.get(7)?,
        depth: row.get(8)?,
        attempts: row.get(9)?,
        next_retry_at: row.get(10)?,
        discovery_method: row.get(11)?,
        claimed_at: row.get(12)?,
    })
}

fn row_to_page(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        page: Page {
            url: row.get(1)?,
            title: row.get(2)?,
            content: PageContent {
                raw_html: row.get(3)?,
                clean_text: row.get(4)?,
                structured: json_column(row, 5)?,
                content_hash: row.get(6)?,
                word_count: row.get(7)?,
                reading_time: row.get(8)?,
            },
            metadata: PageMetadata {
                scraped_at: timestamp_column(row, 9)?,
                last_updated: timestamp_column(row, 10)?,
                last_modified: row.get(11)?,
                etag: row.get(12)?,
                scraping_job_id: row.get(13)?,
                response_time: row.get(14)?,
                status_code: row.get(15)?,
                content_length: count_column(row, 16)?,
                language: row.get(17)?,
                charset: row.get(18)?,
            },
            navigation: json_column(row, 19)?,
            seo: json_column(row, 20)?,
            search: SearchFields {
                searchable_text: row.get(21)?,
                keywords: json_column(row, 22)?,
                tags: json_column(row, 23)?,
                categories: json_column(row, 24)?,
            },
            status: row.get(25)?,
            version: row.get(26)?,
            quality_score: row.get(27)?,
            accessibility: json_column(row, 28)?,
        },
    })
}

fn count_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, i64>(idx)?.max(0) as u64)
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract, LinkStatus, ResponseInfo};
    use std::collections::HashSet;
    use std::sync::{Arc, Barrier};
    use url::Url;

    fn job_config() -> JobConfig {
        JobConfig {
            start_urls: vec!["https://example.com/".to_string()],
            allowed_domains: vec!["example.com".to_string()],
            max_depth: 2,
            concurrent_requests: 4,
            delay_between_requests: 0,
            timeout: 5,
            retry_attempts: 3,
            retry_delay: 10_000,
            poll_interval: 100,
            respect_robots_txt: false,
            download_images: false,
            excluded_patterns: vec![],
            user_agent: "TestBot/1.0".to_string(),
            crawler_name: "TestBot".to_string(),
        }
    }

    fn storage_with_job() -> (SqliteStorage, i64) {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let job_id = storage.create_job("harvest_test", &job_config(), "hash").unwrap();
        (storage, job_id)
    }

    fn new_entry(job_id: i64, url: &str, priority: u32) -> NewQueueEntry {
        NewQueueEntry {
            job_id,
            url: url.to_string(),
            normalized_url: crate::url::normalize(url),
            priority,
            parent_url: None,
            depth: 0,
            discovery_method: "seed".to_string(),
        }
    }

    fn error_for(job_id: i64, url: &str, attempt: u32) -> NewJobError {
        NewJobError {
            job_id,
            url: url.to_string(),
            error_type: "http_error".to_string(),
            message: "HTTP 500".to_string(),
            status_code: Some(500),
            attempt,
        }
    }

    fn sample_page(url: &str, body: &str) -> Page {
        extract(
            body.as_bytes(),
            &Url::parse(url).unwrap(),
            &ResponseInfo {
                status_code: 200,
                content_type: Some("text/html".to_string()),
                ..ResponseInfo::default()
            },
            Duration::from_millis(10),
        )
        .unwrap()
    }

    #[test]
    fn test_create_and_get_job() {
        let (storage, job_id) = storage_with_job();
        let job = storage.get_job(job_id).unwrap();

        assert_eq!(job.name, "harvest_test");
        assert_eq!(job.job_type, FULL_CRAWL);
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.config, job_config());
        assert_eq!(job.config_hash, "hash");
        assert!(job.end_time.is_none());
        assert_eq!(job.statistics, JobStatistics::default());
    }

    #[test]
    fn test_get_missing_job() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_job(42),
            Err(StorageError::JobNotFound(42))
        ));
    }

    #[test]
    fn test_list_jobs_newest_first() {
        let (mut storage, first) = storage_with_job();
        let second = storage.create_job("harvest_two", &job_config(), "hash").unwrap();

        let ids: Vec<i64> = storage.list_jobs(10).unwrap().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert_eq!(storage.list_jobs(1).unwrap().len(), 1);
    }

    #[test]
    fn test_set_job_status_is_conditional() {
        let (mut storage, job_id) = storage_with_job();

        assert!(storage
            .set_job_status(job_id, &[JobStatus::Running], JobStatus::Paused)
            .unwrap());
        assert!(storage.get_job(job_id).unwrap().end_time.is_none());

        // already paused, so a running -> completed update does nothing
        assert!(!storage
            .set_job_status(job_id, &[JobStatus::Running], JobStatus::Completed)
            .unwrap());

        assert!(storage
            .set_job_status(job_id, &[JobStatus::Paused], JobStatus::Cancelled)
            .unwrap());
        let job = storage.get_job(job_id).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.end_time.is_some());
    }

    #[test]
    fn test_job_delta_and_percentage() {
        let (mut storage, job_id) = storage_with_job();

        for _ in 0..4 {
            storage.apply_job_delta(job_id, &JobDelta::discovered()).unwrap();
        }
        storage.apply_job_delta(job_id, &JobDelta::succeeded(100)).unwrap();
        storage.apply_job_delta(job_id, &JobDelta::duplicate()).unwrap();

        let job = storage.get_job(job_id).unwrap();
        assert_eq!(job.statistics.total_urls_discovered, 4);
        assert_eq!(job.statistics.total_urls_processed, 1);
        assert_eq!(job.statistics.successfully_scraped, 1);
        assert_eq!(job.statistics.duplicate_urls, 1);
        assert_eq!(job.statistics.total_bytes, 100);
        assert!((job.progress.percentage_complete - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentage_with_nothing_discovered() {
        let (mut storage, job_id) = storage_with_job();
        storage.refresh_job_progress(job_id).unwrap();
        assert_eq!(storage.get_job(job_id).unwrap().progress.percentage_complete, 0.0);
    }

    #[test]
    fn test_delta_for_missing_job() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.apply_job_delta(7, &JobDelta::discovered()),
            Err(StorageError::JobNotFound(7))
        ));
    }

    #[test]
    fn test_insert_queue_entry_dedup() {
        let (mut storage, job_id) = storage_with_job();
        let entry = new_entry(job_id, "https://example.com/a", 2);

        assert!(storage.insert_queue_entry(&entry).unwrap());
        assert!(!storage.insert_queue_entry(&entry).unwrap());
        assert!(storage.queue_contains(job_id, "https://example.com/a").unwrap());
        assert!(!storage.queue_contains(job_id, "https://example.com/b").unwrap());

        // same URL in another job is a separate entry
        let other = storage.create_job("harvest_other", &job_config(), "hash").unwrap();
        assert!(storage
            .insert_queue_entry(&new_entry(other, "https://example.com/a", 2))
            .unwrap());
    }

    #[test]
    fn test_claim_batch_order_and_exclusivity() {
        let (mut storage, job_id) = storage_with_job();
        storage
            .insert_queue_entry(&new_entry(job_id, "https://example.com/late", 2))
            .unwrap();
        storage
            .insert_queue_entry(&new_entry(job_id, "https://example.com/seed", 1))
            .unwrap();
        storage
            .insert_queue_entry(&new_entry(job_id, "https://example.com/later", 2))
            .unwrap();

        let first = storage.claim_batch(job_id, 2, Utc::now()).unwrap();
        let urls: Vec<&str> = first.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/seed", "https://example.com/late"]);
        assert!(first.iter().all(|e| e.status == QueueStatus::Processing));

        let second = storage.claim_batch(job_id, 10, Utc::now()).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].url, "https://example.com/later");

        assert!(storage.claim_batch(job_id, 10, Utc::now()).unwrap().is_empty());
        assert_eq!(
            storage.queue_depth(job_id).unwrap(),
            QueueDepth {
                pending: 0,
                in_flight: 3
            }
        );
    }

    #[test]
    fn test_claim_entry() {
        let (mut storage, job_id) = storage_with_job();
        storage
            .insert_queue_entry(&new_entry(job_id, "https://example.com/", 1))
            .unwrap();
        let id = storage.conn.last_insert_rowid();

        let claimed = storage.claim_entry(id, Utc::now()).unwrap().unwrap();
        assert_eq!(claimed.status, QueueStatus::Processing);
        assert!(storage.claim_entry(id, Utc::now()).unwrap().is_none());
        assert!(storage.claim_entry(999, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn test_stale_claims_are_released() {
        let (mut storage, job_id) = storage_with_job();
        storage
            .insert_queue_entry(&new_entry(job_id, "https://example.com/", 1))
            .unwrap();

        let claimed_at = Utc::now() - chrono::Duration::minutes(10);
        let entry = storage.claim_batch(job_id, 1, claimed_at).unwrap().remove(0);
        assert_eq!(entry.claimed_at, Some(db_timestamp(claimed_at)));

        // a cutoff before the claim leaves it held
        let fresh = claimed_at - chrono::Duration::seconds(1);
        assert_eq!(storage.release_stale_claims(job_id, fresh).unwrap(), 0);
        assert!(storage.claim_batch(job_id, 1, Utc::now()).unwrap().is_empty());

        let cutoff = Utc::now() - chrono::Duration::minutes(5);
        assert_eq!(storage.release_stale_claims(job_id, cutoff).unwrap(), 1);

        let stored = storage.get_queue_entry(entry.id).unwrap();
        assert_eq!(stored.status, QueueStatus::Pending);
        assert_eq!(stored.claimed_at, None);
        assert_eq!(stored.attempts, 0);

        let reclaimed = storage.claim_batch(job_id, 1, Utc::now()).unwrap();
        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].id, entry.id);
    }

    #[test]
    fn test_transition_entry() {
        let (mut storage, job_id) = storage_with_job();
        storage
            .insert_queue_entry(&new_entry(job_id, "https://example.com/", 1))
            .unwrap();
        let entry = storage.claim_batch(job_id, 1, Utc::now()).unwrap().remove(0);

        assert!(storage
            .transition_entry(entry.id, QueueStatus::Processing, QueueStatus::Completed)
            .unwrap());
        // no longer processing
        assert!(!storage
            .transition_entry(entry.id, QueueStatus::Processing, QueueStatus::Skipped)
            .unwrap());
        assert!(matches!(
            storage.transition_entry(entry.id, QueueStatus::Completed, QueueStatus::Pending),
            Err(StorageError::InvalidTransition { .. })
        ));
        assert_eq!(
            storage.get_queue_entry(entry.id).unwrap().status,
            QueueStatus::Completed
        );
    }

    #[test]
    fn test_failure_rescheduled_then_terminal() {
        let (mut storage, job_id) = storage_with_job();
        let url = "https://example.com/flaky";
        storage.insert_queue_entry(&new_entry(job_id, url, 2)).unwrap();
        storage.apply_job_delta(job_id, &JobDelta::discovered()).unwrap();

        let now = Utc::now();
        let entry = storage.claim_batch(job_id, 1, now).unwrap().remove(0);
        let retry_at = now + chrono::Duration::seconds(10);
        storage
            .record_entry_failure(entry.id, &error_for(job_id, url, 1), Some(retry_at))
            .unwrap();

        let stored = storage.get_queue_entry(entry.id).unwrap();
        assert_eq!(stored.status, QueueStatus::Failed);
        assert_eq!(stored.attempts, 1);
        assert!(stored.next_retry_at.is_some());
        assert_eq!(storage.queue_depth(job_id).unwrap().pending, 1);

        // not yet due
        assert!(storage.claim_batch(job_id, 1, now).unwrap().is_empty());

        let entry = storage.claim_batch(job_id, 1, retry_at).unwrap().remove(0);
        assert_eq!(entry.attempts, 1);
        assert!(entry.next_retry_at.is_none());

        storage
            .record_entry_failure(entry.id, &error_for(job_id, url, 2), None)
            .unwrap();

        let job = storage.get_job(job_id).unwrap();
        assert_eq!(job.statistics.failed_urls, 1);
        assert_eq!(job.statistics.total_urls_processed, 1);
        assert_eq!(job.progress.urls_in_queue, 0);
        assert!(storage.queue_depth(job_id).unwrap().is_drained());
        assert_eq!(storage.list_job_errors(job_id).unwrap().len(), 2);

        // terminal failures are never claimed again
        let far_future = now + chrono::Duration::days(365);
        assert!(storage.claim_batch(job_id, 1, far_future).unwrap().is_empty());
    }

    #[test]
    fn test_failure_requires_processing() {
        let (mut storage, job_id) = storage_with_job();
        let url = "https://example.com/";
        storage.insert_queue_entry(&new_entry(job_id, url, 1)).unwrap();
        let id = storage.conn.last_insert_rowid();

        let result = storage.record_entry_failure(id, &error_for(job_id, url, 1), None);
        assert!(matches!(
            result,
            Err(StorageError::InvalidTransition {
                from: QueueStatus::Pending,
                ..
            })
        ));
        // rolled back: no error row, no counters
        assert!(storage.list_job_errors(job_id).unwrap().is_empty());
        assert_eq!(storage.get_job(job_id).unwrap().statistics.failed_urls, 0);
    }

    #[test]
    fn test_cleanup_deletes_only_terminal_rows() {
        let (mut storage, job_id) = storage_with_job();
        for path in ["done", "waiting", "broken"] {
            storage
                .insert_queue_entry(&new_entry(job_id, &format!("https://example.com/{}", path), 2))
                .unwrap();
        }
        let claimed = storage.claim_batch(job_id, 1, Utc::now()).unwrap();
        storage
            .transition_entry(claimed[0].id, QueueStatus::Processing, QueueStatus::Completed)
            .unwrap();
        storage
            .append_job_error(&error_for(job_id, "https://example.com/broken", 1))
            .unwrap();

        let past = Utc::now() - chrono::Duration::days(1);
        assert_eq!(storage.delete_terminal_entries_before(past).unwrap(), 0);
        assert_eq!(storage.delete_job_errors_before(past).unwrap(), 0);

        let future = Utc::now() + chrono::Duration::days(1);
        assert_eq!(storage.delete_terminal_entries_before(future).unwrap(), 1);
        assert_eq!(storage.delete_job_errors_before(future).unwrap(), 1);
        assert_eq!(storage.count_entries(job_id, QueueStatus::Pending).unwrap(), 2);
    }

    #[test]
    fn test_upsert_page_bumps_version() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut page = sample_page(
            "https://example.com/docs/intro",
            "<title>Intro</title><p>The first version of this page.</p>",
        );
        page.metadata.scraping_job_id = Some(3);

        let id = storage.upsert_page(&page).unwrap();
        let stored = storage.get_page(id).unwrap().page;
        assert_eq!(stored.version, 1);
        assert_eq!(stored.title, "Intro");
        assert_eq!(stored.metadata.scraping_job_id, Some(3));
        assert_eq!(stored.content.structured, page.content.structured);
        assert_eq!(stored.navigation, page.navigation);

        let updated = sample_page(
            "https://example.com/docs/intro",
            "<title>Intro v2</title><p>The second version of this page.</p>",
        );
        let same_id = storage.upsert_page(&updated).unwrap();
        assert_eq!(same_id, id);

        let stored = storage
            .get_page_by_url("https://example.com/docs/intro")
            .unwrap()
            .unwrap();
        assert_eq!(stored.page.version, 2);
        assert_eq!(stored.page.title, "Intro v2");
        assert!(storage.get_page_by_url("https://example.com/none").unwrap().is_none());
        assert!(matches!(
            storage.get_page(999),
            Err(StorageError::PageNotFound(_))
        ));
    }

    #[test]
    fn test_update_page_links() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let page = sample_page(
            "https://example.com/",
            r#"<p><a href="/a">First link</a></p>"#,
        );
        let id = storage.upsert_page(&page).unwrap();

        let mut links = page.content.structured.links.clone();
        links[0].status = LinkStatus::Broken;
        storage.update_page_links(id, &links).unwrap();

        let stored = storage.get_page(id).unwrap();
        assert_eq!(stored.page.content.structured.links[0].status, LinkStatus::Broken);
    }

    #[test]
    fn test_search_and_reports() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .upsert_page(&sample_page(
                "https://example.com/docs/install",
                "<title>Install</title><h1>Install</h1><p>Installing the harvester on linux.</p>",
            ))
            .unwrap();
        storage
            .upsert_page(&sample_page(
                "https://example.com/docs/usage",
                "<title>Usage</title><p>Running the harvester every night.</p>",
            ))
            .unwrap();
        storage
            .upsert_page(&sample_page(
                "https://example.com/blog/news",
                "<title>News</title><p>Nothing about that tool here at all.</p>",
            ))
            .unwrap();

        let all = storage.search_pages(&SearchQuery::default()).unwrap();
        assert_eq!(all.total, 3);

        let harvester = storage
            .search_pages(&SearchQuery {
                text: Some("harvester".to_string()),
                ..SearchQuery::default()
            })
            .unwrap();
        assert_eq!(harvester.total, 2);
        // the page with a heading scores higher
        assert_eq!(harvester.pages[0].url, "https://example.com/docs/install");

        let filtered = storage
            .search_pages(&SearchQuery {
                text: Some("harvester".to_string()),
                subsection: Some("usage".to_string()),
                ..SearchQuery::default()
            })
            .unwrap();
        assert_eq!(filtered.total, 1);
        assert_eq!(filtered.pages[0].page_type, PageType::Documentation);

        let paged = storage
            .search_pages(&SearchQuery {
                section: Some("docs".to_string()),
                limit: 1,
                offset: 1,
                ..SearchQuery::default()
            })
            .unwrap();
        assert_eq!(paged.total, 2);
        assert_eq!(paged.pages.len(), 1);
        assert_eq!(paged.pages[0].url, "https://example.com/docs/usage");

        let quality = storage
            .search_pages(&SearchQuery {
                min_quality: Some(1),
                ..SearchQuery::default()
            })
            .unwrap();
        assert_eq!(quality.total, 3);

        // a stray quote is searched as text instead of breaking the MATCH syntax
        let odd = storage
            .search_pages(&SearchQuery {
                text: Some("\"harvester".to_string()),
                ..SearchQuery::default()
            })
            .unwrap();
        assert_eq!(odd.total, 2);

        let structure = storage.site_structure().unwrap();
        assert_eq!(structure.len(), 3);
        assert_eq!(structure[0].section.as_deref(), Some("blog"));
        assert_eq!(structure[1].subsection.as_deref(), Some("install"));

        let stats = storage.content_statistics().unwrap();
        assert_eq!(stats.total_pages, 3);
        assert_eq!(stats.page_types[0], ("documentation".to_string(), 2));
        assert_eq!(stats.languages, vec![("en".to_string(), 3)]);
        assert!(stats.average_reading_time >= 1.0);
    }

    #[test]
    fn test_empty_content_statistics() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stats = storage.content_statistics().unwrap();
        assert_eq!(stats, ContentStatistics::default());
    }

    #[test]
    fn test_fts_query_quoting() {
        assert_eq!(fts_query("rust  crawler"), "\"rust\" \"crawler\"");
        assert_eq!(fts_query("say \"hi\""), "\"say\" \"\"\"hi\"\"\"");
        assert_eq!(fts_query("   "), "");
    }

    #[test]
    fn test_concurrent_claims_never_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");

        let job_id = {
            let mut storage = SqliteStorage::new(&path).unwrap();
            let job_id = storage.create_job("harvest_shared", &job_config(), "hash").unwrap();
            for i in 0..60 {
                storage
                    .insert_queue_entry(&new_entry(job_id, &format!("https://example.com/{}", i), 2))
                    .unwrap();
            }
            job_id
        };

        let barrier = Arc::new(Barrier::new(3));
        let workers: Vec<_> = (0..3)
            .map(|_| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let mut storage = SqliteStorage::new(&path).unwrap();
                    barrier.wait();

                    let mut claimed = Vec::new();
                    loop {
                        let batch = storage.claim_batch(job_id, 4, Utc::now()).unwrap();
                        if batch.is_empty() {
                            break;
                        }
                        claimed.extend(batch.into_iter().map(|e| e.id));
                    }
                    claimed
                })
            })
            .collect();

        let mut all = Vec::new();
        for worker in workers {
            all.extend(worker.join().unwrap());
        }

        let unique: HashSet<i64> = all.iter().copied().collect();
        assert_eq!(all.len(), 60);
        assert_eq!(unique.len(), 60);
    }
}
