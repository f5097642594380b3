//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Site-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Crawl jobs, their configuration snapshot and live statistics
CREATE TABLE IF NOT EXISTS crawl_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    job_type TEXT NOT NULL,
    status TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    config TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    total_urls_discovered INTEGER NOT NULL DEFAULT 0,
    total_urls_processed INTEGER NOT NULL DEFAULT 0,
    successfully_scraped INTEGER NOT NULL DEFAULT 0,
    failed_urls INTEGER NOT NULL DEFAULT 0,
    duplicate_urls INTEGER NOT NULL DEFAULT 0,
    total_bytes INTEGER NOT NULL DEFAULT 0,
    urls_in_queue INTEGER NOT NULL DEFAULT 0,
    urls_processing INTEGER NOT NULL DEFAULT 0,
    percentage_complete REAL NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_crawl_jobs_start_time ON crawl_jobs(start_time DESC);
CREATE INDEX IF NOT EXISTS idx_crawl_jobs_status ON crawl_jobs(status);

-- Append-only per-job error log
CREATE TABLE IF NOT EXISTS job_errors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES crawl_jobs(id),
    url TEXT NOT NULL,
    error_type TEXT NOT NULL,
    message TEXT NOT NULL,
    status_code INTEGER,
    timestamp TEXT NOT NULL,
    attempt INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_job_errors_job ON job_errors(job_id);

-- Shared URL frontier
CREATE TABLE IF NOT EXISTS url_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES crawl_jobs(id),
    url TEXT NOT NULL,
    normalized_url TEXT NOT NULL,
    status TEXT NOT NULL,
    priority INTEGER NOT NULL,
    discovered_at TEXT NOT NULL,
    parent_url TEXT,
    depth INTEGER NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    next_retry_at TEXT,
    discovery_method TEXT NOT NULL,
    claimed_at TEXT,
    UNIQUE(normalized_url, job_id)
);

CREATE INDEX IF NOT EXISTS idx_url_queue_status ON url_queue(status);
CREATE INDEX IF NOT EXISTS idx_url_queue_priority ON url_queue(priority);
CREATE INDEX IF NOT EXISTS idx_url_queue_discovered_at ON url_queue(discovered_at DESC);

-- Harvested pages; nested structures are JSON text
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    raw_html TEXT NOT NULL,
    clean_text TEXT NOT NULL,
    structured TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    word_count INTEGER NOT NULL,
    reading_time INTEGER NOT NULL,
    scraped_at TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    last_modified TEXT,
    etag TEXT,
    scraping_job_id INTEGER,
    response_time REAL NOT NULL,
    status_code INTEGER NOT NULL,
    content_length INTEGER NOT NULL,
    language TEXT NOT NULL,
    charset TEXT NOT NULL,
    navigation TEXT NOT NULL,
    section TEXT,
    subsection TEXT,
    page_type TEXT NOT NULL,
    seo TEXT NOT NULL,
    searchable_text TEXT NOT NULL,
    keywords TEXT NOT NULL,
    tags TEXT NOT NULL,
    categories TEXT NOT NULL,
    status TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    quality_score INTEGER NOT NULL,
    accessibility TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_content_hash ON pages(content_hash);
CREATE INDEX IF NOT EXISTS idx_pages_section ON pages(section);
CREATE INDEX IF NOT EXISTS idx_pages_subsection ON pages(subsection);

-- Keyword index over pages; rowid is the page id
CREATE VIRTUAL TABLE IF NOT EXISTS pages_fts USING fts5(title, clean_text, keywords);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    add_missing_columns(conn)?;
    Ok(())
}

/// Columns added after the first release, as (table, column, definition)
const ADDED_COLUMNS: &[(&str, &str, &str)] = &[("url_queue", "claimed_at", "TEXT")];

/// Brings tables created by an older release up to date
fn add_missing_columns(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    for (table, column, definition) in ADDED_COLUMNS {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let present = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?
            .iter()
            .any(|name| name == column);

        if !present {
            conn.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                table, column, definition
            ))?;
        }
    }
    Ok(())
}
