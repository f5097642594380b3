//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! job progress, site structure and content statistics from the storage
//! layer.

use crate::storage::{ContentStatistics, JobErrorRecord, JobRecord, SectionSummary, Storage};
use crate::Result;
use std::fmt::Write;

/// How many jobs the statistics view lists
const RECENT_JOBS: u32 = 5;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Most recently started jobs, newest first
    pub recent_jobs: Vec<JobRecord>,

    /// Page count and average quality per section/subsection
    pub sections: Vec<SectionSummary>,

    /// Corpus-wide content statistics
    pub content: ContentStatistics,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics> {
    Ok(HarvestStatistics {
        recent_jobs: storage.list_jobs(RECENT_JOBS)?,
        sections: storage.site_structure()?,
        content: storage.content_statistics()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    print!("{}", render_statistics(stats));
}

/// Prints one job with its error log
pub fn print_job(job: &JobRecord, errors: &[JobErrorRecord]) {
    print!("{}", render_job(job, errors));
}

/// Prints a one-line summary per job
pub fn print_job_list(jobs: &[JobRecord]) {
    print!("{}", render_job_list(jobs));
}

pub fn render_statistics(stats: &HarvestStatistics) -> String {
    let mut out = String::new();
    let content = &stats.content;

    let _ = writeln!(out, "=== Harvest Statistics ===\n");

    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Total pages: {}", content.total_pages);
    let _ = writeln!(out, "  Total words: {}", content.total_words);
    let _ = writeln!(out, "  Average quality: {:.1}", content.average_quality);
    let _ = writeln!(
        out,
        "  Average reading time: {:.1} min",
        content.average_reading_time
    );
    let _ = writeln!(out);

    if !content.page_types.is_empty() {
        let _ = writeln!(out, "Pages by Type:");
        for (page_type, count) in &content.page_types {
            let _ = writeln!(
                out,
                "  {}: {} ({:.1}%)",
                page_type,
                count,
                percentage(*count, content.total_pages)
            );
        }
        let _ = writeln!(out);
    }

    if !content.languages.is_empty() {
        let _ = writeln!(out, "Languages:");
        for (language, count) in &content.languages {
            let _ = writeln!(out, "  {}: {}", language, count);
        }
        let _ = writeln!(out);
    }

    if !stats.sections.is_empty() {
        let _ = writeln!(out, "Site Structure:");
        for section in &stats.sections {
            let _ = writeln!(
                out,
                "  {}/{}: {} pages, quality {:.1}",
                section.section.as_deref().unwrap_or("(root)"),
                section.subsection.as_deref().unwrap_or("-"),
                section.page_count,
                section.average_quality
            );
        }
        let _ = writeln!(out);
    }

    if !stats.recent_jobs.is_empty() {
        let _ = writeln!(out, "Recent Jobs:");
        out.push_str(&render_job_list(&stats.recent_jobs));
    }

    out
}

pub fn render_job(job: &JobRecord, errors: &[JobErrorRecord]) -> String {
    let mut out = String::new();
    let stats = &job.statistics;
    let progress = &job.progress;

    let _ = writeln!(out, "=== Job {} ({}) ===\n", job.id, job.name);
    let _ = writeln!(out, "  Status: {}", job.status);
    let _ = writeln!(out, "  Started: {}", job.start_time);
    if let Some(end_time) = &job.end_time {
        let _ = writeln!(out, "  Finished: {}", end_time);
    }
    let _ = writeln!(out, "  Config hash: {}", job.config_hash);
    let _ = writeln!(out);

    let _ = writeln!(out, "Statistics:");
    let _ = writeln!(out, "  URLs discovered: {}", stats.total_urls_discovered);
    let _ = writeln!(out, "  URLs processed: {}", stats.total_urls_processed);
    let _ = writeln!(out, "  Successfully scraped: {}", stats.successfully_scraped);
    let _ = writeln!(out, "  Failed: {}", stats.failed_urls);
    let _ = writeln!(out, "  Duplicates: {}", stats.duplicate_urls);
    let _ = writeln!(out, "  Bytes: {}", stats.total_bytes);
    let _ = writeln!(out);

    let _ = writeln!(out, "Progress:");
    let _ = writeln!(out, "  Queued: {}", progress.urls_in_queue);
    let _ = writeln!(out, "  In flight: {}", progress.urls_processing);
    let _ = writeln!(out, "  Complete: {:.1}%", progress.percentage_complete);

    if !errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Errors ({}):", errors.len());
        for error in errors {
            let status = error
                .status_code
                .map(|code| format!(" [{}]", code))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  - {} {}{} attempt {}: {}",
                error.error_type, error.url, status, error.attempt, error.message
            );
        }
    }

    out
}

pub fn render_job_list(jobs: &[JobRecord]) -> String {
    let mut out = String::new();

    if jobs.is_empty() {
        let _ = writeln!(out, "  No jobs found");
        return out;
    }

    for job in jobs {
        let _ = writeln!(
            out,
            "  #{} {} [{}] {}/{} processed ({:.1}%), {} failed",
            job.id,
            job.name,
            job.status,
            job.statistics.total_urls_processed,
            job.statistics.total_urls_discovered,
            job.progress.percentage_complete,
            job.statistics.failed_urls
        );
    }

    out
}

fn percentage(count: u64, total: u64) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
