//! Standalone tasks
//!
//! Each task can run on its own, from the CLI or another process sharing the
//! database, and is safe to repeat. Every task reports a [`TaskResult`].

use crate::crawler::fetcher::check_link;
use crate::crawler::worker::{WorkOutcome, Worker};
use crate::extract::{LinkStatus, LinkType};
use crate::storage::{self, SharedStorage, Storage};
use crate::Result;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;

/// Outcome of a task, serializable for logs and operators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResult {
    pub task: String,
    pub success: bool,
    pub message: String,
    pub details: serde_json::Value,
}

impl TaskResult {
    fn new(task: &str, success: bool, message: String, details: serde_json::Value) -> Self {
        Self {
            task: task.to_string(),
            success,
            message,
            details,
        }
    }
}

/// Fetches one frontier entry of a job
///
/// Claims the entry first, so an entry already taken by another worker (or
/// already finished) is reported and left alone.
pub async fn fetch_url(
    storage: SharedStorage,
    url: &str,
    job_id: i64,
    entry_id: i64,
) -> Result<TaskResult> {
    let worker = Worker::for_job(storage, job_id)?;

    let Some(entry) = worker.frontier().claim(entry_id)? else {
        return Ok(TaskResult::new(
            "fetch_url",
            false,
            format!("Entry {} is not claimable", entry_id),
            json!({ "url": url, "job_id": job_id, "entry_id": entry_id }),
        ));
    };

    if entry.url != url {
        tracing::warn!(
            "Entry {} holds {}, not {}; fetching the queued URL",
            entry_id,
            entry.url,
            url
        );
    }

    let outcome = worker.process(&entry).await?;
    let (success, message) = match &outcome {
        WorkOutcome::Completed { page_id, admitted } => (
            true,
            format!("Stored page {} and queued {} links", page_id, admitted),
        ),
        WorkOutcome::Skipped { content_type } => {
            (true, format!("Skipped non-HTML content ({})", content_type))
        }
        WorkOutcome::Retrying { attempt } => {
            (false, format!("Attempt {} failed, retry scheduled", attempt))
        }
        WorkOutcome::Failed { attempt } => {
            (false, format!("Failed after {} attempts", attempt))
        }
    };

    Ok(TaskResult::new(
        "fetch_url",
        success,
        message,
        json!({ "url": entry.url, "job_id": job_id, "entry_id": entry_id }),
    ))
}

/// Checks every non-anchor link of a page with a HEAD request
///
/// Links answering below 400 become `valid`, everything else `broken`.
pub async fn validate_links(
    storage: SharedStorage,
    client: &Client,
    page_id: i64,
) -> Result<TaskResult> {
    let mut links = storage::lock(&storage)?
        .get_page(page_id)?
        .page
        .content
        .structured
        .links;

    let (mut valid, mut broken) = (0, 0);
    for link in links.iter_mut() {
        if link.link_type == LinkType::Anchor {
            continue;
        }

        link.status = check_link(client, &link.href).await;
        match link.status {
            LinkStatus::Valid => valid += 1,
            _ => broken += 1,
        }
    }

    storage::lock(&storage)?.update_page_links(page_id, &links)?;
    tracing::info!(
        "Validated links of page {}: {} valid, {} broken",
        page_id,
        valid,
        broken
    );

    Ok(TaskResult::new(
        "validate_links",
        true,
        format!("{} valid, {} broken", valid, broken),
        json!({ "page_id": page_id, "valid": valid, "broken": broken }),
    ))
}

/// Deletes finished frontier entries and error log rows older than `days_old` days
pub fn cleanup(storage: SharedStorage, days_old: u32) -> Result<TaskResult> {
    let cutoff = Utc::now() - Duration::days(i64::from(days_old));

    let (entries, errors) = {
        let mut storage = storage::lock(&storage)?;
        let entries = storage.delete_terminal_entries_before(cutoff)?;
        let errors = storage.delete_job_errors_before(cutoff)?;
        (entries, errors)
    };

    tracing::info!(
        "Cleanup removed {} queue entries and {} error records older than {} days",
        entries,
        errors,
        days_old
    );

    Ok(TaskResult::new(
        "cleanup",
        true,
        format!("Removed {} queue entries and {} error records", entries, errors),
        json!({ "days_old": days_old, "queue_entries": entries, "job_errors": errors }),
    ))
}
