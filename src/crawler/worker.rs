//! Fetch worker
//!
//! Processes one claimed frontier entry at a time: fetch, extract, store,
//! discover links, then settle the entry and the job counters.

use crate::crawler::fetcher::{build_http_client, fetch_page};
use crate::crawler::frontier::{DiscoveryMethod, Frontier, DISCOVERED_PRIORITY};
use crate::crawler::retry::FetchFailure;
use crate::extract::{discover_links, extract};
use crate::job::{JobConfig, JobDelta, JobManager};
use crate::state::QueueStatus;
use crate::storage::{self, SharedStorage, Storage, UrlQueueEntry};
use crate::Result;
use reqwest::Client;
use scraper::Html;
use std::sync::Arc;
use url::Url;

/// How processing one entry ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Page stored; `admitted` new links were queued
    Completed { page_id: i64, admitted: usize },
    /// Response was not HTML
    Skipped { content_type: String },
    /// Attempt failed, entry rescheduled
    Retrying { attempt: u32 },
    /// Attempt failed, retries exhausted
    Failed { attempt: u32 },
}

/// Processes entries of one job
pub struct Worker {
    job_id: i64,
    config: Arc<JobConfig>,
    client: Client,
    storage: SharedStorage,
    frontier: Frontier,
    jobs: JobManager,
}

impl Worker {
    /// Creates a worker for a job with the given configuration
    pub fn new(storage: SharedStorage, job_id: i64, config: JobConfig) -> Result<Self> {
        let client = build_http_client(&config)?;
        let frontier = Frontier::new(storage.clone(), job_id, &config, client.clone())?;

        Ok(Self {
            job_id,
            config: Arc::new(config),
            client,
            jobs: JobManager::new(storage.clone()),
            storage,
            frontier,
        })
    }

    /// Creates a worker for an existing job, using its stored configuration
    pub fn for_job(storage: SharedStorage, job_id: i64) -> Result<Self> {
        let config = storage::lock(&storage)?.get_job(job_id)?.config;
        Self::new(storage, job_id, config)
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Processes one claimed entry
    ///
    /// A failed attempt is recorded on the entry and reported as `Retrying`
    /// or `Failed`; only storage problems while recording it are errors.
    pub async fn process(&self, entry: &UrlQueueEntry) -> Result<WorkOutcome> {
        match self.try_process(entry).await {
            Ok(outcome) => Ok(outcome),
            Err(failure) => {
                let decision = self.frontier.record_failure(entry, &failure)?;
                Ok(match decision.retry_at() {
                    Some(_) => WorkOutcome::Retrying {
                        attempt: decision.attempt(),
                    },
                    None => WorkOutcome::Failed {
                        attempt: decision.attempt(),
                    },
                })
            }
        }
    }

    async fn try_process(&self, entry: &UrlQueueEntry) -> std::result::Result<WorkOutcome, FetchFailure> {
        let url = Url::parse(&entry.url)
            .map_err(|e| FetchFailure::processing(format!("Invalid URL {}: {}", entry.url, e)))?;

        tracing::debug!("Fetching {} (depth {})", url, entry.depth);
        let fetched = fetch_page(&self.client, &url).await?;

        if !fetched.response.is_html() {
            let content_type = fetched.response.content_type.clone().unwrap_or_default();
            self.frontier.mark(entry.id, QueueStatus::Skipped)?;
            self.jobs.record_outcome(self.job_id, &JobDelta::skipped())?;
            tracing::debug!("Skipped {} ({})", url, content_type);
            return Ok(WorkOutcome::Skipped { content_type });
        }

        let mut page = extract(
            &fetched.body,
            &fetched.final_url,
            &fetched.response,
            fetched.elapsed,
        )
        .map_err(FetchFailure::extraction)?;
        // the frontier entry is the page identity, not the redirect target
        page.url = entry.url.clone();
        page.metadata.scraping_job_id = Some(self.job_id);

        let page_id = storage::lock(&self.storage)?.upsert_page(&page)?;

        let mut admitted = 0;
        if entry.depth < self.config.max_depth {
            let links = {
                let document = Html::parse_document(&page.content.raw_html);
                discover_links(&document, &fetched.final_url, &self.config.allowed_domains)
            };

            for link in links {
                let queued = self
                    .frontier
                    .admit(
                        link.as_str(),
                        entry.depth + 1,
                        DISCOVERED_PRIORITY,
                        Some(&entry.url),
                        DiscoveryMethod::Link,
                    )
                    .await?;
                if queued {
                    admitted += 1;
                }
            }
        }

        self.frontier.mark(entry.id, QueueStatus::Completed)?;
        self.jobs
            .record_outcome(self.job_id, &JobDelta::succeeded(fetched.body.len() as u64))?;

        tracing::info!(
            "Harvested {} (quality {}, {} new links)",
            entry.url,
            page.quality_score,
            admitted
        );

        Ok(WorkOutcome::Completed { page_id, admitted })
    }
}
