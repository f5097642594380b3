//! Crawl orchestration
//!
//! This module contains the crawl loop that drives a job to completion:
//! - Creating the job and admitting its start URLs
//! - Claiming batches from the shared frontier and fetching them concurrently
//! - Honouring operator pause, cancel and fail requests between batches
//! - Waiting out scheduled retries and other processes' in-flight work
//! - Completing the job once the frontier is drained

use crate::config::Config;
use crate::crawler::frontier::{DiscoveryMethod, SEED_PRIORITY};
use crate::crawler::worker::{WorkOutcome, Worker};
use crate::job::{JobConfig, JobManager};
use crate::state::JobStatus;
use crate::storage::{self, JobRecord, SharedStorage};
use crate::{HarvestError, Result};
use futures::future::join_all;
use std::path::Path;
use std::time::Duration;

/// Counts of one pass over the frontier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub claimed: usize,
    pub completed: usize,
    pub skipped: usize,
    pub retrying: usize,
    pub failed: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: &WorkOutcome) {
        match outcome {
            WorkOutcome::Completed { .. } => self.completed += 1,
            WorkOutcome::Skipped { .. } => self.skipped += 1,
            WorkOutcome::Retrying { .. } => self.retrying += 1,
            WorkOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Drives one job
pub struct Coordinator {
    worker: Worker,
    jobs: JobManager,
    job_id: i64,
}

impl Coordinator {
    /// Creates a job and admits its start URLs
    ///
    /// # Errors
    ///
    /// `NoSeedsAdmitted` if every start URL was rejected; the job is marked
    /// failed before returning.
    pub async fn start(storage: SharedStorage, config: JobConfig, config_hash: &str) -> Result<Self> {
        let jobs = JobManager::new(storage.clone());
        let job_id = jobs.create(&config, config_hash)?;
        let worker = Worker::new(storage, job_id, config)?;

        let mut admitted = 0;
        for url in &worker.config().start_urls {
            if worker
                .frontier()
                .admit(url, 0, SEED_PRIORITY, None, DiscoveryMethod::Seed)
                .await?
            {
                admitted += 1;
            }
        }

        if admitted == 0 {
            jobs.fail(job_id, "No start URL could be admitted")?;
            return Err(HarvestError::NoSeedsAdmitted { job_id });
        }

        tracing::info!("Job {} started with {} start URLs", job_id, admitted);
        jobs.refresh_progress(job_id)?;

        Ok(Self {
            worker,
            jobs,
            job_id,
        })
    }

    /// Joins an existing job, e.g. as an additional worker process
    pub fn attach(storage: SharedStorage, job_id: i64) -> Result<Self> {
        let worker = Worker::for_job(storage.clone(), job_id)?;
        tracing::info!("Attached to job {}", job_id);

        Ok(Self {
            worker,
            jobs: JobManager::new(storage),
            job_id,
        })
    }

    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    /// Claims one batch and processes every entry of it concurrently
    pub async fn run_batch(&self) -> Result<BatchReport> {
        let batch = self
            .worker
            .frontier()
            .take_batch(self.worker.config().concurrent_requests)?;

        let mut report = BatchReport {
            claimed: batch.len(),
            ..BatchReport::default()
        };
        if batch.is_empty() {
            return Ok(report);
        }

        let results = join_all(batch.iter().map(|entry| self.worker.process(entry))).await;

        let mut first_error = None;
        for (entry, result) in batch.iter().zip(results) {
            match result {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    tracing::error!("Error processing {}: {}", entry.url, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        self.jobs.refresh_progress(self.job_id)?;

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Runs batches until the job is drained or stopped
    ///
    /// | Job status | Action |
    /// |------------|--------|
    /// | running | claim and process a batch |
    /// | paused | sleep the poll interval and check again |
    /// | completed / failed / cancelled | stop |
    ///
    /// An empty batch ends the loop only when no entry is pending, scheduled
    /// for retry or in flight anywhere; otherwise the loop polls.
    ///
    /// # Returns
    ///
    /// The job as it stands when the loop ends
    pub async fn run(&self) -> Result<JobRecord> {
        let poll_interval = Duration::from_millis(self.worker.config().poll_interval);
        let batch_delay = Duration::from_millis(self.worker.config().delay_between_requests);

        tracing::info!("Running job {}", self.job_id);

        loop {
            let status = self.jobs.status(self.job_id)?;
            if status.is_terminal() {
                tracing::info!("Job {} is {}, stopping", self.job_id, status);
                break;
            }
            if status == JobStatus::Paused {
                tracing::debug!("Job {} is paused", self.job_id);
                tokio::time::sleep(poll_interval).await;
                continue;
            }

            let report = self.run_batch().await?;

            if report.claimed > 0 {
                let job = self.jobs.get(self.job_id)?;
                tracing::info!(
                    "Progress: {}/{} processed ({:.1}%), {} queued, {} in flight",
                    job.statistics.total_urls_processed,
                    job.statistics.total_urls_discovered,
                    job.progress.percentage_complete,
                    job.progress.urls_in_queue,
                    job.progress.urls_processing
                );
                tokio::time::sleep(batch_delay).await;
                continue;
            }

            let depth = self.worker.frontier().depth()?;
            if !depth.is_drained() {
                tracing::debug!(
                    "Waiting on {} queued and {} in-flight URLs",
                    depth.pending,
                    depth.in_flight
                );
                tokio::time::sleep(poll_interval).await;
                continue;
            }

            match self.jobs.complete(self.job_id) {
                Ok(()) => break,
                // another process queued work since the depth check
                Err(HarvestError::JobNotDrained { .. }) => continue,
                // an operator stopped the job or another process completed it
                Err(HarvestError::JobTransition { from, .. }) => {
                    tracing::warn!("Job {} could not complete from {}", self.job_id, from);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let job = self.jobs.get(self.job_id)?;
        tracing::info!(
            "Job {} {}: {} pages harvested, {} failed, {} duplicates",
            job.id,
            job.status,
            job.statistics.successfully_scraped,
            job.statistics.failed_urls,
            job.statistics.duplicate_urls
        );
        Ok(job)
    }
}

/// Runs a complete crawl with the given configuration
///
/// Opens the database named in the configuration, starts a job and runs it
/// to the end.
pub async fn run_crawl(config: &Config, config_hash: &str) -> Result<JobRecord> {
    let storage = storage::share(storage::open_storage(Path::new(
        &config.output.database_path,
    ))?);

    let coordinator = Coordinator::start(storage, JobConfig::from(config), config_hash).await?;
    coordinator.run().await
}
