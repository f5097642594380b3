//! Job lifecycle manager
//!
//! Drives a job through `running -> {completed | failed | cancelled}`,
//! `running <-> paused` and `paused -> {cancelled | failed}`. Every
//! transition is a conditional update, so a job changed by another process
//! or by an operator is never silently overwritten.

use crate::job::{job_name, JobConfig, JobDelta};
use crate::state::JobStatus;
use crate::storage::{self, JobErrorRecord, JobRecord, NewJobError, SharedStorage, Storage};
use crate::{HarvestError, Result};
use chrono::Utc;

/// Creates jobs and moves them through their lifecycle
#[derive(Clone)]
pub struct JobManager {
    storage: SharedStorage,
}

impl JobManager {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Creates a `running` job named after the current time
    ///
    /// # Returns
    ///
    /// The new job ID
    pub fn create(&self, config: &JobConfig, config_hash: &str) -> Result<i64> {
        let name = job_name(Utc::now());
        let job_id = storage::lock(&self.storage)?.create_job(&name, config, config_hash)?;
        tracing::info!("Created job {} ({})", job_id, name);
        Ok(job_id)
    }

    /// Adds a delta to the job statistics in one atomic update
    pub fn record_outcome(&self, job_id: i64, delta: &JobDelta) -> Result<()> {
        storage::lock(&self.storage)?.apply_job_delta(job_id, delta)?;
        Ok(())
    }

    /// Recomputes queue depth, in-flight count and percentage complete
    pub fn refresh_progress(&self, job_id: i64) -> Result<()> {
        storage::lock(&self.storage)?.refresh_job_progress(job_id)?;
        Ok(())
    }

    /// Marks a running job completed
    ///
    /// # Errors
    ///
    /// `JobNotDrained` while the frontier still holds pending, retrying or
    /// in-flight entries; `JobTransition` if the job is not running.
    pub fn complete(&self, job_id: i64) -> Result<()> {
        {
            let mut storage = storage::lock(&self.storage)?;
            let depth = storage.queue_depth(job_id)?;
            if !depth.is_drained() {
                return Err(HarvestError::JobNotDrained {
                    job_id,
                    pending: depth.pending,
                    in_flight: depth.in_flight,
                });
            }
            storage.refresh_job_progress(job_id)?;
        }

        self.transition(job_id, JobStatus::Completed)?;
        tracing::info!("Job {} completed", job_id);
        Ok(())
    }

    pub fn pause(&self, job_id: i64) -> Result<()> {
        self.transition(job_id, JobStatus::Paused)?;
        tracing::info!("Job {} paused", job_id);
        Ok(())
    }

    pub fn resume(&self, job_id: i64) -> Result<()> {
        self.transition(job_id, JobStatus::Running)?;
        tracing::info!("Job {} resumed", job_id);
        Ok(())
    }

    pub fn cancel(&self, job_id: i64) -> Result<()> {
        self.transition(job_id, JobStatus::Cancelled)?;
        tracing::info!("Job {} cancelled", job_id);
        Ok(())
    }

    /// Fails a job, recording `reason` in its error log
    pub fn fail(&self, job_id: i64, reason: &str) -> Result<()> {
        self.transition(job_id, JobStatus::Failed)?;
        storage::lock(&self.storage)?.append_job_error(&NewJobError {
            job_id,
            url: String::new(),
            error_type: "processing_error".to_string(),
            message: reason.to_string(),
            status_code: None,
            attempt: 0,
        })?;
        tracing::error!("Job {} failed: {}", job_id, reason);
        Ok(())
    }

    pub fn status(&self, job_id: i64) -> Result<JobStatus> {
        Ok(self.get(job_id)?.status)
    }

    pub fn get(&self, job_id: i64) -> Result<JobRecord> {
        Ok(storage::lock(&self.storage)?.get_job(job_id)?)
    }

    /// Most recently started jobs first
    pub fn list(&self, limit: u32) -> Result<Vec<JobRecord>> {
        Ok(storage::lock(&self.storage)?.list_jobs(limit)?)
    }

    pub fn errors(&self, job_id: i64) -> Result<Vec<JobErrorRecord>> {
        Ok(storage::lock(&self.storage)?.list_job_errors(job_id)?)
    }

    fn transition(&self, job_id: i64, to: JobStatus) -> Result<()> {
        let mut storage = storage::lock(&self.storage)?;
        let sources = JobStatus::sources_of(to);

        if storage.set_job_status(job_id, &sources, to)? {
            return Ok(());
        }

        let from = storage.get_job(job_id)?.status;
        Err(HarvestError::JobTransition { job_id, from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{share, NewQueueEntry, SqliteStorage};

    fn config() -> JobConfig {
        JobConfig {
            start_urls: vec!["https://example.com/".to_string()],
            allowed_domains: vec!["example.com".to_string()],
            max_depth: 1,
            concurrent_requests: 2,
            delay_between_requests: 0,
            timeout: 5,
            retry_attempts: 3,
            retry_delay: 1_000,
            poll_interval: 10,
            respect_robots_txt: false,
            download_images: false,
            excluded_patterns: vec![],
            user_agent: "TestBot/1.0".to_string(),
            crawler_name: "TestBot".to_string(),
        }
    }

    fn manager() -> (JobManager, SharedStorage) {
        let storage = share(SqliteStorage::new_in_memory().unwrap());
        (JobManager::new(storage.clone()), storage)
    }

    #[test]
    fn test_create_names_job() {
        let (jobs, _) = manager();
        let job_id = jobs.create(&config(), "abc").unwrap();
        let job = jobs.get(job_id).unwrap();

        assert!(job.name.starts_with("harvest_"));
        assert_eq!(job.name.len(), "harvest_YYYYMMDD_HHMMSS".len());
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.config_hash, "abc");
    }

    #[test]
    fn test_pause_resume_cancel() {
        let (jobs, _) = manager();
        let job_id = jobs.create(&config(), "abc").unwrap();

        jobs.pause(job_id).unwrap();
        assert_eq!(jobs.status(job_id).unwrap(), JobStatus::Paused);

        // paused jobs cannot complete
        assert!(matches!(
            jobs.complete(job_id),
            Err(HarvestError::JobTransition {
                from: JobStatus::Paused,
                to: JobStatus::Completed,
                ..
            })
        ));

        jobs.resume(job_id).unwrap();
        jobs.cancel(job_id).unwrap();
        assert_eq!(jobs.status(job_id).unwrap(), JobStatus::Cancelled);
        assert!(jobs.get(job_id).unwrap().end_time.is_some());

        // terminal
        assert!(jobs.resume(job_id).is_err());
        assert!(jobs.pause(job_id).is_err());
    }

    #[test]
    fn test_complete_requires_drained_queue() {
        let (jobs, storage) = manager();
        let job_id = jobs.create(&config(), "abc").unwrap();

        storage::lock(&storage)
            .unwrap()
            .insert_queue_entry(&NewQueueEntry {
                job_id,
                url: "https://example.com/".to_string(),
                normalized_url: "https://example.com/".to_string(),
                priority: 1,
                parent_url: None,
                depth: 0,
                discovery_method: "seed".to_string(),
            })
            .unwrap();

        assert!(matches!(
            jobs.complete(job_id),
            Err(HarvestError::JobNotDrained { pending: 1, .. })
        ));
        assert_eq!(jobs.status(job_id).unwrap(), JobStatus::Running);
    }

    #[test]
    fn test_complete_empty_job() {
        let (jobs, _) = manager();
        let job_id = jobs.create(&config(), "abc").unwrap();
        jobs.complete(job_id).unwrap();
        assert_eq!(jobs.status(job_id).unwrap(), JobStatus::Completed);
    }

    #[test]
    fn test_fail_records_reason() {
        let (jobs, _) = manager();
        let job_id = jobs.create(&config(), "abc").unwrap();

        jobs.fail(job_id, "no start URL admitted").unwrap();

        assert_eq!(jobs.status(job_id).unwrap(), JobStatus::Failed);
        let errors = jobs.errors(job_id).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "no start URL admitted");
    }

    #[test]
    fn test_statistics_only_grow() {
        let (jobs, _) = manager();
        let job_id = jobs.create(&config(), "abc").unwrap();

        let deltas = [
            JobDelta::discovered(),
            JobDelta::discovered(),
            JobDelta::duplicate(),
            JobDelta::succeeded(10),
            JobDelta::skipped(),
            JobDelta::failed(),
        ];

        let mut previous = jobs.get(job_id).unwrap().statistics;
        for delta in &deltas {
            jobs.record_outcome(job_id, delta).unwrap();
            let current = jobs.get(job_id).unwrap().statistics;
            assert!(current.total_urls_discovered >= previous.total_urls_discovered);
            assert!(current.total_urls_processed >= previous.total_urls_processed);
            assert!(current.successfully_scraped >= previous.successfully_scraped);
            assert!(current.failed_urls >= previous.failed_urls);
            assert!(current.duplicate_urls >= previous.duplicate_urls);
            assert!(current.total_bytes >= previous.total_bytes);
            previous = current;
        }

        let job = jobs.get(job_id).unwrap();
        assert_eq!(job.statistics.total_urls_processed, 3);
        assert!((job.progress.percentage_complete - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_list_jobs() {
        let (jobs, _) = manager();
        jobs.create(&config(), "a").unwrap();
        jobs.create(&config(), "b").unwrap();
        assert_eq!(jobs.list(10).unwrap().len(), 2);
    }
}
