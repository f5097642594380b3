//! Retry and backoff policy for failed fetches
//!
//! | Failure | Error type |
//! |---------|------------|
//! | Request timed out | `timeout` |
//! | Connection refused, DNS, TLS | `connection_error` |
//! | HTTP status >= 400 | `http_error` |
//! | Body could not be decoded | `extraction_error` |
//! | Anything else | `processing_error` |
//!
//! Every kind is retried the same way: attempt `n` waits `n` times the base
//! delay, until the configured number of attempts is used up.

use crate::extract::ExtractError;
use crate::job::JobConfig;
use crate::storage::{StorageError, UrlQueueEntry};
use crate::HarvestError;
use chrono::{DateTime, Duration, Utc};

/// Classification of a failed fetch, as recorded in the job error log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    ConnectionError,
    HttpError,
    ExtractionError,
    ProcessingError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::ConnectionError => "connection_error",
            FailureKind::HttpError => "http_error",
            FailureKind::ExtractionError => "extraction_error",
            FailureKind::ProcessingError => "processing_error",
        }
    }
}

/// Why one attempt at a URL failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
    pub status_code: Option<u16>,
}

impl FetchFailure {
    pub fn http(status: u16) -> Self {
        Self {
            kind: FailureKind::HttpError,
            message: format!("HTTP {}", status),
            status_code: Some(status),
        }
    }

    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            FailureKind::Timeout
        } else if error.is_connect() || error.is_request() {
            FailureKind::ConnectionError
        } else {
            FailureKind::ProcessingError
        };

        Self {
            kind,
            message: error.to_string(),
            status_code: error.status().map(|s| s.as_u16()),
        }
    }

    pub fn extraction(error: ExtractError) -> Self {
        Self {
            kind: FailureKind::ExtractionError,
            message: error.to_string(),
            status_code: None,
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::ProcessingError,
            message: message.into(),
            status_code: None,
        }
    }
}

impl From<HarvestError> for FetchFailure {
    fn from(error: HarvestError) -> Self {
        Self::processing(error.to_string())
    }
}

impl From<StorageError> for FetchFailure {
    fn from(error: StorageError) -> Self {
        Self::processing(error.to_string())
    }
}

/// What happens to an entry after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Claimable again from `retry_at`
    Retry { retry_at: DateTime<Utc>, attempt: u32 },
    /// Attempts exhausted
    Terminal { attempt: u32 },
}

impl RetryDecision {
    pub fn attempt(&self) -> u32 {
        match self {
            RetryDecision::Retry { attempt, .. } | RetryDecision::Terminal { attempt } => *attempt,
        }
    }

    pub fn retry_at(&self) -> Option<DateTime<Utc>> {
        match self {
            RetryDecision::Retry { retry_at, .. } => Some(*retry_at),
            RetryDecision::Terminal { .. } => None,
        }
    }
}

/// Linear backoff with a fixed attempt limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &JobConfig) -> Self {
        Self {
            max_attempts: config.retry_attempts,
            base_delay: Duration::milliseconds(config.retry_delay as i64),
        }
    }

    /// Decides whether a failed entry gets another attempt
    ///
    /// The attempt being recorded is `entry.attempts + 1`. While it is below
    /// the limit the entry is rescheduled `base_delay * attempt` from `now`.
    pub fn on_failure(&self, entry: &UrlQueueEntry, now: DateTime<Utc>) -> RetryDecision {
        let attempt = entry.attempts + 1;

        if attempt < self.max_attempts {
            RetryDecision::Retry {
                retry_at: now + self.base_delay * attempt as i32,
                attempt,
            }
        } else {
            RetryDecision::Terminal { attempt }
        }
    }
}
