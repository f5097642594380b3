//! Crawler module for fetching and processing pages
//!
//! This module contains the core crawling logic, including:
//! - The shared URL frontier with admission checks and atomic claiming
//! - HTTP fetching and error classification
//! - The retry and backoff policy
//! - The fetch worker that turns claimed entries into stored pages
//! - Overall crawl coordination
//! - Standalone tasks (single fetch, link validation, cleanup)

mod coordinator;
mod fetcher;
mod frontier;
mod retry;
pub mod tasks;
mod worker;

pub use coordinator::{run_crawl, BatchReport, Coordinator};
pub use fetcher::{build_http_client, check_link, fetch_page, FetchedPage};
pub use frontier::{DiscoveryMethod, Frontier, DISCOVERED_PRIORITY, SEED_PRIORITY};
pub use retry::{FailureKind, FetchFailure, RetryDecision, RetryPolicy};
pub use tasks::TaskResult;
pub use worker::{WorkOutcome, Worker};
