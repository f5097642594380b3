//! State machines for queue entries and crawl jobs
//!
//! # Components
//!
//! - `QueueStatus`: lifecycle of one frontier entry (pending, processing, completed, failed, skipped)
//! - `JobStatus`: lifecycle of a crawl job, including operator pause/resume

mod job_status;
mod queue_status;

pub use job_status::JobStatus;
pub use queue_status::QueueStatus;
