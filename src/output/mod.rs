//! Output module for reporting on harvest results
//!
//! This module handles:
//! - Loading job, site structure and content statistics from storage
//! - Printing them for the operator

pub mod stats;

pub use stats::{
    load_statistics, print_job, print_job_list, print_statistics, render_job, render_job_list,
    render_statistics, HarvestStatistics,
};
