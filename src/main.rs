//! Site-Harvest main entry point
//!
//! This is the command-line interface for the Site-Harvest crawler.

use anyhow::Context;
use clap::Parser;
use site_harvest::config::{load_config_with_hash, Config};
use site_harvest::crawler::{build_http_client, run_crawl, tasks, Coordinator, TaskResult};
use site_harvest::job::{JobConfig, JobManager};
use site_harvest::output::{load_statistics, print_job, print_job_list, print_statistics};
use site_harvest::storage::{self, open_storage, SharedStorage};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Site-Harvest: a resumable site crawler and content extractor
///
/// Site-Harvest crawls one website inside its allowed domains, extracts
/// structured content with quality and accessibility scores, and keeps
/// every job's progress in SQLite so several processes can share the work.
#[derive(Parser, Debug)]
#[command(name = "site-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable site crawler and content extractor", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, group = "mode")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, group = "mode")]
    stats: bool,

    /// List recent jobs and exit
    #[arg(long, group = "mode")]
    list_jobs: bool,

    /// Delete finished queue entries and error records older than DAYS
    #[arg(long, value_name = "DAYS", group = "mode")]
    cleanup: Option<u32>,

    /// Check every link of a stored page and record which are broken
    #[arg(long, value_name = "PAGE_ID", group = "mode")]
    validate_links: Option<i64>,

    /// Pause a running job
    #[arg(long, value_name = "JOB_ID", group = "mode")]
    pause: Option<i64>,

    /// Resume a paused job and keep working on it
    #[arg(long, value_name = "JOB_ID", group = "mode")]
    resume: Option<i64>,

    /// Cancel a running or paused job
    #[arg(long, value_name = "JOB_ID", group = "mode")]
    cancel: Option<i64>,

    /// Join a running job as an additional worker
    #[arg(long, value_name = "JOB_ID", group = "mode")]
    work: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if cli.list_jobs {
        handle_list_jobs(&config)
    } else if let Some(days) = cli.cleanup {
        let result = tasks::cleanup(open_shared(&config)?, days)?;
        print_task_result(&result)
    } else if let Some(page_id) = cli.validate_links {
        handle_validate_links(&config, page_id).await
    } else if let Some(job_id) = cli.pause {
        jobs(&config)?.pause(job_id)?;
        println!("Job {} paused", job_id);
        Ok(())
    } else if let Some(job_id) = cli.resume {
        handle_resume(&config, job_id).await
    } else if let Some(job_id) = cli.cancel {
        jobs(&config)?.cancel(job_id)?;
        println!("Job {} cancelled", job_id);
        Ok(())
    } else if let Some(job_id) = cli.work {
        work_on(open_shared(&config)?, job_id).await
    } else {
        handle_crawl(&config, &config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_harvest=info,warn"),
            1 => EnvFilter::new("site_harvest=debug,info"),
            2 => EnvFilter::new("site_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_shared(config: &Config) -> anyhow::Result<SharedStorage> {
    let path = Path::new(&config.output.database_path);
    let storage = open_storage(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(storage::share(storage))
}

fn jobs(config: &Config) -> anyhow::Result<JobManager> {
    Ok(JobManager::new(open_shared(config)?))
}

fn print_task_result(result: &TaskResult) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Site-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!(
        "  Concurrent requests: {}",
        config.crawler.concurrent_requests
    );
    println!(
        "  Delay between batches: {}ms",
        config.crawler.delay_between_requests
    );
    println!("  Timeout: {}s", config.crawler.timeout);
    println!(
        "  Retries: {} attempts, {}ms base delay",
        config.crawler.retry_attempts, config.crawler.retry_delay
    );
    println!("  Respect robots.txt: {}", config.crawler.respect_robots_txt);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nStart URLs ({}):", config.site.start_urls.len());
    for url in &config.site.start_urls {
        println!("  - {}", url);
    }

    println!("\nAllowed Domains ({}):", config.site.allowed_domains.len());
    for domain in &config.site.allowed_domains {
        println!("  - {}", domain);
    }

    if !config.site.excluded_patterns.is_empty() {
        println!(
            "\nExcluded Patterns ({}):",
            config.site.excluded_patterns.len()
        );
        for pattern in &config.site.excluded_patterns {
            println!("  - {}", pattern);
        }
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} start URLs",
        config.site.start_urls.len()
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_shared(config)?;
    let stats = {
        let storage = storage::lock(&storage)?;
        load_statistics(&*storage)?
    };

    print_statistics(&stats);
    Ok(())
}

/// Handles the --list-jobs mode
fn handle_list_jobs(config: &Config) -> anyhow::Result<()> {
    let jobs = jobs(config)?.list(20)?;
    println!("Jobs ({}):", jobs.len());
    print_job_list(&jobs);
    Ok(())
}

/// Handles the --validate-links mode
async fn handle_validate_links(config: &Config, page_id: i64) -> anyhow::Result<()> {
    let client = build_http_client(&JobConfig::from(config))?;
    let result = tasks::validate_links(open_shared(config)?, &client, page_id).await?;
    print_task_result(&result)
}

/// Handles the --resume mode: resumes the job and works on it until it ends
async fn handle_resume(config: &Config, job_id: i64) -> anyhow::Result<()> {
    let storage = open_shared(config)?;
    JobManager::new(storage.clone()).resume(job_id)?;
    work_on(storage, job_id).await
}

/// Works on an existing job alongside any other process until it ends
async fn work_on(storage: SharedStorage, job_id: i64) -> anyhow::Result<()> {
    let jobs = JobManager::new(storage.clone());
    let status = jobs.status(job_id)?;
    if status.is_terminal() {
        anyhow::bail!("Job {} is already {}", job_id, status);
    }

    let coordinator = Coordinator::attach(storage, job_id)?;
    let job = coordinator.run().await?;

    let errors = jobs.errors(job.id)?;
    print_job(&job, &errors);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    tracing::info!(
        "Start URLs: {}, allowed domains: {}",
        config.site.start_urls.len(),
        config.site.allowed_domains.len()
    );

    match run_crawl(config, config_hash).await {
        Ok(job) => {
            tracing::info!("Crawl finished with status {}", job.status);
            let errors = jobs(config)?.errors(job.id)?;
            print_job(&job, &errors);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_mode_parses() {
        let cli = Cli::try_parse_from(["site-harvest", "harvest.toml", "--work", "7"]).unwrap();
        assert_eq!(cli.work, Some(7));
        assert!(!cli.stats);
    }

    #[test]
    fn test_modes_are_exclusive() {
        let result = Cli::try_parse_from(["site-harvest", "harvest.toml", "--work", "7", "--stats"]);
        assert!(result.is_err());
    }
}
