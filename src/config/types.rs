use serde::{Deserialize, Serialize};

/// Main configuration structure for Site-Harvest
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    pub site: SiteConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerConfig {
    /// Maximum link distance from a start URL
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Batch size: number of fetches dispatched concurrently
    #[serde(rename = "concurrent-requests")]
    pub concurrent_requests: u32,

    /// Politeness delay between batches (milliseconds)
    #[serde(rename = "delay-between-requests", default = "default_delay")]
    pub delay_between_requests: u64,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Attempts before a URL is terminally failed
    #[serde(rename = "retry-attempts", default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base retry delay (milliseconds); attempt n waits n times this
    #[serde(rename = "retry-delay", default = "default_retry_delay")]
    pub retry_delay: u64,

    /// Sleep between polls when the frontier is momentarily empty (milliseconds)
    #[serde(rename = "poll-interval", default = "default_poll_interval")]
    pub poll_interval: u64,

    #[serde(rename = "respect-robots-txt", default = "default_true")]
    pub respect_robots_txt: bool,

    /// Recorded in the job snapshot; assets are never downloaded
    #[serde(rename = "download-images", default)]
    pub download_images: bool,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserAgentConfig {
    /// Name of the crawler (also the robots.txt product token)
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Full User-Agent header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// The site being harvested
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    /// Seed URLs, admitted at depth 0 with priority 1
    #[serde(rename = "start-urls")]
    pub start_urls: Vec<String>,

    /// Host patterns links must match to be followed (e.g. "docs.example.com" or "*.example.com")
    #[serde(rename = "allowed-domains")]
    pub allowed_domains: Vec<String>,

    /// Regular expressions; a URL matching any of them is never admitted
    #[serde(rename = "excluded-patterns", default)]
    pub excluded_patterns: Vec<String>,
}

fn default_delay() -> u64 {
    1000
}

fn default_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    10_000
}

fn default_poll_interval() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}
