use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads, parses and validates a configuration file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use site_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Start URLs: {:?}", config.site.start_urls);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes the hex-encoded SHA-256 of the configuration file
///
/// Stored with every job so an operator can tell which configuration produced it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&content)))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_CONFIG: &str = r#"
[crawler]
max-depth = 3
concurrent-requests = 8
delay-between-requests = 500

[user-agent]
crawler-name = "HarvestBot"
crawler-version = "1.0"
contact-url = "https://example.com/bot"
contact-email = "ops@example.com"

[output]
database-path = "./harvest.db"

[site]
start-urls = ["https://docs.example.com/"]
allowed-domains = ["docs.example.com", "*.cdn.example.com"]
excluded-patterns = ["/login", "\\?print=1"]
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_depth, 3);
        assert_eq!(config.crawler.concurrent_requests, 8);
        assert_eq!(config.crawler.delay_between_requests, 500);
        assert_eq!(config.user_agent.crawler_name, "HarvestBot");
        assert_eq!(config.site.allowed_domains.len(), 2);
        assert_eq!(config.site.excluded_patterns.len(), 2);
    }

    #[test]
    fn test_defaults_applied() {
        let config = parse_config(VALID_CONFIG).unwrap();

        assert_eq!(config.crawler.timeout, 30);
        assert_eq!(config.crawler.retry_attempts, 3);
        assert_eq!(config.crawler.retry_delay, 10_000);
        assert_eq!(config.crawler.poll_interval, 5_000);
        assert!(config.crawler.respect_robots_txt);
        assert!(!config.crawler.download_images);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/harvest.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = VALID_CONFIG.replace("concurrent-requests = 8", "concurrent-requests = 0");
        let result = parse_config(&content);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_user_agent_header_value() {
        let config = parse_config(VALID_CONFIG).unwrap();
        assert_eq!(
            config.user_agent.header_value(),
            "HarvestBot/1.0 (+https://example.com/bot; ops@example.com)"
        );
    }

    #[test]
    fn test_config_hash_is_stable_and_content_sensitive() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        assert_eq!(hash1, compute_config_hash(file1.path()).unwrap());
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, compute_config_hash(file2.path()).unwrap());
    }
}
