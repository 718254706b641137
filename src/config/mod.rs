//! Configuration management for the escargot crawler
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of simultaneously outstanding requests
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default table used by the SQLite queue
pub const DEFAULT_TABLE_NAME: &str = "escargot";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Crawl budgets and politeness settings
    #[serde(default)]
    pub crawler: CrawlConfig,

    /// Persistent queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Crawl budgets and politeness settings
///
/// Zero means "unbounded" for `max_requests`, `max_duration_ms` and `max_depth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Maximum number of simultaneously outstanding requests
    pub concurrency: usize,

    /// Maximum number of requests for one crawl
    pub max_requests: usize,

    /// Maximum wall-clock duration of one crawl in milliseconds
    pub max_duration_ms: u64,

    /// Delay before every request in microseconds
    pub request_delay_us: u64,

    /// Maximum depth from the base URIs
    pub max_depth: u32,

    /// User agent string sent by the default transport
    pub user_agent: String,

    /// Request timeout in seconds for the default transport
    pub request_timeout_secs: u64,

    /// Maximum number of redirects the default transport follows
    pub max_redirects: usize,
}

/// Persistent queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,

    /// Table holding the queue rows
    pub table_name: String,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_requests: 0,
            max_duration_ms: 0,
            request_delay_us: 0,
            max_depth: 0,
            user_agent: default_user_agent(),
            request_timeout_secs: 30,
            max_redirects: 10,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/escargot.db"),
            table_name: String::from(DEFAULT_TABLE_NAME),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

/// User agent used when none is configured
pub fn default_user_agent() -> String {
    format!("escargot/{}", env!("CARGO_PKG_VERSION"))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = CrawlConfig::default();

        let crawler = CrawlConfig {
            concurrency: env_parse("ESCARGOT_CONCURRENCY").unwrap_or(defaults.concurrency),
            max_requests: env_parse("ESCARGOT_MAX_REQUESTS").unwrap_or(defaults.max_requests),
            max_duration_ms: env_parse("ESCARGOT_MAX_DURATION_MS")
                .unwrap_or(defaults.max_duration_ms),
            request_delay_us: env_parse("ESCARGOT_REQUEST_DELAY_US")
                .unwrap_or(defaults.request_delay_us),
            max_depth: env_parse("ESCARGOT_MAX_DEPTH").unwrap_or(defaults.max_depth),
            user_agent: std::env::var("ESCARGOT_USER_AGENT").unwrap_or(defaults.user_agent),
            request_timeout_secs: env_parse("ESCARGOT_REQUEST_TIMEOUT")
                .unwrap_or(defaults.request_timeout_secs),
            max_redirects: env_parse("ESCARGOT_MAX_REDIRECTS").unwrap_or(defaults.max_redirects),
        };

        let queue = QueueConfig {
            sqlite_path: std::env::var("ESCARGOT_SQLITE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| QueueConfig::default().sqlite_path),
            table_name: std::env::var("ESCARGOT_TABLE_NAME")
                .unwrap_or_else(|_| String::from(DEFAULT_TABLE_NAME)),
        };

        let logging = LoggingConfig {
            level: std::env::var("ESCARGOT_LOG_LEVEL").unwrap_or_else(|_| String::from("info")),
            format: std::env::var("ESCARGOT_LOG_FORMAT").unwrap_or_else(|_| String::from("text")),
        };

        let config = Self {
            crawler,
            queue,
            logging,
        };
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.crawler.validate()?;

        if self.queue.table_name.is_empty()
            || !self
                .queue
                .table_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            anyhow::bail!(
                "table_name must be a non-empty identifier, got \"{}\"",
                self.queue.table_name
            );
        }

        Ok(())
    }
}

/// Whole `unit`s in `duration`, rounded up and saturating at `u64::MAX`
fn ceil_units(duration: Duration, unit: Duration) -> u64 {
    let units = duration.as_nanos().div_ceil(unit.as_nanos());
    u64::try_from(units).unwrap_or(u64::MAX)
}

impl CrawlConfig {
    /// Validate crawl settings
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be greater than 0");
        }

        if self.user_agent.trim().is_empty() {
            anyhow::bail!("user_agent must not be empty");
        }

        Ok(())
    }

    /// Maximum crawl duration, `Duration::ZERO` meaning unbounded
    #[must_use]
    pub fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }

    /// Delay applied before every request
    #[must_use]
    pub fn request_delay(&self) -> Duration {
        Duration::from_micros(self.request_delay_us)
    }

    /// Set the crawl duration budget
    ///
    /// Sub-millisecond remainders round up so a non-zero budget never becomes unbounded.
    pub fn set_max_duration(&mut self, max_duration: Duration) {
        self.max_duration_ms = ceil_units(max_duration, Duration::from_millis(1));
    }

    /// Set the delay applied before every request, rounded up to the microsecond
    pub fn set_request_delay(&mut self, request_delay: Duration) {
        self.request_delay_us = ceil_units(request_delay, Duration::from_micros(1));
    }

    /// Request timeout for the default transport
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.crawler.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.crawler.max_depth, 0);
    }

    #[test]
    fn test_invalid_concurrency() {
        let mut config = Config::default();
        config.crawler.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_table_name() {
        let mut config = Config::default();
        config.queue.table_name = String::from("escargot; DROP TABLE x");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_conversion() {
        let crawler = CrawlConfig {
            max_duration_ms: 90_000,
            request_delay_us: 250_000,
            ..CrawlConfig::default()
        };

        assert_eq!(crawler.max_duration(), Duration::from_secs(90));
        assert_eq!(crawler.request_delay(), Duration::from_millis(250));
        assert_eq!(crawler.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_sub_second_durations_are_kept() {
        let mut crawler = CrawlConfig::default();

        crawler.set_max_duration(Duration::from_millis(500));
        crawler.set_request_delay(Duration::from_micros(750));
        assert_eq!(crawler.max_duration(), Duration::from_millis(500));
        assert_eq!(crawler.request_delay(), Duration::from_micros(750));

        crawler.set_max_duration(Duration::from_nanos(1));
        crawler.set_request_delay(Duration::from_nanos(1));
        assert_eq!(crawler.max_duration(), Duration::from_millis(1));
        assert_eq!(crawler.request_delay(), Duration::from_micros(1));

        crawler.set_max_duration(Duration::MAX);
        assert_eq!(crawler.max_duration_ms, u64::MAX);
    }

    #[test]
    fn test_from_file_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("escargot.toml");
        std::fs::write(
            &path,
            r#"
                [crawler]
                concurrency = 4
                max_depth = 3

                [logging]
                format = "json"
            "#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.crawler.concurrency, 4);
        assert_eq!(config.crawler.max_depth, 3);
        assert_eq!(config.crawler.max_requests, 0);
        assert_eq!(config.queue.table_name, DEFAULT_TABLE_NAME);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }
}
