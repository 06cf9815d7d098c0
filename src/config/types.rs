use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for crawl-engine
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Order in which the frontier hands out entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontierOrder {
    /// First in, first out (breadth-first)
    #[default]
    Fifo,
    /// Shallowest depth first, then discovery order
    Priority,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerConfig {
    /// Maximum link depth from the root URL
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of pages fetched in one session
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Number of concurrent fetch workers per session
    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// Minimum time between requests to the same host (milliseconds)
    #[serde(rename = "politeness-delay", default = "default_politeness_delay")]
    pub politeness_delay_ms: u64,

    /// Timeout for a single fetch attempt (milliseconds)
    #[serde(rename = "fetch-timeout", default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,

    /// Whether robots.txt rules and crawl delays are honored
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,

    #[serde(rename = "frontier-order", default)]
    pub frontier_order: FrontierOrder,
}

impl CrawlerConfig {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            max_concurrency: default_max_concurrency(),
            politeness_delay_ms: default_politeness_delay(),
            fetch_timeout_ms: default_fetch_timeout(),
            respect_robots: true,
            frontier_order: FrontierOrder::default(),
        }
    }
}

/// Retry policy for transient fetch failures
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts per URL, including the first one
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the first retry (milliseconds), doubled per retry
    #[serde(rename = "base-delay", default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff (milliseconds)
    #[serde(rename = "max-delay", default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Random jitter added on top of the backoff, in percent of it
    #[serde(rename = "jitter-percent", default = "default_jitter_percent")]
    pub jitter_percent: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter_percent: default_jitter_percent(),
        }
    }
}

/// Which discovered URLs belong to a session
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScopeConfig {
    /// Only follow links to the root URL's host
    #[serde(rename = "same-host-only", default = "default_true")]
    pub same_host_only: bool,

    /// Extra domain patterns (e.g., "example.com" or "*.example.com") that are in scope
    #[serde(rename = "allowed-domains", default)]
    pub allowed_domains: Vec<String>,

    /// URLs containing any of these substrings are skipped
    #[serde(rename = "exclude-patterns", default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            same_host_only: true,
            allowed_domains: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the robots.txt product token
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default = "default_contact_url")]
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: default_contact_url(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_max_depth() -> u32 {
    2
}

fn default_max_pages() -> u32 {
    100
}

fn default_max_concurrency() -> u32 {
    8
}

fn default_politeness_delay() -> u64 {
    1000
}

fn default_fetch_timeout() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    8000
}

fn default_jitter_percent() -> u64 {
    10
}

fn default_crawler_name() -> String {
    "crawl-engine".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_contact_url() -> String {
    "https://example.com/bot".to_string()
}

fn default_database_path() -> String {
    "./crawl.db".to_string()
}
