use crate::url::{HostScope, NormalizeOptions, QueryPolicy};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Ripple-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    pub output: OutputConfig,
}

/// Crawl engine configuration
///
/// Durations are given in milliseconds in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of fetch workers (bounds total network concurrency)
    pub max_concurrency: u32,

    /// Timeout applied to every fetch
    pub per_request_timeout_ms: u64,

    /// Retries allowed for transient failures before an entry fails
    pub max_retries: u32,

    /// Minimum spacing between two requests to the same host
    pub base_backoff_ms: u64,

    /// Ceiling for the exponential per-host backoff
    pub max_backoff_ms: u64,

    /// Maximum link depth from the seeds (seeds are depth 0)
    pub max_depth: u32,

    #[serde(default)]
    pub host_scope: HostScope,

    #[serde(default)]
    pub query_policy: QueryPolicy,

    #[serde(default = "default_true")]
    pub strip_tracking_params: bool,

    /// Emit results in discovery order instead of completion order
    #[serde(default)]
    pub ordered_results: bool,

    /// Fetch and honour robots.txt for every host
    #[serde(default)]
    pub respect_robots: bool,

    /// Redirect hops the HTTP fetcher follows on its own
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,

    /// URLs the crawl starts from
    #[serde(default)]
    pub seeds: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_max_redirects() -> u32 {
    10
}

impl CrawlerConfig {
    pub fn per_request_timeout(&self) -> Duration {
        Duration::from_millis(self.per_request_timeout_ms)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// The normalizer options implied by this configuration
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            query_policy: self.query_policy,
            strip_tracking_params: self.strip_tracking_params,
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            per_request_timeout_ms: 30_000,
            max_retries: 3,
            base_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
            max_depth: 2,
            host_scope: HostScope::default(),
            query_policy: QueryPolicy::default(),
            strip_tracking_params: true,
            ordered_results: false,
            respect_robots: false,
            max_redirects: default_max_redirects(),
            seeds: Vec::new(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Extraction configuration for the built-in HTML extractor
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    /// CSS selector of the elements turned into records
    #[serde(default = "default_selector")]
    pub selector: String,
}

fn default_selector() -> String {
    ".prodbox".to_string()
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            selector: default_selector(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}
