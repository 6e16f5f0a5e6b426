//! Ripple-Crawl: a bounded, polite, resumable crawl engine
//!
//! This crate turns "fetch one page and pick out the nodes with a CSS class"
//! into a crawl of a whole site: a deduplicating frontier with per-host
//! politeness, a bounded pool of fetch workers with retry and backoff, an
//! extraction hand-off that feeds discovered links back into the frontier,
//! and a coordinator that owns the crawl lifecycle.
//!
//! The engine only talks to the network and to the HTML parser through the
//! [`crawler::Fetcher`] and [`crawler::Extractor`] traits. Default
//! implementations built on reqwest and scraper are provided.

pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Ripple-Crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Extraction setup error: {0}")]
    Extract(#[from] crawler::ExtractError),

    #[error("Invalid crawl state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlState,
        to: state::CrawlState,
    },

    #[error("Crawl task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
///
/// Every variant is a `MalformedUrl` in crawl terms: the link is rejected
/// before it reaches the frontier and the crawl carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Ripple-Crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, CrawlerConfig};
pub use crawler::{Coordinator, CrawlHandle, Frontier};
pub use state::{CrawlResult, CrawlState, CrawlStatus, FrontierEntry, HostState};
pub use url::{normalize, CanonicalUrl, HostScope, NormalizeOptions, QueryPolicy};
