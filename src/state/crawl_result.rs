/// Crawl result definitions
///
/// A `CrawlResult` is produced exactly once per entry, when the entry reaches
/// a terminal outcome.
use crate::state::Record;
use crate::url::CanonicalUrl;
use chrono::{DateTime, Utc};
use std::fmt;

/// Terminal outcome of a frontier entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlStatus {
    /// The page was fetched with a 2xx response
    Success,

    /// The fetch failed permanently, or transient failures exhausted the retries
    Failed,

    /// No content was fetched (robots.txt disallow, redirect handed back to the frontier)
    Skipped,
}

impl CrawlStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Parses a status from a database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::Failed => write!(f, "Failed"),
            Self::Skipped => write!(f, "Skipped"),
        }
    }
}

/// The terminal outcome of one frontier entry
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub url: CanonicalUrl,
    pub status: CrawlStatus,

    /// HTTP status of the last attempt, if a response was received
    pub status_code: Option<u16>,

    pub depth: u32,

    /// Fetch attempts made, including retries
    pub attempts: u32,

    pub extracted_records: Vec<Record>,

    /// In-scope links found on the page, after normalization
    pub discovered_links: Vec<CanonicalUrl>,

    /// Why the entry failed or was skipped
    pub error: Option<String>,

    /// Set when the page was fetched but extraction failed (non-fatal)
    pub extraction_error: Option<String>,

    pub fetched_at: DateTime<Utc>,
}

impl CrawlResult {
    /// Creates a result with no records or links
    pub fn new(url: CanonicalUrl, status: CrawlStatus, depth: u32, attempts: u32) -> Self {
        Self {
            url,
            status,
            status_code: None,
            depth,
            attempts,
            extracted_records: Vec::new(),
            discovered_links: Vec::new(),
            error: None,
            extraction_error: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
