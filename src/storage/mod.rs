//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Run tracking and resumption support
//! - The per-run ledger of enqueued URLs and their outcomes
//! - Extracted records

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{CrawlStore, StorageError, StorageResult};

use crate::state::CrawlStatus;
use std::path::Path;

/// Opens (or creates) the crawl database at `path`
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true if a run in this status can be picked up again
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Running | Self::Interrupted)
    }
}

/// Status of a stored entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    Queued,
    Success,
    Failed,
    Skipped,
}

impl EntryStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Success => CrawlStatus::Success.to_db_string(),
            Self::Failed => CrawlStatus::Failed.to_db_string(),
            Self::Skipped => CrawlStatus::Skipped.to_db_string(),
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            other => CrawlStatus::from_db_string(other).map(Self::from),
        }
    }
}

impl From<CrawlStatus> for EntryStatus {
    fn from(status: CrawlStatus) -> Self {
        match status {
            CrawlStatus::Success => Self::Success,
            CrawlStatus::Failed => Self::Failed,
            CrawlStatus::Skipped => Self::Skipped,
        }
    }
}

/// An entry that had no terminal result when its run stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub url: String,
    pub depth: u32,
    pub priority: i32,
    pub referrer: Option<String>,

    /// Failed attempts already made
    pub attempts: u32,
}

/// A failed entry, for reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub url: String,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub attempts: u32,
}
