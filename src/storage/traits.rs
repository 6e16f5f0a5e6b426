//! Storage traits and error types

use crate::state::{CrawlResult, FrontierEntry, Record};
use crate::storage::{EntryStatus, FailureRecord, PendingEntry, RunRecord, RunStatus};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence hooks used by the crawl coordinator
///
/// Everything a run enqueues and every terminal result is written through
/// this trait, which is enough to resume an interrupted run: the ledger is
/// every stored URL and the pending entries are those still `queued`.
pub trait CrawlStore: Send {
    // ===== Run Management =====

    /// Creates a new crawl run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Entries =====

    /// Records newly accepted frontier entries as `queued`
    fn record_enqueued(&mut self, run_id: i64, entries: &[FrontierEntry]) -> StorageResult<()>;

    /// Records a failed attempt of an entry that will be retried
    fn record_retry(
        &mut self,
        run_id: i64,
        url: &str,
        attempts: u32,
        error: &str,
    ) -> StorageResult<()>;

    /// Records a terminal result together with the entries its page enqueued,
    /// in one transaction
    fn record_completion(
        &mut self,
        run_id: i64,
        result: &CrawlResult,
        enqueued: &[FrontierEntry],
    ) -> StorageResult<()>;

    /// Every URL the run ever accepted
    fn load_ledger(&self, run_id: i64) -> StorageResult<Vec<String>>;

    /// Entries without a terminal result, in discovery order
    fn load_pending(&self, run_id: i64) -> StorageResult<Vec<PendingEntry>>;

    // ===== Statistics =====

    fn count_by_status(&self, run_id: i64, status: EntryStatus) -> StorageResult<u64>;

    fn count_entries(&self, run_id: i64) -> StorageResult<u64>;

    fn count_records(&self, run_id: i64) -> StorageResult<u64>;

    /// Number of distinct hosts among the run's entries
    fn count_hosts(&self, run_id: i64) -> StorageResult<u64>;

    /// Entry count per depth
    fn depth_breakdown(&self, run_id: i64) -> StorageResult<BTreeMap<u32, u64>>;

    /// The first `limit` failed entries
    fn failures(&self, run_id: i64, limit: usize) -> StorageResult<Vec<FailureRecord>>;

    /// Extracted records with the URL they came from, in extraction order
    fn load_records(&self, run_id: i64) -> StorageResult<Vec<(String, Record)>>;
}
