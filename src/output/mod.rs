//! Output module for generating crawl summaries and reports
//!
//! This module handles:
//! - Loading run statistics from storage
//! - Generating markdown summaries of crawl results

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_run_statistics, load_statistics, print_statistics, CrawlStatistics};

use crate::state::Record;
use crate::storage::{CrawlStore, StorageError};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("No crawl runs found in database")]
    NoRuns,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Everything the summary report shows for one run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub statistics: CrawlStatistics,

    /// Extracted records with the page they came from
    pub records: Vec<(String, Record)>,
}

/// Builds the summary of the most recent run
pub fn generate_summary(store: &dyn CrawlStore) -> OutputResult<CrawlSummary> {
    let statistics = load_statistics(store)?;
    let records = store.load_records(statistics.run_id)?;

    Ok(CrawlSummary {
        statistics,
        records,
    })
}
