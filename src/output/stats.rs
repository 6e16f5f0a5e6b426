//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::output::{OutputError, OutputResult};
use crate::storage::{CrawlStore, EntryStatus, FailureRecord, RunStatus};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Number of failed entries listed in reports
pub const MAX_LISTED_FAILURES: usize = 20;

/// Crawl statistics summary for one run
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunStatus,
    pub config_hash: String,

    /// Total number of URLs the run accepted
    pub total_entries: u64,

    /// Entries still waiting for a terminal result
    pub queued: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,

    /// Number of distinct hosts among the entries
    pub unique_hosts: u64,

    /// Records extracted across all pages
    pub total_records: u64,

    /// Entries per depth
    pub depth_breakdown: BTreeMap<u32, u64>,

    /// The first failed entries, in discovery order
    pub failures: Vec<FailureRecord>,
}

impl CrawlStatistics {
    /// Entries with a terminal result
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed + self.skipped
    }

    /// Percentage of completed entries that succeeded
    pub fn success_rate(&self) -> f64 {
        let completed = self.completed();
        if completed == 0 {
            0.0
        } else {
            self.succeeded as f64 / completed as f64 * 100.0
        }
    }

    /// Run duration, if the run has finished
    pub fn duration_seconds(&self) -> Option<i64> {
        let started = self.started_at.parse::<DateTime<Utc>>().ok()?;
        let finished = self.finished_at.as_ref()?.parse::<DateTime<Utc>>().ok()?;
        Some((finished - started).num_seconds())
    }
}

/// Loads statistics for the most recent run
pub fn load_statistics(store: &dyn CrawlStore) -> OutputResult<CrawlStatistics> {
    let run = store.get_latest_run()?.ok_or(OutputError::NoRuns)?;
    load_run_statistics(store, run.id)
}

/// Loads statistics for a specific run
pub fn load_run_statistics(store: &dyn CrawlStore, run_id: i64) -> OutputResult<CrawlStatistics> {
    let run = store.get_run(run_id)?;

    Ok(CrawlStatistics {
        run_id: run.id,
        started_at: run.started_at,
        finished_at: run.finished_at,
        status: run.status,
        config_hash: run.config_hash,
        total_entries: store.count_entries(run_id)?,
        queued: store.count_by_status(run_id, EntryStatus::Queued)?,
        succeeded: store.count_by_status(run_id, EntryStatus::Success)?,
        failed: store.count_by_status(run_id, EntryStatus::Failed)?,
        skipped: store.count_by_status(run_id, EntryStatus::Skipped)?,
        unique_hosts: store.count_hosts(run_id)?,
        total_records: store.count_records(run_id)?,
        depth_breakdown: store.depth_breakdown(run_id)?,
        failures: store.failures(run_id, MAX_LISTED_FAILURES)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Run {} ({})", stats.run_id, stats.status.to_db_string());
    println!("  Started: {}", stats.started_at);
    if let Some(finished) = &stats.finished_at {
        println!("  Finished: {}", finished);
    }
    println!();

    println!("Overview:");
    println!("  URLs accepted: {}", stats.total_entries);
    println!("  Unique hosts: {}", stats.unique_hosts);
    println!("  Records extracted: {}", stats.total_records);
    println!();

    println!("Entries by Status:");
    for (label, count) in [
        ("Success", stats.succeeded),
        ("Failed", stats.failed),
        ("Skipped", stats.skipped),
        ("Queued", stats.queued),
    ] {
        let percentage = if stats.total_entries > 0 {
            (count as f64 / stats.total_entries as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", label, count, percentage);
    }
    println!();

    if !stats.depth_breakdown.is_empty() {
        println!("Entries by Depth:");
        for (depth, count) in &stats.depth_breakdown {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    if !stats.failures.is_empty() {
        println!("Failures (first {}):", stats.failures.len());
        for failure in &stats.failures {
            let code = failure
                .status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  [{}] {} ({})",
                code,
                failure.url,
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} completed entries)",
        stats.success_rate(),
        stats.succeeded,
        stats.completed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CrawlResult, CrawlStatus, FrontierEntry, Record};
    use crate::storage::SqliteStore;
    use crate::url::CanonicalUrl;
    use tokio::time::Instant;

    fn url(s: &str) -> CanonicalUrl {
        CanonicalUrl::parse(s).unwrap()
    }

    #[test]
    fn test_load_statistics() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let run_id = store.create_run("abc").unwrap();

        let seed = FrontierEntry::seed(url("http://a.test/"), Instant::now());
        store.record_enqueued(run_id, &[seed.clone()]).unwrap();

        let children = vec![
            FrontierEntry::child_of(&seed, url("http://a.test/b"), Instant::now()),
            FrontierEntry::child_of(&seed, url("http://a.test/c"), Instant::now()),
        ];
        let mut result = CrawlResult::new(seed.url.clone(), CrawlStatus::Success, 0, 1)
            .with_status_code(200);
        result.extracted_records = vec![Record::new().with_field("text", "Widget")];
        store.record_completion(run_id, &result, &children).unwrap();

        let failed = CrawlResult::new(children[0].url.clone(), CrawlStatus::Failed, 1, 1)
            .with_status_code(404)
            .with_error("HTTP 404");
        store.record_completion(run_id, &failed, &[]).unwrap();

        let stats = load_statistics(&store).unwrap();
        assert_eq!(stats.run_id, run_id);
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.total_records, 1);
        assert_eq!(stats.unique_hosts, 1);
        assert_eq!(stats.depth_breakdown.get(&1), Some(&2));
        assert_eq!(stats.failures.len(), 1);
        assert_eq!(stats.failures[0].status_code, Some(404));
        assert!((stats.success_rate() - 50.0).abs() < f64::EPSILON);
        assert_eq!(stats.duration_seconds(), None);
    }

    #[test]
    fn test_no_runs() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert!(matches!(load_statistics(&store), Err(OutputError::NoRuns)));
    }
}
