//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of crawl results,
//! including statistics, failures, and the extracted records.

use crate::output::{CrawlSummary, OutputResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Records listed in the summary before it is truncated
const MAX_LISTED_RECORDS: usize = 200;

/// Writes a markdown summary to `output_path`
pub fn generate_markdown_summary(summary: &CrawlSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl summary as markdown
pub fn format_markdown_summary(summary: &CrawlSummary) -> String {
    let stats = &summary.statistics;
    let mut md = String::new();

    md.push_str("# Ripple-Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", stats.run_id));
    md.push_str(&format!("- **Started**: {}\n", stats.started_at));
    if let Some(finished) = &stats.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    if let Some(duration) = stats.duration_seconds() {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    md.push_str(&format!("- **Status**: {}\n", stats.status.to_db_string()));
    md.push_str(&format!("- **Config Hash**: {}\n\n", stats.config_hash));

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **URLs Accepted**: {}\n", stats.total_entries));
    md.push_str(&format!("- **Unique Hosts**: {}\n", stats.unique_hosts));
    md.push_str(&format!(
        "- **Records Extracted**: {}\n",
        stats.total_records
    ));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        stats.success_rate()
    ));

    md.push_str("## Status Breakdown\n\n");
    md.push_str("| Status | Count |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Success | {} |\n", stats.succeeded));
    md.push_str(&format!("| Failed | {} |\n", stats.failed));
    md.push_str(&format!("| Skipped | {} |\n", stats.skipped));
    md.push_str(&format!("| Queued | {} |\n\n", stats.queued));

    if !stats.depth_breakdown.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | URLs |\n");
        md.push_str("|-------|------|\n");
        for (depth, count) in &stats.depth_breakdown {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    if !stats.failures.is_empty() {
        md.push_str("## Failures\n\n");
        md.push_str("| URL | Status | Attempts | Error |\n");
        md.push_str("|-----|--------|----------|-------|\n");
        for failure in &stats.failures {
            let code = failure
                .status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                failure.url,
                code,
                failure.attempts,
                escape_cell(failure.error.as_deref().unwrap_or(""))
            ));
        }
        md.push('\n');
    }

    if !summary.records.is_empty() {
        md.push_str("## Extracted Records\n\n");
        md.push_str("| Page | Fields |\n");
        md.push_str("|------|--------|\n");
        for (url, record) in summary.records.iter().take(MAX_LISTED_RECORDS) {
            let fields = record
                .iter()
                .map(|(key, value)| format!("{}: {}", key, value))
                .collect::<Vec<_>>()
                .join("; ");
            md.push_str(&format!("| {} | {} |\n", url, escape_cell(&fields)));
        }
        if summary.records.len() > MAX_LISTED_RECORDS {
            md.push_str(&format!(
                "\n... and {} more\n",
                summary.records.len() - MAX_LISTED_RECORDS
            ));
        }
        md.push('\n');
    }

    md
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::stats::CrawlStatistics;
    use crate::state::Record;
    use crate::storage::{FailureRecord, RunStatus};
    use std::collections::BTreeMap;

    fn create_test_summary() -> CrawlSummary {
        CrawlSummary {
            statistics: CrawlStatistics {
                run_id: 1,
                started_at: "2024-01-01T00:00:00Z".to_string(),
                finished_at: Some("2024-01-01T01:00:00Z".to_string()),
                status: RunStatus::Completed,
                config_hash: "abc123".to_string(),
                total_entries: 1000,
                queued: 0,
                succeeded: 900,
                failed: 80,
                skipped: 20,
                unique_hosts: 3,
                total_records: 5000,
                depth_breakdown: BTreeMap::new(),
                failures: Vec::new(),
            },
            records: Vec::new(),
        }
    }

    #[test]
    fn test_format_markdown_summary() {
        let summary = create_test_summary();
        let markdown = format_markdown_summary(&summary);

        assert!(markdown.contains("# Ripple-Crawl Summary"));
        assert!(markdown.contains("- **Run ID**: 1"));
        assert!(markdown.contains("- **Duration**: 3600 seconds"));
        assert!(markdown.contains("- **Status**: completed"));
        assert!(markdown.contains("| Success | 900 |"));
        assert!(markdown.contains("- **Records Extracted**: 5000"));
        assert!(markdown.contains("- **Success Rate**: 90.00%"));
        assert!(!markdown.contains("## Failures"));
    }

    #[test]
    fn test_markdown_with_depth_breakdown() {
        let mut summary = create_test_summary();
        summary.statistics.depth_breakdown.insert(0, 1);
        summary.statistics.depth_breakdown.insert(1, 200);

        let markdown = format_markdown_summary(&summary);

        assert!(markdown.contains("Depth Breakdown"));
        assert!(markdown.contains("| 0 | 1 |"));
        assert!(markdown.contains("| 1 | 200 |"));
    }

    #[test]
    fn test_markdown_with_failures_and_records() {
        let mut summary = create_test_summary();
        summary.statistics.failures.push(FailureRecord {
            url: "http://a.test/gone".to_string(),
            status_code: Some(404),
            error: Some("HTTP 404".to_string()),
            attempts: 1,
        });
        summary.records.push((
            "http://a.test/".to_string(),
            Record::new()
                .with_field("text", "Tea | Coffee")
                .with_field("@data-sku", "A1"),
        ));

        let markdown = format_markdown_summary(&summary);

        assert!(markdown.contains("| http://a.test/gone | 404 | 1 | HTTP 404 |"));
        assert!(markdown.contains("| http://a.test/ | @data-sku: A1; text: Tea \\| Coffee |"));
    }

    #[test]
    fn test_generate_markdown_summary_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.md");

        generate_markdown_summary(&create_test_summary(), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Ripple-Crawl Summary"));
    }
}
