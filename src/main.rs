//! Ripple-Crawl main entry point
//!
//! This is the command-line interface for the Ripple-Crawl crawl engine.

use clap::Parser;
use ripple_crawl::config::{load_config_with_hash, Config};
use ripple_crawl::crawler::{Coordinator, HtmlExtractor, HttpFetcher};
use ripple_crawl::output::{
    generate_markdown_summary, generate_summary, load_statistics, print_statistics,
};
use ripple_crawl::storage::open_store;
use ripple_crawl::url::normalize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Ripple-Crawl: a bounded, polite, resumable crawl engine
///
/// Ripple-Crawl starts from a set of seed URLs, follows in-scope links up to
/// a maximum depth while spacing requests per host, and extracts the
/// elements matching a CSS selector from every page.
#[derive(Parser, Debug)]
#[command(name = "ripple-crawl")]
#[command(version)]
#[command(about = "A bounded, polite, resumable crawl engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl instead of resuming an interrupted one
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Generate markdown summary from existing data and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else {
        handle_crawl(config, config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_crawl=info,warn"),
            1 => EnvFilter::new("ripple_crawl=debug,info"),
            2 => EnvFilter::new("ripple_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let crawler = &config.crawler;
    println!("=== Ripple-Crawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max concurrency: {}", crawler.max_concurrency);
    println!("  Max depth: {}", crawler.max_depth);
    println!("  Per-request timeout: {}ms", crawler.per_request_timeout_ms);
    println!("  Max retries: {}", crawler.max_retries);
    println!(
        "  Backoff: {}ms base, {}ms max",
        crawler.base_backoff_ms, crawler.max_backoff_ms
    );
    println!("  Host scope: {:?}", crawler.host_scope);
    println!("  Query policy: {:?}", crawler.query_policy);
    println!("  Strip tracking params: {}", crawler.strip_tracking_params);
    println!("  Ordered results: {}", crawler.ordered_results);
    println!("  Respect robots.txt: {}", crawler.respect_robots);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nExtraction:");
    println!("  Selector: {}", config.extract.selector);
    HtmlExtractor::new(&config.extract.selector)?;

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    let options = crawler.normalize_options();
    println!("\nSeeds ({}):", crawler.seeds.len());
    for seed in &crawler.seeds {
        let canonical = normalize(seed, None, &options)?;
        println!("  - {}", canonical);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} seed URLs",
        crawler.seeds.len()
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: generates markdown summary
fn handle_export_summary(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Exporting Crawl Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    export_summary(config)?;

    println!("✓ Summary exported to: {}", config.output.summary_path);
    Ok(())
}

fn export_summary(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(Path::new(&config.output.database_path))?;

    tracing::info!("Loading crawl data from database...");
    let summary = generate_summary(&store)?;

    tracing::info!("Generating markdown summary...");
    generate_markdown_summary(&summary, Path::new(&config.output.summary_path))?;
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume if interrupted run exists)");
    }
    tracing::info!("Seed URLs: {}", config.crawler.seeds.len());

    let store = open_store(Path::new(&config.output.database_path))?;
    let fetcher = Arc::new(HttpFetcher::from_config(
        &config.user_agent,
        config.crawler.max_redirects,
    )?);
    let extractor = Arc::new(HtmlExtractor::new(&config.extract.selector)?);

    let mut crawl = Coordinator::new(config.crawler.clone(), fetcher, extractor)?
        .with_store(store, config_hash, fresh)
        .with_robots_agent(config.user_agent.crawler_name.clone())
        .start()?;

    let stopper = crawl.stopper();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, stopping after in-flight fetches");
            stopper.stop();
        }
    });

    while let Some(result) = crawl.next_result().await {
        match &result.error {
            None => tracing::info!(
                "[{}] {} (depth {}, {} records, {} links)",
                result.status,
                result.url,
                result.depth,
                result.extracted_records.len(),
                result.discovered_links.len()
            ),
            Some(error) => tracing::info!("[{}] {}: {}", result.status, result.url, error),
        }
        if let Some(error) = &result.extraction_error {
            tracing::warn!("Extraction failed for {}: {}", result.url, error);
        }
    }

    let report = match crawl.wait().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    if report.stopped {
        tracing::info!(
            "Crawl stopped with {} entries pending; run again to resume",
            report.unfinished
        );
    } else {
        tracing::info!("Crawl completed successfully");
    }

    export_summary(&config)?;
    tracing::info!("Summary written to {}", config.output.summary_path);

    Ok(())
}
