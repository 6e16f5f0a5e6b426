//! Crawler coordinator - main crawl orchestration logic
//!
//! The coordinator owns the crawl lifecycle (`Idle -> Running -> Draining ->
//! Done`). Starting a crawl:
//! - Seeds the frontier, or restores it from storage when resuming a run
//! - Spawns the fetch worker pool
//! - Spawns a collector task that persists results, applies result ordering
//!   and drives the lifecycle to `Done`

use crate::config::{validate_crawler_config, CrawlerConfig};
use crate::crawler::clock::{Clock, TokioClock};
use crate::crawler::dispatcher::Dispatcher;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::Frontier;
use crate::crawler::parser::Extractor;
use crate::crawler::reorder::ReorderBuffer;
use crate::crawler::worker::{Worker, WorkerEvent};
use crate::robots::RobotsPolicy;
use crate::state::{CrawlResult, CrawlState, CrawlStatus, FrontierEntry};
use crate::storage::{CrawlStore, RunStatus};
use crate::url::{normalize, CanonicalUrl, ScopeFilter};
use crate::{ConfigError, CrawlError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

/// Default product token used to match robots.txt groups
const DEFAULT_ROBOTS_AGENT: &str = "ripple-crawl";

/// Summary of a finished crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Storage run ID, when a store was attached
    pub run_id: Option<i64>,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,

    /// Transient failures that were retried
    pub retries: u64,

    /// Records extracted across all pages
    pub records: u64,

    /// Distinct URLs accepted by the frontier
    pub discovered: u64,

    /// Entries still queued when the crawl stopped
    pub unfinished: u64,

    /// True if the crawl ended because of a stop request
    pub stopped: bool,

    pub duration: Duration,
}

impl CrawlReport {
    /// Number of terminal results
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed + self.skipped
    }
}

/// Requests a graceful stop of a running crawl
///
/// In-flight fetches finish and their results are emitted; nothing new is
/// taken from the frontier once `stop` returns.
#[derive(Debug, Clone)]
pub struct StopHandle {
    frontier: Arc<Frontier>,
    signal: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.frontier.close();
        self.signal.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.signal.borrow()
    }
}

/// Handle to a running crawl
pub struct CrawlHandle {
    results: mpsc::UnboundedReceiver<CrawlResult>,
    state: watch::Receiver<CrawlState>,
    stopper: StopHandle,
    run_id: Option<i64>,
    task: JoinHandle<Result<CrawlReport, CrawlError>>,
}

impl CrawlHandle {
    /// Signals the crawl to stop
    pub fn stop(&self) {
        self.stopper.stop();
    }

    /// A cloneable handle that can stop the crawl from elsewhere (e.g. Ctrl-C)
    pub fn stopper(&self) -> StopHandle {
        self.stopper.clone()
    }

    /// The current lifecycle state
    pub fn state(&self) -> CrawlState {
        *self.state.borrow()
    }

    /// A receiver that observes lifecycle changes
    pub fn state_changes(&self) -> watch::Receiver<CrawlState> {
        self.state.clone()
    }

    pub fn frontier(&self) -> &Arc<Frontier> {
        &self.stopper.frontier
    }

    pub fn run_id(&self) -> Option<i64> {
        self.run_id
    }

    /// Receives the next result; `None` once the crawl is done and every
    /// result has been delivered
    pub async fn next_result(&mut self) -> Option<CrawlResult> {
        self.results.recv().await
    }

    /// Waits for the crawl to finish, discarding undelivered results
    pub async fn wait(self) -> Result<CrawlReport, CrawlError> {
        drop(self.results);
        join_collector(self.task).await
    }

    /// Waits for the crawl to finish and returns every result with the report
    pub async fn collect(mut self) -> Result<(Vec<CrawlResult>, CrawlReport), CrawlError> {
        let mut results = Vec::new();
        while let Some(result) = self.results.recv().await {
            results.push(result);
        }
        let report = join_collector(self.task).await?;
        Ok((results, report))
    }
}

async fn join_collector(
    task: JoinHandle<Result<CrawlReport, CrawlError>>,
) -> Result<CrawlReport, CrawlError> {
    task.await
        .map_err(|e| CrawlError::Task(e.to_string()))?
}

struct StoreBinding {
    store: Box<dyn CrawlStore>,
    config_hash: String,
    fresh: bool,
}

/// Builds and starts a crawl
///
/// # Example
///
/// ```no_run
/// use ripple_crawl::config::{CrawlerConfig, UserAgentConfig};
/// use ripple_crawl::crawler::{Coordinator, HtmlExtractor, HttpFetcher};
/// use std::sync::Arc;
///
/// # async fn run(user_agent: UserAgentConfig) -> Result<(), Box<dyn std::error::Error>> {
/// let config = CrawlerConfig {
///     seeds: vec!["https://shop.example.com/".to_string()],
///     ..CrawlerConfig::default()
/// };
/// let fetcher = Arc::new(HttpFetcher::from_config(&user_agent, config.max_redirects)?);
/// let extractor = Arc::new(HtmlExtractor::for_class("prodbox")?);
///
/// let mut crawl = Coordinator::new(config, fetcher, extractor)?.start()?;
/// while let Some(result) = crawl.next_result().await {
///     println!("{} {}", result.status, result.url);
/// }
/// let report = crawl.wait().await?;
/// println!("{} pages", report.succeeded);
/// # Ok(())
/// # }
/// ```
pub struct Coordinator {
    config: CrawlerConfig,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    clock: Arc<dyn Clock>,
    store: Option<StoreBinding>,
    robots_agent: String,
}

impl Coordinator {
    /// Creates a coordinator for the given configuration and capabilities
    pub fn new(
        config: CrawlerConfig,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
    ) -> Result<Self, CrawlError> {
        validate_crawler_config(&config)?;

        Ok(Self {
            config,
            fetcher,
            extractor,
            clock: Arc::new(TokioClock),
            store: None,
            robots_agent: DEFAULT_ROBOTS_AGENT.to_string(),
        })
    }

    /// Replaces the clock used for politeness and backoff
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Persists the crawl to `store`
    ///
    /// Unless `fresh` is set, the latest run is resumed if it did not finish.
    pub fn with_store(
        mut self,
        store: impl CrawlStore + 'static,
        config_hash: impl Into<String>,
        fresh: bool,
    ) -> Self {
        self.store = Some(StoreBinding {
            store: Box::new(store),
            config_hash: config_hash.into(),
            fresh,
        });
        self
    }

    /// Sets the product token matched against robots.txt `User-agent` lines
    pub fn with_robots_agent(mut self, agent: impl Into<String>) -> Self {
        self.robots_agent = agent.into();
        self
    }

    /// Seeds the frontier, spawns the workers and returns a handle to the
    /// running crawl
    ///
    /// Seeds that fail to normalize are logged and dropped. Must be called
    /// from within a tokio runtime.
    ///
    /// # Returns
    ///
    /// A `CrawlHandle` for streaming results, stopping the crawl and waiting
    /// for the final report, or an error if no seed is usable or the store
    /// cannot be prepared.
    pub fn start(mut self) -> Result<CrawlHandle, CrawlError> {
        let options = self.config.normalize_options();
        let seeds: Vec<CanonicalUrl> = self
            .config
            .seeds
            .iter()
            .filter_map(|raw| match normalize(raw, None, &options) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!("Dropping seed '{}': {}", raw, e);
                    None
                }
            })
            .collect();
        if seeds.is_empty() {
            return Err(ConfigError::InvalidUrl("no usable seed URLs".to_string()).into());
        }

        let frontier = Arc::new(Frontier::from_config(&self.config, Arc::clone(&self.clock)));
        let run_id = self.prepare_run(&frontier, &seeds)?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(CrawlState::Idle);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();

        transition(&state_tx, CrawlState::Running)?;

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&self.extractor),
            Arc::clone(&frontier),
            ScopeFilter::new(self.config.host_scope, seeds.iter()),
            options,
            self.config.max_depth,
        ));

        let robots = self.config.respect_robots.then(|| {
            Arc::new(RobotsPolicy::new(
                Arc::clone(&self.fetcher),
                self.robots_agent.clone(),
                self.config.per_request_timeout(),
            ))
        });

        let mut workers = JoinSet::new();
        for id in 0..self.config.max_concurrency.max(1) as usize {
            let worker = Worker {
                id,
                frontier: Arc::clone(&frontier),
                fetcher: Arc::clone(&self.fetcher),
                dispatcher: Arc::clone(&dispatcher),
                robots: robots.clone(),
                timeout: self.config.per_request_timeout(),
                events: event_tx.clone(),
                shutdown: stop_rx.clone(),
            };
            workers.spawn(worker.run());
        }
        drop(event_tx);

        tracing::info!(
            "Crawl started: {} seeds, {} queued, {} workers",
            seeds.len(),
            frontier.len(),
            self.config.max_concurrency
        );

        let collector = Collector {
            frontier: Arc::clone(&frontier),
            events: event_rx,
            results: result_tx,
            state: state_tx,
            stop: stop_rx,
            workers,
            store: self.store.map(|binding| binding.store),
            run_id,
            reorder: self.config.ordered_results.then(ReorderBuffer::new),
            report: CrawlReport {
                run_id,
                ..CrawlReport::default()
            },
            started: Instant::now(),
        };

        Ok(CrawlHandle {
            results: result_rx,
            state: state_rx,
            stopper: StopHandle {
                frontier,
                signal: Arc::new(stop_tx),
            },
            run_id,
            task: tokio::spawn(collector.run()),
        })
    }

    /// Creates or resumes the storage run and seeds the frontier
    fn prepare_run(
        &mut self,
        frontier: &Frontier,
        seeds: &[CanonicalUrl],
    ) -> Result<Option<i64>, CrawlError> {
        let now = frontier.now();

        let run_id = match self.store.as_mut() {
            Some(binding) => Some(resume_or_create(binding, frontier, &self.config)?),
            None => None,
        };

        let seeded: Vec<FrontierEntry> = seeds
            .iter()
            .filter_map(|url| frontier.offer(FrontierEntry::seed(url.clone(), now)))
            .collect();

        if let (Some(binding), Some(run_id)) = (self.store.as_mut(), run_id) {
            binding.store.record_enqueued(run_id, &seeded)?;
        }

        Ok(run_id)
    }
}

fn resume_or_create(
    binding: &mut StoreBinding,
    frontier: &Frontier,
    config: &CrawlerConfig,
) -> Result<i64, CrawlError> {
    let resumable = if binding.fresh {
        None
    } else {
        binding
            .store
            .get_latest_run()?
            .filter(|run| run.status.is_resumable())
    };

    let Some(run) = resumable else {
        let run_id = binding.store.create_run(&binding.config_hash)?;
        tracing::info!("Starting new run {}", run_id);
        return Ok(run_id);
    };

    if run.config_hash != binding.config_hash {
        tracing::warn!(
            "Configuration changed since run {} started; resuming anyway",
            run.id
        );
    }

    let ledger = binding.store.load_ledger(run.id)?;
    let pending = binding.store.load_pending(run.id)?;
    let options = config.normalize_options();
    let now = frontier.now();

    frontier.preload_ledger(ledger);

    let mut restored = 0;
    for stored in pending {
        let url = match normalize(&stored.url, None, &options) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Dropping stored entry '{}': {}", stored.url, e);
                continue;
            }
        };

        let mut entry = FrontierEntry::new(url, stored.depth, now)
            .with_priority(stored.priority)
            .with_retry_count(stored.attempts.min(config.max_retries));
        entry.referrer = stored
            .referrer
            .as_deref()
            .and_then(|referrer| normalize(referrer, None, &options).ok());

        if frontier.restore(entry).is_some() {
            restored += 1;
        }
    }

    binding.store.update_run_status(run.id, RunStatus::Running)?;
    tracing::info!(
        "Resuming run {}: {} pending entries, {} URLs already seen",
        run.id,
        restored,
        frontier.ledger_len()
    );
    Ok(run.id)
}

fn transition(state: &watch::Sender<CrawlState>, next: CrawlState) -> Result<(), CrawlError> {
    let current = *state.borrow();
    if !current.can_transition_to(next) {
        return Err(CrawlError::InvalidTransition {
            from: current,
            to: next,
        });
    }
    state.send_replace(next);
    tracing::info!("Crawl {} -> {}", current, next);
    Ok(())
}

/// Owns everything that happens after the workers report back
struct Collector {
    frontier: Arc<Frontier>,
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    results: mpsc::UnboundedSender<CrawlResult>,
    state: watch::Sender<CrawlState>,
    stop: watch::Receiver<bool>,
    workers: JoinSet<()>,
    store: Option<Box<dyn CrawlStore>>,
    run_id: Option<i64>,
    reorder: Option<ReorderBuffer<CrawlResult>>,
    report: CrawlReport,
    started: Instant,
}

impl Collector {
    async fn run(mut self) -> Result<CrawlReport, CrawlError> {
        let mut stop_open = true;

        loop {
            let running = *self.state.borrow() == CrawlState::Running;

            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => {
                        self.handle(event);
                        if running && self.frontier.is_exhausted() {
                            tracing::info!("Frontier exhausted");
                            self.begin_draining()?;
                        }
                    }
                    // Every worker has exited
                    None => break,
                },
                changed = self.stop.changed(), if running && stop_open => {
                    match changed {
                        Ok(()) if *self.stop.borrow() => {
                            tracing::info!("Stop requested; letting in-flight fetches finish");
                            self.report.stopped = true;
                            self.begin_draining()?;
                        }
                        Ok(()) => {}
                        Err(_) => stop_open = false,
                    }
                }
            }
        }

        if *self.state.borrow() == CrawlState::Running {
            self.begin_draining()?;
        }

        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        if let Some(mut reorder) = self.reorder.take() {
            for result in reorder.drain() {
                self.emit(result);
            }
        }

        self.report.discovered = self.frontier.ledger_len() as u64;
        self.report.unfinished = self.frontier.len() as u64;
        self.report.duration = self.started.elapsed();
        let finalized = self.finalize_run();

        transition(&self.state, CrawlState::Done)?;
        tracing::info!(
            "Crawl done: {} succeeded, {} failed, {} skipped, {} retries in {:?}",
            self.report.succeeded,
            self.report.failed,
            self.report.skipped,
            self.report.retries,
            self.report.duration
        );

        finalized?;
        Ok(self.report)
    }

    fn begin_draining(&mut self) -> Result<(), CrawlError> {
        self.frontier.close();
        transition(&self.state, CrawlState::Draining)
    }

    fn handle(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Completed {
                result,
                sequence,
                enqueued,
            } => {
                match result.status {
                    CrawlStatus::Success => self.report.succeeded += 1,
                    CrawlStatus::Failed => self.report.failed += 1,
                    CrawlStatus::Skipped => self.report.skipped += 1,
                }
                self.report.records += result.extracted_records.len() as u64;

                if let (Some(store), Some(run_id)) = (self.store.as_mut(), self.run_id) {
                    if let Err(e) = store.record_completion(run_id, &result, &enqueued) {
                        tracing::error!("Failed to persist result for {}: {}", result.url, e);
                    }
                }

                match self.reorder.as_mut() {
                    Some(reorder) => {
                        for ready in reorder.push(sequence, result) {
                            self.emit(ready);
                        }
                    }
                    None => self.emit(result),
                }
            }
            WorkerEvent::Retried {
                url,
                attempt,
                error,
            } => {
                self.report.retries += 1;
                if let (Some(store), Some(run_id)) = (self.store.as_mut(), self.run_id) {
                    if let Err(e) = store.record_retry(run_id, url.as_str(), attempt, &error) {
                        tracing::error!("Failed to persist retry for {}: {}", url, e);
                    }
                }
            }
        }
    }

    fn emit(&self, result: CrawlResult) {
        // The receiver may have been dropped; the crawl carries on regardless
        let _ = self.results.send(result);
    }

    fn finalize_run(&mut self) -> Result<(), CrawlError> {
        let (Some(store), Some(run_id)) = (self.store.as_mut(), self.run_id) else {
            return Ok(());
        };

        if self.report.unfinished > 0 {
            store.update_run_status(run_id, RunStatus::Interrupted)?;
            tracing::info!(
                "Run {} interrupted with {} entries pending",
                run_id,
                self.report.unfinished
            );
        } else {
            store.complete_run(run_id)?;
        }
        Ok(())
    }
}
