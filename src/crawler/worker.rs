//! Fetch workers
//!
//! Each worker loops: take the next ready entry from the frontier, check
//! robots.txt if enabled, fetch under the per-request timeout, classify the
//! outcome and report it to the coordinator. Workers stop when the frontier
//! is exhausted or closed, or when the stop signal is raised; a fetch that is
//! already in flight always runs to completion.

use crate::crawler::dispatcher::Dispatcher;
use crate::crawler::fetcher::{FetchError, FetchResponse, Fetcher, ResponseClass};
use crate::crawler::frontier::{Frontier, Retry};
use crate::robots::{RobotsPolicy, RobotsVerdict};
use crate::state::{CrawlResult, CrawlStatus, FrontierEntry};
use crate::url::CanonicalUrl;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// What a worker reports to the coordinator
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    /// An entry reached its terminal outcome
    Completed {
        result: CrawlResult,
        sequence: u64,
        enqueued: Vec<FrontierEntry>,
    },

    /// A transient failure put the entry back in the frontier
    Retried {
        url: CanonicalUrl,
        attempt: u32,
        error: String,
    },
}

pub(crate) struct Worker {
    pub id: usize,
    pub frontier: Arc<Frontier>,
    pub fetcher: Arc<dyn Fetcher>,
    pub dispatcher: Arc<Dispatcher>,
    pub robots: Option<Arc<RobotsPolicy>>,
    pub timeout: Duration,
    pub events: mpsc::UnboundedSender<WorkerEvent>,
    pub shutdown: watch::Receiver<bool>,
}

impl Worker {
    pub async fn run(mut self) {
        tracing::debug!("Worker {} started", self.id);

        while let Some(entry) = self.frontier.next_entry(&mut self.shutdown).await {
            self.process(entry).await;
        }

        tracing::debug!("Worker {} finished", self.id);
    }

    async fn process(&self, entry: FrontierEntry) {
        tracing::debug!(
            "Worker {} fetching {} (depth {}, attempt {})",
            self.id,
            entry.url,
            entry.depth,
            entry.attempts()
        );

        if let Some(robots) = &self.robots {
            match robots.check(&entry.url).await {
                RobotsVerdict::Disallowed => {
                    tracing::info!("Skipping {} (disallowed by robots.txt)", entry.url);
                    self.frontier.mark_skipped(&entry.url);
                    let result = CrawlResult::new(
                        entry.url.clone(),
                        CrawlStatus::Skipped,
                        entry.depth,
                        entry.retry_count,
                    )
                    .with_error("disallowed by robots.txt");
                    self.complete(&entry, result, Vec::new());
                    return;
                }
                RobotsVerdict::Allowed {
                    crawl_delay: Some(delay),
                } => self.frontier.set_host_delay(entry.url.host(), delay),
                RobotsVerdict::Allowed { crawl_delay: None } => {}
            }
        }

        let fetched = match tokio::time::timeout(
            self.timeout,
            self.fetcher.fetch(entry.url.as_url(), self.timeout),
        )
        .await
        {
            Ok(fetched) => fetched,
            Err(_) => Err(FetchError::timeout(self.timeout)),
        };

        match fetched {
            Ok(response) => self.handle_response(entry, response),
            Err(e) if e.is_transient() => self.retry(entry, None, e.to_string(), None),
            Err(e) => {
                tracing::warn!("Fetching {} failed permanently: {}", entry.url, e);
                self.frontier.mark_failed(&entry.url);
                let result = CrawlResult::new(
                    entry.url.clone(),
                    CrawlStatus::Failed,
                    entry.depth,
                    entry.attempts(),
                )
                .with_error(e.to_string());
                self.complete(&entry, result, Vec::new());
            }
        }
    }

    fn handle_response(&self, entry: FrontierEntry, response: FetchResponse) {
        let status = response.status;

        match response.classify() {
            ResponseClass::Success => {
                // Children must be in the frontier before the parent is released,
                // otherwise the frontier could look exhausted in between
                let dispatch = self.dispatcher.dispatch(&entry, &response);
                self.frontier.mark_done(&entry.url);

                let mut result = CrawlResult::new(
                    entry.url.clone(),
                    CrawlStatus::Success,
                    entry.depth,
                    entry.attempts(),
                )
                .with_status_code(status);
                result.extracted_records = dispatch.records;
                result.discovered_links = dispatch.discovered;
                result.extraction_error = dispatch.extraction_error;

                self.complete(&entry, result, dispatch.enqueued);
            }
            ResponseClass::Redirect => {
                let location = response.location().unwrap_or_default().to_string();
                let base = response.final_url.as_ref().unwrap_or(entry.url.as_url());
                let (discovered, enqueued) =
                    self.dispatcher.offer_redirect(&entry, base, &location);
                self.frontier.mark_done(&entry.url);

                tracing::debug!("{} redirected ({}) to {}", entry.url, status, location);
                let mut result = CrawlResult::new(
                    entry.url.clone(),
                    CrawlStatus::Skipped,
                    entry.depth,
                    entry.attempts(),
                )
                .with_status_code(status)
                .with_error(format!("redirected to {}", location));
                result.discovered_links = discovered;

                self.complete(&entry, result, enqueued);
            }
            ResponseClass::Transient => {
                let retry_after = response.retry_after();
                self.retry(entry, Some(status), format!("HTTP {}", status), retry_after);
            }
            ResponseClass::Permanent => {
                tracing::info!("{} returned HTTP {}", entry.url, status);
                self.frontier.mark_failed(&entry.url);
                let result = CrawlResult::new(
                    entry.url.clone(),
                    CrawlStatus::Failed,
                    entry.depth,
                    entry.attempts(),
                )
                .with_status_code(status)
                .with_error(format!("HTTP {}", status));
                self.complete(&entry, result, Vec::new());
            }
        }
    }

    fn retry(
        &self,
        entry: FrontierEntry,
        status: Option<u16>,
        error: String,
        retry_after: Option<Duration>,
    ) {
        match self.frontier.mark_retry(&entry.url, retry_after) {
            Retry::Requeued { attempt, backoff } => {
                tracing::warn!(
                    "{} failed ({}); retry {} with host backoff {:?}",
                    entry.url,
                    error,
                    attempt,
                    backoff
                );
                let _ = self.events.send(WorkerEvent::Retried {
                    url: entry.url,
                    attempt,
                    error,
                });
            }
            Retry::Exhausted(exhausted) => {
                tracing::warn!(
                    "Giving up on {} after {} attempts: {}",
                    exhausted.url,
                    exhausted.attempts(),
                    error
                );
                let mut result = CrawlResult::new(
                    exhausted.url.clone(),
                    CrawlStatus::Failed,
                    exhausted.depth,
                    exhausted.attempts(),
                )
                .with_error(format!(
                    "{} (gave up after {} attempts)",
                    error,
                    exhausted.attempts()
                ));
                result.status_code = status;
                self.complete(&exhausted, result, Vec::new());
            }
            Retry::Unknown => {
                tracing::error!("Frontier has no lease for {}", entry.url);
            }
        }
    }

    fn complete(&self, entry: &FrontierEntry, result: CrawlResult, enqueued: Vec<FrontierEntry>) {
        let _ = self.events.send(WorkerEvent::Completed {
            result,
            sequence: entry.sequence(),
            enqueued,
        });
    }
}
