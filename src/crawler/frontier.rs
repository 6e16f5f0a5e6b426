//! The crawl frontier
//!
//! The frontier owns every URL the crawl will ever fetch. It handles:
//! - Deduplication through a ledger of every canonical URL ever accepted
//! - One priority queue per host, consumed highest priority first
//! - Per-host politeness: at most one request in flight per host and
//!   `current_backoff` between requests
//! - Retry bookkeeping with exponential per-host backoff
//!
//! All operations are safe to call from many workers at once. The host map is
//! sharded and each host sits behind its own short-lived lock, so workers
//! touching different hosts never contend.

use crate::config::CrawlerConfig;
use crate::crawler::clock::Clock;
use crate::state::{FrontierEntry, HostState};
use crate::url::CanonicalUrl;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

/// Backoff and retry limits applied by the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Spacing between requests to a healthy host
    pub base: Duration,

    /// Ceiling for the per-host backoff
    pub max: Duration,

    /// Retries allowed per entry before it fails for good
    pub max_retries: u32,
}

impl BackoffPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            base: config.base_backoff(),
            max: config.max_backoff(),
            max_retries: config.max_retries,
        }
    }
}

/// Outcome of a non-blocking `pop`
#[derive(Debug)]
pub enum Pop {
    /// An entry whose host slot is now leased to the caller
    Ready(FrontierEntry),

    /// Work is outstanding but no host can be served yet.
    ///
    /// Carries the earliest instant a backoff window opens, or `None` when
    /// every waiting host is blocked on an in-flight request.
    Wait(Option<Instant>),

    /// Nothing is queued or in flight
    Exhausted,

    /// The frontier was closed
    Closed,
}

/// Outcome of `mark_retry`
#[derive(Debug)]
pub enum Retry {
    /// The entry went back into its host queue
    Requeued { attempt: u32, backoff: Duration },

    /// The entry used up its retries and has left the frontier
    Exhausted(FrontierEntry),

    /// No in-flight entry matches the URL
    Unknown,
}

/// An entry sitting in a host queue
#[derive(Debug)]
struct Queued {
    entry: FrontierEntry,

    /// Insertion ordinal; requeued entries get a fresh one and go to the back
    order: u64,
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, then oldest insertion first
        self.entry
            .priority
            .cmp(&other.entry.priority)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
    }
}

impl Eq for Queued {}

#[derive(Debug)]
struct HostQueue {
    state: HostState,
    queue: BinaryHeap<Queued>,
    leased: Option<FrontierEntry>,
}

impl HostQueue {
    fn new(host: &str, base: Duration) -> Self {
        Self {
            state: HostState::new(host, base),
            queue: BinaryHeap::new(),
            leased: None,
        }
    }

    /// Takes the leased entry if it is the one for `url`
    fn take_lease(&mut self, url: &CanonicalUrl) -> Option<FrontierEntry> {
        if self.leased.as_ref().map_or(false, |entry| entry.url == *url) {
            self.leased.take()
        } else {
            None
        }
    }

    fn head_order(&self) -> u64 {
        self.queue.peek().map(|q| q.order).unwrap_or(u64::MAX)
    }
}

/// The shared, concurrent crawl frontier
#[derive(Debug)]
pub struct Frontier {
    hosts: DashMap<String, Arc<Mutex<HostQueue>>>,

    /// Every canonical URL ever accepted; never shrinks
    ledger: DashSet<String>,

    /// Entries queued or in flight; zero means the crawl is exhausted
    outstanding: AtomicUsize,
    queued: AtomicUsize,
    leased: AtomicUsize,

    next_sequence: AtomicU64,
    next_order: AtomicU64,

    closed: AtomicBool,
    notify: Notify,
    clock: Arc<dyn Clock>,
    policy: BackoffPolicy,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new(policy: BackoffPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            hosts: DashMap::new(),
            ledger: DashSet::new(),
            outstanding: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            leased: AtomicUsize::new(0),
            next_sequence: AtomicU64::new(0),
            next_order: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            notify: Notify::new(),
            clock,
            policy,
        }
    }

    /// Creates an empty frontier with limits taken from the crawler configuration
    pub fn from_config(config: &CrawlerConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(BackoffPolicy::from_config(config), clock)
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Adds an entry unless its URL was seen before
    ///
    /// Returns the accepted entry, carrying its discovery sequence number, or
    /// `None` if the URL is a duplicate or the frontier is closed.
    pub fn offer(&self, mut entry: FrontierEntry) -> Option<FrontierEntry> {
        if self.closed.load(AtomicOrdering::Acquire) {
            return None;
        }

        if !self.ledger.insert(entry.url.as_str().to_string()) {
            tracing::trace!("Duplicate URL rejected: {}", entry.url);
            return None;
        }

        entry.sequence = self.next_sequence.fetch_add(1, AtomicOrdering::SeqCst);
        self.enqueue(entry.clone());
        Some(entry)
    }

    /// Adds an entry; returns false if it was rejected as a duplicate
    pub fn push(&self, entry: FrontierEntry) -> bool {
        self.offer(entry).is_some()
    }

    /// Marks URLs as already crawled, so they are never accepted again
    ///
    /// Used when resuming an interrupted crawl.
    pub fn preload_ledger<I, S>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for url in urls {
            if self.ledger.insert(url.into()) {
                added += 1;
            }
        }
        added
    }

    /// Re-queues an entry that was pending when a previous crawl stopped
    ///
    /// Unlike `offer`, the URL may already be in the ledger.
    pub fn restore(&self, mut entry: FrontierEntry) -> Option<FrontierEntry> {
        if self.closed.load(AtomicOrdering::Acquire) {
            return None;
        }
        self.ledger.insert(entry.url.as_str().to_string());
        entry.sequence = self.next_sequence.fetch_add(1, AtomicOrdering::SeqCst);
        self.enqueue(entry.clone());
        Some(entry)
    }

    fn enqueue(&self, entry: FrontierEntry) {
        self.outstanding.fetch_add(1, AtomicOrdering::SeqCst);
        self.queued.fetch_add(1, AtomicOrdering::SeqCst);

        let host = self.host_queue(entry.host());
        let order = self.next_order.fetch_add(1, AtomicOrdering::SeqCst);
        host.lock().queue.push(Queued { entry, order });

        self.notify.notify_waiters();
    }

    fn host_queue(&self, host: &str) -> Arc<Mutex<HostQueue>> {
        let base = self.policy.base;
        let queue = self
            .hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(HostQueue::new(host, base))));
        Arc::clone(queue.value())
    }

    fn existing_host_queue(&self, host: &str) -> Option<Arc<Mutex<HostQueue>>> {
        self.hosts.get(host).map(|queue| Arc::clone(queue.value()))
    }

    /// Takes the next entry whose host is ready, without blocking
    ///
    /// Among ready hosts, the one that has been ready the longest is served
    /// first, which keeps a single busy host from starving the others. The
    /// returned entry's host is leased until one of the `mark_*` calls.
    ///
    /// # Returns
    ///
    /// * `Pop::Ready` - An entry to fetch now
    /// * `Pop::Wait` - Work is outstanding but no host can be served yet
    /// * `Pop::Exhausted` - Nothing queued and nothing in flight
    /// * `Pop::Closed` - The frontier was closed by a stop request
    pub fn pop(&self) -> Pop {
        loop {
            if self.closed.load(AtomicOrdering::Acquire) {
                return Pop::Closed;
            }

            let now = self.clock.now();
            let hosts: Vec<Arc<Mutex<HostQueue>>> = self
                .hosts
                .iter()
                .map(|queue| Arc::clone(queue.value()))
                .collect();

            let mut best: Option<((Option<Instant>, u64), Arc<Mutex<HostQueue>>)> = None;
            let mut next_wake: Option<Instant> = None;

            for host in hosts {
                let key = {
                    let guard = host.lock();
                    if guard.queue.is_empty() || guard.state.in_flight {
                        continue;
                    }
                    if !guard.state.can_request(now) {
                        if let Some(ready_at) = guard.state.ready_at() {
                            next_wake = Some(next_wake.map_or(ready_at, |w| w.min(ready_at)));
                        }
                        continue;
                    }
                    (guard.state.ready_at(), guard.head_order())
                };

                if best.as_ref().map_or(true, |(best_key, _)| key < *best_key) {
                    best = Some((key, host));
                }
            }

            let Some((_, host)) = best else {
                if self.outstanding.load(AtomicOrdering::SeqCst) == 0 {
                    return Pop::Exhausted;
                }
                return Pop::Wait(next_wake);
            };

            let mut guard = host.lock();
            if guard.queue.is_empty() || !guard.state.can_request(now) {
                // Another worker got here first; look again
                continue;
            }

            if let Some(Queued { entry, .. }) = guard.queue.pop() {
                guard.state.begin_request();
                guard.leased = Some(entry.clone());
                self.queued.fetch_sub(1, AtomicOrdering::SeqCst);
                self.leased.fetch_add(1, AtomicOrdering::SeqCst);
                tracing::trace!("Leased {} (attempt {})", entry.url, entry.attempts());
                return Pop::Ready(entry);
            }
        }
    }

    /// Waits for the next ready entry
    ///
    /// Returns `None` when the frontier is exhausted or closed, or when
    /// `shutdown` flips to true.
    pub async fn next_entry(&self, shutdown: &mut watch::Receiver<bool>) -> Option<FrontierEntry> {
        loop {
            if *shutdown.borrow() {
                return None;
            }

            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let deadline = match self.pop() {
                Pop::Ready(entry) => return Some(entry),
                Pop::Exhausted | Pop::Closed => {
                    self.notify.notify_waiters();
                    return None;
                }
                Pop::Wait(deadline) => deadline,
            };

            let sleep = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = &mut notified => {}
                _ = sleep => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    /// Completes a leased entry after a successful fetch
    pub fn mark_done(&self, url: &CanonicalUrl) -> Option<FrontierEntry> {
        self.finish(url, |state, now| state.record_success(now))
    }

    /// Completes a leased entry after a permanent failure
    pub fn mark_failed(&self, url: &CanonicalUrl) -> Option<FrontierEntry> {
        self.finish(url, |state, now| state.record_permanent_failure(now))
    }

    /// Completes a leased entry that was never fetched (e.g. disallowed by robots.txt)
    pub fn mark_skipped(&self, url: &CanonicalUrl) -> Option<FrontierEntry> {
        self.finish(url, |state, _| state.release())
    }

    fn finish(
        &self,
        url: &CanonicalUrl,
        update: impl FnOnce(&mut HostState, Instant),
    ) -> Option<FrontierEntry> {
        let host = self.existing_host_queue(url.host())?;
        let entry = {
            let mut guard = host.lock();
            let entry = guard.take_lease(url)?;
            update(&mut guard.state, self.clock.now());
            entry
        };

        self.leased.fetch_sub(1, AtomicOrdering::SeqCst);
        self.outstanding.fetch_sub(1, AtomicOrdering::SeqCst);
        self.notify.notify_waiters();
        Some(entry)
    }

    /// Handles a transient failure of a leased entry
    ///
    /// The host backoff grows (honouring a server `Retry-After` hint, capped at
    /// the maximum backoff). The entry goes to the back of its host queue with
    /// `retry_count` incremented, unless it has already used `max_retries`
    /// retries, in which case it leaves the frontier.
    ///
    /// # Arguments
    ///
    /// * `url` - The leased entry that failed
    /// * `retry_after` - A server-supplied minimum delay, if any
    ///
    /// # Returns
    ///
    /// `Retry::Requeued` with the new attempt number and host backoff,
    /// `Retry::Exhausted` with the entry that ran out of retries, or
    /// `Retry::Unknown` if `url` was not leased.
    pub fn mark_retry(&self, url: &CanonicalUrl, retry_after: Option<Duration>) -> Retry {
        let Some(host) = self.existing_host_queue(url.host()) else {
            return Retry::Unknown;
        };

        let outcome = {
            let mut guard = host.lock();
            let Some(mut entry) = guard.take_lease(url) else {
                return Retry::Unknown;
            };

            let backoff =
                guard
                    .state
                    .record_failure(self.clock.now(), self.policy.max, retry_after);

            if entry.retry_count >= self.policy.max_retries {
                Retry::Exhausted(entry)
            } else {
                entry.retry_count += 1;
                let attempt = entry.retry_count;
                let order = self.next_order.fetch_add(1, AtomicOrdering::SeqCst);
                guard.queue.push(Queued { entry, order });
                Retry::Requeued { attempt, backoff }
            }
        };

        self.leased.fetch_sub(1, AtomicOrdering::SeqCst);
        match &outcome {
            Retry::Requeued { .. } => {
                self.queued.fetch_add(1, AtomicOrdering::SeqCst);
            }
            Retry::Exhausted(_) => {
                self.outstanding.fetch_sub(1, AtomicOrdering::SeqCst);
            }
            Retry::Unknown => {}
        }
        self.notify.notify_waiters();
        outcome
    }

    /// Raises the minimum spacing for a host (robots.txt `Crawl-delay`)
    pub fn set_host_delay(&self, host: &str, delay: Duration) {
        let capped = delay.min(self.policy.max.max(self.policy.base));
        self.host_queue(host).lock().state.raise_min_delay(capped);
    }

    /// Stops handing out entries; in-flight entries can still be completed
    pub fn close(&self) {
        self.closed.store(true, AtomicOrdering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::Acquire)
    }

    /// True when nothing is queued or in flight
    pub fn is_exhausted(&self) -> bool {
        self.outstanding.load(AtomicOrdering::SeqCst) == 0
    }

    /// Snapshot of a host's politeness state
    pub fn host_state(&self, host: &str) -> Option<HostState> {
        self.existing_host_queue(host)
            .map(|queue| queue.lock().state.clone())
    }

    /// Number of entries waiting in host queues
    pub fn len(&self) -> usize {
        self.queued.load(AtomicOrdering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries currently leased to workers
    pub fn in_flight(&self) -> usize {
        self.leased.load(AtomicOrdering::SeqCst)
    }

    /// Number of distinct URLs ever accepted
    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    pub fn contains(&self, url: &CanonicalUrl) -> bool {
        self.ledger.contains(url.as_str())
    }

    /// Number of distinct hosts seen so far
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }
}
