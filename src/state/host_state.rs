use std::time::Duration;
use tokio::time::Instant;

/// Tracks the politeness state of a host during crawling
///
/// One `HostState` exists per distinct host and it only ever lives inside the
/// frontier's per-host lock. A host accepts a new request when nothing is in
/// flight against it and `current_backoff` has elapsed since the last fetch
/// completed.
#[derive(Debug, Clone)]
pub struct HostState {
    /// The scheduling key (host plus non-default port)
    pub host: String,

    /// When the last fetch to this host completed
    pub last_fetch_time: Option<Instant>,

    /// Transient failures since the last success
    pub consecutive_failures: u32,

    /// Spacing required before the next request may start
    pub current_backoff: Duration,

    /// The base spacing; `current_backoff` resets to this on success
    pub min_delay: Duration,

    /// Whether a fetch to this host is currently in flight
    pub in_flight: bool,

    /// Number of requests started against this host
    pub request_count: u32,
}

impl HostState {
    /// Creates a new HostState with the given base delay
    pub fn new(host: impl Into<String>, base_delay: Duration) -> Self {
        Self {
            host: host.into(),
            last_fetch_time: None,
            consecutive_failures: 0,
            current_backoff: base_delay,
            min_delay: base_delay,
            in_flight: false,
            request_count: 0,
        }
    }

    /// The earliest instant the next request may start, ignoring the in-flight
    /// slot. `None` means the host has never been fetched and is ready now.
    pub fn ready_at(&self) -> Option<Instant> {
        self.last_fetch_time.map(|last| last + self.current_backoff)
    }

    /// Checks if a request can be made to this host at `now`
    pub fn can_request(&self, now: Instant) -> bool {
        !self.in_flight && self.time_until_next_request(now).is_none()
    }

    /// Calculates the time until the backoff window has elapsed
    ///
    /// Returns None if the window is already open.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let ready_at = self.ready_at()?;
        if now < ready_at {
            Some(ready_at - now)
        } else {
            None
        }
    }

    /// Leases the host slot for a new request
    pub fn begin_request(&mut self) {
        self.in_flight = true;
        self.request_count += 1;
    }

    /// Records a successful fetch: backoff returns to the base delay
    pub fn record_success(&mut self, now: Instant) {
        self.in_flight = false;
        self.last_fetch_time = Some(now);
        self.consecutive_failures = 0;
        self.current_backoff = self.min_delay;
    }

    /// Records a transient failure and grows the backoff
    ///
    /// The backoff doubles, is capped at `max_backoff` and never decreases.
    /// A server-provided `retry_after` hint raises it further (still capped).
    /// Returns the new backoff.
    pub fn record_failure(
        &mut self,
        now: Instant,
        max_backoff: Duration,
        retry_after: Option<Duration>,
    ) -> Duration {
        self.in_flight = false;
        self.last_fetch_time = Some(now);
        self.consecutive_failures += 1;

        let mut next = self.current_backoff.saturating_mul(2).min(max_backoff);
        if let Some(hint) = retry_after {
            next = next.max(hint.min(max_backoff));
        }
        self.current_backoff = next.max(self.current_backoff);
        self.current_backoff
    }

    /// Records a permanent failure: the slot is released but the backoff is
    /// left alone, since a 4xx can mean the host is pushing back
    pub fn record_permanent_failure(&mut self, now: Instant) {
        self.in_flight = false;
        self.last_fetch_time = Some(now);
    }

    /// Releases the slot without a request having been made
    pub fn release(&mut self) {
        self.in_flight = false;
    }

    /// Raises the base delay (e.g. from a robots.txt `Crawl-delay`)
    pub fn raise_min_delay(&mut self, delay: Duration) {
        if delay > self.min_delay {
            self.min_delay = delay;
        }
        if self.current_backoff < self.min_delay {
            self.current_backoff = self.min_delay;
        }
    }
}
