use crate::url::CanonicalUrl;
use tokio::time::Instant;

/// A URL waiting in the frontier
///
/// Entries are created on discovery and owned by the frontier from the moment
/// they are pushed. The frontier hands out a copy on `pop`, mutates
/// `retry_count` on retry and drops the entry on success or terminal failure.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    /// The canonical URL to fetch
    pub url: CanonicalUrl,

    /// Hops from the seed URL (seeds are depth 0)
    pub depth: u32,

    /// When this URL was discovered
    pub discovered_at: Instant,

    /// Scheduling priority (higher is fetched sooner within a host)
    pub priority: i32,

    /// Failed attempts so far
    pub retry_count: u32,

    /// The page this URL was discovered on
    pub referrer: Option<CanonicalUrl>,

    /// Dense discovery ordinal, assigned by the frontier on push
    pub(crate) sequence: u64,
}

impl FrontierEntry {
    /// Creates a new entry with default priority
    pub fn new(url: CanonicalUrl, depth: u32, discovered_at: Instant) -> Self {
        Self {
            url,
            depth,
            discovered_at,
            priority: 0,
            retry_count: 0,
            referrer: None,
            sequence: 0,
        }
    }

    /// Creates a seed entry (depth 0)
    pub fn seed(url: CanonicalUrl, discovered_at: Instant) -> Self {
        Self::new(url, 0, discovered_at)
    }

    /// Creates an entry discovered on `parent`'s page
    ///
    /// Priority falls by one per hop so that each host queue is consumed
    /// breadth-first.
    pub fn child_of(parent: &FrontierEntry, url: CanonicalUrl, discovered_at: Instant) -> Self {
        let depth = parent.depth + 1;
        Self {
            priority: -(depth as i32),
            referrer: Some(parent.url.clone()),
            ..Self::new(url, depth, discovered_at)
        }
    }

    /// Creates the entry for a redirect target of `parent`
    ///
    /// The target stands in for the same page, so it keeps the parent's depth
    /// and priority.
    pub fn redirect_of(parent: &FrontierEntry, url: CanonicalUrl, discovered_at: Instant) -> Self {
        Self {
            priority: parent.priority,
            referrer: Some(parent.url.clone()),
            ..Self::new(url, parent.depth, discovered_at)
        }
    }

    /// Sets the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the number of attempts already made (used when resuming)
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// The discovery ordinal assigned by the frontier
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The host this entry is scheduled under
    pub fn host(&self) -> &str {
        self.url.host()
    }

    /// Number of fetch attempts including the one in progress
    pub fn attempts(&self) -> u32 {
        self.retry_count + 1
    }
}
