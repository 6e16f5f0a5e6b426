//! Per-host robots.txt cache
//!
//! Entries expire after 24 hours so long crawls pick up changes.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// A robots.txt policy with the time it was fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub robots: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(robots: ParsedRobots) -> Self {
        Self {
            robots,
            fetched_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }

    /// True once the entry is older than 24 hours
    pub fn is_stale(&self) -> bool {
        self.age() > Duration::hours(24)
    }
}

/// Robots.txt policies keyed by origin
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached policy for `origin` unless it is stale
    pub fn get(&self, origin: &str) -> Option<ParsedRobots> {
        let entries = self.entries.lock();
        entries
            .get(origin)
            .filter(|cached| !cached.is_stale())
            .map(|cached| cached.robots.clone())
    }

    pub fn insert(&self, origin: &str, robots: ParsedRobots) {
        self.entries
            .lock()
            .insert(origin.to_string(), CachedRobots::new(robots));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
