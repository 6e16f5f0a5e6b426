//! Robots.txt handling module
//!
//! This module fetches, parses and caches robots.txt files, and answers
//! whether the crawl may fetch a given URL. It is only consulted when
//! `respect-robots` is enabled.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use crate::crawler::Fetcher;
use crate::url::CanonicalUrl;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Whether a URL may be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotsVerdict {
    /// Allowed; carries the host's `Crawl-delay` if one applies
    Allowed { crawl_delay: Option<Duration> },
    Disallowed,
}

impl RobotsVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Fetches robots.txt through the crawl's own fetcher and caches it per origin
pub struct RobotsPolicy {
    fetcher: Arc<dyn Fetcher>,
    cache: RobotsCache,
    user_agent: String,
    timeout: Duration,
}

impl RobotsPolicy {
    /// # Arguments
    ///
    /// * `fetcher` - Used to download robots.txt
    /// * `user_agent` - The product token matched against `User-agent` lines
    /// * `timeout` - Timeout for each robots.txt download
    pub fn new(fetcher: Arc<dyn Fetcher>, user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            fetcher,
            cache: RobotsCache::new(),
            user_agent: user_agent.into(),
            timeout,
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Checks `url` against its host's robots.txt, downloading it on first use
    pub async fn check(&self, url: &CanonicalUrl) -> RobotsVerdict {
        let robots = self.robots_for(&url.origin()).await;

        if robots.is_allowed(url.as_str(), &self.user_agent) {
            RobotsVerdict::Allowed {
                crawl_delay: robots.crawl_delay(&self.user_agent),
            }
        } else {
            RobotsVerdict::Disallowed
        }
    }

    async fn robots_for(&self, origin: &str) -> ParsedRobots {
        if let Some(robots) = self.cache.get(origin) {
            return robots;
        }

        let robots = self.fetch_robots(origin).await;
        self.cache.insert(origin, robots.clone());
        robots
    }

    /// Downloads and parses `{origin}/robots.txt`
    ///
    /// Anything but a 2xx response (including network failures) is treated
    /// as "no restrictions".
    async fn fetch_robots(&self, origin: &str) -> ParsedRobots {
        let robots_url = match Url::parse(&format!("{}/robots.txt", origin)) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Cannot build robots.txt URL for {}: {}", origin, e);
                return ParsedRobots::allow_all();
            }
        };

        match tokio::time::timeout(self.timeout, self.fetcher.fetch(&robots_url, self.timeout)).await
        {
            Ok(Ok(response)) if (200..300).contains(&response.status) => {
                tracing::debug!("Fetched {}", robots_url);
                ParsedRobots::from_content(&response.body)
            }
            Ok(Ok(response)) => {
                tracing::debug!("{} returned {}; allowing all", robots_url, response.status);
                ParsedRobots::allow_all()
            }
            Ok(Err(e)) => {
                tracing::debug!("Failed to fetch {}: {}; allowing all", robots_url, e);
                ParsedRobots::allow_all()
            }
            Err(_) => {
                tracing::debug!("Timed out fetching {}; allowing all", robots_url);
                ParsedRobots::allow_all()
            }
        }
    }
}
