//! Extraction hand-off
//!
//! Runs the extraction capability on a fetched page and feeds the links it
//! finds back into the frontier, after normalization, depth and scope checks.

use crate::crawler::fetcher::FetchResponse;
use crate::crawler::frontier::Frontier;
use crate::crawler::parser::Extractor;
use crate::state::{FrontierEntry, Record};
use crate::url::{normalize, CanonicalUrl, NormalizeOptions, ScopeFilter};
use std::sync::Arc;
use tokio::time::Instant;
use url::Url;

/// What the dispatcher did with one page
#[derive(Debug, Default)]
pub struct Dispatch {
    pub records: Vec<Record>,

    /// In-scope links found on the page, duplicates included
    pub discovered: Vec<CanonicalUrl>,

    /// Entries newly accepted by the frontier
    pub enqueued: Vec<FrontierEntry>,

    pub extraction_error: Option<String>,
}

/// Turns fetched pages into records and new frontier entries
pub struct Dispatcher {
    extractor: Arc<dyn Extractor>,
    frontier: Arc<Frontier>,
    scope: ScopeFilter,
    options: NormalizeOptions,
    max_depth: u32,
}

impl Dispatcher {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        frontier: Arc<Frontier>,
        scope: ScopeFilter,
        options: NormalizeOptions,
        max_depth: u32,
    ) -> Self {
        Self {
            extractor,
            frontier,
            scope,
            options,
            max_depth,
        }
    }

    /// Extracts records and links from a successfully fetched page
    ///
    /// An extraction failure is logged and reported in the returned
    /// `Dispatch`; the page still counts as fetched.
    pub fn dispatch(&self, entry: &FrontierEntry, response: &FetchResponse) -> Dispatch {
        let extraction = match self
            .extractor
            .extract(&response.body, response.content_type())
        {
            Ok(extraction) => extraction,
            Err(e) => {
                tracing::warn!("Extraction failed for {}: {}", entry.url, e);
                return Dispatch {
                    extraction_error: Some(e.to_string()),
                    ..Dispatch::default()
                };
            }
        };

        let base = response.final_url.as_ref().unwrap_or(entry.url.as_url());
        let (discovered, enqueued) = self.offer_links(entry, base, &extraction.links);

        tracing::debug!(
            "{}: {} records, {} links, {} new",
            entry.url,
            extraction.records.len(),
            discovered.len(),
            enqueued.len()
        );

        Dispatch {
            records: extraction.records,
            discovered,
            enqueued,
            extraction_error: None,
        }
    }

    /// Normalizes raw links found on `parent`'s page and offers the survivors
    /// to the frontier at depth `parent.depth + 1`
    ///
    /// Returns the in-scope links and the entries the frontier accepted.
    pub fn offer_links<S: AsRef<str>>(
        &self,
        parent: &FrontierEntry,
        base: &Url,
        links: &[S],
    ) -> (Vec<CanonicalUrl>, Vec<FrontierEntry>) {
        if parent.depth >= self.max_depth {
            tracing::trace!("{} is at max depth; not following links", parent.url);
            return (Vec::new(), Vec::new());
        }

        self.offer(parent, base, links, FrontierEntry::child_of)
    }

    /// Offers the target of a redirect from `parent` at the parent's own depth
    pub fn offer_redirect(
        &self,
        parent: &FrontierEntry,
        base: &Url,
        location: &str,
    ) -> (Vec<CanonicalUrl>, Vec<FrontierEntry>) {
        self.offer(parent, base, &[location], FrontierEntry::redirect_of)
    }

    fn offer<S: AsRef<str>>(
        &self,
        parent: &FrontierEntry,
        base: &Url,
        links: &[S],
        make_entry: fn(&FrontierEntry, CanonicalUrl, Instant) -> FrontierEntry,
    ) -> (Vec<CanonicalUrl>, Vec<FrontierEntry>) {
        let mut discovered = Vec::new();
        let mut enqueued = Vec::new();

        let now = self.frontier.now();
        for raw in links {
            let raw = raw.as_ref();
            let url = match normalize(raw, Some(base), &self.options) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Rejected link '{}' on {}: {}", raw, parent.url, e);
                    continue;
                }
            };

            if !self.scope.allows(&url) {
                tracing::trace!("Out of scope: {}", url);
                continue;
            }

            discovered.push(url.clone());
            if let Some(accepted) = self.frontier.offer(make_entry(parent, url, now)) {
                enqueued.push(accepted);
            }
        }

        (discovered, enqueued)
    }
}
