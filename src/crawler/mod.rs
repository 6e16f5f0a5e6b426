//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The shared frontier with deduplication, per-host politeness and backoff
//! - The fetch worker pool and response classification
//! - Extraction hand-off and link discovery
//! - Overall crawl coordination
//!
//! The network and the HTML parser sit behind the [`Fetcher`] and
//! [`Extractor`] traits so the engine can be driven by scripted
//! implementations in tests.

mod clock;
mod coordinator;
mod dispatcher;
mod fetcher;
mod frontier;
mod parser;
mod reorder;
mod worker;

pub use clock::{Clock, ManualClock, TokioClock};
pub use coordinator::{Coordinator, CrawlHandle, CrawlReport, StopHandle};
pub use dispatcher::{Dispatch, Dispatcher};
pub use fetcher::{
    build_http_client, FetchError, FetchErrorKind, FetchResponse, Fetcher, HttpFetcher,
    ResponseClass,
};
pub use frontier::{BackoffPolicy, Frontier, Pop, Retry};
pub use parser::{ExtractError, Extraction, Extractor, HtmlExtractor};
