//! State module for tracking crawl progress
//!
//! This module provides the state carried by the crawl engine.
//!
//! # Components
//!
//! - `HostState`: per-host politeness and backoff bookkeeping
//! - `FrontierEntry`: a URL waiting in (or leased from) the frontier
//! - `CrawlResult` / `CrawlStatus`: the single terminal outcome of an entry
//! - `CrawlState`: the coordinator lifecycle (`Idle -> Running -> Draining -> Done`)
//! - `Record`: one structured item returned by the extraction capability

mod crawl_result;
mod entry;
mod host_state;
mod lifecycle;
mod record;

// Re-export main types
pub use crawl_result::{CrawlResult, CrawlStatus};
pub use entry::FrontierEntry;
pub use host_state::HostState;
pub use lifecycle::CrawlState;
pub use record::Record;
