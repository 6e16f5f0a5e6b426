//! URL handling module for Ripple-Crawl
//!
//! This module provides URL canonicalization (the deduplication key used by
//! the frontier) and the host-scope policy that decides which discovered
//! links are allowed into the crawl.

mod canonical;
mod normalize;
mod scope;

// Re-export main types and functions
pub use canonical::CanonicalUrl;
pub use normalize::{normalize, normalize_url, NormalizeOptions, QueryPolicy};
pub use scope::{HostScope, ScopeFilter};
