//! URL handling module for crawl-engine
//!
//! This module provides URL normalization, host extraction and the per-session
//! crawl scope that decides which discovered links are followed.

mod domain;
mod normalize;
mod scope;

// Re-export main functions
pub use domain::{extract_host, host_key};
pub use normalize::normalize_url;
pub use scope::{matches_wildcard, CrawlScope};
