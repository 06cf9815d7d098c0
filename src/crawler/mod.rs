//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The per-session URL frontier
//! - HTTP fetching with retries and per-host politeness
//! - HTML parsing into page metadata and links
//! - Session coordination

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod politeness;
mod retry;

pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, is_html, sniff_content_type, FailureKind, FetchOutcome, Fetcher};
pub use frontier::{Frontier, FrontierEntry, Rejection};
pub use parser::{parse_html, Info, Token, MAX_PARAGRAPH_CHARS};
pub use politeness::PolitenessGate;
pub use retry::{ExponentialBackoff, RetryPolicy};

use crate::config::Config;
use crate::state::CrawlSession;
use crate::storage::{CrawlResult, ResultStore};
use crate::Result;
use std::sync::Arc;

/// Runs a single crawl session to completion
///
/// This is the simplest entry point: it builds a coordinator, starts one
/// session at `root_url`, waits for it to finish and returns the final
/// session summary with its results.
pub async fn crawl(
    config: Config,
    store: Arc<dyn ResultStore>,
    root_url: &str,
) -> Result<(CrawlSession, Vec<CrawlResult>)> {
    let coordinator = Coordinator::new(config, store)?;
    let id = coordinator.start(root_url).await?;
    let session = coordinator.wait(id).await?;
    let results = coordinator.results(id)?;
    Ok((session, results))
}
