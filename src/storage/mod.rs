//! Storage module for crawl sessions and their results
//!
//! Two backends implement [`ResultStore`]:
//! - [`MemoryStore`]: process-local, used by tests and embedders
//! - [`SqliteStore`]: durable, used by the CLI

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{ResultStore, StoreError, StoreResult};

use crate::crawler::Info;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of one fetch+parse cycle, immutable once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    /// Normalized URL, unique within a session
    pub url: String,
    /// HTTP status, or 0 when no response was received
    pub status_code: u16,
    pub content_type: String,
    /// Milliseconds
    pub response_time: u64,
    pub body: String,
    pub info: Info,
    pub is_error: bool,
    pub depth: u32,
    pub fetched_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

/// Opens (or creates) the SQLite store at `path`
pub fn open_store(path: &Path) -> StoreResult<SqliteStore> {
    SqliteStore::new(path)
}

#[cfg(test)]
pub(crate) fn sample_result(url: &str, status_code: u16) -> CrawlResult {
    CrawlResult {
        url: url.to_string(),
        status_code,
        content_type: "text/html".to_string(),
        response_time: 12,
        body: "<html></html>".to_string(),
        info: Info::default(),
        is_error: status_code >= 400 || status_code == 0,
        depth: 0,
        fetched_at: Utc::now(),
        error_message: None,
    }
}
