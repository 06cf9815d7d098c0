//! Storage traits and error types
//!
//! This module defines the trait interface for result store backends and
//! associated error types.

use crate::state::{CrawlSession, SessionId};
use crate::storage::CrawlResult;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for result store implementations
///
/// Stores are shared by every session in the process, so all methods take
/// `&self` and implementations handle their own locking. Writes for one
/// session must not block another session.
pub trait ResultStore: Send + Sync {
    // ===== Session Management =====

    /// Records a newly created session
    fn create_session(&self, session: &CrawlSession) -> StoreResult<()>;

    /// Replaces the stored summary of an existing session
    fn update_session(&self, session: &CrawlSession) -> StoreResult<()>;

    /// Gets a session summary by ID
    fn status(&self, session_id: SessionId) -> StoreResult<CrawlSession>;

    /// Lists every stored session, oldest first
    fn list_sessions(&self) -> StoreResult<Vec<CrawlSession>>;

    // ===== Results =====

    /// Writes a result, keyed by its normalized URL
    ///
    /// Writing the same URL twice keeps the latest result at the position of
    /// the first write.
    fn put(&self, session_id: SessionId, result: CrawlResult) -> StoreResult<()>;

    /// Gets a session's results ordered by first insertion
    fn get(&self, session_id: SessionId) -> StoreResult<Vec<CrawlResult>>;
}
