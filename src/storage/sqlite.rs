//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ResultStore trait.

use crate::state::{CrawlSession, SessionId, SessionStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ResultStore, StoreError, StoreResult};
use crate::storage::CrawlResult;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SESSION_COLUMNS: &str = "id, root_url, status, created_at, started_at, finished_at, \
     visited_count, error_count, max_depth, max_pages, failure_reason, config_hash";

const RESULT_COLUMNS: &str = "url, status_code, content_type, response_time_ms, body, \
     info_json, is_error, depth, fetched_at, error_message";

/// SQLite storage backend
///
/// One connection guarded by a mutex; SQLite serializes writers anyway.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_optional_time(idx: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_time(idx, &v)).transpose()
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<CrawlSession> {
    let id: String = row.get(0)?;
    let status: String = row.get(2)?;
    let created_at: String = row.get(3)?;

    Ok(CrawlSession {
        id: id.parse().map_err(|e| conversion_error(0, e))?,
        root_url: row.get(1)?,
        status: SessionStatus::from_db_string(&status)
            .ok_or_else(|| conversion_error(2, format!("unknown session status: {}", status)))?,
        created_at: parse_time(3, &created_at)?,
        started_at: parse_optional_time(4, row.get(4)?)?,
        finished_at: parse_optional_time(5, row.get(5)?)?,
        visited_count: row.get(6)?,
        error_count: row.get(7)?,
        max_depth: row.get(8)?,
        max_pages: row.get(9)?,
        failure_reason: row.get(10)?,
        config_hash: row.get(11)?,
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<CrawlResult> {
    let info_json: String = row.get(5)?;
    let fetched_at: String = row.get(8)?;

    Ok(CrawlResult {
        url: row.get(0)?,
        status_code: row.get(1)?,
        content_type: row.get(2)?,
        response_time: row.get(3)?,
        body: row.get(4)?,
        info: serde_json::from_str(&info_json).map_err(|e| conversion_error(5, e))?,
        is_error: row.get(6)?,
        depth: row.get(7)?,
        fetched_at: parse_time(8, &fetched_at)?,
        error_message: row.get(9)?,
    })
}

fn session_exists(conn: &Connection, session_id: SessionId) -> StoreResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sessions WHERE id = ?1",
            params![session_id.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

impl ResultStore for SqliteStore {
    // ===== Session Management =====

    fn create_session(&self, session: &CrawlSession) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO sessions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                SESSION_COLUMNS
            ),
            params![
                session.id.to_string(),
                session.root_url,
                session.status.to_db_string(),
                session.created_at.to_rfc3339(),
                session.started_at.map(|t| t.to_rfc3339()),
                session.finished_at.map(|t| t.to_rfc3339()),
                session.visited_count,
                session.error_count,
                session.max_depth,
                session.max_pages,
                session.failure_reason,
                session.config_hash,
            ],
        )?;
        Ok(())
    }

    fn update_session(&self, session: &CrawlSession) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE sessions SET status = ?1, started_at = ?2, finished_at = ?3,
                visited_count = ?4, error_count = ?5, failure_reason = ?6
             WHERE id = ?7",
            params![
                session.status.to_db_string(),
                session.started_at.map(|t| t.to_rfc3339()),
                session.finished_at.map(|t| t.to_rfc3339()),
                session.visited_count,
                session.error_count,
                session.failure_reason,
                session.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::SessionNotFound(session.id));
        }
        Ok(())
    }

    fn status(&self, session_id: SessionId) -> StoreResult<CrawlSession> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
                params![session_id.to_string()],
                session_from_row,
            )
            .optional()?;
        session.ok_or(StoreError::SessionNotFound(session_id))
    }

    fn list_sessions(&self) -> StoreResult<Vec<CrawlSession>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sessions ORDER BY id",
            SESSION_COLUMNS
        ))?;
        let sessions = stmt
            .query_map([], session_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    // ===== Results =====

    fn put(&self, session_id: SessionId, result: CrawlResult) -> StoreResult<()> {
        let conn = self.conn()?;
        if !session_exists(&conn, session_id)? {
            return Err(StoreError::SessionNotFound(session_id));
        }

        let info_json = serde_json::to_string(&result.info)?;
        conn.execute(
            "INSERT INTO results (session_id, url, status_code, content_type, response_time_ms,
                body, info_json, is_error, depth, fetched_at, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(session_id, url) DO UPDATE SET
                status_code = excluded.status_code,
                content_type = excluded.content_type,
                response_time_ms = excluded.response_time_ms,
                body = excluded.body,
                info_json = excluded.info_json,
                is_error = excluded.is_error,
                depth = excluded.depth,
                fetched_at = excluded.fetched_at,
                error_message = excluded.error_message",
            params![
                session_id.to_string(),
                result.url,
                result.status_code,
                result.content_type,
                result.response_time,
                result.body,
                info_json,
                result.is_error,
                result.depth,
                result.fetched_at.to_rfc3339(),
                result.error_message,
            ],
        )?;
        Ok(())
    }

    fn get(&self, session_id: SessionId) -> StoreResult<Vec<CrawlResult>> {
        let conn = self.conn()?;
        if !session_exists(&conn, session_id)? {
            return Err(StoreError::SessionNotFound(session_id));
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM results WHERE session_id = ?1 ORDER BY id",
            RESULT_COLUMNS
        ))?;
        let results = stmt
            .query_map(params![session_id.to_string()], result_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }
}
