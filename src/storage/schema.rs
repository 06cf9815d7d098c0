//! Database schema definitions
//!
//! This module contains the SQL schema for the crawl-engine database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl session
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    root_url TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    started_at TEXT,
    finished_at TEXT,
    visited_count INTEGER NOT NULL DEFAULT 0,
    error_count INTEGER NOT NULL DEFAULT 0,
    max_depth INTEGER NOT NULL,
    max_pages INTEGER NOT NULL,
    failure_reason TEXT,
    config_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);

-- One row per fetched URL; rowid order is first-insertion order
CREATE TABLE IF NOT EXISTS results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    url TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    content_type TEXT NOT NULL,
    response_time_ms INTEGER NOT NULL,
    body TEXT NOT NULL,
    info_json TEXT NOT NULL,
    is_error INTEGER NOT NULL,
    depth INTEGER NOT NULL,
    fetched_at TEXT NOT NULL,
    error_message TEXT,
    UNIQUE(session_id, url)
);

CREATE INDEX IF NOT EXISTS idx_results_session ON results(session_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
