/// Session state definitions for tracking crawl lifecycles
///
/// A session moves `Pending → Running → {Completed, Failed, Cancelled}`.
/// Terminal states are final; recrawling needs a new session.
use crate::CrawlError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Represents the lifecycle state of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session created, frontier not yet seeded
    Pending,

    /// Workers are pulling from the frontier
    Running,

    // ===== Terminal States =====
    /// Frontier exhausted and every in-flight fetch finished
    Completed,

    /// An infrastructure fault (result store) stopped the session
    Failed,

    /// A stop request was honored
    Cancelled,
}

impl SessionStatus {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the state machine allows moving to `next`
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Cancelled)
        )
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Running,
            Self::Completed,
            Self::Failed,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Identifier of a crawl session (a ULID, so ids sort by creation time)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Ulid);

impl SessionId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Summary of one crawl run, owned by the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSession {
    pub id: SessionId,
    /// Normalized root URL
    pub root_url: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    /// Set on the transition to `Running`
    pub started_at: Option<DateTime<Utc>>,
    /// Set on the transition to a terminal state
    pub finished_at: Option<DateTime<Utc>>,
    /// Number of results written; never exceeds `max_pages`
    pub visited_count: u32,
    /// Number of results written with `is_error = true`
    pub error_count: u32,
    pub max_depth: u32,
    pub max_pages: u32,
    pub failure_reason: Option<String>,
    /// Fingerprint of the configuration the session ran with
    pub config_hash: String,
}

impl CrawlSession {
    /// Creates a `Pending` session
    pub fn new(root_url: &str, max_depth: u32, max_pages: u32, config_hash: &str) -> Self {
        Self {
            id: SessionId::new(),
            root_url: root_url.to_string(),
            status: SessionStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            visited_count: 0,
            error_count: 0,
            max_depth,
            max_pages,
            failure_reason: None,
            config_hash: config_hash.to_string(),
        }
    }

    /// Moves the session to `next`, stamping start/finish times
    pub fn transition(&mut self, next: SessionStatus) -> Result<(), CrawlError> {
        if !self.status.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        if next == SessionStatus::Running {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        self.status = next;
        Ok(())
    }

    /// Records a written result in the session counters
    pub fn record_visit(&mut self, is_error: bool) {
        self.visited_count += 1;
        if is_error {
            self.error_count += 1;
        }
    }
}
