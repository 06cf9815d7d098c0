//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `SessionStatus`: lifecycle of a crawl session (pending, running, and the terminal states)
//! - `CrawlSession`: the summary record the coordinator owns for each session
//! - `HostState`: per-host politeness bookkeeping shared by a session's workers

mod host_state;
mod session_state;

// Re-export main types
pub use host_state::HostState;
pub use session_state::{CrawlSession, SessionId, SessionStatus};
