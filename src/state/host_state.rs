use std::time::Duration;
use tokio::time::Instant;

/// Politeness bookkeeping for one host within a session
///
/// Workers reserve request slots rather than polling: each reservation
/// pushes `next_allowed` forward by the effective delay, so two workers
/// aimed at the same host are serialized even if they arrive together.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Earliest instant the next request may start
    pub next_allowed: Option<Instant>,

    /// Number of slots handed out so far
    pub request_count: u64,

    /// Crawl-delay advertised by the host's robots.txt, if any
    pub crawl_delay: Option<Duration>,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The delay to enforce between requests: the larger of the configured
    /// default and the host's advertised crawl-delay
    pub fn effective_delay(&self, default: Duration) -> Duration {
        match self.crawl_delay {
            Some(delay) => delay.max(default),
            None => default,
        }
    }

    /// Claims the next request slot and returns how long the caller must
    /// sleep before using it
    pub fn reserve(&mut self, now: Instant, delay: Duration) -> Duration {
        let start = match self.next_allowed {
            Some(next) if next > now => next,
            _ => now,
        };
        self.next_allowed = Some(start.checked_add(delay).unwrap_or(start));
        self.request_count += 1;
        start - now
    }

    /// Returns true if a request could start immediately
    pub fn can_request(&self, now: Instant) -> bool {
        self.next_allowed.map_or(true, |next| next <= now)
    }
}
