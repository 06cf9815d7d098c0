use crate::state::HostState;
use crate::url::host_key;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Per-host request spacing shared by a session's workers
///
/// Slots are reserved under the lock and slept on outside it, so a worker
/// waiting on one host never blocks workers bound for another.
#[derive(Debug)]
pub struct PolitenessGate {
    default_delay: Duration,
    hosts: Mutex<HashMap<String, HostState>>,
}

impl PolitenessGate {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    fn hosts(&self) -> MutexGuard<'_, HashMap<String, HostState>> {
        match self.hosts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Records a host's robots.txt Crawl-delay
    pub fn set_crawl_delay(&self, url: &Url, delay: Option<Duration>) {
        if let Some(key) = host_key(url) {
            self.hosts().entry(key).or_default().crawl_delay = delay;
        }
    }

    /// Reserves the next request slot for `url`'s host and returns the wait
    pub fn reserve(&self, url: &Url) -> Duration {
        let Some(key) = host_key(url) else {
            return Duration::ZERO;
        };
        let mut hosts = self.hosts();
        let state = hosts.entry(key).or_default();
        let delay = state.effective_delay(self.default_delay);
        state.reserve(Instant::now(), delay)
    }

    /// Waits for this worker's turn at `url`'s host
    ///
    /// Returns false if `cancel` fired during the wait; the caller must not
    /// fetch in that case.
    pub async fn wait_turn(&self, url: &Url, cancel: &CancellationToken) -> bool {
        let wait = self.reserve(url);
        if wait.is_zero() {
            return !cancel.is_cancelled();
        }

        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(wait) => true,
        }
    }

    /// Waits for a slot at `url`'s host without observing cancellation
    ///
    /// Callers that need to abandon the wait drop the future.
    pub async fn pause(&self, url: &Url) {
        let wait = self.reserve(url);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of request slots handed out for `url`'s host
    pub fn request_count(&self, url: &Url) -> u64 {
        host_key(url)
            .and_then(|key| self.hosts().get(&key).map(|state| state.request_count))
            .unwrap_or(0)
    }
}
