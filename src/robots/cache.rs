//! Per-session robots.txt cache
//!
//! Each host's robots.txt is fetched at most once per session. Concurrent
//! workers asking for the same host wait on one shared fetch.

use crate::crawler::PolitenessGate;
use crate::robots::{fetch_robots, RobotsPolicy};
use crate::url::host_key;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use url::Url;

type Slot = Arc<OnceCell<Arc<RobotsPolicy>>>;

#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, Slot>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the policy for `url`'s host, fetching it on first use
    ///
    /// The robots.txt request takes a slot from `gate` like any other
    /// request to the host.
    pub async fn policy_for(
        &self,
        client: &reqwest::Client,
        gate: &PolitenessGate,
        url: &Url,
    ) -> Arc<RobotsPolicy> {
        let key = match host_key(url) {
            Some(key) => key,
            None => return Arc::new(RobotsPolicy::allow_all()),
        };

        let slot = {
            let mut entries = match self.entries.lock() {
                Ok(entries) => entries,
                Err(poisoned) => poisoned.into_inner(),
            };
            entries.entry(key).or_default().clone()
        };

        slot.get_or_init(|| async {
            gate.pause(url).await;
            Arc::new(fetch_robots(client, url).await)
        })
            .await
            .clone()
    }

    /// Number of hosts with a cached (or in-progress) entry
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
