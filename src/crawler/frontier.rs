//! URL frontier for one crawl session
//!
//! The frontier owns the session's dedup set, the queue of URLs waiting to
//! be fetched, and the count of entries workers have taken but not yet
//! completed. Exhaustion is only signalled once the queue is empty *and*
//! nothing is in flight, since an in-flight page may still discover links.

use crate::config::FrontierOrder;
use crate::url::{normalize_url, CrawlScope};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::debug;
use url::Url;

/// A URL admitted to the frontier, consumed exactly once by a worker
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    /// Normalized URL
    pub url: Url,

    /// Link distance from the root URL (root is 0)
    pub depth: u32,

    pub discovered_at: DateTime<Utc>,

    /// Admission order, used to break ties deterministically
    seq: u64,
}

// Lower depth first, then earlier discovery. Comparison is reversed so the
// max-heap pops the shallowest entry.
impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .depth
            .cmp(&self.depth)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for FrontierEntry {}

#[derive(Debug)]
enum Queue {
    Fifo(VecDeque<FrontierEntry>),
    Priority(BinaryHeap<FrontierEntry>),
}

impl Queue {
    fn new(order: FrontierOrder) -> Self {
        match order {
            FrontierOrder::Fifo => Self::Fifo(VecDeque::new()),
            FrontierOrder::Priority => Self::Priority(BinaryHeap::new()),
        }
    }

    fn push(&mut self, entry: FrontierEntry) {
        match self {
            Self::Fifo(queue) => queue.push_back(entry),
            Self::Priority(heap) => heap.push(entry),
        }
    }

    fn pop(&mut self) -> Option<FrontierEntry> {
        match self {
            Self::Fifo(queue) => queue.pop_front(),
            Self::Priority(heap) => heap.pop(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Fifo(queue) => queue.len(),
            Self::Priority(heap) => heap.len(),
        }
    }
}

#[derive(Debug)]
struct FrontierState {
    queue: Queue,
    seen: HashSet<String>,
    admitted: u32,
    in_flight: usize,
    closed: bool,
    next_seq: u64,
}

/// Why `offer` turned a URL away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Closed,
    Invalid,
    TooDeep,
    OutOfScope,
    Duplicate,
    BudgetExhausted,
}

/// Deduplicating work queue shared by one session's workers
#[derive(Debug)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    notify: Notify,
    scope: CrawlScope,
    max_depth: u32,
    max_pages: u32,
}

impl Frontier {
    pub fn new(scope: CrawlScope, order: FrontierOrder, max_depth: u32, max_pages: u32) -> Self {
        Self {
            state: Mutex::new(FrontierState {
                queue: Queue::new(order),
                seen: HashSet::new(),
                admitted: 0,
                in_flight: 0,
                closed: false,
                next_seq: 0,
            }),
            notify: Notify::new(),
            scope,
            max_depth,
            max_pages,
        }
    }

    fn state(&self) -> MutexGuard<'_, FrontierState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Offers a discovered URL; returns true if it was queued
    pub fn offer(&self, url: &str, depth: u32) -> bool {
        match self.try_offer(url, depth) {
            Ok(()) => true,
            Err(reason) => {
                debug!(url, depth, ?reason, "frontier rejected url");
                false
            }
        }
    }

    /// Like `offer`, but reports the reason for a rejection
    pub fn try_offer(&self, url: &str, depth: u32) -> Result<(), Rejection> {
        if depth > self.max_depth {
            return Err(Rejection::TooDeep);
        }
        let url = normalize_url(url).map_err(|_| Rejection::Invalid)?;
        if !self.scope.allows(&url) {
            return Err(Rejection::OutOfScope);
        }

        let mut state = self.state();
        if state.closed {
            return Err(Rejection::Closed);
        }
        if state.seen.contains(url.as_str()) {
            return Err(Rejection::Duplicate);
        }
        if state.admitted >= self.max_pages {
            return Err(Rejection::BudgetExhausted);
        }

        state.seen.insert(url.as_str().to_string());
        state.admitted += 1;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(FrontierEntry {
            url,
            depth,
            discovered_at: Utc::now(),
            seq,
        });
        drop(state);

        self.notify.notify_waiters();
        Ok(())
    }

    /// Takes the next entry, waiting while the queue is empty but other
    /// entries are still in flight
    ///
    /// Returns `None` once the frontier is exhausted or closed. A returned
    /// entry counts as in flight until `complete` is called for it.
    pub async fn take(&self) -> Option<FrontierEntry> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before inspecting state so a wake-up between the check
            // and the await is not lost.
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if state.closed {
                    return None;
                }
                if let Some(entry) = state.queue.pop() {
                    state.in_flight += 1;
                    return Some(entry);
                }
                if state.in_flight == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks a taken entry as finished
    pub fn complete(&self) {
        let mut state = self.state();
        state.in_flight = state.in_flight.saturating_sub(1);
        let idle = state.in_flight == 0;
        drop(state);

        if idle {
            self.notify.notify_waiters();
        }
    }

    /// Stops admission and wakes every waiting worker
    pub fn close(&self) {
        self.state().closed = true;
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Entries waiting to be taken
    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries taken but not yet completed
    pub fn in_flight(&self) -> usize {
        self.state().in_flight
    }

    /// Distinct URLs admitted so far
    pub fn seen_count(&self) -> usize {
        self.state().seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopeConfig;
    use std::sync::Arc;
    use std::time::Duration;

    fn frontier(order: FrontierOrder, max_depth: u32, max_pages: u32) -> Frontier {
        let root = Url::parse("http://example.com/").unwrap();
        let scope = CrawlScope::new(&ScopeConfig::default(), &root);
        Frontier::new(scope, order, max_depth, max_pages)
    }

    #[tokio::test]
    async fn test_dedup_normalized_forms() {
        let frontier = frontier(FrontierOrder::Fifo, 5, 100);
        assert!(frontier.offer("http://example.com/about", 1));
        assert!(!frontier.offer("http://example.com/about/", 1));
        assert!(!frontier.offer("http://EXAMPLE.com/about#team", 2));
        assert_eq!(frontier.try_offer("http://example.com/about", 1), Err(Rejection::Duplicate));
        assert_eq!(frontier.seen_count(), 1);
    }

    #[tokio::test]
    async fn test_depth_and_scope_rejections() {
        let frontier = frontier(FrontierOrder::Fifo, 1, 100);
        assert_eq!(frontier.try_offer("http://example.com/deep", 2), Err(Rejection::TooDeep));
        assert_eq!(frontier.try_offer("http://other.com/", 1), Err(Rejection::OutOfScope));
        assert_eq!(frontier.try_offer("not a url", 0), Err(Rejection::Invalid));
        assert!(frontier.is_empty());
    }

    #[tokio::test]
    async fn test_page_budget() {
        let frontier = frontier(FrontierOrder::Fifo, 5, 2);
        assert!(frontier.offer("http://example.com/", 0));
        assert!(frontier.offer("http://example.com/a", 1));
        assert_eq!(
            frontier.try_offer("http://example.com/b", 1),
            Err(Rejection::BudgetExhausted)
        );
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let frontier = frontier(FrontierOrder::Fifo, 5, 100);
        frontier.offer("http://example.com/deep", 2);
        frontier.offer("http://example.com/shallow", 1);

        assert_eq!(frontier.take().await.unwrap().url.path(), "/deep");
        assert_eq!(frontier.take().await.unwrap().url.path(), "/shallow");
    }

    #[tokio::test]
    async fn test_priority_order() {
        let frontier = frontier(FrontierOrder::Priority, 5, 100);
        frontier.offer("http://example.com/deep", 2);
        frontier.offer("http://example.com/first", 1);
        frontier.offer("http://example.com/second", 1);

        assert_eq!(frontier.take().await.unwrap().url.path(), "/first");
        assert_eq!(frontier.take().await.unwrap().url.path(), "/second");
        assert_eq!(frontier.take().await.unwrap().url.path(), "/deep");
    }

    #[tokio::test]
    async fn test_exhaustion_requires_no_in_flight() {
        let frontier = Arc::new(frontier(FrontierOrder::Fifo, 5, 100));
        frontier.offer("http://example.com/", 0);

        let entry = frontier.take().await.unwrap();
        assert_eq!(entry.depth, 0);
        assert_eq!(frontier.in_flight(), 1);

        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.take().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // A link discovered by the in-flight page wakes the waiter.
        frontier.offer("http://example.com/child", 1);
        let child = waiter.await.unwrap().unwrap();
        assert_eq!(child.url.path(), "/child");

        frontier.complete();
        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.take().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        frontier.complete();
        assert!(waiter.await.unwrap().is_none());
        assert_eq!(frontier.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_empty_frontier_is_exhausted() {
        let frontier = frontier(FrontierOrder::Fifo, 5, 100);
        assert!(frontier.take().await.is_none());
    }

    #[tokio::test]
    async fn test_close_wakes_waiters_and_blocks_offers() {
        let frontier = Arc::new(frontier(FrontierOrder::Fifo, 5, 100));
        frontier.offer("http://example.com/", 0);
        frontier.offer("http://example.com/queued", 1);
        let _entry = frontier.take().await.unwrap();

        frontier.close();
        assert!(frontier.is_closed());
        assert!(frontier.take().await.is_none());
        assert_eq!(frontier.try_offer("http://example.com/new", 1), Err(Rejection::Closed));
    }
}
