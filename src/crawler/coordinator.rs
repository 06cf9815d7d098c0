//! Crawl coordinator - session lifecycle and crawl orchestration
//!
//! The coordinator owns every session started in this process. Each session
//! gets its own frontier, politeness gate, robots cache, cancellation token
//! and worker pool; the HTTP client and result store are shared.
//!
//! Session flow:
//! - `start` validates the root URL, persists a `Pending` session, seeds the
//!   frontier and moves it to `Running`
//! - workers take entries, wait for their host's turn, fetch, parse HTML
//!   and feed discovered links back to the frontier at `depth + 1`
//! - the supervisor ends the session `Completed` once every worker has
//!   drained the frontier, `Cancelled` after `stop`, or `Failed` when the
//!   result store faults

use crate::config::{config_fingerprint, validate, Config};
use crate::crawler::fetcher::{build_http_client, is_html, FetchOutcome, Fetcher};
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::crawler::parser::{parse_html, Info};
use crate::crawler::politeness::PolitenessGate;
use crate::crawler::retry::RetryPolicy;
use crate::robots::RobotsCache;
use crate::state::{CrawlSession, SessionId, SessionStatus};
use crate::storage::{CrawlResult, ResultStore, StoreError};
use crate::url::{normalize_url, CrawlScope};
use crate::{CrawlError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Session summaries are written to the store after this many results
const PERSIST_EVERY: u32 = 10;

/// Maps store lookups of unknown sessions to the crate-level error
fn store_error(err: StoreError) -> CrawlError {
    match err {
        StoreError::SessionNotFound(id) => CrawlError::SessionNotFound(id),
        other => CrawlError::Store(other),
    }
}

/// State shared by one session's supervisor and workers
struct SessionContext {
    id: SessionId,
    config: Arc<Config>,
    session: Mutex<CrawlSession>,
    frontier: Frontier,
    politeness: PolitenessGate,
    robots: Option<RobotsCache>,
    fetcher: Fetcher,
    store: Arc<dyn ResultStore>,
    cancel: CancellationToken,
    /// First store fault seen; forces the session to `Failed`
    fault: Mutex<Option<String>>,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionContext {
    fn session(&self) -> MutexGuard<'_, CrawlSession> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn snapshot(&self) -> CrawlSession {
        self.session().clone()
    }

    /// Requests cancellation; workers stop at their next suspension point
    fn cancel(&self) {
        self.cancel.cancel();
        self.frontier.close();
    }

    /// Records an unrecoverable fault and stops the session's workers
    fn fail(&self, reason: String) {
        {
            let mut fault = match self.fault.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if fault.is_none() {
                tracing::error!(session = %self.id, "session failed: {}", reason);
                *fault = Some(reason);
            }
        }
        self.cancel();
    }

    fn fault(&self) -> Option<String> {
        match self.fault.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Processes one frontier entry: robots check, politeness wait, fetch,
    /// parse, link discovery and result write
    async fn process(&self, entry: &FrontierEntry) {
        let url = &entry.url;
        let agent = &self.config.user_agent.crawler_name;

        if let Some(robots) = &self.robots {
            let policy = tokio::select! {
                _ = self.cancel.cancelled() => return,
                policy = robots.policy_for(self.fetcher.client(), &self.politeness, url) => policy,
            };
            self.politeness.set_crawl_delay(url, policy.crawl_delay(agent));

            if !policy.allows(url, agent) {
                tracing::debug!(session = %self.id, url = %url, "disallowed by robots.txt");
                self.record(entry, FetchOutcome::disallowed(), Info::default());
                return;
            }
        }

        tracing::debug!(session = %self.id, url = %url, depth = entry.depth, "fetching");
        let Some(outcome) = self.fetcher.fetch(url, &self.politeness, &self.cancel).await else {
            tracing::debug!(session = %self.id, url = %url, "cancelled before fetch");
            return;
        };

        let info = match &outcome {
            FetchOutcome::Success {
                final_url,
                content_type,
                body,
                ..
            } if is_html(content_type) => parse_html(body, final_url),
            _ => Info::default(),
        };

        let next_depth = entry.depth + 1;
        if next_depth <= self.config.crawler.max_depth && !self.cancel.is_cancelled() {
            let accepted = info
                .links
                .iter()
                .filter(|link| self.frontier.offer(&link.value, next_depth))
                .count();
            tracing::debug!(
                session = %self.id,
                url = %url,
                "queued {} of {} links",
                accepted,
                info.links.len()
            );
        }

        self.record(entry, outcome, info);
    }

    /// Writes a result and updates the session counters
    fn record(&self, entry: &FrontierEntry, outcome: FetchOutcome, info: Info) {
        let result = build_result(entry, outcome, info);
        let is_error = result.is_error;

        if is_error {
            tracing::warn!(
                session = %self.id,
                url = %result.url,
                status = result.status_code,
                "fetch failed: {}",
                result.error_message.as_deref().unwrap_or("unknown error")
            );
        }

        if let Err(e) = self.store.put(self.id, result) {
            self.fail(format!("result store write failed: {}", e));
            return;
        }

        let persisted = {
            let mut session = self.session();
            session.record_visit(is_error);
            let persisted = if session.visited_count % PERSIST_EVERY == 0 {
                self.store.update_session(&session)
            } else {
                Ok(())
            };
            persisted
        };
        if let Err(e) = persisted {
            self.fail(format!("session update failed: {}", e));
        }
    }

    /// Moves the session to its terminal state and persists it
    ///
    /// Returns the final summary and whether the store accepted it.
    fn finish(&self) -> (CrawlSession, bool) {
        let fault = self.fault();
        let next = if fault.is_some() {
            SessionStatus::Failed
        } else if self.cancel.is_cancelled() {
            SessionStatus::Cancelled
        } else {
            SessionStatus::Completed
        };

        let finished = {
            let mut session = self.session();
            if let Err(e) = session.transition(next) {
                tracing::error!(session = %self.id, "{}", e);
            }
            if fault.is_some() {
                session.failure_reason = fault;
            }
            session.clone()
        };

        let persisted = match self.store.update_session(&finished) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(session = %self.id, "failed to persist final session state: {}", e);
                false
            }
        };

        tracing::info!(
            session = %self.id,
            status = %finished.status,
            visited = finished.visited_count,
            errors = finished.error_count,
            "crawl session finished"
        );

        (finished, persisted)
    }
}

/// Builds the stored record for a processed entry
fn build_result(entry: &FrontierEntry, outcome: FetchOutcome, info: Info) -> CrawlResult {
    match outcome {
        FetchOutcome::Success {
            status_code,
            content_type,
            body,
            response_time,
            ..
        } => CrawlResult {
            url: entry.url.to_string(),
            status_code,
            content_type,
            response_time: response_time.as_millis() as u64,
            body,
            info,
            is_error: false,
            depth: entry.depth,
            fetched_at: Utc::now(),
            error_message: None,
        },
        FetchOutcome::Failure {
            status_code,
            message,
            response_time,
            body,
            ..
        } => CrawlResult {
            url: entry.url.to_string(),
            status_code,
            content_type: String::new(),
            response_time: response_time.as_millis() as u64,
            body,
            info,
            is_error: true,
            depth: entry.depth,
            fetched_at: Utc::now(),
            error_message: Some(message),
        },
    }
}

/// Pulls entries until the frontier is exhausted or the session is cancelled
async fn worker_loop(ctx: Arc<SessionContext>, worker_id: u32) {
    loop {
        let entry = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            entry = ctx.frontier.take() => match entry {
                Some(entry) => entry,
                None => break,
            },
        };

        ctx.process(&entry).await;
        ctx.frontier.complete();
    }
    tracing::trace!(session = %ctx.id, worker = worker_id, "worker exiting");
}

type Registry = Arc<RwLock<HashMap<SessionId, Arc<SessionContext>>>>;

/// Runs the worker pool to completion and settles the session's final state
///
/// A session whose final summary reached the store is dropped from the
/// registry; later lookups are answered by the store.
async fn run_session(ctx: Arc<SessionContext>, registry: Registry) {
    let concurrency = ctx.config.crawler.max_concurrency.max(1);
    let mut workers = JoinSet::new();
    for worker_id in 0..concurrency {
        workers.spawn(worker_loop(ctx.clone(), worker_id));
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            ctx.fail(format!("worker task failed: {}", e));
        }
    }

    let (finished, persisted) = ctx.finish();
    if persisted {
        let mut sessions = match registry.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions.remove(&ctx.id);
    }
    ctx.status_tx.send_replace(finished.status);
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    config_hash: String,
    store: Arc<dyn ResultStore>,
    fetcher: Fetcher,
    /// Sessions that are running or whose final summary is not yet stored
    sessions: Registry,
}

impl Coordinator {
    /// Creates a coordinator writing to `store`
    ///
    /// Fails if the configuration is invalid or the HTTP client cannot be
    /// built.
    pub fn new(config: Config, store: Arc<dyn ResultStore>) -> Result<Self> {
        validate(&config)?;
        let config_hash = config_fingerprint(&config)?;
        let client = build_http_client(&config.user_agent, config.crawler.fetch_timeout())?;
        let fetcher = Fetcher::new(client, RetryPolicy::from(&config.retry));

        Ok(Self {
            config: Arc::new(config),
            config_hash,
            store,
            fetcher,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn context(&self, id: SessionId) -> Option<Arc<SessionContext>> {
        let sessions = match self.sessions.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions.get(&id).cloned()
    }

    /// Starts a crawl session rooted at `root_url` and returns its id
    ///
    /// An invalid root URL is rejected before any session is created.
    pub async fn start(&self, root_url: &str) -> Result<SessionId> {
        let root = normalize_url(root_url)?;
        let crawler = &self.config.crawler;

        let mut session = CrawlSession::new(
            root.as_str(),
            crawler.max_depth,
            crawler.max_pages,
            &self.config_hash,
        );
        let id = session.id;
        self.store.create_session(&session)?;

        let frontier = Frontier::new(
            CrawlScope::new(&self.config.scope, &root),
            crawler.frontier_order,
            crawler.max_depth,
            crawler.max_pages,
        );
        if !frontier.offer(root.as_str(), 0) {
            tracing::warn!(session = %id, url = %root, "root url rejected by crawl scope");
        }

        session.transition(SessionStatus::Running)?;
        self.store.update_session(&session)?;

        let (status_tx, _) = watch::channel(SessionStatus::Running);
        let ctx = Arc::new(SessionContext {
            id,
            config: self.config.clone(),
            session: Mutex::new(session),
            frontier,
            politeness: PolitenessGate::new(crawler.politeness_delay()),
            robots: crawler.respect_robots.then(RobotsCache::new),
            fetcher: self.fetcher.clone(),
            store: self.store.clone(),
            cancel: CancellationToken::new(),
            fault: Mutex::new(None),
            status_tx,
        });

        {
            let mut sessions = match self.sessions.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            sessions.insert(id, ctx.clone());
        }

        tracing::info!(
            session = %id,
            url = %root,
            max_depth = crawler.max_depth,
            max_pages = crawler.max_pages,
            workers = crawler.max_concurrency,
            "crawl session started"
        );
        tokio::spawn(run_session(ctx, self.sessions.clone()));

        Ok(id)
    }

    /// Requests a session to stop and returns its current summary
    ///
    /// In-flight fetches finish and are recorded; nothing new is taken from
    /// the frontier. Stopping a finished session is a no-op.
    pub fn stop(&self, id: SessionId) -> Result<CrawlSession> {
        match self.context(id) {
            Some(ctx) => {
                let session = ctx.snapshot();
                if !session.status.is_terminal() {
                    tracing::info!(session = %id, "stop requested");
                    ctx.cancel();
                }
                Ok(session)
            }
            None => self.store.status(id).map_err(store_error),
        }
    }

    /// Current summary of a session
    pub fn status(&self, id: SessionId) -> Result<CrawlSession> {
        match self.context(id) {
            Some(ctx) => Ok(ctx.snapshot()),
            None => self.store.status(id).map_err(store_error),
        }
    }

    /// Results written so far, in first-insertion order
    pub fn results(&self, id: SessionId) -> Result<Vec<CrawlResult>> {
        self.store.get(id).map_err(store_error)
    }

    /// Waits until a session reaches a terminal state
    pub async fn wait(&self, id: SessionId) -> Result<CrawlSession> {
        let ctx = match self.context(id) {
            Some(ctx) => ctx,
            None => return self.store.status(id).map_err(store_error),
        };

        let mut status_rx = ctx.status_tx.subscribe();
        // The sender lives in `ctx`, so the channel cannot close while we wait.
        let _ = status_rx.wait_for(|status| status.is_terminal()).await;
        Ok(ctx.snapshot())
    }

    /// Every known session, live ones reflecting their latest counters
    pub fn sessions(&self) -> Result<Vec<CrawlSession>> {
        let mut sessions = self.store.list_sessions()?;
        for session in sessions.iter_mut() {
            if let Some(ctx) = self.context(session.id) {
                *session = ctx.snapshot();
            }
        }
        Ok(sessions)
    }
}
