//! In-memory result store

use crate::state::{CrawlSession, SessionId};
use crate::storage::traits::{ResultStore, StoreError, StoreResult};
use crate::storage::CrawlResult;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

#[derive(Debug)]
struct SessionRecords {
    session: CrawlSession,
    results: Vec<CrawlResult>,
    /// URL -> position in `results`
    index: HashMap<String, usize>,
}

/// Process-local store
///
/// The outer map is read-locked for lookups and write-locked only to add a
/// session; each session's records sit behind their own mutex so writes to
/// different sessions never contend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<SessionRecords>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self, session_id: SessionId) -> StoreResult<Arc<Mutex<SessionRecords>>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| StoreError::Unavailable("session map lock poisoned".to_string()))?;
        sessions
            .get(&session_id)
            .cloned()
            .ok_or(StoreError::SessionNotFound(session_id))
    }
}

fn lock(records: &Mutex<SessionRecords>) -> StoreResult<MutexGuard<'_, SessionRecords>> {
    records
        .lock()
        .map_err(|_| StoreError::Unavailable("session lock poisoned".to_string()))
}

impl ResultStore for MemoryStore {
    fn create_session(&self, session: &CrawlSession) -> StoreResult<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| StoreError::Unavailable("session map lock poisoned".to_string()))?;
        sessions.entry(session.id).or_insert_with(|| {
            Arc::new(Mutex::new(SessionRecords {
                session: session.clone(),
                results: Vec::new(),
                index: HashMap::new(),
            }))
        });
        Ok(())
    }

    fn update_session(&self, session: &CrawlSession) -> StoreResult<()> {
        let records = self.records(session.id)?;
        lock(&records)?.session = session.clone();
        Ok(())
    }

    fn status(&self, session_id: SessionId) -> StoreResult<CrawlSession> {
        let records = self.records(session_id)?;
        let session = lock(&records)?.session.clone();
        Ok(session)
    }

    fn list_sessions(&self) -> StoreResult<Vec<CrawlSession>> {
        let all: Vec<_> = {
            let sessions = self
                .sessions
                .read()
                .map_err(|_| StoreError::Unavailable("session map lock poisoned".to_string()))?;
            sessions.values().cloned().collect()
        };

        let mut list = Vec::with_capacity(all.len());
        for records in all {
            list.push(lock(&records)?.session.clone());
        }
        list.sort_by_key(|session| session.id);
        Ok(list)
    }

    fn put(&self, session_id: SessionId, result: CrawlResult) -> StoreResult<()> {
        let records = self.records(session_id)?;
        let mut records = lock(&records)?;
        match records.index.get(&result.url).copied() {
            Some(position) => records.results[position] = result,
            None => {
                let position = records.results.len();
                records.index.insert(result.url.clone(), position);
                records.results.push(result);
            }
        }
        Ok(())
    }

    fn get(&self, session_id: SessionId) -> StoreResult<Vec<CrawlResult>> {
        let records = self.records(session_id)?;
        let results = lock(&records)?.results.clone();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SessionStatus;
    use crate::storage::sample_result;

    fn store_with_session() -> (MemoryStore, CrawlSession) {
        let store = MemoryStore::new();
        let session = CrawlSession::new("http://example.com/", 2, 10, "hash");
        store.create_session(&session).unwrap();
        (store, session)
    }

    #[test]
    fn test_put_and_get_in_order() {
        let (store, session) = store_with_session();
        store.put(session.id, sample_result("http://example.com/", 200)).unwrap();
        store.put(session.id, sample_result("http://example.com/b", 200)).unwrap();
        store.put(session.id, sample_result("http://example.com/a", 404)).unwrap();

        let urls: Vec<_> = store
            .get(session.id)
            .unwrap()
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(
            urls,
            vec!["http://example.com/", "http://example.com/b", "http://example.com/a"]
        );
    }

    #[test]
    fn test_put_is_idempotent_per_url() {
        let (store, session) = store_with_session();
        store.put(session.id, sample_result("http://example.com/", 500)).unwrap();
        store.put(session.id, sample_result("http://example.com/x", 200)).unwrap();
        store.put(session.id, sample_result("http://example.com/", 200)).unwrap();

        let results = store.get(session.id).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "http://example.com/");
        assert_eq!(results[0].status_code, 200);
    }

    #[test]
    fn test_unknown_session() {
        let store = MemoryStore::new();
        let id = SessionId::new();
        assert!(matches!(store.get(id), Err(StoreError::SessionNotFound(_))));
        assert!(matches!(store.status(id), Err(StoreError::SessionNotFound(_))));
        assert!(matches!(
            store.put(id, sample_result("http://example.com/", 200)),
            Err(StoreError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_update_session() {
        let (store, mut session) = store_with_session();
        session.transition(SessionStatus::Running).unwrap();
        session.record_visit(false);
        store.update_session(&session).unwrap();

        let stored = store.status(session.id).unwrap();
        assert_eq!(stored.status, SessionStatus::Running);
        assert_eq!(stored.visited_count, 1);
    }

    #[test]
    fn test_sessions_are_independent() {
        let (store, first) = store_with_session();
        let second = CrawlSession::new("http://other.com/", 1, 5, "hash");
        store.create_session(&second).unwrap();

        store.put(first.id, sample_result("http://example.com/", 200)).unwrap();
        assert_eq!(store.get(first.id).unwrap().len(), 1);
        assert!(store.get(second.id).unwrap().is_empty());
        assert_eq!(store.list_sessions().unwrap().len(), 2);
    }
}
