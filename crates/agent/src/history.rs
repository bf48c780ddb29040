//! Per-session conversation history.
//!
//! Each session keeps at most `max_history` exchanges; the oldest is dropped
//! first. Sessions live in memory only.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

#[derive(Debug, Clone)]
struct Exchange {
    query: String,
    answer: String,
}

type Session = Arc<Mutex<VecDeque<Exchange>>>;

pub struct SessionStore {
    max_history: usize,
    counter: AtomicU64,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            counter: AtomicU64::new(0),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Open a new, empty session and return its id.
    pub async fn create_session(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("session_{n}");
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(VecDeque::new())));
        debug!(session_id = %id, "Session created");
        id
    }

    async fn session(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn session_or_create(&self, id: &str) -> Session {
        if let Some(session) = self.session(id).await {
            return session;
        }
        self.sessions
            .write()
            .await
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }

    /// Record one exchange. Unknown ids get a session on first use.
    pub async fn append(&self, id: &str, query: impl Into<String>, answer: impl Into<String>) {
        let session = self.session_or_create(id).await;
        let mut exchanges = session.lock().await;
        exchanges.push_back(Exchange {
            query: query.into(),
            answer: answer.into(),
        });
        while exchanges.len() > self.max_history {
            exchanges.pop_front();
        }
    }

    /// Recent exchanges as prompt text, or `None` when there are none.
    pub async fn format_recent(&self, id: &str) -> Option<String> {
        let session = self.session(id).await?;
        let exchanges = session.lock().await;
        if exchanges.is_empty() {
            return None;
        }
        let lines: Vec<String> = exchanges
            .iter()
            .map(|e| format!("User: {}\nAssistant: {}", e.query, e.answer))
            .collect();
        Some(lines.join("\n"))
    }

    pub async fn exchange_count(&self, id: &str) -> usize {
        match self.session(id).await {
            Some(session) => session.lock().await.len(),
            None => 0,
        }
    }

    /// Forget every exchange of `id`. The id stays valid.
    pub async fn clear(&self, id: &str) {
        if let Some(session) = self.session(id).await {
            session.lock().await.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_ids_are_sequential() {
        let store = SessionStore::new(2);
        assert_eq!(store.create_session().await, "session_1");
        assert_eq!(store.create_session().await, "session_2");
    }

    #[tokio::test]
    async fn oldest_exchange_is_evicted_first() {
        let store = SessionStore::new(2);
        let id = store.create_session().await;
        store.append(&id, "q1", "a1").await;
        store.append(&id, "q2", "a2").await;
        store.append(&id, "q3", "a3").await;

        assert_eq!(store.exchange_count(&id).await, 2);
        assert_eq!(
            store.format_recent(&id).await.unwrap(),
            "User: q2\nAssistant: a2\nUser: q3\nAssistant: a3"
        );
    }

    #[tokio::test]
    async fn new_session_has_no_history() {
        let store = SessionStore::new(2);
        let id = store.create_session().await;
        assert_eq!(store.format_recent(&id).await, None);
        assert_eq!(store.format_recent("session_404").await, None);
    }

    #[tokio::test]
    async fn append_to_unknown_id_creates_it() {
        let store = SessionStore::new(2);
        store.append("client-chosen", "hi", "hello").await;
        assert_eq!(store.exchange_count("client-chosen").await, 1);
    }

    #[tokio::test]
    async fn sessions_do_not_leak_into_each_other() {
        let store = SessionStore::new(2);
        let a = store.create_session().await;
        let b = store.create_session().await;
        store.append(&a, "only in a", "yes").await;
        assert_eq!(store.exchange_count(&b).await, 0);
        assert!(store.format_recent(&b).await.is_none());
    }

    #[tokio::test]
    async fn clear_empties_history() {
        let store = SessionStore::new(2);
        let id = store.create_session().await;
        store.append(&id, "q", "a").await;
        store.clear(&id).await;
        assert_eq!(store.exchange_count(&id).await, 0);
    }

    #[tokio::test]
    async fn zero_capacity_keeps_nothing() {
        let store = SessionStore::new(0);
        store.append("s", "q", "a").await;
        assert_eq!(store.format_recent("s").await, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_respect_the_cap() {
        for (appends, cap) in [(200, 2), (50, 500)] {
            let store = Arc::new(SessionStore::new(cap));
            let id = store.create_session().await;

            let handles: Vec<_> = (0..appends)
                .map(|i| {
                    let store = store.clone();
                    let id = id.clone();
                    tokio::spawn(async move {
                        store.append(&id, format!("q{i}"), format!("a{i}")).await
                    })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap();
            }

            assert_eq!(store.exchange_count(&id).await, appends.min(cap));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_shares_one_session() {
        let store = Arc::new(SessionStore::new(100));
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.append("shared", format!("q{i}"), "a").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.exchange_count("shared").await, 32);
        let recent = store.format_recent("shared").await.unwrap();
        assert_eq!(recent.lines().count(), 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_get_distinct_ids() {
        let store = Arc::new(SessionStore::new(2));
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.create_session().await })
            })
            .collect();
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20);
    }
}
