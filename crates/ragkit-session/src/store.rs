//! In-memory session store with TTL eviction
//!
//! Owns all session lifetime. Expiry happens lazily on access and eagerly
//! from a periodic sweep; the two paths are idempotent. Locks are never held
//! across an await point, and a sweep deletion racing a lookup resolves to
//! `SessionNotFound`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use ragkit_core::{Error, Result, SessionConfig};

use crate::context::{render_context, summarize_exchanges};
use crate::facts::extract_facts;

/// One user/assistant exchange recorded in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub timestamp: DateTime<Utc>,
    pub user_message: String,
    pub assistant_message: String,
    pub metadata: serde_json::Value,
}

/// Conversational state for one session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Live exchange window, bounded by `SessionConfig::max_exchanges`.
    pub exchanges: Vec<Exchange>,
    /// Summary of exchanges evicted from the window. Replaced, not appended.
    pub summary: Option<String>,
    /// Facts extracted from user messages (name, age, ...).
    pub facts: BTreeMap<String, String>,
    /// Topic tags accumulated from exchange metadata.
    pub topics: Vec<String>,
    pub metadata: serde_json::Value,
}

/// One rendered history message (user or assistant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    #[serde(rename = "type")]
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Flattened chat history for a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatHistory {
    pub messages: Vec<HistoryMessage>,
    pub message_count: usize,
}

/// Session store statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: u64,
    pub active_sessions: usize,
    pub total_exchanges: u64,
    pub cleanup_runs: u64,
    pub sessions_in_memory: usize,
    pub ttl_seconds: u64,
    pub max_exchanges: usize,
}

/// In-memory session store.
///
/// Shared via `Arc`; the periodic sweep and request handlers go through the
/// same public eviction path. Per-session mutation is intentionally not
/// serialized across concurrent requests for the same id (documented
/// limitation): last write wins on the exchange list.
pub struct SessionStore {
    config: SessionConfig,
    sessions: RwLock<HashMap<String, Session>>,
    total_sessions: AtomicU64,
    total_exchanges: AtomicU64,
    cleanup_runs: AtomicU64,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            total_sessions: AtomicU64::new(0),
            total_exchanges: AtomicU64::new(0),
            cleanup_runs: AtomicU64::new(0),
            sweeper: Mutex::new(None),
        }
    }

    /// Allocate a new, empty session.
    pub fn create(&self, metadata: serde_json::Value) -> String {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let session = Session {
            session_id: session_id.clone(),
            created_at: now,
            last_accessed: now,
            exchanges: Vec::new(),
            summary: None,
            facts: BTreeMap::new(),
            topics: Vec::new(),
            metadata,
        };

        self.sessions
            .write()
            .expect("session lock poisoned")
            .insert(session_id.clone(), session);
        self.total_sessions.fetch_add(1, Ordering::Relaxed);

        debug!(session_id = %session_id, "session created");
        session_id
    }

    /// Look up a session, refreshing its last-accessed time and merging the
    /// supplied context into its metadata.
    ///
    /// An expired session is deleted as a side effect and reported as
    /// `SessionExpired`; the next lookup reports `SessionNotFound`.
    pub fn get(&self, session_id: &str, context: Option<serde_json::Value>) -> Result<Session> {
        let mut sessions = self.sessions.write().expect("session lock poisoned");

        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        if Self::expired(session, &self.config) {
            sessions.remove(session_id);
            debug!(session_id = %session_id, "session expired on access");
            return Err(Error::SessionExpired(session_id.to_string()));
        }

        session.last_accessed = Utc::now();
        if let Some(context) = context {
            merge_metadata(&mut session.metadata, context);
        }

        Ok(session.clone())
    }

    /// Append an exchange, folding window overflow into the summary.
    pub fn record_exchange(
        &self,
        session_id: &str,
        user_message: &str,
        assistant_message: &str,
        metadata: serde_json::Value,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().expect("session lock poisoned");

        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::InvalidSession(session_id.to_string()))?;

        if Self::expired(session, &self.config) {
            sessions.remove(session_id);
            return Err(Error::InvalidSession(session_id.to_string()));
        }

        session.last_accessed = Utc::now();

        for fact in extract_facts(user_message) {
            info!(session_id = %session_id, key = %fact.key, "extracted user fact");
            session.facts.insert(fact.key, fact.value);
        }

        if let Some(topic) = metadata.get("topic").and_then(|t| t.as_str()) {
            if !session.topics.iter().any(|t| t == topic) {
                session.topics.push(topic.to_string());
            }
        }

        session.exchanges.push(Exchange {
            timestamp: Utc::now(),
            user_message: user_message.to_string(),
            assistant_message: assistant_message.to_string(),
            metadata,
        });
        self.total_exchanges.fetch_add(1, Ordering::Relaxed);

        // Overflow is summarized before truncation, never silently dropped.
        let window = self.config.max_exchanges;
        if session.exchanges.len() > window {
            let overflow: Vec<Exchange> = session
                .exchanges
                .drain(..session.exchanges.len() - window)
                .collect();
            session.summary = Some(summarize_exchanges(&overflow));
            debug!(
                session_id = %session_id,
                evicted = overflow.len(),
                "compacted exchange overflow into summary"
            );
        }

        Ok(())
    }

    /// Render the session's context block for retrieval and generation.
    ///
    /// Returns an empty string for an unknown or expired session; never
    /// fails.
    pub fn context_string(&self, session_id: &str) -> String {
        let mut sessions = self.sessions.write().expect("session lock poisoned");

        let Some(session) = sessions.get_mut(session_id) else {
            return String::new();
        };
        if Self::expired(session, &self.config) {
            sessions.remove(session_id);
            return String::new();
        }

        session.last_accessed = Utc::now();
        render_context(session, self.config.recent_exchanges)
    }

    /// Flattened user/assistant history; empty for an invalid session.
    pub fn history(&self, session_id: &str) -> ChatHistory {
        let Ok(session) = self.get(session_id, None) else {
            return ChatHistory::default();
        };

        let mut messages = Vec::with_capacity(session.exchanges.len() * 2);
        for exchange in &session.exchanges {
            messages.push(HistoryMessage {
                role: "user".to_string(),
                content: exchange.user_message.clone(),
                timestamp: exchange.timestamp,
                metadata: None,
            });
            messages.push(HistoryMessage {
                role: "assistant".to_string(),
                content: exchange.assistant_message.clone(),
                timestamp: exchange.timestamp,
                metadata: Some(exchange.metadata.clone()),
            });
        }

        ChatHistory {
            message_count: messages.len(),
            messages,
        }
    }

    /// Delete a session. Returns whether it existed.
    pub fn delete(&self, session_id: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .expect("session lock poisoned")
            .remove(session_id)
            .is_some();
        if removed {
            debug!(session_id = %session_id, "session deleted");
        }
        removed
    }

    /// Delete every session past its TTL. Idempotent with lazy expiry.
    pub fn evict_expired(&self) -> usize {
        let mut sessions = self.sessions.write().expect("session lock poisoned");
        let before = sessions.len();
        sessions.retain(|_, session| !Self::expired(session, &self.config));
        let evicted = before - sessions.len();

        self.cleanup_runs.fetch_add(1, Ordering::Relaxed);
        if evicted > 0 {
            debug!(evicted, "swept expired sessions");
        }
        evicted
    }

    pub fn stats(&self) -> SessionStats {
        let sessions = self.sessions.read().expect("session lock poisoned");
        let active = sessions
            .values()
            .filter(|s| !Self::expired(s, &self.config))
            .count();

        SessionStats {
            total_sessions: self.total_sessions.load(Ordering::Relaxed),
            active_sessions: active,
            total_exchanges: self.total_exchanges.load(Ordering::Relaxed),
            cleanup_runs: self.cleanup_runs.load(Ordering::Relaxed),
            sessions_in_memory: sessions.len(),
            ttl_seconds: self.config.ttl_seconds,
            max_exchanges: self.config.max_exchanges,
        }
    }

    /// Start the periodic expiry sweep. Call once after construction.
    pub fn start_sweeper(self: &Arc<Self>) {
        let store = Arc::clone(self);
        let interval = self.config.cleanup_interval();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.evict_expired();
            }
        });

        let mut sweeper = self.sweeper.lock().expect("sweeper lock poisoned");
        if let Some(old) = sweeper.replace(handle) {
            error!("session sweeper started twice; aborting previous task");
            old.abort();
        }
    }

    /// Stop the sweep task. Safe to call without a running sweeper.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().expect("sweeper lock poisoned").take() {
            handle.abort();
            info!("session sweeper stopped");
        }
    }

    fn expired(session: &Session, config: &SessionConfig) -> bool {
        let idle = Utc::now().signed_duration_since(session.last_accessed);
        idle.num_milliseconds() > config.ttl().as_millis() as i64
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn merge_metadata(target: &mut serde_json::Value, incoming: serde_json::Value) {
    match (target.as_object_mut(), incoming) {
        (Some(target), serde_json::Value::Object(incoming)) => {
            for (key, value) in incoming {
                target.insert(key, value);
            }
        }
        (None, incoming @ serde_json::Value::Object(_)) => *target = incoming,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn store_with_ttl(ttl_seconds: u64, max_exchanges: usize) -> SessionStore {
        SessionStore::new(SessionConfig {
            ttl_seconds,
            max_exchanges,
            cleanup_interval_seconds: 300,
            recent_exchanges: 3,
        })
    }

    #[tokio::test]
    async fn test_get_after_create_is_valid() {
        let store = store_with_ttl(3600, 5);
        let id = store.create(json!({}));

        let session = store.get(&id, None).unwrap();
        assert_eq!(session.session_id, id);
        assert!(session.exchanges.is_empty());
        assert!(session.last_accessed >= session.created_at);
    }

    #[tokio::test]
    async fn test_unknown_session_not_found() {
        let store = store_with_ttl(3600, 5);
        let err = store.get("missing", None).unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_expired_then_not_found() {
        let store = store_with_ttl(0, 5);
        let id = store.create(json!({}));

        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = store.get(&id, None).unwrap_err();
        assert!(matches!(err, Error::SessionExpired(_)));

        // The expired lookup deleted the session.
        let err = store.get(&id, None).unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_window_overflow_summarized() {
        let store = store_with_ttl(3600, 5);
        let id = store.create(json!({}));

        store
            .record_exchange(&id, "휴가 정책을 검색해 주세요", "네", json!({}))
            .unwrap();
        for i in 0..5 {
            store
                .record_exchange(&id, &format!("질문 {}", i), "답변", json!({}))
                .unwrap();
        }

        let session = store.get(&id, None).unwrap();
        assert_eq!(session.exchanges.len(), 5);
        // The evicted first exchange was a search request.
        assert!(session.summary.as_deref().unwrap().contains("문서 검색"));
        // The live window no longer holds the evicted message.
        assert!(session.exchanges.iter().all(|e| e.user_message != "휴가 정책을 검색해 주세요"));
    }

    #[tokio::test]
    async fn test_record_exchange_invalid_session() {
        let store = store_with_ttl(3600, 5);
        let err = store
            .record_exchange("missing", "hi", "hello", json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSession(_)));
    }

    #[tokio::test]
    async fn test_context_string_for_unknown_session_is_empty() {
        let store = store_with_ttl(3600, 5);
        assert_eq!(store.context_string("missing"), "");
    }

    #[tokio::test]
    async fn test_context_string_renders_facts_and_exchanges() {
        let store = store_with_ttl(3600, 5);
        let id = store.create(json!({}));

        store
            .record_exchange(&id, "내 이름은 철수입니다", "반갑습니다", json!({"topic": "general"}))
            .unwrap();

        let context = store.context_string(&id);
        assert!(context.contains("- 이름: 철수"));
        assert!(context.contains("대화 주제: general"));
        assert!(context.contains("사용자: 내 이름은 철수입니다"));
        assert!(context.contains("어시스턴트: 반갑습니다"));
    }

    #[tokio::test]
    async fn test_context_merge_on_get() {
        let store = store_with_ttl(3600, 5);
        let id = store.create(json!({"ip": "127.0.0.1"}));

        let session = store
            .get(&id, Some(json!({"user_agent": "test"})))
            .unwrap();
        assert_eq!(session.metadata["ip"], "127.0.0.1");
        assert_eq!(session.metadata["user_agent"], "test");
    }

    #[tokio::test]
    async fn test_evict_expired_is_idempotent() {
        let store = store_with_ttl(0, 5);
        store.create(json!({}));
        store.create(json!({}));

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.evict_expired(), 2);
        assert_eq!(store.evict_expired(), 0);
        assert_eq!(store.stats().sessions_in_memory, 0);
    }

    #[tokio::test]
    async fn test_history_flattens_exchanges() {
        let store = store_with_ttl(3600, 5);
        let id = store.create(json!({}));
        store
            .record_exchange(&id, "질문", "답변", json!({"tokens_used": 12}))
            .unwrap();

        let history = store.history(&id);
        assert_eq!(history.message_count, 2);
        assert_eq!(history.messages[0].role, "user");
        assert_eq!(history.messages[1].role, "assistant");
        assert!(history.messages[1].metadata.is_some());

        assert_eq!(store.history("missing").message_count, 0);
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let store = store_with_ttl(3600, 5);
        let id = store.create(json!({}));
        store.record_exchange(&id, "a", "b", json!({})).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.total_exchanges, 1);

        store.delete(&id);
        assert_eq!(store.stats().sessions_in_memory, 0);
    }
}
