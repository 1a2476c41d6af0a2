//! Conversation persistence.
//!
//! Per-turn messages and session metadata behind small CRUD traits, with an
//! in-memory implementation backed by JSON file persistence. A database-backed
//! implementation plugs in behind the same traits.
//!
//! Known consistency gap: a turn's user and assistant messages are written
//! sequentially with no transaction spanning them. A crash between the two
//! writes leaves an orphaned user message. Callers must not paper over this.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

use crate::types::{Message, Session, Tier};

/// Append-only message log, queried per (user, session).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Up to `limit` most recent messages, newest first.
    async fn recent(&self, user_id: &str, session_id: &str, limit: usize) -> Result<Vec<Message>>;

    /// Full session transcript in chronological order.
    async fn all_messages(&self, session_id: &str) -> Result<Vec<Message>>;

    /// Append messages in order. Writes are sequential, not transactional.
    async fn append(&self, messages: Vec<Message>) -> Result<()>;

    async fn count_messages(&self, session_id: &str) -> Result<usize>;
}

/// Session metadata CRUD. The pipeline only calls `update_title` and
/// `update_tier`; the rest exists for the HTTP layer. Deletion is
/// deliberately absent — it belongs to an external collaborator.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, user_id: &str, title: Option<String>) -> Result<Session>;

    async fn get(&self, session_id: &str) -> Result<Option<Session>>;

    /// All sessions for a user, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Session>>;

    async fn update_title(&self, session_id: &str, title: &str) -> Result<()>;

    async fn update_tier(
        &self,
        session_id: &str,
        tier: Tier,
        timestamp: DateTime<Utc>,
    ) -> Result<()>;
}

/// In-memory store with best-effort JSON persistence, keyed by session id.
pub struct MemoryStore {
    messages: DashMap<String, Vec<Message>>,
    sessions: DashMap<String, Session>,
    storage_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Purely in-memory store (tests, embedded use).
    pub fn new() -> Self {
        Self {
            messages: DashMap::new(),
            sessions: DashMap::new(),
            storage_path: None,
        }
    }

    /// Store that loads from and persists to `dir/{messages,sessions}.json`.
    pub fn with_persistence(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        let store = Self {
            messages: DashMap::new(),
            sessions: DashMap::new(),
            storage_path: Some(dir),
        };
        store.load_from_disk();
        Ok(store)
    }

    fn persist(&self) {
        let Some(dir) = &self.storage_path else {
            return;
        };
        let messages: HashMap<String, Vec<Message>> = self
            .messages
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let sessions: HashMap<String, Session> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let write = |name: &str, json: serde_json::Result<String>| match json {
            Ok(json) => {
                if let Err(e) = std::fs::write(dir.join(name), json) {
                    tracing::warn!(file = name, error = %e, "history persist failed");
                }
            }
            Err(e) => tracing::warn!(file = name, error = %e, "history serialize failed"),
        };
        write("messages.json", serde_json::to_string(&messages));
        write("sessions.json", serde_json::to_string(&sessions));
    }

    fn load_from_disk(&self) {
        let Some(dir) = &self.storage_path else {
            return;
        };

        let messages_path = dir.join("messages.json");
        if messages_path.exists() {
            match std::fs::read_to_string(&messages_path)
                .map_err(anyhow::Error::from)
                .and_then(|json| {
                    serde_json::from_str::<HashMap<String, Vec<Message>>>(&json)
                        .map_err(anyhow::Error::from)
                }) {
                Ok(data) => {
                    for (session_id, msgs) in data {
                        self.messages.insert(session_id, msgs);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "corrupt messages.json, starting fresh"),
            }
        }

        let sessions_path = dir.join("sessions.json");
        if sessions_path.exists() {
            match std::fs::read_to_string(&sessions_path)
                .map_err(anyhow::Error::from)
                .and_then(|json| {
                    serde_json::from_str::<HashMap<String, Session>>(&json)
                        .map_err(anyhow::Error::from)
                }) {
                Ok(data) => {
                    for (session_id, session) in data {
                        self.sessions.insert(session_id, session);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "corrupt sessions.json, starting fresh"),
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn recent(&self, user_id: &str, session_id: &str, limit: usize) -> Result<Vec<Message>> {
        let matching: Vec<Message> = self
            .messages
            .get(session_id)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| m.user_id == user_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Messages are stored in insertion order; same-instant turn halves
        // keep user-before-assistant, so take the tail and flip it.
        let start = matching.len().saturating_sub(limit);
        let mut recent: Vec<Message> = matching[start..].to_vec();
        recent.reverse();
        Ok(recent)
    }

    async fn all_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .messages
            .get(session_id)
            .map(|msgs| msgs.clone())
            .unwrap_or_default())
    }

    async fn append(&self, messages: Vec<Message>) -> Result<()> {
        for message in messages {
            self.messages
                .entry(message.session_id.clone())
                .or_default()
                .push(message);
        }
        self.persist();
        Ok(())
    }

    async fn count_messages(&self, session_id: &str) -> Result<usize> {
        Ok(self
            .messages
            .get(session_id)
            .map(|msgs| msgs.len())
            .unwrap_or(0))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self, user_id: &str, title: Option<String>) -> Result<Session> {
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.unwrap_or_else(|| "New Chat".to_string()),
            created_time: Utc::now(),
            last_response_tier: None,
            last_response_time: None,
        };
        self.sessions
            .insert(session.session_id.clone(), session.clone());
        self.persist();
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|e| e.value().user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        sessions.sort_by(|a, b| b.created_time.cmp(&a.created_time));
        Ok(sessions)
    }

    async fn update_title(&self, session_id: &str, title: &str) -> Result<()> {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.title = title.to_string();
        }
        self.persist();
        Ok(())
    }

    async fn update_tier(
        &self,
        session_id: &str,
        tier: Tier,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.last_response_tier = Some(tier);
            session.last_response_time = Some(timestamp);
        }
        self.persist();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn message(user: &str, session: &str, role: Role, content: &str) -> Message {
        Message {
            user_id: user.into(),
            session_id: session.into(),
            role,
            content: content.into(),
            created_time: Utc::now(),
            tier: None,
        }
    }

    #[tokio::test]
    async fn recent_returns_the_tail_newest_first() {
        let store = MemoryStore::new();
        // 7 full turns = 14 messages
        for i in 0..7 {
            store
                .append(vec![
                    message("u1", "s1", Role::User, &format!("question {}", i)),
                    message("u1", "s1", Role::Assistant, &format!("answer {}", i)),
                ])
                .await
                .unwrap();
        }

        let recent = store.recent("u1", "s1", 10).await.unwrap();
        assert_eq!(recent.len(), 10);
        // Newest first: last appended message leads.
        assert_eq!(recent[0].content, "answer 6");
        assert_eq!(recent[9].content, "question 2");

        // Reversing yields chronological order for the synthesizer.
        let mut chronological = recent;
        chronological.reverse();
        assert_eq!(chronological[0].content, "question 2");
        assert_eq!(chronological[9].content, "answer 6");
    }

    #[tokio::test]
    async fn recent_is_scoped_to_the_user() {
        let store = MemoryStore::new();
        store
            .append(vec![
                message("u1", "s1", Role::User, "mine"),
                message("u2", "s1", Role::User, "theirs"),
            ])
            .await
            .unwrap();
        let recent = store.recent("u1", "s1", 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "mine");
    }

    #[tokio::test]
    async fn count_tracks_appends_per_session() {
        let store = MemoryStore::new();
        assert_eq!(store.count_messages("s1").await.unwrap(), 0);
        store
            .append(vec![
                message("u1", "s1", Role::User, "q"),
                message("u1", "s1", Role::Assistant, "a"),
            ])
            .await
            .unwrap();
        store
            .append(vec![message("u1", "s2", Role::User, "other session")])
            .await
            .unwrap();
        assert_eq!(store.count_messages("s1").await.unwrap(), 2);
        assert_eq!(store.count_messages("s2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn session_lifecycle_and_listing_order() {
        let store = MemoryStore::new();
        let first = store.create("u1", None).await.unwrap();
        let second = store
            .create("u1", Some("BOQ review".into()))
            .await
            .unwrap();
        store.create("u2", None).await.unwrap();

        assert_eq!(first.title, "New Chat");
        assert_eq!(second.title, "BOQ review");

        let listed = store.list_for_user("u1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_time >= listed[1].created_time);
    }

    #[tokio::test]
    async fn title_and_tier_updates_mutate_the_session() {
        let store = MemoryStore::new();
        let session = store.create("u1", None).await.unwrap();
        store
            .update_title(&session.session_id, "Excavation rates")
            .await
            .unwrap();
        let now = Utc::now();
        store
            .update_tier(&session.session_id, Tier::Documents, now)
            .await
            .unwrap();

        let loaded = store.get(&session.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Excavation rates");
        assert_eq!(loaded.last_response_tier, Some(Tier::Documents));
        assert_eq!(loaded.last_response_time, Some(now));
    }

    #[tokio::test]
    async fn persistence_round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("uttara-store-{}", Uuid::new_v4()));

        let session_id = {
            let store = MemoryStore::with_persistence(dir.clone()).unwrap();
            let session = store.create("u1", Some("persisted".into())).await.unwrap();
            store
                .append(vec![message("u1", &session.session_id, Role::User, "q")])
                .await
                .unwrap();
            session.session_id
        };

        let reloaded = MemoryStore::with_persistence(dir.clone()).unwrap();
        let session = reloaded.get(&session_id).await.unwrap().unwrap();
        assert_eq!(session.title, "persisted");
        assert_eq!(reloaded.count_messages(&session_id).await.unwrap(), 1);

        let _ = std::fs::remove_dir_all(dir);
    }
}
