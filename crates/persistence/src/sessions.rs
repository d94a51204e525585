//! Session store persisted to `sessions.json`

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use voice_assistant_core::{Message, Result, Session, SessionStore};

use crate::file::{load_or_default, write_atomic};
use crate::PersistenceError;

/// File name used inside the data directory
pub const SESSIONS_FILE: &str = "sessions.json";

/// In-memory session map with a JSON snapshot on disk.
///
/// Every session keeps at most `max_messages` of its most recent messages.
pub struct JsonSessionStore {
    path: Option<PathBuf>,
    sessions: RwLock<HashMap<String, Session>>,
    max_messages: usize,
    /// Serializes file writes so the newest snapshot always lands last
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonSessionStore {
    /// Store that never touches disk
    pub fn in_memory(max_messages: usize) -> Self {
        Self {
            path: None,
            sessions: RwLock::new(HashMap::new()),
            max_messages,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Open (or create) the store under `data_dir`
    pub async fn open(
        data_dir: impl AsRef<Path>,
        max_messages: usize,
    ) -> std::result::Result<Self, PersistenceError> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await?;
        let path = data_dir.join(SESSIONS_FILE);

        let sessions: HashMap<String, Session> = load_or_default(&path).await?;
        tracing::info!(path = %path.display(), count = sessions.len(), "Session store loaded");

        Ok(Self {
            path: Some(path),
            sessions: RwLock::new(sessions),
            max_messages,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    async fn persist(&self) -> std::result::Result<(), PersistenceError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;
        let bytes = serde_json::to_vec_pretty(&*self.sessions.read())?;
        write_atomic(path, bytes).await
    }

    /// Fetch a session, creating and persisting an empty one if needed
    pub async fn get_or_create(&self, id: &str) -> Result<Session> {
        if let Some(session) = self.sessions.read().get(id) {
            return Ok(session.clone());
        }

        let session = self
            .sessions
            .write()
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id))
            .clone();
        self.persist().await?;
        tracing::debug!(session_id = %id, "Session created");
        Ok(session)
    }

    /// Append one message, enforcing the cap
    pub async fn append_message(&self, id: &str, message: Message) -> Result<Session> {
        let session = {
            let mut sessions = self.sessions.write();
            let session = sessions
                .entry(id.to_string())
                .or_insert_with(|| Session::new(id));
            session.append(message, self.max_messages);
            session.clone()
        };
        self.persist().await?;
        Ok(session)
    }

    /// Drop a session's history. Returns `false` for an unknown id.
    pub async fn clear(&self, id: &str) -> Result<bool> {
        let found = match self.sessions.write().get_mut(id) {
            Some(session) => {
                session.clear();
                true
            }
            None => false,
        };
        if found {
            self.persist().await?;
        }
        Ok(found)
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().get(id).cloned())
    }

    async fn save(&self, mut session: Session) -> Result<()> {
        session.enforce_cap(self.max_messages);
        self.sessions.write().insert(session.id.clone(), session);
        self.persist().await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let removed = self.sessions.write().remove(id).is_some();
        if removed {
            self.persist().await?;
        }
        Ok(())
    }

    /// Most recently updated first
    async fn list(&self) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self.sessions.read().values().cloned().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    fn message_cap(&self) -> usize {
        self.max_messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_assistant_core::RollingSummary;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = JsonSessionStore::in_memory(20);
        let first = store.get_or_create("s1").await.unwrap();
        let second = store.get_or_create("s1").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn test_append_enforces_cap() {
        let store = JsonSessionStore::in_memory(20);
        for i in 0..25 {
            store
                .append_message("s1", Message::user(format!("m{}", i)))
                .await
                .unwrap();
        }

        let session = store.get("s1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 20);
        assert_eq!(session.messages[0].content, "m5");
    }

    #[tokio::test]
    async fn test_save_enforces_cap() {
        let store = JsonSessionStore::in_memory(4);
        let mut session = Session::new("s1");
        for i in 0..6 {
            session.messages.push(Message::user(format!("m{}", i)));
        }
        session.summary = Some(RollingSummary::new("digest", vec![], vec![], 3));

        store.save(session).await.unwrap();

        let saved = store.get("s1").await.unwrap().unwrap();
        assert_eq!(saved.messages.len(), 4);
        assert_eq!(saved.summary.unwrap().message_count, 1);
    }

    #[tokio::test]
    async fn test_clear_and_delete() {
        let store = JsonSessionStore::in_memory(20);
        store.append_message("s1", Message::user("hi")).await.unwrap();

        assert!(store.clear("s1").await.unwrap());
        assert!(!store.clear("missing").await.unwrap());
        assert!(store.get("s1").await.unwrap().unwrap().messages.is_empty());

        store.delete("s1").await.unwrap();
        store.delete("s1").await.unwrap();
        assert!(store.get("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = JsonSessionStore::in_memory(20);
        store.append_message("old", Message::user("a")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.append_message("new", Message::user("b")).await.unwrap();

        let ids: Vec<_> = store.list().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonSessionStore::open(dir.path(), 20).await.unwrap();
            store.append_message("s1", Message::user("hello")).await.unwrap();
            store.append_message("s1", Message::assistant("hi")).await.unwrap();
        }

        let reopened = JsonSessionStore::open(dir.path(), 20).await.unwrap();
        let session = reopened.get("s1").await.unwrap().unwrap();
        assert_eq!(session.messages, vec![Message::user("hello"), Message::assistant("hi")]);
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(SESSIONS_FILE), b"{not json")
            .await
            .unwrap();

        let store = JsonSessionStore::open(dir.path(), 20).await.unwrap();
        assert_eq!(store.count(), 0);
    }
}
