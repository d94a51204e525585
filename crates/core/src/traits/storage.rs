//! Persistence traits

use async_trait::async_trait;

use crate::{Knowledge, Result, Session};

/// Durable per-session message history.
///
/// Shared across connections; implementations serialize internally.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Fetch a session, `None` when it does not exist
    async fn get(&self, id: &str) -> Result<Option<Session>>;

    /// Insert or replace a session
    async fn save(&self, session: Session) -> Result<()>;

    /// Remove a session. Deleting an unknown id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// List all sessions
    async fn list(&self) -> Result<Vec<Session>>;

    /// Maximum number of messages kept per session (0 = unbounded)
    fn message_cap(&self) -> usize {
        0
    }
}

/// Storage for extracted knowledge records
#[async_trait]
pub trait KnowledgeStore: Send + Sync + 'static {
    async fn save(&self, knowledge: Knowledge) -> Result<()>;

    /// Newest first
    async fn list(&self) -> Result<Vec<Knowledge>>;
}
