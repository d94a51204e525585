//! File-backed persistence for the voice assistant
//!
//! Provides persistent storage for:
//! - Sessions (`sessions.json`), capped to the most recent messages
//! - Knowledge records extracted from conversations (`knowledge.json`)
//!
//! Both stores keep everything in memory and rewrite their file after every
//! mutation.

pub mod error;
pub mod file;
pub mod knowledge;
pub mod sessions;

use std::sync::Arc;

pub use error::PersistenceError;
pub use file::{load_or_default, write_atomic};
pub use knowledge::{JsonKnowledgeStore, KNOWLEDGE_FILE};
pub use sessions::{JsonSessionStore, SESSIONS_FILE};

use voice_assistant_config::SessionConfig;

/// Open both stores under `config.data_dir`
pub async fn init(config: &SessionConfig) -> Result<PersistenceLayer, PersistenceError> {
    let sessions = JsonSessionStore::open(&config.data_dir, config.max_messages).await?;
    let knowledge = JsonKnowledgeStore::open(&config.data_dir).await?;

    Ok(PersistenceLayer {
        sessions: Arc::new(sessions),
        knowledge: Arc::new(knowledge),
    })
}

/// Combined persistence layer
#[derive(Clone)]
pub struct PersistenceLayer {
    pub sessions: Arc<JsonSessionStore>,
    pub knowledge: Arc<JsonKnowledgeStore>,
}
