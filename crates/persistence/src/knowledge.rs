//! Knowledge store persisted to `knowledge.json`

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use voice_assistant_core::{Knowledge, KnowledgeStore, Result};

use crate::file::{load_or_default, write_atomic};
use crate::PersistenceError;

/// File name used inside the data directory
pub const KNOWLEDGE_FILE: &str = "knowledge.json";

pub struct JsonKnowledgeStore {
    path: Option<PathBuf>,
    records: RwLock<Vec<Knowledge>>,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonKnowledgeStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: RwLock::new(Vec::new()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn open(data_dir: impl AsRef<Path>) -> std::result::Result<Self, PersistenceError> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await?;
        let path = data_dir.join(KNOWLEDGE_FILE);

        let records: Vec<Knowledge> = load_or_default(&path).await?;
        tracing::info!(path = %path.display(), count = records.len(), "Knowledge store loaded");

        Ok(Self {
            path: Some(path),
            records: RwLock::new(records),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    async fn persist(&self) -> std::result::Result<(), PersistenceError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;
        let bytes = serde_json::to_vec_pretty(&*self.records.read())?;
        write_atomic(path, bytes).await
    }

    pub fn get(&self, id: &str) -> Option<Knowledge> {
        self.records.read().iter().find(|k| k.id == id).cloned()
    }

    pub fn count(&self) -> usize {
        self.records.read().len()
    }
}

#[async_trait]
impl KnowledgeStore for JsonKnowledgeStore {
    /// Insert, replacing any record with the same id
    async fn save(&self, knowledge: Knowledge) -> Result<()> {
        {
            let mut records = self.records.write();
            records.retain(|k| k.id != knowledge.id);
            records.push(knowledge);
        }
        self.persist().await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Knowledge>> {
        let mut records = self.records.read().clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}
