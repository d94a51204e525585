//! In-memory vector store with JSON persistence
//!
//! Search is a linear scan; the knowledge base of a single assistant is
//! small enough that an index would not pay for itself.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use voice_assistant_core::{
    cosine_similarity, Result, VectorMetadata, VectorSearchResult, VectorStore,
};
use voice_assistant_persistence::{load_or_default, write_atomic};

use crate::RagError;

/// File name used inside the data directory
pub const VECTORS_FILE: &str = "vectors.json";

/// Stored vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDocument {
    pub id: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: VectorMetadata,
    pub created_at: DateTime<Utc>,
}

/// Cosine-similarity store persisted to `vectors.json`
pub struct JsonVectorStore {
    path: Option<PathBuf>,
    documents: RwLock<Vec<VectorDocument>>,
    /// Serializes file writes so the newest snapshot always lands last
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonVectorStore {
    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            documents: RwLock::new(Vec::new()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Open (or create) the store under `data_dir`.
    ///
    /// A missing or corrupt file starts empty.
    pub async fn open(data_dir: impl AsRef<Path>) -> std::result::Result<Self, RagError> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await?;
        let path = data_dir.join(VECTORS_FILE);

        let documents: Vec<VectorDocument> = load_or_default(&path).await?;

        tracing::info!(path = %path.display(), count = documents.len(), "Vector store loaded");

        Ok(Self {
            path: Some(path),
            documents: RwLock::new(documents),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    async fn persist(&self) -> std::result::Result<(), RagError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;
        let bytes = serde_json::to_vec(&*self.documents.read())?;
        write_atomic(path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for JsonVectorStore {
    async fn add(&self, id: &str, vector: Vec<f32>, metadata: VectorMetadata) -> Result<()> {
        if vector.is_empty() {
            return Err(RagError::VectorStore("vector is empty".to_string()).into());
        }

        {
            let mut documents = self.documents.write();
            documents.retain(|d| d.id != id);
            documents.push(VectorDocument {
                id: id.to_string(),
                vector,
                metadata,
                created_at: Utc::now(),
            });
        }

        self.persist().await?;
        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<VectorSearchResult>> {
        let mut results: Vec<VectorSearchResult> = self
            .documents
            .read()
            .iter()
            .map(|doc| VectorSearchResult {
                id: doc.id.clone(),
                score: cosine_similarity(vector, &doc.vector),
                metadata: doc.metadata.clone(),
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(k);
        Ok(results)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let removed = {
            let mut documents = self.documents.write();
            let before = documents.len();
            documents.retain(|d| d.id != id);
            before != documents.len()
        };

        if removed {
            self.persist().await?;
        }
        Ok(())
    }

    async fn count(&self) -> usize {
        self.documents.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(label: &str) -> VectorMetadata {
        let mut m = VectorMetadata::new();
        m.insert("label".to_string(), serde_json::json!(label));
        m
    }

    #[tokio::test]
    async fn test_search_ranks_by_cosine_descending() {
        let store = JsonVectorStore::in_memory();
        store.add("x", vec![1.0, 0.0], meta("x")).await.unwrap();
        store.add("y", vec![0.0, 1.0], meta("y")).await.unwrap();
        store.add("xy", vec![1.0, 1.0], meta("xy")).await.unwrap();

        let results = store.search(&[1.0, 0.1], 3).await.unwrap();

        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "xy", "y"]);
        assert!(results[0].score >= results[1].score);
        assert!(results[1].score >= results[2].score);
    }

    #[tokio::test]
    async fn test_search_truncates_to_k() {
        let store = JsonVectorStore::in_memory();
        for i in 0..5 {
            store
                .add(&format!("d{}", i), vec![1.0, i as f32], VectorMetadata::new())
                .await
                .unwrap();
        }

        assert_eq!(store.search(&[1.0, 0.0], 2).await.unwrap().len(), 2);
        assert_eq!(store.search(&[1.0, 0.0], 0).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_add_replaces_same_id() {
        let store = JsonVectorStore::in_memory();
        store.add("a", vec![1.0, 0.0], meta("old")).await.unwrap();
        store.add("a", vec![0.0, 1.0], meta("new")).await.unwrap();

        assert_eq!(store.count().await, 1);
        let hit = &store.search(&[0.0, 1.0], 1).await.unwrap()[0];
        assert_eq!(hit.metadata["label"], "new");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = JsonVectorStore::in_memory();
        store.add("a", vec![1.0], VectorMetadata::new()).await.unwrap();
        store.delete("a").await.unwrap();
        store.delete("missing").await.unwrap();
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_vector_rejected() {
        let store = JsonVectorStore::in_memory();
        assert!(store.add("a", Vec::new(), VectorMetadata::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonVectorStore::open(dir.path()).await.unwrap();
            store.add("a", vec![1.0, 2.0], meta("kept")).await.unwrap();
        }

        let reopened = JsonVectorStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.count().await, 1);
        let hit = &reopened.search(&[1.0, 2.0], 1).await.unwrap()[0];
        assert_eq!(hit.id, "a");
        assert_eq!(hit.metadata["label"], "kept");
        assert!(!dir.path().join("vectors.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(VECTORS_FILE), b"[{\"id\":")
            .await
            .unwrap();

        let store = JsonVectorStore::open(dir.path()).await.unwrap();
        assert_eq!(store.count().await, 0);

        store.add("a", vec![1.0], VectorMetadata::new()).await.unwrap();
        let reopened = JsonVectorStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.count().await, 1);
    }
}
