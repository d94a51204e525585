//! Retrieval traits for retrieval-augmented generation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::Result;

/// Free-form metadata attached to a stored vector
pub type VectorMetadata = HashMap<String, serde_json::Value>;

/// Ranked search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSearchResult {
    pub id: String,
    /// Cosine similarity, higher is closer
    pub score: f32,
    pub metadata: VectorMetadata,
}

/// Similarity store
///
/// Results from [`VectorStore::search`] are sorted by descending score.
#[async_trait]
pub trait VectorStore: Send + Sync + 'static {
    /// Add a vector, replacing any existing entry with the same id
    async fn add(&self, id: &str, vector: Vec<f32>, metadata: VectorMetadata) -> Result<()>;

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<VectorSearchResult>>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn count(&self) -> usize;
}

/// Turns text into a dense vector
#[async_trait]
pub trait Embedder: Send + Sync + 'static {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn model_name(&self) -> &str;
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when the dimensions differ or either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = [1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
