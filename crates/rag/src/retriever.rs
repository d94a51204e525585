//! Knowledge retrieval for prompt augmentation

use std::fmt::Write;
use std::sync::Arc;

use voice_assistant_config::RagConfig;
use voice_assistant_core::{Embedder, Intent, IntentResult, Result, VectorMetadata, VectorStore};

/// Metadata key holding the original text
const CONTENT_KEY: &str = "content";

/// Minimum classifier confidence before retrieval kicks in
const MIN_INTENT_CONFIDENCE: f32 = 0.1;

/// One retrieved snippet
#[derive(Debug, Clone)]
pub struct RetrievedKnowledge {
    pub id: String,
    pub content: String,
    pub score: f32,
}

/// Embeds text into, and retrieves it back out of, a vector store
pub struct KnowledgeRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
    min_score: f32,
}

impl KnowledgeRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, config: &RagConfig) -> Self {
        Self {
            embedder,
            store,
            top_k: config.top_k,
            min_score: config.min_score,
        }
    }

    /// Only search and question turns benefit from retrieval
    pub fn should_retrieve(&self, intent: Option<&IntentResult>) -> bool {
        intent.is_some_and(|r| {
            matches!(r.intent, Intent::Search | Intent::Question)
                && r.confidence > MIN_INTENT_CONFIDENCE
        })
    }

    /// Embed `content` and store it under `id`
    pub async fn index(&self, id: &str, content: &str, mut metadata: VectorMetadata) -> Result<()> {
        let vector = self.embedder.embed(content).await?;
        metadata.insert(CONTENT_KEY.to_string(), serde_json::Value::from(content));
        self.store.add(id, vector, metadata).await
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedKnowledge>> {
        let vector = self.embedder.embed(query).await?;
        let hits = self.store.search(&vector, self.top_k).await?;

        Ok(hits
            .into_iter()
            .filter(|hit| hit.score >= self.min_score)
            .filter_map(|hit| {
                let content = hit.metadata.get(CONTENT_KEY)?.as_str()?.to_string();
                Some(RetrievedKnowledge {
                    id: hit.id,
                    content,
                    score: hit.score,
                })
            })
            .collect())
    }

    /// Render retrieved snippets as a prompt section, `None` when nothing matched
    pub async fn build_context(&self, query: &str) -> Result<Option<String>> {
        let results = self.retrieve(query).await?;
        if results.is_empty() {
            return Ok(None);
        }

        let mut context = String::from("Relevant entries from the user's knowledge base:\n\n");
        for (i, r) in results.iter().enumerate() {
            let _ = writeln!(context, "[Knowledge {}] (relevance: {:.2})", i + 1, r.score);
            context.push_str(&r.content);
            context.push_str("\n\n");
        }
        Ok(Some(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JsonVectorStore;
    use async_trait::async_trait;

    /// Maps a few words onto fixed axes
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let text = text.to_lowercase();
            Ok(vec![
                if text.contains("rust") { 1.0 } else { 0.0 },
                if text.contains("coffee") { 1.0 } else { 0.0 },
                0.01,
            ])
        }

        fn model_name(&self) -> &str {
            "keyword"
        }
    }

    fn retriever() -> KnowledgeRetriever {
        KnowledgeRetriever::new(
            Arc::new(KeywordEmbedder),
            Arc::new(JsonVectorStore::in_memory()),
            &RagConfig {
                enabled: true,
                top_k: 1,
                min_score: 0.5,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_index_then_retrieve() {
        let retriever = retriever();
        retriever
            .index("k1", "Rust has ownership", VectorMetadata::new())
            .await
            .unwrap();
        retriever
            .index("k2", "Coffee at nine", VectorMetadata::new())
            .await
            .unwrap();

        let hits = retriever.retrieve("tell me about rust").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "k1");
        assert_eq!(hits[0].content, "Rust has ownership");
    }

    #[tokio::test]
    async fn test_low_scores_filtered() {
        let retriever = retriever();
        retriever
            .index("k2", "Coffee at nine", VectorMetadata::new())
            .await
            .unwrap();

        assert!(retriever.build_context("rust").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_context_lists_snippets() {
        let retriever = retriever();
        retriever
            .index("k1", "Rust has ownership", VectorMetadata::new())
            .await
            .unwrap();

        let context = retriever.build_context("rust").await.unwrap().unwrap();
        assert!(context.contains("[Knowledge 1]"));
        assert!(context.contains("Rust has ownership"));
    }

    #[test]
    fn test_should_retrieve() {
        let retriever = retriever();
        assert!(retriever.should_retrieve(Some(&IntentResult::new(Intent::Search, 0.5))));
        assert!(retriever.should_retrieve(Some(&IntentResult::new(Intent::Question, 0.2))));
        assert!(!retriever.should_retrieve(Some(&IntentResult::new(Intent::Question, 0.05))));
        assert!(!retriever.should_retrieve(Some(&IntentResult::new(Intent::Chat, 0.9))));
        assert!(!retriever.should_retrieve(None));
    }
}
