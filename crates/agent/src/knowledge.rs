//! Knowledge extraction from finished turns
//!
//! The organizer asks the language model for a structured digest of one
//! exchange. The worker runs the organizer off the conversational path, on
//! its own tasks, so a later barge-in never aborts a save in progress.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use voice_assistant_config::KnowledgeConfig;
use voice_assistant_core::{
    Entities, GenerateRequest, Knowledge, KnowledgeStore, LanguageModel, VectorMetadata,
    VOICE_CHAT_SOURCE,
};
use voice_assistant_rag::KnowledgeRetriever;

use crate::AgentError;

/// Category used when the model reply cannot be parsed
const FALLBACK_CATEGORY: &str = "idea";

/// Characters of content kept as the fallback summary
const FALLBACK_SUMMARY_CHARS: usize = 20;

const ORGANIZER_PROMPT: &str = r#"You organize a personal voice notebook.

Analyze the conversation below and reply with JSON only:
{
  "summary": "one sentence, at most 20 words",
  "key_points": ["point 1", "point 2"],
  "category": "technology | life | work | study | idea",
  "tags": ["tag1", "tag2"],
  "importance": "low | medium | high",
  "sentiment": "positive | neutral | negative",
  "entities": {"people": [], "products": [], "companies": [], "locations": [], "concepts": []}
}"#;

/// Structured digest of one exchange
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OrganizedKnowledge {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub importance: String,
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub entities: Entities,
}

impl OrganizedKnowledge {
    /// Minimal digest used when the model reply is not valid JSON
    pub fn fallback(content: &str) -> Self {
        Self {
            summary: content.chars().take(FALLBACK_SUMMARY_CHARS).collect(),
            category: FALLBACK_CATEGORY.to_string(),
            ..Default::default()
        }
    }
}

/// Turns raw exchanges into [`OrganizedKnowledge`]
pub struct KnowledgeOrganizer {
    llm: Arc<dyn LanguageModel>,
    temperature: f32,
    max_tokens: u32,
}

impl KnowledgeOrganizer {
    pub fn new(llm: Arc<dyn LanguageModel>, config: &KnowledgeConfig) -> Self {
        Self {
            llm,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Fails only when the model call itself fails
    pub async fn organize(&self, content: &str) -> Result<OrganizedKnowledge, AgentError> {
        let request = GenerateRequest::default()
            .with_user_message(format!("{}\n\nConversation:\n{}", ORGANIZER_PROMPT, content))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let response = self
            .llm
            .generate(request)
            .await
            .map_err(|e| AgentError::Generation(e.to_string()))?;

        Ok(parse_organized(&response.text).unwrap_or_else(|| {
            tracing::debug!("Organizer reply was not valid JSON, using fallback");
            OrganizedKnowledge::fallback(content)
        }))
    }
}

/// Parse a model reply, tolerating code fences and surrounding prose
fn parse_organized(reply: &str) -> Option<OrganizedKnowledge> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}

/// Bounded background executor for knowledge extraction.
///
/// At most `max_concurrent_tasks` jobs run at once; a job submitted while
/// all permits are taken is dropped rather than queued.
#[derive(Clone)]
pub struct KnowledgeWorker {
    organizer: Arc<KnowledgeOrganizer>,
    store: Arc<dyn KnowledgeStore>,
    retriever: Option<Arc<KnowledgeRetriever>>,
    permits: Arc<Semaphore>,
}

impl KnowledgeWorker {
    pub fn new(
        organizer: Arc<KnowledgeOrganizer>,
        store: Arc<dyn KnowledgeStore>,
        config: &KnowledgeConfig,
    ) -> Self {
        Self {
            organizer,
            store,
            retriever: None,
            permits: Arc::new(Semaphore::new(config.max_concurrent_tasks.max(1))),
        }
    }

    /// Also index saved records for retrieval
    pub fn with_retriever(mut self, retriever: Arc<KnowledgeRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Start extraction for one exchange.
    ///
    /// Returns `None` when the worker is saturated and the job was dropped.
    pub fn submit(
        &self,
        session_id: impl Into<String>,
        user_text: &str,
        ai_text: &str,
    ) -> Option<JoinHandle<()>> {
        let session_id = session_id.into();
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(session_id = %session_id, "Knowledge worker saturated, dropping job");
                return None;
            }
        };

        let content = format!("User: {}\nAI: {}", user_text, ai_text);
        let worker = self.clone();

        Some(tokio::spawn(async move {
            let _permit = permit;
            let start = std::time::Instant::now();
            match worker.extract(&session_id, content).await {
                Ok(knowledge) => tracing::info!(
                    session_id = %session_id,
                    knowledge_id = %knowledge.id,
                    category = %knowledge.category,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Knowledge saved"
                ),
                Err(e) => tracing::warn!(session_id = %session_id, error = %e, "Knowledge extraction failed"),
            }
        }))
    }

    async fn extract(
        &self,
        session_id: &str,
        content: String,
    ) -> voice_assistant_core::Result<Knowledge> {
        let organized = self.organizer.organize(&content).await?;
        self.save(session_id, content, VOICE_CHAT_SOURCE, organized).await
    }

    /// Organize and save `content` right away, outside the worker's bound.
    ///
    /// An organizer failure falls back to a minimal digest; only storage
    /// errors are returned.
    pub async fn record(
        &self,
        session_id: &str,
        content: String,
        source: &str,
        organize: bool,
    ) -> voice_assistant_core::Result<Knowledge> {
        let organized = if organize {
            match self.organizer.organize(&content).await {
                Ok(organized) => organized,
                Err(e) => {
                    tracing::warn!(error = %e, "Organizing knowledge failed, saving raw text");
                    OrganizedKnowledge::fallback(&content)
                }
            }
        } else {
            OrganizedKnowledge::fallback(&content)
        };
        self.save(session_id, content, source, organized).await
    }

    async fn save(
        &self,
        session_id: &str,
        content: String,
        source: &str,
        organized: OrganizedKnowledge,
    ) -> voice_assistant_core::Result<Knowledge> {
        let now = Utc::now();
        let knowledge = Knowledge {
            id: uuid::Uuid::new_v4().to_string(),
            title: organized.summary.clone(),
            content,
            summary: organized.summary,
            key_points: organized.key_points,
            entities: organized.entities,
            category: organized.category,
            tags: organized.tags,
            importance: organized.importance,
            sentiment: organized.sentiment,
            source: source.to_string(),
            session_id: session_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.store.save(knowledge.clone()).await?;

        if let Some(retriever) = &self.retriever {
            let mut metadata = VectorMetadata::new();
            metadata.insert("session_id".to_string(), session_id.into());
            metadata.insert("category".to_string(), knowledge.category.as_str().into());
            metadata.insert("source".to_string(), source.into());
            if let Err(e) = retriever.index(&knowledge.id, &knowledge.content, metadata).await {
                tracing::warn!(knowledge_id = %knowledge.id, error = %e, "Indexing knowledge failed");
            }
        }

        Ok(knowledge)
    }
}
