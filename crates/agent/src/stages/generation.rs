//! Streaming generation stage

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use voice_assistant_core::{
    CompressedContext, Error, GenerateRequest, LanguageModel, Message, Result, RollingSummary,
    Session, SessionStore,
};
use voice_assistant_pipeline::{ConversationRecord, Stage, StageOutcome};
use voice_assistant_rag::KnowledgeRetriever;

use crate::intent::extract_search_query;
use crate::{AgentError, ContextCompressor};

const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Generates the reply for the transcript.
///
/// The session history is compressed, optionally augmented with retrieved
/// knowledge, and streamed from the language model one delta at a time.
/// Every delta is a cancellation checkpoint. Session writes happen once,
/// after the stream ends, and only while the run is still current.
pub struct GenerationStage {
    llm: Arc<dyn LanguageModel>,
    sessions: Arc<dyn SessionStore>,
    compressor: Arc<ContextCompressor>,
    retriever: Option<Arc<KnowledgeRetriever>>,
    system_prompt: String,
    model: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl GenerationStage {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        sessions: Arc<dyn SessionStore>,
        compressor: Arc<ContextCompressor>,
    ) -> Self {
        Self {
            llm,
            sessions,
            compressor,
            retriever: None,
            system_prompt: String::new(),
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<KnowledgeRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// System prompt, extended with retrieved knowledge when the intent asks for it
    async fn system_prompt_for(&self, record: &ConversationRecord, transcript: &str) -> String {
        let Some(retriever) = self
            .retriever
            .as_ref()
            .filter(|r| r.should_retrieve(record.intent()))
        else {
            return self.system_prompt.clone();
        };

        let mut query = extract_search_query(transcript);
        if query.is_empty() {
            query = transcript.to_string();
        }
        tracing::debug!(session_id = %record.session_id(), query = %query, "Retrieving knowledge");

        match retriever.build_context(&query).await {
            Ok(Some(context)) => format!(
                "{}\n\n{}Answer from these entries when they are relevant; say so when they are incomplete.",
                self.system_prompt, context
            ),
            Ok(None) => self.system_prompt.clone(),
            Err(e) => {
                tracing::warn!(session_id = %record.session_id(), error = %e, "Knowledge retrieval failed");
                self.system_prompt.clone()
            }
        }
    }

    /// Append this turn to the session, unless the run has been superseded
    async fn persist_turn(
        &self,
        record: &ConversationRecord,
        summary: Option<RollingSummary>,
        transcript: &str,
        reply: &str,
    ) -> Result<()> {
        record.scope().check()?;

        let id = record.session_id();
        let cap = self.sessions.message_cap();
        let mut session = self
            .sessions
            .get(id)
            .await?
            .unwrap_or_else(|| Session::new(id));

        if summary.is_some() {
            session.summary = summary;
        }
        session.append(Message::user(transcript), cap);
        if !reply.is_empty() {
            session.append(Message::assistant(reply), cap);
        }

        record.scope().check()?;
        self.sessions.save(session).await
    }
}

#[async_trait]
impl Stage for GenerationStage {
    async fn process(&self, record: &mut ConversationRecord) -> Result<StageOutcome> {
        let transcript = record.transcript_text().trim().to_string();
        if transcript.is_empty() {
            return Err(AgentError::EmptyTranscript.into());
        }

        let scope = record.scope().clone();
        let session_id = record.session_id().to_string();

        let session = scope.run(self.sessions.get(&session_id)).await??;
        let (history, stored_summary) = session
            .map(|s| (s.messages, s.summary))
            .unwrap_or_default();

        let context: CompressedContext = scope
            .run(
                self.compressor
                    .compress_with_summary(&history, stored_summary.as_ref()),
            )
            .await?;
        let system_prompt = scope.run(self.system_prompt_for(record, &transcript)).await?;
        let messages = self
            .compressor
            .build_messages_for_api(&context, &system_prompt, &transcript);

        tracing::debug!(
            session_id = %session_id,
            total = context.total_messages,
            summarized = context.summary.as_ref().map(|s| s.message_count).unwrap_or(0),
            recent = context.recent_messages.len(),
            "Context compressed"
        );

        let mut request = GenerateRequest::from_messages(messages)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_streaming(true);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let mut failure: Option<Error> = None;
        {
            let mut stream = self.llm.generate_stream(request);
            loop {
                match scope.run(stream.next()).await? {
                    Some(Ok(chunk)) => {
                        if !chunk.delta.is_empty() {
                            record.append_reply(&chunk.delta);
                        }
                        if chunk.is_final {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        failure = Some(e);
                        break;
                    }
                    None => break,
                }
            }
        }

        if let Some(e) = failure {
            if e.is_cancelled() {
                return Err(e);
            }
            tracing::error!(session_id = %session_id, error = %e, "LLM stream failed");
            self.persist_turn(record, None, &transcript, "").await?;
            return Err(AgentError::Generation(e.to_string()).into());
        }

        let reply = record.model_reply().trim().to_string();
        self.persist_turn(record, context.summary, &transcript, &reply).await?;

        if reply.is_empty() {
            tracing::info!(session_id = %session_id, "Empty reply, nothing to say");
            return Ok(StageOutcome::ShortCircuit);
        }

        tracing::info!(session_id = %session_id, reply_chars = reply.chars().count(), "Reply generated");
        Ok(StageOutcome::Continue)
    }

    fn name(&self) -> &'static str {
        "generation"
    }
}
