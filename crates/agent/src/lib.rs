//! Conversation stages
//!
//! Features:
//! - Keyword intent classification with administrative short-circuits
//! - Context compression (rolling summary + recent window)
//! - Streaming generation with a cancellation checkpoint per delta
//! - Background knowledge extraction on a bounded worker

pub mod conversation;
pub mod intent;
pub mod knowledge;
pub mod memory;
pub mod stages;

pub use conversation::{build_pipeline, ConversationServices};
pub use intent::KeywordIntentClassifier;
pub use knowledge::{KnowledgeOrganizer, KnowledgeWorker, OrganizedKnowledge};
pub use memory::ContextCompressor;
pub use stages::{GenerationStage, IntentStage, KnowledgeStage};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Transcript is empty")]
    EmptyTranscript,

    #[error("llm request failed: {0}")]
    Generation(String),

    #[error("Summarization failed: {0}")]
    Summarization(String),
}

impl From<AgentError> for voice_assistant_core::Error {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::EmptyTranscript => {
                voice_assistant_core::Error::InvalidInput(err.to_string())
            }
            AgentError::Generation(_) | AgentError::Summarization(_) => {
                voice_assistant_core::Error::Llm(err.to_string())
            }
        }
    }
}
