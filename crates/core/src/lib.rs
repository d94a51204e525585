//! Core traits and types for the voice assistant
//!
//! This crate provides foundational types used across all other crates:
//! - Collaborator traits (speech, intent, LLM, storage, retrieval)
//! - LLM message types
//! - Session, rolling summary and knowledge records
//! - Error types

pub mod conversation;
pub mod error;
pub mod intent;
pub mod knowledge;
pub mod llm_types;
pub mod traits;

pub use conversation::{CompressedContext, RollingSummary, Session};
pub use error::{Error, Result};
pub use intent::{Intent, IntentResult};
pub use knowledge::{Entities, Knowledge, MANUAL_SOURCE, VOICE_CHAT_SOURCE};
pub use llm_types::{
    FinishReason, GenerateRequest, GenerateResponse, Message, Role, StreamChunk, TokenUsage,
};

pub use traits::{
    cosine_similarity, ChunkStream, Embedder, IntentClassifier, KnowledgeStore, LanguageModel,
    RecognitionRequest, SessionStore, SpeechRecognizer, SpeechSynthesizer, SynthesisOptions,
    VectorMetadata, VectorSearchResult, VectorStore,
};
