//! Retrieval-augmented generation support
//!
//! - `JsonVectorStore`: brute-force cosine search over an in-memory list,
//!   persisted as JSON
//! - `HttpEmbedder`: embeddings over an OpenAI-compatible HTTP API
//! - `KnowledgeRetriever`: embeds queries, searches, and renders the hits
//!   as prompt context

pub mod embeddings;
pub mod retriever;
pub mod vector_store;

pub use embeddings::HttpEmbedder;
pub use retriever::{KnowledgeRetriever, RetrievedKnowledge};
pub use vector_store::{JsonVectorStore, VectorDocument};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] voice_assistant_persistence::PersistenceError),
}

impl From<RagError> for voice_assistant_core::Error {
    fn from(err: RagError) -> Self {
        voice_assistant_core::Error::Retrieval(err.to_string())
    }
}
