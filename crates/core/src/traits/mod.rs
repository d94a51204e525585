//! Collaborator traits consumed by the conversational core
//!
//! Every external service sits behind one of these traits so that the
//! pipeline can be driven by real providers in production and by mocks in
//! tests.
//!
//! ```text
//! Speech:
//!   - SpeechRecognizer: audio bytes -> candidate transcripts
//!   - SpeechSynthesizer: text -> audio bytes
//!
//! Language:
//!   - IntentClassifier: text -> {intent, confidence}
//!   - LanguageModel: blocking and streaming generation
//!
//! Storage:
//!   - SessionStore: per-session message history
//!   - KnowledgeStore: extracted knowledge records
//!
//! Retrieval:
//!   - Embedder: text -> vector
//!   - VectorStore: cosine-ranked similarity search
//! ```

mod intent;
mod llm;
mod retrieval;
mod speech;
mod storage;

pub use intent::IntentClassifier;
pub use llm::{ChunkStream, LanguageModel};
pub use retrieval::{cosine_similarity, Embedder, VectorMetadata, VectorSearchResult, VectorStore};
pub use speech::{RecognitionRequest, SpeechRecognizer, SpeechSynthesizer, SynthesisOptions};
pub use storage::{KnowledgeStore, SessionStore};
