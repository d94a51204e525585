//! Conversation stages

mod generation;
mod intent;
mod knowledge;

pub use generation::GenerationStage;
pub use intent::IntentStage;
pub use knowledge::KnowledgeStage;
