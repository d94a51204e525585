//! Error types shared across the voice assistant crates
//!
//! Every crate defines its own `thiserror` enum and converts into
//! [`Error`] at the crate boundary.

use thiserror::Error;

/// Result alias used by collaborator traits
pub type Result<T> = std::result::Result<T, Error>;

/// Cross-crate error
#[derive(Error, Debug)]
pub enum Error {
    /// The run's cancellation scope was cancelled
    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Speech recognition error: {0}")]
    Recognition(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when this error only reports that the run was superseded
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_distinguished() {
        assert!(Error::Cancelled("superseded".into()).is_cancelled());
        assert!(!Error::Llm("timeout".into()).is_cancelled());
    }

    #[test]
    fn test_display() {
        let err = Error::Storage("disk full".into());
        assert_eq!(err.to_string(), "Storage error: disk full");
    }
}
