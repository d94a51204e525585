//! Persistence errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PersistenceError> for voice_assistant_core::Error {
    fn from(err: PersistenceError) -> Self {
        voice_assistant_core::Error::Storage(err.to_string())
    }
}
