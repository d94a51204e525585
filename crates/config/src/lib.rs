//! Configuration management for the voice assistant
//!
//! Supports loading configuration from:
//! - TOML/YAML files under `config/` (`default`, then `{env}`)
//! - Environment variables (`VOICE_ASSISTANT__` prefix, `__` separator)

pub mod agent;
pub mod pipeline;
pub mod settings;

pub use agent::{CompressionConfig, KnowledgeConfig, SessionConfig};
pub use pipeline::SpeechConfig;
pub use settings::{
    load_settings, LlmConfig, ObservabilityConfig, RagConfig, ServerConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
