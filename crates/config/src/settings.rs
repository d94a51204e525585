//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{CompressionConfig, ConfigError, KnowledgeConfig, SessionConfig, SpeechConfig};

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub speech: SpeechConfig,

    #[serde(default)]
    pub compression: CompressionConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub rag: RagConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_llm()?;
        self.validate_memory()?;
        self.validate_rag()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", self.llm.temperature),
            });
        }
        if self.llm.endpoint.is_empty() {
            return Err(ConfigError::MissingField("llm.endpoint".to_string()));
        }
        if self.llm.api_key.is_none() {
            tracing::warn!("llm.api_key is not set; generation requests will be unauthenticated");
        }
        Ok(())
    }

    fn validate_memory(&self) -> Result<(), ConfigError> {
        let compression = &self.compression;
        if compression.max_recent_messages > compression.summary_threshold {
            return Err(ConfigError::InvalidValue {
                field: "compression.max_recent_messages".to_string(),
                message: format!(
                    "Recent window ({}) must not exceed summary threshold ({})",
                    compression.max_recent_messages, compression.summary_threshold
                ),
            });
        }
        if self.session.max_messages == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.max_messages".to_string(),
                message: "Must keep at least one message".to_string(),
            });
        }
        if self.knowledge.max_concurrent_tasks == 0 {
            return Err(ConfigError::InvalidValue {
                field: "knowledge.max_concurrent_tasks".to_string(),
                message: "Must allow at least one background task".to_string(),
            });
        }
        Ok(())
    }

    fn validate_rag(&self) -> Result<(), ConfigError> {
        if !(-1.0..=1.0).contains(&self.rag.min_score) {
            return Err(ConfigError::InvalidValue {
                field: "rag.min_score".to_string(),
                message: format!("Must be between -1.0 and 1.0, got {}", self.rag.min_score),
            });
        }
        if self.rag.enabled && self.rag.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rag.top_k".to_string(),
                message: "Must be at least 1 when retrieval is enabled".to_string(),
            });
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrent websocket connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}
fn default_max_connections() -> usize {
    1000
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Expose Prometheus metrics at `/metrics`
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Language model backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Messages API endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,

    /// Retries for transient failures (network, 429, 5xx)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Style instructions placed first in every generation request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_llm_endpoint() -> String {
    "https://open.bigmodel.cn/api/anthropic/v1/messages".to_string()
}
fn default_api_key() -> Option<String> {
    std::env::var("GLM_API_KEY").ok().filter(|k| !k.is_empty())
}
fn default_model() -> String {
    "glm-4-plus".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.7
}
fn default_llm_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    100
}
fn default_system_prompt() -> String {
    "You are a friendly voice assistant. Answer briefly in a natural, spoken style \
     without markdown, lists or emoji."
        .to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: default_api_key(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_seconds: default_llm_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Retrieval-augmented generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_embedding_endpoint")]
    pub embedding_endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Results folded into the prompt
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Hits below this similarity are ignored
    #[serde(default)]
    pub min_score: f32,
}

fn default_embedding_endpoint() -> String {
    "https://open.bigmodel.cn/api/paas/v4/embeddings".to_string()
}
fn default_embedding_model() -> String {
    "embedding-2".to_string()
}
fn default_top_k() -> usize {
    3
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            embedding_endpoint: default_embedding_endpoint(),
            embedding_model: default_embedding_model(),
            top_k: default_top_k(),
            min_score: 0.0,
        }
    }
}

/// Load settings from files and environment
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::with_name("config/default").required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("VOICE_ASSISTANT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.compression.summary_threshold, 10);
        assert_eq!(settings.compression.max_recent_messages, 6);
        assert_eq!(settings.compression.summary_max_age_seconds, 3600);
        assert_eq!(settings.session.max_messages, 20);
        assert_eq!(settings.speech.sample_rate, 16000);
        assert_eq!(settings.llm.model, "glm-4-plus");
        assert!(!settings.speech.synthesis_enabled);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_recent_window_larger_than_threshold_rejected() {
        let mut settings = Settings::default();
        settings.compression.max_recent_messages = 12;
        assert!(settings.validate().is_err());

        settings.compression.max_recent_messages = 10;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_background_tasks_rejected() {
        let mut settings = Settings::default();
        settings.knowledge.max_concurrent_tasks = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_temperature_range() {
        let mut settings = Settings::default();
        settings.llm.temperature = 2.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [server]
            port = 9000

            [compression]
            summary_threshold = 8
            "#,
        )
        .unwrap();

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.compression.summary_threshold, 8);
        assert_eq!(settings.compression.max_recent_messages, 6);
        assert_eq!(settings.session.data_dir, "data");
    }
}
