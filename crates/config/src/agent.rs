//! Conversation memory, session and knowledge settings

use serde::{Deserialize, Serialize};

/// History compression policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Histories at or below this length are passed through verbatim
    #[serde(default = "default_summary_threshold")]
    pub summary_threshold: usize,

    /// Number of most recent messages always kept verbatim
    #[serde(default = "default_max_recent_messages")]
    pub max_recent_messages: usize,

    /// Soft token budget for the assembled prompt
    #[serde(default = "default_max_total_tokens")]
    pub max_total_tokens: usize,

    /// A summary older than this is regenerated
    #[serde(default = "default_summary_max_age")]
    pub summary_max_age_seconds: u64,

    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,

    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
}

fn default_summary_threshold() -> usize {
    10
}
fn default_max_recent_messages() -> usize {
    6
}
fn default_max_total_tokens() -> usize {
    4000
}
fn default_summary_max_age() -> u64 {
    3600
}
fn default_summary_temperature() -> f32 {
    0.3
}
fn default_summary_max_tokens() -> u32 {
    512
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            summary_threshold: default_summary_threshold(),
            max_recent_messages: default_max_recent_messages(),
            max_total_tokens: default_max_total_tokens(),
            summary_max_age_seconds: default_summary_max_age(),
            summary_temperature: default_summary_temperature(),
            summary_max_tokens: default_summary_max_tokens(),
        }
    }
}

/// Session persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding `sessions.json`, `knowledge.json` and `vectors.json`
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Most recent messages kept per session
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

fn default_data_dir() -> String {
    "data".to_string()
}
fn default_max_messages() -> usize {
    20
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_messages: default_max_messages(),
        }
    }
}

/// Background knowledge extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Upper bound on extraction tasks in flight
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    #[serde(default = "default_organize_temperature")]
    pub temperature: f32,

    #[serde(default = "default_organize_max_tokens")]
    pub max_tokens: u32,
}

fn default_true() -> bool {
    true
}
fn default_max_concurrent_tasks() -> usize {
    4
}
fn default_organize_temperature() -> f32 {
    0.3
}
fn default_organize_max_tokens() -> u32 {
    512
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent_tasks: default_max_concurrent_tasks(),
            temperature: default_organize_temperature(),
            max_tokens: default_organize_max_tokens(),
        }
    }
}
