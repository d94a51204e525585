//! Speech pipeline settings

use serde::{Deserialize, Serialize};

/// Recognition and synthesis providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Recognition service URL
    #[serde(default = "default_stt_endpoint")]
    pub stt_endpoint: String,

    /// Synthesis service URL
    #[serde(default = "default_tts_endpoint")]
    pub tts_endpoint: String,

    /// Container format of inbound audio
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_voice")]
    pub voice: String,

    /// Append a synthesis stage to the pipeline
    #[serde(default)]
    pub synthesis_enabled: bool,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_stt_endpoint() -> String {
    std::env::var("STT_ENDPOINT").unwrap_or_else(|_| "http://127.0.0.1:6006/asr".to_string())
}
fn default_tts_endpoint() -> String {
    std::env::var("TTS_ENDPOINT").unwrap_or_else(|_| "http://127.0.0.1:6006/tts".to_string())
}
fn default_audio_format() -> String {
    "wav".to_string()
}
fn default_sample_rate() -> u32 {
    16000
}
fn default_voice() -> String {
    "default".to_string()
}
fn default_timeout() -> u64 {
    30
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            stt_endpoint: default_stt_endpoint(),
            tts_endpoint: default_tts_endpoint(),
            audio_format: default_audio_format(),
            sample_rate: default_sample_rate(),
            voice: default_voice(),
            synthesis_enabled: false,
            timeout_seconds: default_timeout(),
        }
    }
}
