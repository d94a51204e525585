//! Speech processing traits

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// One utterance to transcribe
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub audio: Vec<u8>,
    /// Container format, e.g. `wav`
    pub format: String,
    pub sample_rate: u32,
}

impl RecognitionRequest {
    pub fn new(audio: Vec<u8>, format: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            audio,
            format: format.into(),
            sample_rate,
        }
    }
}

/// Speech-to-Text interface
///
/// Implementations:
/// - `HttpRecognizer` - posts audio to a recognition service
///
/// # Example
///
/// ```ignore
/// let stt: Arc<dyn SpeechRecognizer> = Arc::new(HttpRecognizer::new(config)?);
/// let candidates = stt.recognize(RecognitionRequest::new(audio, "wav", 16000)).await?;
/// let transcript = candidates.concat();
/// ```
#[async_trait]
pub trait SpeechRecognizer: Send + Sync + 'static {
    /// Transcribe one utterance.
    ///
    /// Returns candidate transcript fragments; callers join them.
    async fn recognize(&self, request: RecognitionRequest) -> Result<Vec<String>>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Parameters for a synthesis call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisOptions {
    pub text: String,
    pub voice: String,
    /// Playback speed multiplier
    pub speed: f32,
    pub format: String,
}

impl SynthesisOptions {
    /// Defaults for the given text
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: "default".to_string(),
            speed: 1.0,
            format: "wav".to_string(),
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }
}

/// Text-to-Speech interface
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// Synthesize text to encoded audio
    async fn synthesize(&self, options: SynthesisOptions) -> Result<Vec<u8>>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
