//! HTTP speech backends
//!
//! Both clients talk to a sidecar service: recognition posts the raw
//! utterance and reads back JSON, synthesis posts JSON options and reads
//! back the encoded audio body.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use voice_assistant_config::SpeechConfig;
use voice_assistant_core::{
    Error, RecognitionRequest, Result, SpeechRecognizer, SpeechSynthesizer, SynthesisOptions,
};

/// Response from the recognition service
#[derive(Debug, Deserialize)]
struct RecognitionResponse {
    #[serde(default)]
    results: Vec<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl RecognitionResponse {
    fn into_candidates(self) -> Vec<String> {
        if !self.results.is_empty() {
            self.results
        } else {
            self.text.into_iter().collect()
        }
    }
}

fn build_client(timeout_seconds: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Recognizer backed by an HTTP transcription service
pub struct HttpRecognizer {
    client: reqwest::Client,
    url: String,
}

impl HttpRecognizer {
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_seconds)?,
            url: config.stt_endpoint.clone(),
        })
    }
}

#[async_trait]
impl SpeechRecognizer for HttpRecognizer {
    async fn recognize(&self, request: RecognitionRequest) -> Result<Vec<String>> {
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", format!("audio/{}", request.format))
            .header("X-Sample-Rate", request.sample_rate.to_string())
            .body(request.audio)
            .send()
            .await
            .map_err(|e| Error::Recognition(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Recognition(format!(
                "service returned {}",
                response.status()
            )));
        }

        let body: RecognitionResponse = response
            .json()
            .await
            .map_err(|e| Error::Recognition(format!("invalid response: {}", e)))?;

        if let Some(error) = body.error.as_deref().filter(|e| !e.is_empty()) {
            return Err(Error::Recognition(error.to_string()));
        }

        Ok(body.into_candidates())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Synthesizer backed by an HTTP TTS service
pub struct HttpSynthesizer {
    client: reqwest::Client,
    url: String,
}

impl HttpSynthesizer {
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_seconds)?,
            url: config.tts_endpoint.clone(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, options: SynthesisOptions) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(&self.url)
            .json(&options)
            .send()
            .await
            .map_err(|e| Error::Synthesis(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Synthesis(format!(
                "service returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Synthesis(format!("failed to read audio: {}", e)))?;

        if bytes.is_empty() {
            return Err(Error::Synthesis("service returned no audio".to_string()));
        }

        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        "http"
    }
}
