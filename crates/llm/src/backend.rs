//! HTTP backend for messages-style chat APIs

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use voice_assistant_config::LlmConfig;
use voice_assistant_core::{
    ChunkStream, FinishReason, GenerateRequest, GenerateResponse, LanguageModel, Message, Result,
    Role, StreamChunk, TokenUsage,
};

use crate::sse::{Delta, SseParser, StopReason, StreamEvent};
use crate::LlmError;

const API_VERSION: &str = "2023-06-01";

/// Client configuration
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Initial backoff duration (doubles each retry)
    pub initial_backoff: Duration,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for LlmClientConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_seconds),
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        }
    }
}

/// Language model over HTTP
#[derive(Clone)]
pub struct HttpLanguageModel {
    client: Client,
    config: LlmClientConfig,
}

impl HttpLanguageModel {
    pub fn new(config: LlmClientConfig) -> std::result::Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn build_body(&self, request: &GenerateRequest, stream: bool) -> MessagesRequest {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        MessagesRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            system: if system.is_empty() {
                None
            } else {
                Some(system.join("\n\n"))
            },
            messages: request
                .messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(ApiMessage::from)
                .collect(),
            temperature: Some(request.temperature.unwrap_or(self.config.temperature)),
            top_p: request.top_p,
            stream,
        }
    }

    async fn send_once(&self, body: &MessagesRequest) -> std::result::Result<reqwest::Response, LlmError> {
        let mut builder = self
            .client
            .post(&self.config.endpoint)
            .header("anthropic-version", API_VERSION)
            .json(body);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("x-api-key", key).bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Send with exponential backoff on transient failures
    async fn send(&self, body: &MessagesRequest) -> std::result::Result<reqwest::Response, LlmError> {
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0;

        loop {
            match self.send_once(body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_retries = self.config.max_retries,
                        "LLM request failed, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let body = self.build_body(&request, false);
        let response = self.send(&body).await?;

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(parsed.into_response())
    }

    fn generate_stream<'a>(&'a self, request: GenerateRequest) -> ChunkStream<'a> {
        let body = self.build_body(&request, true);

        Box::pin(async_stream::stream! {
            let response = match self.send(&body).await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(voice_assistant_core::Error::from(e));
                    return;
                }
            };

            let mut bytes = response.bytes_stream();
            let mut parser = SseParser::new();
            let mut finish_reason = FinishReason::Stop;

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(voice_assistant_core::Error::from(LlmError::from(e)));
                        return;
                    }
                };

                for payload in parser.push(&chunk) {
                    let event = match serde_json::from_str::<StreamEvent>(&payload) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::debug!(error = %e, "Skipping unrecognized stream event");
                            continue;
                        }
                    };

                    match event {
                        StreamEvent::ContentBlockDelta { delta: Delta::TextDelta { text } } => {
                            if !text.is_empty() {
                                yield Ok(StreamChunk::text(text));
                            }
                        }
                        StreamEvent::MessageDelta { delta } => {
                            if let Some(reason) = delta.stop_reason {
                                finish_reason = reason.into();
                            }
                        }
                        StreamEvent::MessageStop {} => {
                            yield Ok(StreamChunk::final_chunk(finish_reason));
                            return;
                        }
                        StreamEvent::Error { error } => {
                            yield Err(voice_assistant_core::Error::from(LlmError::Api(error.message)));
                            return;
                        }
                        _ => {}
                    }
                }
            }

            // Connection closed without an explicit stop event
            yield Ok(StreamChunk::final_chunk(finish_reason));
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

impl From<StopReason> for FinishReason {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::MaxTokens => FinishReason::Length,
            _ => FinishReason::Stop,
        }
    }
}

// =============================================================================
// API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

impl From<&Message> for ApiMessage {
    fn from(message: &Message) -> Self {
        let role = match message.role {
            Role::Assistant => "assistant",
            Role::User | Role::System => "user",
        };
        Self {
            role,
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<StopReason>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

impl MessagesResponse {
    fn into_response(self) -> GenerateResponse {
        let text = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<String>();

        GenerateResponse {
            text,
            finish_reason: self.stop_reason.map(Into::into).unwrap_or_default(),
            usage: self
                .usage
                .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> HttpLanguageModel {
        HttpLanguageModel::new(LlmClientConfig {
            api_key: None,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_system_messages_hoisted_in_order() {
        let request = GenerateRequest::from_messages(vec![
            Message::system("Be brief."),
            Message::system("Summary of earlier conversation (9 messages): weather"),
            Message::user("hello"),
            Message::assistant("hi"),
            Message::user("again"),
        ]);

        let body = backend().build_body(&request, true);

        assert_eq!(
            body.system.as_deref(),
            Some("Be brief.\n\nSummary of earlier conversation (9 messages): weather")
        );
        let roles: Vec<_> = body.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
        assert!(body.stream);
    }

    #[test]
    fn test_request_overrides_defaults() {
        let request = GenerateRequest::new("sys")
            .with_user_message("q")
            .with_max_tokens(512)
            .with_temperature(0.3)
            .with_model("glm-4-flash");

        let body = backend().build_body(&request, false);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "glm-4-flash");
        assert_eq!(json["max_tokens"], 512);
        assert!((json["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_defaults_from_config() {
        let body = backend().build_body(&GenerateRequest::default().with_user_message("q"), false);
        assert_eq!(body.model, "glm-4-plus");
        assert_eq!(body.max_tokens, 1024);
        assert!(body.system.is_none());
    }

    #[test]
    fn test_response_parsing() {
        let parsed: MessagesResponse = serde_json::from_str(
            r#"{
                "id": "msg_1",
                "content": [
                    {"type": "text", "text": "Hello "},
                    {"type": "thinking", "thinking": "..."},
                    {"type": "text", "text": "world"}
                ],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 10, "output_tokens": 2}
            }"#,
        )
        .unwrap();

        let response = parsed.into_response();
        assert_eq!(response.text, "Hello world");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage.unwrap().total_tokens, 12);
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(FinishReason::from(StopReason::MaxTokens), FinishReason::Length);
        assert_eq!(FinishReason::from(StopReason::EndTurn), FinishReason::Stop);
    }
}
