//! Summary-based context compressor
//!
//! A history longer than the threshold is split into a prefix and a fixed
//! window of recent messages. The prefix is summarized by the language model;
//! the window is kept verbatim. Summarization failure never drops data: the
//! whole history is passed through instead.

use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use voice_assistant_config::CompressionConfig;
use voice_assistant_core::{
    CompressedContext, GenerateRequest, LanguageModel, Message, Role, RollingSummary,
};

use crate::AgentError;

static NUMBERED_POINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[.、)]\s*(.+)").expect("valid regex"));
static BULLET_POINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-*•]\s+(.+)").expect("valid regex"));

/// Topic tag and the words that imply it
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("technology", &["技术", "代码", "编程", "code", "programming", "software", "technology"]),
    ("life", &["生活", "日常", "健康", "life", "daily", "health"]),
    ("work", &["工作", "项目", "会议", "work", "project", "meeting"]),
    ("study", &["学习", "笔记", "教程", "study", "learn", "course"]),
];

/// Bounds the history passed to generation
pub struct ContextCompressor {
    llm: Arc<dyn LanguageModel>,
    config: CompressionConfig,
}

impl ContextCompressor {
    pub fn new(llm: Arc<dyn LanguageModel>, config: CompressionConfig) -> Self {
        Self { llm, config }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Whether `history` is long enough to need a summary
    pub fn should_compress(&self, history: &[Message]) -> bool {
        history.len() > self.config.summary_threshold
    }

    /// Compress a full history from scratch
    pub async fn compress(&self, history: &[Message]) -> CompressedContext {
        self.compress_with_summary(history, None).await
    }

    /// Compress `history`, reusing `existing` when it is still usable.
    ///
    /// A stored summary is reused while it is younger than the staleness
    /// window and covers all but at most one window of the prefix; the
    /// uncovered tail is then passed verbatim with the recent messages.
    pub async fn compress_with_summary(
        &self,
        history: &[Message],
        existing: Option<&RollingSummary>,
    ) -> CompressedContext {
        if !self.should_compress(history) {
            return CompressedContext::verbatim(history);
        }

        let split = history.len().saturating_sub(self.config.max_recent_messages);

        if let Some(summary) = existing.filter(|s| self.can_reuse(s, split)) {
            tracing::debug!(
                covered = summary.message_count,
                total = history.len(),
                "Reusing rolling summary"
            );
            return CompressedContext {
                summary: Some(summary.clone()),
                recent_messages: history[summary.message_count..].to_vec(),
                total_messages: history.len(),
            };
        }

        match self.summarize(&history[..split]).await {
            Ok(summary) => {
                tracing::debug!(
                    covered = summary.message_count,
                    recent = history.len() - split,
                    "Generated rolling summary"
                );
                CompressedContext {
                    summary: Some(summary),
                    recent_messages: history[split..].to_vec(),
                    total_messages: history.len(),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Summarization failed, passing history verbatim");
                CompressedContext::verbatim(history)
            }
        }
    }

    fn can_reuse(&self, summary: &RollingSummary, split: usize) -> bool {
        !self.should_regenerate_summary(Some(summary))
            && summary.message_count > 0
            && summary.message_count <= split
            && split - summary.message_count <= self.config.max_recent_messages
    }

    /// Summarize `messages` with a low-temperature request
    pub async fn summarize(&self, messages: &[Message]) -> Result<RollingSummary, AgentError> {
        if messages.is_empty() {
            return Err(AgentError::Summarization("no messages to summarize".to_string()));
        }

        let request = GenerateRequest::default()
            .with_user_message(summary_prompt(messages))
            .with_temperature(self.config.summary_temperature)
            .with_max_tokens(self.config.summary_max_tokens);

        let response = self
            .llm
            .generate(request)
            .await
            .map_err(|e| AgentError::Summarization(e.to_string()))?;

        let content = response.text.trim();
        if content.is_empty() {
            return Err(AgentError::Summarization("empty summary".to_string()));
        }

        Ok(RollingSummary::new(
            content,
            extract_key_points(content),
            extract_topics(content),
            messages.len(),
        ))
    }

    /// Assemble the request messages.
    ///
    /// Order is fixed: system instructions, summary digest, recent messages,
    /// then the new user message.
    pub fn build_messages_for_api(
        &self,
        compressed: &CompressedContext,
        system_prompt: &str,
        current_user_message: &str,
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(compressed.recent_messages.len() + 3);

        if !system_prompt.is_empty() {
            messages.push(Message::system(system_prompt));
        }

        if let Some(summary) = compressed.summary.as_ref().filter(|s| !s.content.is_empty()) {
            messages.push(Message::system(format!(
                "Summary of earlier conversation ({} messages): {}",
                summary.message_count, summary.content
            )));
        }

        messages.extend(compressed.recent_messages.iter().cloned());
        messages.push(Message::user(current_user_message));

        let tokens = estimate_tokens(&messages);
        if tokens > self.config.max_total_tokens {
            tracing::debug!(
                tokens,
                budget = self.config.max_total_tokens,
                "Assembled context exceeds token budget"
            );
        }

        messages
    }

    /// `false` without a summary; `true` once it is older than the staleness window
    pub fn should_regenerate_summary(&self, summary: Option<&RollingSummary>) -> bool {
        let Some(summary) = summary else {
            return false;
        };
        let max_age = Duration::from_secs(self.config.summary_max_age_seconds);
        (Utc::now() - summary.updated_at)
            .to_std()
            .map(|age| age > max_age)
            .unwrap_or(false)
    }
}

fn summary_prompt(messages: &[Message]) -> String {
    let mut prompt =
        String::from("Summarize the following conversation between a user and an AI assistant:\n\n");
    for (i, message) in messages.iter().enumerate() {
        let speaker = match message.role {
            Role::Assistant => "Assistant",
            Role::User | Role::System => "User",
        };
        let _ = writeln!(prompt, "{}. {}: {}", i + 1, speaker, message.content);
    }
    prompt.push_str(
        "\nRespond with:\n\
         1. A two or three sentence summary\n\
         2. Three to five key points, one per line starting with \"- \"\n\
         3. The topics discussed",
    );
    prompt
}

/// Rough token estimate (about two characters per token)
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.content.chars().count()).sum::<usize>() / 2
}

/// Lines that start with a numeral or a bullet
pub fn extract_key_points(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter_map(|line| {
            NUMBERED_POINT
                .captures(line)
                .or_else(|| BULLET_POINT.captures(line))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|point| !point.is_empty())
        .collect()
}

/// Topic tags implied by keywords in `text`
pub fn extract_topics(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOPIC_KEYWORDS
        .iter()
        .filter(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(topic, _)| topic.to_string())
        .collect()
}
