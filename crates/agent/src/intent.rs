//! Keyword intent classifier
//!
//! Labels are checked in priority order (clear, delete, record, search,
//! question). A label wins once its confidence, the share of its keywords
//! found in the text, exceeds 0.10. A single keyword hit is enough for
//! every list here; anything else is chat.
//!
//! English keywords only match whole words, so "unclear" is not "clear".

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use voice_assistant_core::{Intent, IntentClassifier, IntentResult, Result};

/// Minimum confidence for a keyword label to win
const MATCH_THRESHOLD: f32 = 0.10;

/// Confidence reported when nothing matched
const DEFAULT_CHAT_CONFIDENCE: f32 = 0.5;

const CLEAR_KEYWORDS: &[&str] = &["清空", "重置", "重新开始", "新对话", "忘掉", "clear", "reset", "start over"];
const DELETE_KEYWORDS: &[&str] = &["删除", "移除", "不要", "去掉", "delete", "remove"];
const RECORD_KEYWORDS: &[&str] = &["记住", "保存", "记录", "备忘", "存一下", "帮我记", "remember", "save", "note down"];
const SEARCH_KEYWORDS: &[&str] = &["搜索", "查找", "找一下", "查询", "有什么", "search", "look up", "find"];
const QUESTION_KEYWORDS: &[&str] = &["什么是", "怎么", "如何", "为什么", "?", "？", "解释", "what", "how"];

/// Captures the topic in "关于 X 的 ..." style queries
static ABOUT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"关于(.+?)的").expect("valid regex"));

/// Whole-word patterns for the latin keywords; CJK keywords match as substrings
static WORD_PATTERNS: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    [CLEAR_KEYWORDS, DELETE_KEYWORDS, RECORD_KEYWORDS, SEARCH_KEYWORDS, QUESTION_KEYWORDS]
        .into_iter()
        .flatten()
        .filter(|k| k.chars().any(|c| c.is_ascii_alphabetic()))
        .map(|k| {
            let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(k))).expect("valid regex");
            (*k, pattern)
        })
        .collect()
});

fn contains_keyword(text: &str, keyword: &str) -> bool {
    match WORD_PATTERNS.get(keyword) {
        Some(pattern) => pattern.is_match(text),
        None => text.contains(keyword),
    }
}

fn remove_keyword(text: &str, keyword: &str) -> String {
    match WORD_PATTERNS.get(keyword) {
        Some(pattern) => pattern.replace_all(text, "").into_owned(),
        None => text.replace(keyword, ""),
    }
}

/// Best-effort search query: the captured topic, or the text with search
/// keywords removed
pub fn extract_search_query(text: &str) -> String {
    let text = text.trim().to_lowercase();
    if let Some(topic) = ABOUT_PATTERN.captures(&text).and_then(|c| c.get(1)) {
        return topic.as_str().trim().to_string();
    }

    SEARCH_KEYWORDS
        .iter()
        .fold(text, |query, k| remove_keyword(&query, k))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

struct IntentRule {
    intent: Intent,
    keywords: &'static [&'static str],
    patterns: Vec<&'static Regex>,
}

impl IntentRule {
    fn size(&self) -> usize {
        self.keywords.len() + self.patterns.len()
    }
}

/// Keyword and pattern based classifier for Chinese and English utterances
pub struct KeywordIntentClassifier {
    rules: Vec<IntentRule>,
}

impl Default for KeywordIntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordIntentClassifier {
    pub fn new() -> Self {
        let rules = vec![
            IntentRule {
                intent: Intent::Clear,
                keywords: CLEAR_KEYWORDS,
                patterns: vec![],
            },
            IntentRule {
                intent: Intent::Delete,
                keywords: DELETE_KEYWORDS,
                patterns: vec![],
            },
            IntentRule {
                intent: Intent::Record,
                keywords: RECORD_KEYWORDS,
                patterns: vec![],
            },
            IntentRule {
                intent: Intent::Search,
                keywords: SEARCH_KEYWORDS,
                patterns: vec![&*ABOUT_PATTERN],
            },
            IntentRule {
                intent: Intent::Question,
                keywords: QUESTION_KEYWORDS,
                patterns: vec![],
            },
        ];
        Self { rules }
    }

    /// Classify synchronously
    pub fn recognize(&self, text: &str) -> IntentResult {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return IntentResult::new(Intent::Unknown, 0.0);
        }

        for rule in &self.rules {
            let matched: Vec<String> = rule
                .keywords
                .iter()
                .filter(|k| contains_keyword(&text, k))
                .map(|k| k.to_string())
                .chain(
                    rule.patterns
                        .iter()
                        .filter_map(|p| p.find(&text))
                        .map(|m| m.as_str().to_string()),
                )
                .collect();

            let confidence = (matched.len() as f32 / rule.size() as f32).min(1.0);
            if confidence > MATCH_THRESHOLD {
                tracing::debug!(intent = %rule.intent, confidence, "Intent matched");
                return IntentResult::new(rule.intent, confidence).with_keywords(matched);
            }
        }

        IntentResult::new(Intent::Chat, DEFAULT_CHAT_CONFIDENCE)
    }
}

#[async_trait]
impl IntentClassifier for KeywordIntentClassifier {
    async fn classify(&self, text: &str) -> Result<IntentResult> {
        Ok(self.recognize(text))
    }
}
