//! Intent labels produced by the classifier

use serde::{Deserialize, Serialize};

/// User intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Free conversation
    #[default]
    Chat,
    Question,
    /// Save something to the knowledge base
    Record,
    /// Look something up in the knowledge base
    Search,
    Delete,
    /// Clear the session history
    Clear,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Chat => "chat",
            Intent::Question => "question",
            Intent::Record => "record",
            Intent::Search => "search",
            Intent::Delete => "delete",
            Intent::Clear => "clear",
            Intent::Unknown => "unknown",
        }
    }

    /// Administrative intents are handled by the classifier stage itself
    /// and never reach generation.
    pub fn is_administrative(&self) -> bool {
        matches!(self, Intent::Clear | Intent::Delete)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    /// 0.0 - 1.0
    pub confidence: f32,
    /// Keywords that triggered the match
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl IntentResult {
    pub fn new(intent: Intent, confidence: f32) -> Self {
        Self {
            intent,
            confidence: confidence.clamp(0.0, 1.0),
            keywords: Vec::new(),
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }
}
