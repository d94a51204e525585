//! Intent classification trait

use async_trait::async_trait;

use crate::{IntentResult, Result};

/// Maps an utterance to an intent label
#[async_trait]
pub trait IntentClassifier: Send + Sync + 'static {
    async fn classify(&self, text: &str) -> Result<IntentResult>;
}
