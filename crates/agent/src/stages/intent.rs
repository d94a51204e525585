//! Intent classification stage

use std::sync::Arc;

use async_trait::async_trait;
use voice_assistant_core::{Intent, IntentClassifier, Result, Session, SessionStore};
use voice_assistant_pipeline::{ConversationRecord, Stage, StageOutcome};

/// Classifies the transcript and handles administrative intents itself.
///
/// `clear` empties the session and stops the run; `delete` stops the run.
/// Conversational intents continue to generation.
pub struct IntentStage {
    classifier: Arc<dyn IntentClassifier>,
    sessions: Arc<dyn SessionStore>,
}

impl IntentStage {
    pub fn new(classifier: Arc<dyn IntentClassifier>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            classifier,
            sessions,
        }
    }

    async fn clear_session(&self, record: &ConversationRecord) -> Result<()> {
        let id = record.session_id();
        let mut session = self
            .sessions
            .get(id)
            .await?
            .unwrap_or_else(|| Session::new(id));
        session.clear();

        record.scope().check()?;
        self.sessions.save(session).await?;
        tracing::info!(session_id = %id, "Session history cleared");
        Ok(())
    }
}

#[async_trait]
impl Stage for IntentStage {
    async fn process(&self, record: &mut ConversationRecord) -> Result<StageOutcome> {
        let transcript = record.transcript_text().trim().to_string();
        if transcript.is_empty() {
            return Ok(StageOutcome::Continue);
        }

        let result = record
            .scope()
            .run(self.classifier.classify(&transcript))
            .await??;
        tracing::info!(
            session_id = %record.session_id(),
            intent = %result.intent,
            confidence = result.confidence,
            "Intent classified"
        );

        let intent = result.intent;
        record.set_intent(result)?;

        match intent {
            Intent::Clear => {
                self.clear_session(record).await?;
                Ok(StageOutcome::ShortCircuit)
            }
            Intent::Delete => {
                tracing::info!(session_id = %record.session_id(), "Delete command, skipping generation");
                Ok(StageOutcome::ShortCircuit)
            }
            _ => Ok(StageOutcome::Continue),
        }
    }

    fn name(&self) -> &'static str {
        "intent"
    }
}
