//! Knowledge extraction hand-off

use async_trait::async_trait;
use voice_assistant_core::Result;
use voice_assistant_pipeline::{ConversationRecord, Stage, StageOutcome};

use crate::KnowledgeWorker;

/// Hands the finished exchange to the background [`KnowledgeWorker`].
///
/// Never waits for extraction and never fails the run.
pub struct KnowledgeStage {
    worker: KnowledgeWorker,
}

impl KnowledgeStage {
    pub fn new(worker: KnowledgeWorker) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl Stage for KnowledgeStage {
    async fn process(&self, record: &mut ConversationRecord) -> Result<StageOutcome> {
        let transcript = record.transcript_text().trim();
        let reply = record.model_reply().trim();
        if transcript.is_empty() && reply.is_empty() {
            return Ok(StageOutcome::Continue);
        }

        // Detached from the run's scope: a later barge-in must not lose the save
        let _ = self.worker.submit(record.session_id(), transcript, reply);
        Ok(StageOutcome::Continue)
    }

    fn name(&self) -> &'static str {
        "knowledge"
    }
}
