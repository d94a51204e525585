//! Request-scoped state threaded through the stages of one run

use voice_assistant_core::IntentResult;

use crate::{CancellationScope, PipelineError};

/// Mutable state for a single pipeline run.
///
/// Every field except the reply is write-once: a setter fails with
/// [`PipelineError::FieldAlreadySet`] if an earlier stage already filled it.
/// The reply only grows, one streamed delta at a time.
#[derive(Debug)]
pub struct ConversationRecord {
    scope: CancellationScope,
    session_id: String,
    input_audio: Option<Vec<u8>>,
    transcript: Option<String>,
    intent: Option<IntentResult>,
    model_reply: String,
    output_audio: Option<Vec<u8>>,
}

impl ConversationRecord {
    /// Record for an audio turn; recognition fills the transcript
    pub fn from_audio(scope: CancellationScope, session_id: impl Into<String>, audio: Vec<u8>) -> Self {
        Self {
            scope,
            session_id: session_id.into(),
            input_audio: Some(audio),
            transcript: None,
            intent: None,
            model_reply: String::new(),
            output_audio: None,
        }
    }

    /// Record for a text turn; recognition passes through
    pub fn from_text(
        scope: CancellationScope,
        session_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            scope,
            session_id: session_id.into(),
            input_audio: None,
            transcript: Some(text.into()),
            intent: None,
            model_reply: String::new(),
            output_audio: None,
        }
    }

    pub fn scope(&self) -> &CancellationScope {
        &self.scope
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn input_audio(&self) -> Option<&[u8]> {
        self.input_audio.as_deref()
    }

    /// Whether the run was triggered by an audio frame
    pub fn is_audio_turn(&self) -> bool {
        self.input_audio.is_some()
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    /// Transcript, or "" when none was produced
    pub fn transcript_text(&self) -> &str {
        self.transcript.as_deref().unwrap_or_default()
    }

    pub fn intent(&self) -> Option<&IntentResult> {
        self.intent.as_ref()
    }

    pub fn model_reply(&self) -> &str {
        &self.model_reply
    }

    pub fn output_audio(&self) -> Option<&[u8]> {
        self.output_audio.as_deref()
    }

    /// Take the synthesized audio out of the record for sending
    pub fn take_output_audio(&mut self) -> Option<Vec<u8>> {
        self.output_audio.take()
    }

    pub fn set_transcript(&mut self, transcript: impl Into<String>) -> Result<(), PipelineError> {
        if self.transcript.is_some() {
            return Err(PipelineError::FieldAlreadySet("transcript"));
        }
        self.transcript = Some(transcript.into());
        Ok(())
    }

    pub fn set_intent(&mut self, intent: IntentResult) -> Result<(), PipelineError> {
        if self.intent.is_some() {
            return Err(PipelineError::FieldAlreadySet("intent"));
        }
        self.intent = Some(intent);
        Ok(())
    }

    /// Append one streamed delta to the reply
    pub fn append_reply(&mut self, delta: &str) {
        self.model_reply.push_str(delta);
    }

    pub fn set_output_audio(&mut self, audio: Vec<u8>) -> Result<(), PipelineError> {
        if self.output_audio.is_some() {
            return Err(PipelineError::FieldAlreadySet("output_audio"));
        }
        self.output_audio = Some(audio);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_assistant_core::Intent;

    #[test]
    fn test_text_record_has_transcript() {
        let record = ConversationRecord::from_text(CancellationScope::detached(), "s1", "hello");
        assert_eq!(record.transcript(), Some("hello"));
        assert!(!record.is_audio_turn());
        assert_eq!(record.session_id(), "s1");
    }

    #[test]
    fn test_fields_are_write_once() {
        let mut record =
            ConversationRecord::from_audio(CancellationScope::detached(), "s1", vec![1, 2, 3]);
        assert!(record.is_audio_turn());

        record.set_transcript("hi").unwrap();
        assert!(matches!(
            record.set_transcript("again"),
            Err(PipelineError::FieldAlreadySet("transcript"))
        ));

        record.set_intent(IntentResult::new(Intent::Chat, 0.5)).unwrap();
        assert!(record.set_intent(IntentResult::new(Intent::Clear, 1.0)).is_err());
        assert_eq!(record.intent().unwrap().intent, Intent::Chat);
    }

    #[test]
    fn test_reply_accumulates() {
        let mut record = ConversationRecord::from_text(CancellationScope::detached(), "s1", "q");
        record.append_reply("wor");
        record.append_reply("ld");
        assert_eq!(record.model_reply(), "world");
    }

    #[test]
    fn test_take_output_audio() {
        let mut record = ConversationRecord::from_text(CancellationScope::detached(), "s1", "q");
        record.set_output_audio(vec![9, 9]).unwrap();
        assert_eq!(record.take_output_audio(), Some(vec![9, 9]));
        assert!(record.output_audio().is_none());
    }
}
