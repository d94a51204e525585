//! Speech recognition stage

use std::sync::Arc;

use async_trait::async_trait;
use voice_assistant_core::{Error, RecognitionRequest, Result, SpeechRecognizer};

use crate::{ConversationRecord, Stage, StageOutcome};

/// Fills the transcript from the input audio.
///
/// Passes through when the turn already carries text and stops the run
/// quietly when the audio contains no speech.
pub struct RecognitionStage {
    recognizer: Arc<dyn SpeechRecognizer>,
    format: String,
    sample_rate: u32,
}

impl RecognitionStage {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            format: "wav".to_string(),
            sample_rate: 16000,
        }
    }

    pub fn with_audio_format(mut self, format: impl Into<String>, sample_rate: u32) -> Self {
        self.format = format.into();
        self.sample_rate = sample_rate;
        self
    }
}

#[async_trait]
impl Stage for RecognitionStage {
    async fn process(&self, record: &mut ConversationRecord) -> Result<StageOutcome> {
        if !record.transcript_text().is_empty() {
            return Ok(StageOutcome::Continue);
        }

        let audio = match record.input_audio() {
            Some(audio) if !audio.is_empty() => audio.to_vec(),
            _ => return Err(Error::InvalidInput("input audio is empty".to_string())),
        };

        let request = RecognitionRequest::new(audio, self.format.clone(), self.sample_rate);
        let candidates = record
            .scope()
            .run(self.recognizer.recognize(request))
            .await??;

        let transcript = candidates.concat().trim().to_string();
        if transcript.is_empty() {
            tracing::debug!(
                session_id = %record.session_id(),
                recognizer = self.recognizer.name(),
                "No speech recognized"
            );
            return Ok(StageOutcome::ShortCircuit);
        }

        tracing::info!(session_id = %record.session_id(), transcript = %transcript, "Recognized");
        record.set_transcript(transcript)?;
        Ok(StageOutcome::Continue)
    }

    fn name(&self) -> &'static str {
        "recognition"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CancellationScope;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedRecognizer {
        output: Vec<String>,
        calls: AtomicUsize,
    }

    impl FixedRecognizer {
        fn new(output: &[&str]) -> Self {
            Self {
                output: output.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpeechRecognizer for FixedRecognizer {
        async fn recognize(&self, request: RecognitionRequest) -> Result<Vec<String>> {
            assert_eq!(request.format, "wav");
            assert_eq!(request.sample_rate, 16000);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_text_turn_passes_through() {
        let stt = Arc::new(FixedRecognizer::new(&["ignored"]));
        let stage = RecognitionStage::new(stt.clone());
        let mut record = ConversationRecord::from_text(CancellationScope::detached(), "s1", "hi");

        let outcome = stage.process(&mut record).await.unwrap();

        assert_eq!(outcome, StageOutcome::Continue);
        assert_eq!(record.transcript(), Some("hi"));
        assert_eq!(stt.calls(), 0);
    }

    #[tokio::test]
    async fn test_candidates_are_joined() {
        let stage = RecognitionStage::new(Arc::new(FixedRecognizer::new(&["hel", "lo"])));
        let mut record =
            ConversationRecord::from_audio(CancellationScope::detached(), "s1", vec![0u8; 32]);

        let outcome = stage.process(&mut record).await.unwrap();

        assert_eq!(outcome, StageOutcome::Continue);
        assert_eq!(record.transcript(), Some("hello"));
    }

    #[tokio::test]
    async fn test_silence_short_circuits() {
        let stage = RecognitionStage::new(Arc::new(FixedRecognizer::new(&["", "  "])));
        let mut record =
            ConversationRecord::from_audio(CancellationScope::detached(), "s1", vec![0u8; 32]);

        let outcome = stage.process(&mut record).await.unwrap();

        assert_eq!(outcome, StageOutcome::ShortCircuit);
        assert!(record.transcript().is_none());
    }

    #[tokio::test]
    async fn test_empty_audio_is_error() {
        let stage = RecognitionStage::new(Arc::new(FixedRecognizer::new(&["x"])));
        let mut record =
            ConversationRecord::from_audio(CancellationScope::detached(), "s1", Vec::new());

        let err = stage.process(&mut record).await.unwrap_err();
        assert!(err.to_string().contains("input audio is empty"));
    }
}
