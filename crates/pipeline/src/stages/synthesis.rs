//! Speech synthesis stage

use std::sync::Arc;

use async_trait::async_trait;
use voice_assistant_core::{Error, Result, SpeechSynthesizer, SynthesisOptions};

use crate::{ConversationRecord, Stage, StageOutcome};

/// Turns the accumulated reply into audio
pub struct SynthesisStage {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice: String,
}

impl SynthesisStage {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            synthesizer,
            voice: "default".to_string(),
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }
}

#[async_trait]
impl Stage for SynthesisStage {
    async fn process(&self, record: &mut ConversationRecord) -> Result<StageOutcome> {
        let reply = record.model_reply().trim();
        if reply.is_empty() {
            return Err(Error::InvalidInput("reply is empty".to_string()));
        }

        let options = SynthesisOptions::new(reply).with_voice(self.voice.clone());
        let audio = record
            .scope()
            .run(self.synthesizer.synthesize(options))
            .await??;

        tracing::debug!(
            session_id = %record.session_id(),
            synthesizer = self.synthesizer.name(),
            bytes = audio.len(),
            "Synthesized reply"
        );
        record.set_output_audio(audio)?;
        Ok(StageOutcome::Continue)
    }

    fn name(&self) -> &'static str {
        "synthesis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CancellationScope;

    struct ToneSynthesizer;

    #[async_trait]
    impl SpeechSynthesizer for ToneSynthesizer {
        async fn synthesize(&self, options: SynthesisOptions) -> Result<Vec<u8>> {
            assert_eq!(options.voice, "xiaoyan");
            Ok(options.text.into_bytes())
        }

        fn name(&self) -> &str {
            "tone"
        }
    }

    #[tokio::test]
    async fn test_synthesizes_reply() {
        let stage = SynthesisStage::new(Arc::new(ToneSynthesizer)).with_voice("xiaoyan");
        let mut record = ConversationRecord::from_text(CancellationScope::detached(), "s1", "q");
        record.append_reply("hello");

        stage.process(&mut record).await.unwrap();

        assert_eq!(record.output_audio(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn test_empty_reply_is_error() {
        let stage = SynthesisStage::new(Arc::new(ToneSynthesizer));
        let mut record = ConversationRecord::from_text(CancellationScope::detached(), "s1", "q");

        assert!(stage.process(&mut record).await.is_err());
        assert!(record.output_audio().is_none());
    }
}
