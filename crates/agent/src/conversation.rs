//! Canonical pipeline assembly

use std::sync::Arc;

use voice_assistant_config::Settings;
use voice_assistant_core::{
    IntentClassifier, KnowledgeStore, LanguageModel, SessionStore, SpeechRecognizer,
    SpeechSynthesizer,
};
use voice_assistant_pipeline::{Pipeline, RecognitionStage, SynthesisStage};
use voice_assistant_rag::KnowledgeRetriever;

use crate::{
    ContextCompressor, GenerationStage, IntentStage, KnowledgeOrganizer, KnowledgeStage,
    KnowledgeWorker,
};

/// Collaborators the conversation stages are built from
#[derive(Clone)]
pub struct ConversationServices {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub classifier: Arc<dyn IntentClassifier>,
    pub llm: Arc<dyn LanguageModel>,
    pub sessions: Arc<dyn SessionStore>,
    pub knowledge: Option<Arc<dyn KnowledgeStore>>,
    pub retriever: Option<Arc<KnowledgeRetriever>>,
}

impl ConversationServices {
    /// Worker over the knowledge store, if there is one, indexing into the
    /// retriever when retrieval is configured
    pub fn knowledge_worker(&self, settings: &Settings) -> Option<KnowledgeWorker> {
        let store = self.knowledge.clone()?;
        let organizer = Arc::new(KnowledgeOrganizer::new(self.llm.clone(), &settings.knowledge));
        let mut worker = KnowledgeWorker::new(organizer, store, &settings.knowledge);
        if let Some(retriever) = &self.retriever {
            worker = worker.with_retriever(retriever.clone());
        }
        Some(worker)
    }
}

/// Build `recognition -> intent -> generation -> [knowledge] -> [synthesis]`.
///
/// Knowledge extraction needs a knowledge store and `knowledge.enabled`;
/// synthesis needs a synthesizer and `speech.synthesis_enabled`.
pub fn build_pipeline(services: ConversationServices, settings: &Settings) -> Pipeline {
    let compressor = Arc::new(ContextCompressor::new(
        services.llm.clone(),
        settings.compression.clone(),
    ));

    let recognition = RecognitionStage::new(services.recognizer.clone())
        .with_audio_format(settings.speech.audio_format.clone(), settings.speech.sample_rate);

    let intent = IntentStage::new(services.classifier.clone(), services.sessions.clone());

    let mut generation = GenerationStage::new(
        services.llm.clone(),
        services.sessions.clone(),
        compressor,
    )
    .with_system_prompt(settings.llm.system_prompt.clone())
    .with_model(settings.llm.model.clone())
    .with_sampling(settings.llm.max_tokens, settings.llm.temperature);
    if let Some(retriever) = &services.retriever {
        generation = generation.with_retriever(retriever.clone());
    }

    let knowledge = services
        .knowledge_worker(settings)
        .filter(|_| settings.knowledge.enabled)
        .map(KnowledgeStage::new);

    let synthesis = services
        .synthesizer
        .clone()
        .filter(|_| settings.speech.synthesis_enabled)
        .map(|synthesizer| SynthesisStage::new(synthesizer).with_voice(settings.speech.voice.clone()));

    let mut builder = Pipeline::builder("conversation")
        .stage(recognition)
        .stage(intent)
        .stage(generation);
    if let Some(stage) = knowledge {
        builder = builder.stage(stage);
    }
    if let Some(stage) = synthesis {
        builder = builder.stage(stage);
    }

    let pipeline = builder.build();
    tracing::info!(stages = ?pipeline.stage_names(), "Conversation pipeline assembled");
    pipeline
}
