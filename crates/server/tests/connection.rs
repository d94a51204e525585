//! Connection handler behaviour: frame order, barge-in, interrupts

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use voice_assistant_agent::{build_pipeline, ConversationServices, KeywordIntentClassifier};
use voice_assistant_config::Settings;
use voice_assistant_core::{
    ChunkStream, Error, GenerateRequest, GenerateResponse, LanguageModel, Message,
    RecognitionRequest, Result, SessionStore, SpeechRecognizer, SpeechSynthesizer, StreamChunk,
    SynthesisOptions,
};
use voice_assistant_persistence::JsonSessionStore;
use voice_assistant_pipeline::{CancelReason, CancellationScope, ConversationRecord};
use voice_assistant_server::{
    run_turn, ConnectionHandler, FrameSink, Outbound, OutboundFrame, ServerError, Status,
    TurnInput, TurnResult,
};

/// Streams fixed deltas after an optional delay
struct ScriptedModel {
    deltas: Vec<&'static str>,
    delay: Duration,
    fail: bool,
    stream_requests: AtomicUsize,
}

impl ScriptedModel {
    fn new(deltas: &[&'static str]) -> Self {
        Self {
            deltas: deltas.to_vec(),
            delay: Duration::ZERO,
            fail: false,
            stream_requests: AtomicUsize::new(0),
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
        Ok(GenerateResponse::text("summary"))
    }

    fn generate_stream<'a>(&'a self, _request: GenerateRequest) -> ChunkStream<'a> {
        self.stream_requests.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay;
        let lead = futures::stream::once(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        })
        .filter_map(|_| async { None::<Result<StreamChunk>> });

        let mut items: Vec<Result<StreamChunk>> = self
            .deltas
            .iter()
            .map(|d| Ok(StreamChunk::text(d.to_string())))
            .collect();
        if self.fail {
            items.push(Err(Error::Llm("upstream unavailable".to_string())));
        } else {
            items.push(Ok(StreamChunk::final_chunk(Default::default())));
        }

        Box::pin(lead.chain(futures::stream::iter(items)))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct FixedRecognizer;

#[async_trait]
impl SpeechRecognizer for FixedRecognizer {
    async fn recognize(&self, _request: RecognitionRequest) -> Result<Vec<String>> {
        Ok(vec!["hello".to_string()])
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

struct ToneSynthesizer;

#[async_trait]
impl SpeechSynthesizer for ToneSynthesizer {
    async fn synthesize(&self, options: SynthesisOptions) -> Result<Vec<u8>> {
        Ok(options.text.into_bytes())
    }

    fn name(&self) -> &str {
        "tone"
    }
}

/// Sink that records what it was allowed to write
#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<Outbound>>,
}

impl RecordingSink {
    fn sent(&self) -> Vec<Outbound> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn deliver(&self, scope: &CancellationScope, item: Outbound) -> std::result::Result<bool, ServerError> {
        let mut sent = self.sent.lock();
        if scope.is_cancelled() {
            return Ok(false);
        }
        sent.push(item);
        Ok(true)
    }
}

/// Sink whose transport is already gone
struct ClosedSink;

#[async_trait]
impl FrameSink for ClosedSink {
    async fn deliver(&self, _scope: &CancellationScope, _item: Outbound) -> std::result::Result<bool, ServerError> {
        Err(ServerError::WebSocket("connection reset".to_string()))
    }
}

struct Fixture {
    handler: ConnectionHandler<RecordingSink>,
    sink: Arc<RecordingSink>,
    sessions: Arc<JsonSessionStore>,
    llm: Arc<ScriptedModel>,
}

fn fixture(llm: ScriptedModel, synthesis: bool) -> Fixture {
    let llm = Arc::new(llm);
    let sessions = Arc::new(JsonSessionStore::in_memory(20));
    let mut settings = Settings::default();
    settings.speech.synthesis_enabled = synthesis;
    settings.knowledge.enabled = false;

    let synthesizer: Option<Arc<dyn SpeechSynthesizer>> =
        if synthesis { Some(Arc::new(ToneSynthesizer)) } else { None };
    let services = ConversationServices {
        recognizer: Arc::new(FixedRecognizer),
        synthesizer,
        classifier: Arc::new(KeywordIntentClassifier::new()),
        llm: llm.clone(),
        sessions: sessions.clone(),
        knowledge: None,
        retriever: None,
    };
    let pipeline = Arc::new(build_pipeline(services, &settings));

    let sink = Arc::new(RecordingSink::default());
    Fixture {
        handler: ConnectionHandler::new("s1", pipeline, sink.clone()),
        sink,
        sessions,
        llm,
    }
}

fn state(status: Status) -> Outbound {
    Outbound::Frame(OutboundFrame::state(status))
}

fn stt(text: &str) -> Outbound {
    Outbound::Frame(OutboundFrame::SttFinal { text: text.to_string() })
}

fn reply(text: &str) -> Outbound {
    Outbound::Frame(OutboundFrame::LlmReply { text: text.to_string() })
}

#[tokio::test]
async fn test_audio_turn_frame_order() {
    let f = fixture(ScriptedModel::new(&["wor", "ld"]), false);

    let result = f.handler.on_audio(vec![7u8; 32]).await.unwrap();

    assert_eq!(result, TurnResult::Completed);
    assert_eq!(
        f.sink.sent(),
        vec![state(Status::Processing), stt("hello"), reply("world"), state(Status::Idle)]
    );
    let session = f.sessions.get("s1").await.unwrap().unwrap();
    assert_eq!(session.messages, vec![Message::user("hello"), Message::assistant("world")]);
}

#[tokio::test]
async fn test_text_turn_has_no_stt_final() {
    let f = fixture(ScriptedModel::new(&["wor", "ld"]), false);

    let run = f
        .handler
        .on_text(r#"{"type":"text","text":"how are you"}"#)
        .await
        .expect("text frame starts a run");

    assert_eq!(run.await.unwrap(), TurnResult::Completed);
    assert_eq!(
        f.sink.sent(),
        vec![state(Status::Processing), reply("world"), state(Status::Idle)]
    );
}

#[tokio::test]
async fn test_synthesized_audio_follows_speaking() {
    let f = fixture(ScriptedModel::new(&["wor", "ld"]), true);

    let result = f.handler.on_audio(vec![1u8; 16]).await.unwrap();

    assert_eq!(result, TurnResult::Completed);
    assert_eq!(
        f.sink.sent(),
        vec![
            state(Status::Processing),
            stt("hello"),
            reply("world"),
            state(Status::Speaking),
            Outbound::Audio(b"world".to_vec()),
            state(Status::Idle),
        ]
    );
}

#[tokio::test]
async fn test_only_last_of_rapid_events_has_effects() {
    let f = fixture(ScriptedModel::new(&["wor", "ld"]).slow(Duration::from_millis(20)), false);

    let runs: Vec<_> = ["one", "two", "three"]
        .into_iter()
        .map(|text| f.handler.on_event(TurnInput::Text(text.to_string())))
        .collect();

    let mut results = Vec::new();
    for run in runs {
        results.push(run.await.unwrap());
    }

    assert_eq!(
        results,
        vec![TurnResult::Cancelled, TurnResult::Cancelled, TurnResult::Completed]
    );
    assert_eq!(
        f.sink.sent(),
        vec![state(Status::Processing), reply("world"), state(Status::Idle)]
    );
    let session = f.sessions.get("s1").await.unwrap().unwrap();
    assert_eq!(session.messages, vec![Message::user("three"), Message::assistant("world")]);
}

#[tokio::test]
async fn test_barge_in_mid_generation_is_silent() {
    let f = fixture(ScriptedModel::new(&["wor", "ld"]).slow(Duration::from_millis(200)), false);

    let first = f.handler.on_event(TurnInput::Text("first".to_string()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = f.handler.on_event(TurnInput::Text("second".to_string()));

    assert_eq!(first.await.unwrap(), TurnResult::Cancelled);
    assert_eq!(second.await.unwrap(), TurnResult::Completed);

    // The first run got as far as `processing`, then went quiet
    assert_eq!(
        f.sink.sent(),
        vec![
            state(Status::Processing),
            state(Status::Processing),
            reply("world"),
            state(Status::Idle),
        ]
    );
    let session = f.sessions.get("s1").await.unwrap().unwrap();
    assert_eq!(session.messages, vec![Message::user("second"), Message::assistant("world")]);
}

#[tokio::test]
async fn test_interrupt_cancels_and_reports_idle() {
    let f = fixture(ScriptedModel::new(&["wor", "ld"]).slow(Duration::from_millis(200)), false);

    let run = f.handler.on_event(TurnInput::Text("tell me a story".to_string()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(f.handler.has_active_run());

    assert!(f.handler.on_text(r#"{"type":"interrupt"}"#).await.is_none());

    assert_eq!(run.await.unwrap(), TurnResult::Cancelled);
    assert!(!f.handler.has_active_run());
    assert_eq!(f.sink.sent(), vec![state(Status::Processing), state(Status::Idle)]);
    assert!(f.sessions.get("s1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_bare_interrupt_string_is_accepted() {
    let f = fixture(ScriptedModel::new(&["ok"]), false);

    assert!(f.handler.on_text("interrupt").await.is_none());
    assert_eq!(f.sink.sent(), vec![state(Status::Idle)]);
}

#[tokio::test]
async fn test_clear_command_short_circuits_to_idle() {
    let f = fixture(ScriptedModel::new(&["should not be sent"]), false);
    f.sessions.append_message("s1", Message::user("old")).await.unwrap();
    f.sessions.append_message("s1", Message::assistant("older")).await.unwrap();

    let result = f.handler.on_event(TurnInput::Text("清空".to_string())).await.unwrap();

    assert_eq!(result, TurnResult::ShortCircuited);
    assert_eq!(f.sink.sent(), vec![state(Status::Processing), state(Status::Idle)]);
    assert_eq!(f.llm.stream_requests.load(Ordering::SeqCst), 0);
    assert!(f.sessions.get("s1").await.unwrap().unwrap().messages.is_empty());
}

#[tokio::test]
async fn test_generation_failure_reports_error_then_idle() {
    let f = fixture(ScriptedModel::new(&[]).failing(), false);

    let result = f.handler.on_event(TurnInput::Text("hi".to_string())).await.unwrap();

    assert_eq!(result, TurnResult::Failed);
    let sent = f.sink.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0], state(Status::Processing));
    match &sent[1] {
        Outbound::Frame(OutboundFrame::Error { error }) => {
            assert!(error.contains("generation"));
            assert!(error.contains("llm request failed"));
        }
        other => panic!("expected an error frame, got {:?}", other),
    }
    assert_eq!(sent[2], state(Status::Idle));
}

#[tokio::test]
async fn test_unknown_and_malformed_frames_are_ignored() {
    let f = fixture(ScriptedModel::new(&["ok"]), false);

    assert!(f.handler.on_text(r#"{"type":"config","data":{}}"#).await.is_none());
    assert!(f.handler.on_text("not json").await.is_none());
    assert!(f.handler.on_text(r#"{"type":"text","text":"   "}"#).await.is_none());

    assert!(f.sink.sent().is_empty());
    assert!(!f.handler.has_active_run());
}

#[tokio::test]
async fn test_close_cancels_current_run() {
    let f = fixture(ScriptedModel::new(&["wor", "ld"]).slow(Duration::from_millis(200)), false);

    let run = f.handler.on_event(TurnInput::Text("hello there".to_string()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    f.handler.close(CancelReason::ConnectionClosed);

    assert_eq!(run.await.unwrap(), TurnResult::Cancelled);
    assert_eq!(f.sink.sent(), vec![state(Status::Processing)]);
    assert!(f.sessions.get("s1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_chat_containing_clear_as_substring_is_answered() {
    let f = fixture(ScriptedModel::new(&["Happy to explain."]), false);
    f.sessions.append_message("s1", Message::user("hi")).await.unwrap();
    f.sessions.append_message("s1", Message::assistant("hello")).await.unwrap();

    let text = "The nuclear physics part is unclear to me";
    let result = f.handler.on_event(TurnInput::Text(text.to_string())).await.unwrap();

    assert_eq!(result, TurnResult::Completed);
    assert_eq!(f.llm.stream_requests.load(Ordering::SeqCst), 1);
    let session = f.sessions.get("s1").await.unwrap().unwrap();
    assert_eq!(session.messages.len(), 4);
    assert_eq!(session.messages[2], Message::user(text));
}

#[tokio::test]
async fn test_reply_frame_matches_stored_reply() {
    let f = fixture(ScriptedModel::new(&["  wor", "ld \n"]), false);

    let result = f.handler.on_event(TurnInput::Text("  hi there \n".to_string())).await.unwrap();

    assert_eq!(result, TurnResult::Completed);
    assert_eq!(
        f.sink.sent(),
        vec![state(Status::Processing), reply("world"), state(Status::Idle)]
    );
    let session = f.sessions.get("s1").await.unwrap().unwrap();
    assert_eq!(session.messages, vec![Message::user("hi there"), Message::assistant("world")]);
}

#[tokio::test]
async fn test_transport_failure_is_reported_as_disconnected() {
    let f = fixture(ScriptedModel::new(&["ok"]), false);
    let pipeline = build_pipeline(
        ConversationServices {
            recognizer: Arc::new(FixedRecognizer),
            synthesizer: None,
            classifier: Arc::new(KeywordIntentClassifier::new()),
            llm: f.llm.clone(),
            sessions: f.sessions.clone(),
            knowledge: None,
            retriever: None,
        },
        &Settings::default(),
    );

    let record = ConversationRecord::from_text(CancellationScope::detached(), "s1", "hello");
    let result = run_turn(&pipeline, record, &ClosedSink).await;

    assert_eq!(result, TurnResult::Disconnected);
    assert_eq!(result.as_str(), "disconnected");
    assert_eq!(f.llm.stream_requests.load(Ordering::SeqCst), 0);
}
