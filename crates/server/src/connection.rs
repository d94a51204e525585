//! Connection handler
//!
//! The single consumer of one connection's inbound frames. Every event goes
//! through the [`InterruptionController`] first, then the run is spawned on
//! its own task so the read loop never waits on model or network latency.

use std::sync::Arc;

use tokio::task::JoinHandle;
use voice_assistant_pipeline::{CancelReason, CancellationScope, ConversationRecord, Pipeline};

use crate::frames::{Decoded, InboundMessage, Outbound, OutboundFrame, Status};
use crate::interruption::InterruptionController;
use crate::metrics::{record_interrupt, TurnResult};
use crate::turn::{run_turn, FrameSink};

/// Input that starts a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnInput {
    Audio(Vec<u8>),
    Text(String),
}

pub struct ConnectionHandler<S: FrameSink + 'static> {
    session_id: String,
    pipeline: Arc<Pipeline>,
    sink: Arc<S>,
    controller: InterruptionController,
}

impl<S: FrameSink + 'static> ConnectionHandler<S> {
    pub fn new(session_id: impl Into<String>, pipeline: Arc<Pipeline>, sink: Arc<S>) -> Self {
        Self {
            session_id: session_id.into(),
            pipeline,
            sink,
            controller: InterruptionController::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn has_active_run(&self) -> bool {
        self.controller.has_active_run()
    }

    /// Binary frame: one complete utterance
    pub fn on_audio(&self, audio: Vec<u8>) -> JoinHandle<TurnResult> {
        tracing::debug!(session_id = %self.session_id, bytes = audio.len(), "Audio received");
        self.on_event(TurnInput::Audio(audio))
    }

    /// Text frame. Returns the spawned run, if the frame started one.
    pub async fn on_text(&self, raw: &str) -> Option<JoinHandle<TurnResult>> {
        match InboundMessage::decode(raw) {
            Decoded::Message(InboundMessage::Interrupt) => {
                self.interrupt().await;
                None
            }
            Decoded::Message(InboundMessage::Text { text }) => {
                if text.trim().is_empty() {
                    tracing::debug!(session_id = %self.session_id, "Ignoring empty text frame");
                    return None;
                }
                Some(self.on_event(TurnInput::Text(text)))
            }
            Decoded::Unsupported(kind) => {
                tracing::warn!(session_id = %self.session_id, kind = %kind, "Unsupported message type");
                None
            }
            Decoded::Malformed(error) => {
                tracing::warn!(session_id = %self.session_id, error = %error, "Malformed text frame");
                None
            }
        }
    }

    /// Supersede whatever is running and launch a run for `input`
    pub fn on_event(&self, input: TurnInput) -> JoinHandle<TurnResult> {
        let scope = self.controller.begin();
        let record = match input {
            TurnInput::Audio(audio) => {
                ConversationRecord::from_audio(scope, self.session_id.clone(), audio)
            }
            TurnInput::Text(text) => {
                ConversationRecord::from_text(scope, self.session_id.clone(), text)
            }
        };

        let pipeline = self.pipeline.clone();
        let sink = self.sink.clone();
        tokio::spawn(async move { run_turn(&pipeline, record, sink.as_ref()).await })
    }

    /// Cancel the current run and tell the client it is idle
    pub async fn interrupt(&self) {
        if self.controller.interrupt() {
            record_interrupt();
            tracing::info!(session_id = %self.session_id, "Run interrupted by client");
        }

        let idle = Outbound::Frame(OutboundFrame::state(Status::Idle));
        if let Err(e) = self.sink.deliver(&CancellationScope::detached(), idle).await {
            tracing::debug!(session_id = %self.session_id, error = %e, "Failed to send idle");
        }
    }

    /// Teardown: cancel the current run
    pub fn close(&self, reason: CancelReason) {
        if self.controller.close(reason) {
            tracing::debug!(session_id = %self.session_id, %reason, "Cancelled run on close");
        }
    }
}
