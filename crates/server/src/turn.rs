//! One pipeline run as seen by the client
//!
//! A run emits `processing`, then `stt_final` (audio turns), `llm_reply`,
//! `speaking` plus the audio payload, and finally `idle`. Failures emit
//! `error` before `idle`. A cancelled run emits nothing further.

use std::time::Instant;

use async_trait::async_trait;
use voice_assistant_pipeline::{
    CancellationScope, ConversationRecord, Pipeline, PipelineError, PipelineOutcome,
};

use crate::frames::{Outbound, OutboundFrame, Status};
use crate::metrics::{record_stage_failure, record_turn, TurnResult};
use crate::ServerError;

/// Write side of a connection.
///
/// `deliver` must check `scope` and write under the same lock, so once a
/// newer run has written anything a superseded run cannot slip a frame in.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Returns `Ok(false)` without writing when `scope` is already cancelled
    async fn deliver(&self, scope: &CancellationScope, item: Outbound) -> Result<bool, ServerError>;
}

/// Why a run stopped emitting
enum Halt {
    Cancelled,
    SinkClosed(ServerError),
}

impl From<PipelineError> for Halt {
    fn from(_: PipelineError) -> Self {
        Halt::Cancelled
    }
}

struct Emitter<'a, S: ?Sized> {
    scope: &'a CancellationScope,
    sink: &'a S,
}

impl<S: FrameSink + ?Sized> Emitter<'_, S> {
    async fn send(&self, item: impl Into<Outbound>) -> Result<(), Halt> {
        match self.sink.deliver(self.scope, item.into()).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Halt::Cancelled),
            Err(e) => Err(Halt::SinkClosed(e)),
        }
    }

    async fn state(&self, status: Status) -> Result<(), Halt> {
        self.send(OutboundFrame::state(status)).await
    }
}

/// Execute `pipeline` for `record`, framing its results onto `sink`
pub async fn run_turn<S>(pipeline: &Pipeline, mut record: ConversationRecord, sink: &S) -> TurnResult
where
    S: FrameSink + ?Sized,
{
    let started = Instant::now();
    let scope = record.scope().clone();
    let session_id = record.session_id().to_string();
    let emitter = Emitter { scope: &scope, sink };

    let result = match drive(pipeline, &mut record, &emitter).await {
        Ok(result) => result,
        Err(Halt::Cancelled) => {
            tracing::debug!(
                session_id = %session_id,
                reason = ?scope.reason(),
                "Run cancelled"
            );
            TurnResult::Cancelled
        }
        Err(Halt::SinkClosed(e)) => {
            tracing::debug!(session_id = %session_id, error = %e, "Connection gone mid-run");
            TurnResult::Disconnected
        }
    };

    record_turn(result, started.elapsed());
    result
}

async fn drive<S>(
    pipeline: &Pipeline,
    record: &mut ConversationRecord,
    emit: &Emitter<'_, S>,
) -> Result<TurnResult, Halt>
where
    S: FrameSink + ?Sized,
{
    emit.state(Status::Processing).await?;

    let executed = pipeline.execute(record).await;
    if let Err(err) = &executed {
        if err.is_cancelled() {
            return Err(Halt::Cancelled);
        }
    }
    // Completion racing a cancel still counts as cancelled
    emit.scope.check()?;

    if record.is_audio_turn() {
        if let Some(transcript) = record.transcript().filter(|t| !t.is_empty()) {
            tracing::info!(session_id = %record.session_id(), transcript, "User said");
            emit.send(OutboundFrame::SttFinal { text: transcript.to_string() })
                .await?;
        }
    }

    let result = match executed {
        Ok(outcome) => {
            let reply = record.model_reply().trim();
            if !reply.is_empty() {
                tracing::info!(session_id = %record.session_id(), reply, "Assistant replied");
                emit.send(OutboundFrame::LlmReply { text: reply.to_string() })
                    .await?;
            }
            if let Some(audio) = record.take_output_audio() {
                emit.state(Status::Speaking).await?;
                emit.send(Outbound::Audio(audio)).await?;
            }
            match outcome {
                PipelineOutcome::Completed => TurnResult::Completed,
                PipelineOutcome::ShortCircuited { stage } => {
                    tracing::debug!(session_id = %record.session_id(), stage, "Run short-circuited");
                    TurnResult::ShortCircuited
                }
            }
        }
        Err(err) => {
            if let PipelineError::Stage { stage, .. } = &err {
                record_stage_failure(*stage);
            }
            tracing::warn!(session_id = %record.session_id(), error = %err, "Run failed");
            emit.send(OutboundFrame::Error { error: err.to_string() })
                .await?;
            TurnResult::Failed
        }
    };

    emit.state(Status::Idle).await?;
    Ok(result)
}
