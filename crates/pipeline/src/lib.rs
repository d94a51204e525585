//! Staged conversation pipeline
//!
//! This crate provides the request-scoped machinery for one turn:
//! - One-way cancellation scopes (owner handle vs. read-only scope)
//! - The conversation record threaded through every stage
//! - The `Stage` trait and the sequential, short-circuiting `Pipeline`
//! - Recognition and synthesis stages with HTTP speech providers

pub mod cancellation;
pub mod chain;
pub mod record;
pub mod speech;
pub mod stage;
pub mod stages;

pub use cancellation::{CancelReason, CancellationHandle, CancellationScope};
pub use chain::{Pipeline, PipelineBuilder, PipelineOutcome};
pub use record::ConversationRecord;
pub use speech::{HttpRecognizer, HttpSynthesizer};
pub use stage::{Stage, StageOutcome};
pub use stages::{RecognitionStage, SynthesisStage};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The run's scope was cancelled; not a user-visible failure
    #[error("run cancelled: {0}")]
    Cancelled(CancelReason),

    #[error("stage {stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: voice_assistant_core::Error,
    },

    #[error("record field {0} is already set")]
    FieldAlreadySet(&'static str),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled(_))
    }
}

impl From<PipelineError> for voice_assistant_core::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Cancelled(reason) => voice_assistant_core::Error::Cancelled(reason.to_string()),
            other => voice_assistant_core::Error::Pipeline(other.to_string()),
        }
    }
}
