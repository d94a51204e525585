//! Stage abstraction

use async_trait::async_trait;
use voice_assistant_core::Result;

use crate::ConversationRecord;

/// Whether later stages should run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Continue,
    /// Stop the pipeline without error
    ShortCircuit,
}

/// One step of conversational processing.
///
/// Stages hold no per-run state; everything mutable lives in the
/// [`ConversationRecord`], so one stage value may serve many concurrent runs.
///
/// # Example
///
/// ```ignore
/// struct Uppercase;
///
/// #[async_trait]
/// impl Stage for Uppercase {
///     async fn process(&self, record: &mut ConversationRecord) -> Result<StageOutcome> {
///         record.append_reply(&record.transcript_text().to_uppercase());
///         Ok(StageOutcome::Continue)
///     }
///
///     fn name(&self) -> &'static str {
///         "uppercase"
///     }
/// }
/// ```
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    async fn process(&self, record: &mut ConversationRecord) -> Result<StageOutcome>;

    /// Stage name used in error wrapping and logs
    fn name(&self) -> &'static str;
}
