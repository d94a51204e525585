//! Sequential stage executor

use std::sync::Arc;
use std::time::Instant;

use crate::{CancelReason, ConversationRecord, PipelineError, Stage, StageOutcome};

/// How a run that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every stage ran
    Completed,
    /// The named stage stopped the pipeline
    ShortCircuited { stage: &'static str },
}

/// Ordered list of stages.
///
/// Cheap to clone and safe to share between connections; each call to
/// [`Pipeline::execute`] brings its own record.
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Create using the builder
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Add a stage to the end
    pub fn add<S: Stage>(&mut self, stage: S) -> &mut Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the stages in order.
    ///
    /// The record's scope is checked before every stage; a cancelled scope
    /// stops the run with [`PipelineError::Cancelled`] without invoking the
    /// next stage. Stage failures come back wrapped with the stage name.
    pub async fn execute(
        &self,
        record: &mut ConversationRecord,
    ) -> Result<PipelineOutcome, PipelineError> {
        for stage in &self.stages {
            record.scope().check()?;

            let started = Instant::now();
            let result = stage.process(record).await;
            tracing::debug!(
                pipeline = %self.name,
                session_id = %record.session_id(),
                stage = stage.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Stage finished"
            );

            match result {
                Ok(StageOutcome::Continue) => {}
                Ok(StageOutcome::ShortCircuit) => {
                    tracing::debug!(stage = stage.name(), "Pipeline short-circuited");
                    return Ok(PipelineOutcome::ShortCircuited { stage: stage.name() });
                }
                Err(e) if e.is_cancelled() => {
                    let reason = record.scope().reason().unwrap_or(CancelReason::Superseded);
                    return Err(PipelineError::Cancelled(reason));
                }
                Err(e) => {
                    return Err(PipelineError::Stage {
                        stage: stage.name(),
                        source: e,
                    });
                }
            }
        }

        Ok(PipelineOutcome::Completed)
    }
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder {
    pipeline: Pipeline,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            pipeline: Pipeline::new(name),
        }
    }

    pub fn stage<S: Stage>(mut self, stage: S) -> Self {
        self.pipeline.add(stage);
        self
    }

    pub fn build(self) -> Pipeline {
        self.pipeline
    }
}
