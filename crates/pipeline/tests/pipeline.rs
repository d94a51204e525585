//! Executor behavior: ordering, short-circuit, cancellation and error wrapping

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use voice_assistant_core::{Error, Result};
use voice_assistant_pipeline::{
    CancelReason, CancellationHandle, CancellationScope, ConversationRecord, Pipeline,
    PipelineError, PipelineOutcome, Stage, StageOutcome,
};

/// Records its name into a shared log and returns a scripted outcome
struct Scripted {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
    outcome: fn() -> Result<StageOutcome>,
}

#[async_trait]
impl Stage for Scripted {
    async fn process(&self, record: &mut ConversationRecord) -> Result<StageOutcome> {
        self.log.lock().push(self.name);
        record.append_reply(self.name);
        (self.outcome)()
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

fn scripted(
    name: &'static str,
    log: &Arc<Mutex<Vec<&'static str>>>,
    outcome: fn() -> Result<StageOutcome>,
) -> Scripted {
    Scripted {
        name,
        log: log.clone(),
        outcome,
    }
}

fn cont() -> Result<StageOutcome> {
    Ok(StageOutcome::Continue)
}

fn stop() -> Result<StageOutcome> {
    Ok(StageOutcome::ShortCircuit)
}

fn fail() -> Result<StageOutcome> {
    Err(Error::Llm("upstream unreachable".to_string()))
}

/// Cancels the run's owner from inside a stage
struct CancelsOwner {
    handle: Arc<CancellationHandle>,
}

#[async_trait]
impl Stage for CancelsOwner {
    async fn process(&self, _record: &mut ConversationRecord) -> Result<StageOutcome> {
        self.handle.cancel(CancelReason::Superseded);
        Ok(StageOutcome::Continue)
    }

    fn name(&self) -> &'static str {
        "cancels_owner"
    }
}

fn record() -> ConversationRecord {
    ConversationRecord::from_text(CancellationScope::detached(), "session", "hello")
}

#[tokio::test]
async fn runs_all_stages_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::builder("test")
        .stage(scripted("a", &log, cont))
        .stage(scripted("b", &log, cont))
        .stage(scripted("c", &log, cont))
        .build();

    let mut record = record();
    let outcome = pipeline.execute(&mut record).await.unwrap();

    assert_eq!(outcome, PipelineOutcome::Completed);
    assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    assert_eq!(record.model_reply(), "abc");
    assert_eq!(pipeline.stage_names(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn short_circuit_stops_without_error() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::builder("test")
        .stage(scripted("a", &log, cont))
        .stage(scripted("intent", &log, stop))
        .stage(scripted("generation", &log, cont))
        .build();

    let outcome = pipeline.execute(&mut record()).await.unwrap();

    assert_eq!(outcome, PipelineOutcome::ShortCircuited { stage: "intent" });
    assert_eq!(*log.lock(), vec!["a", "intent"]);
}

#[tokio::test]
async fn stage_error_is_wrapped_with_name() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::builder("test")
        .stage(scripted("generation", &log, fail))
        .stage(scripted("after", &log, cont))
        .build();

    let err = pipeline.execute(&mut record()).await.unwrap_err();

    match &err {
        PipelineError::Stage { stage, .. } => assert_eq!(*stage, "generation"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("generation"));
    assert!(err.to_string().contains("upstream unreachable"));
    assert_eq!(*log.lock(), vec!["generation"]);
}

#[tokio::test]
async fn cancelled_scope_skips_first_stage() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::builder("test")
        .stage(scripted("a", &log, cont))
        .build();

    let handle = CancellationHandle::new();
    handle.cancel(CancelReason::Interrupted);
    let mut record = ConversationRecord::from_text(handle.scope(), "session", "hello");

    let err = pipeline.execute(&mut record).await.unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled(CancelReason::Interrupted)));
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn cancellation_is_observed_at_next_boundary() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let handle = Arc::new(CancellationHandle::new());
    let pipeline = Pipeline::builder("test")
        .stage(scripted("a", &log, cont))
        .stage(CancelsOwner {
            handle: handle.clone(),
        })
        .stage(scripted("never", &log, cont))
        .build();

    let mut record = ConversationRecord::from_text(handle.scope(), "session", "hello");
    let err = pipeline.execute(&mut record).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(*log.lock(), vec!["a"]);
}

#[tokio::test]
async fn cancelled_stage_error_is_not_wrapped() {
    struct Aborts;

    #[async_trait]
    impl Stage for Aborts {
        async fn process(&self, _record: &mut ConversationRecord) -> Result<StageOutcome> {
            Err(Error::Cancelled("mid-stream".to_string()))
        }

        fn name(&self) -> &'static str {
            "aborts"
        }
    }

    let pipeline = Pipeline::builder("test").stage(Aborts).build();
    let err = pipeline.execute(&mut record()).await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn one_pipeline_serves_concurrent_runs() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Arc::new(
        Pipeline::builder("shared")
            .stage(scripted("a", &log, cont))
            .stage(scripted("b", &log, cont))
            .build(),
    );

    let mut tasks = Vec::new();
    for i in 0..8 {
        let pipeline = pipeline.clone();
        tasks.push(tokio::spawn(async move {
            let mut record = ConversationRecord::from_text(
                CancellationScope::detached(),
                format!("session-{i}"),
                "hi",
            );
            pipeline.execute(&mut record).await.map(|_| record.model_reply().to_string())
        }));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), "ab");
    }
    assert_eq!(log.lock().len(), 16);
}

#[tokio::test]
async fn empty_pipeline_completes() {
    let pipeline = Pipeline::new("empty");
    assert!(pipeline.is_empty());
    assert_eq!(
        pipeline.execute(&mut record()).await.unwrap(),
        PipelineOutcome::Completed
    );
}
