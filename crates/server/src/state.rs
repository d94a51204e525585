//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::{watch, Semaphore};
use voice_assistant_agent::KnowledgeWorker;
use voice_assistant_config::Settings;
use voice_assistant_core::KnowledgeStore;
use voice_assistant_persistence::JsonSessionStore;
use voice_assistant_pipeline::Pipeline;
use voice_assistant_rag::KnowledgeRetriever;

/// Knowledge base behind `/api/knowledge`
#[derive(Clone)]
pub struct KnowledgeServices {
    pub store: Arc<dyn KnowledgeStore>,
    pub worker: KnowledgeWorker,
    /// Semantic search; keyword search is used without it
    pub retriever: Option<Arc<KnowledgeRetriever>>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    /// Shared by every connection; each run brings its own record
    pub pipeline: Arc<Pipeline>,
    pub sessions: Arc<JsonSessionStore>,
    /// One permit per open websocket, sized by `server.max_connections`
    pub connections: Arc<Semaphore>,
    /// `None` when metrics are disabled
    pub metrics: Option<PrometheusHandle>,
    /// `None` when no knowledge store is configured
    pub knowledge: Option<KnowledgeServices>,
    /// Flips to `true` when the server starts shutting down
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(
        config: Settings,
        pipeline: Pipeline,
        sessions: Arc<JsonSessionStore>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            connections: Arc::new(Semaphore::new(config.server.max_connections)),
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            sessions,
            metrics: None,
            knowledge: None,
            shutdown,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn with_knowledge(mut self, knowledge: KnowledgeServices) -> Self {
        self.knowledge = Some(knowledge);
        self
    }
}
