//! Prometheus metrics
//!
//! Counters and histograms are recorded through the `metrics` facade and
//! rendered by the Prometheus recorder installed at startup.

use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

/// How a run ended, as reported in metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnResult {
    Completed,
    /// Ended quietly (empty transcript, admin command, empty reply)
    ShortCircuited,
    Failed,
    Cancelled,
    /// The connection's write side failed mid-run
    Disconnected,
}

impl TurnResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnResult::Completed => "completed",
            TurnResult::ShortCircuited => "short_circuited",
            TurnResult::Failed => "failed",
            TurnResult::Cancelled => "cancelled",
            TurnResult::Disconnected => "disconnected",
        }
    }
}

/// Install the global Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub fn record_turn(result: TurnResult, elapsed: Duration) {
    counter!("voice_assistant_turns_total", "result" => result.as_str()).increment(1);
    if !matches!(result, TurnResult::Cancelled | TurnResult::Disconnected) {
        histogram!("voice_assistant_turn_seconds").record(elapsed.as_secs_f64());
    }
}

pub fn record_stage_failure(stage: &'static str) {
    counter!("voice_assistant_stage_failures_total", "stage" => stage).increment(1);
}

pub fn record_interrupt() {
    counter!("voice_assistant_interrupts_total").increment(1);
}

pub fn record_connection_opened() {
    counter!("voice_assistant_connections_total").increment(1);
    gauge!("voice_assistant_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    gauge!("voice_assistant_active_connections").decrement(1.0);
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}
