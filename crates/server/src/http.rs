//! HTTP Endpoints
//!
//! Websocket entry point, health, metrics, session inspection and the
//! knowledge base.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use voice_assistant_core::{Knowledge, KnowledgeStore, Session, SessionStore, MANUAL_SOURCE};

use crate::metrics::metrics_handler;
use crate::state::{AppState, KnowledgeServices};
use crate::websocket::ws_handler;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(&state.config.server.cors_origins, state.config.server.cors_enabled);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/clear", post(clear_session))
        .route("/api/knowledge/record", post(record_knowledge))
        .route("/api/knowledge/list", get(list_knowledge))
        .route("/api/knowledge/search", post(search_knowledge))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - `cors_enabled = false`: no cross-origin access
/// - no origins configured: any origin
/// - otherwise only the parseable configured origins
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        return CorsLayer::new();
    }

    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    tracing::info!("CORS configured with {} origins", parsed.len());
    base.allow_origin(parsed)
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "pipeline": state.pipeline.stage_names(),
        "sessions": state.sessions.count(),
        "available_connections": state.connections.available_permits(),
    }))
}

#[derive(Debug, Serialize)]
struct SessionSummary {
    id: String,
    message_count: usize,
    has_summary: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            message_count: session.messages.len(),
            has_summary: session.summary.is_some(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

/// List sessions, most recently updated first
async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let sessions = state
        .sessions
        .list()
        .await
        .map_err(|e| ServerError::Persistence(e.to_string()))?;
    let summaries: Vec<SessionSummary> = sessions.iter().map(SessionSummary::from).collect();

    Ok(Json(serde_json::json!({
        "count": summaries.len(),
        "sessions": summaries,
    })))
}

/// Full session, including messages and the rolling summary
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, StatusCode> {
    let session = state
        .sessions
        .get(&id)
        .await
        .map_err(|e| ServerError::Persistence(e.to_string()))?
        .ok_or_else(|| ServerError::Session(id))?;
    Ok(Json(session))
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    match state.sessions.delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => {
            tracing::error!(session_id = %id, error = %e, "Failed to delete session");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Drop a session's history but keep the session
async fn clear_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let found = state
        .sessions
        .clear(&id)
        .await
        .map_err(|e| ServerError::Persistence(e.to_string()))?;
    if !found {
        return Err(ServerError::Session(id).into());
    }
    tracing::info!(session_id = %id, "Session history cleared");
    Ok(StatusCode::NO_CONTENT)
}

/// Keyword results returned when the request gives no limit
const DEFAULT_SEARCH_LIMIT: usize = 10;

fn knowledge_services(state: &AppState) -> Result<&KnowledgeServices, ServerError> {
    state.knowledge.as_ref().ok_or(ServerError::Disabled("knowledge base"))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RecordKnowledgeRequest {
    text: String,
    #[serde(default)]
    session_id: String,
    #[serde(default = "default_true")]
    auto_organize: bool,
}

/// Save a note typed or dictated outside a conversation
async fn record_knowledge(
    State(state): State<AppState>,
    Json(request): Json<RecordKnowledgeRequest>,
) -> Result<Json<Knowledge>, StatusCode> {
    let knowledge = knowledge_services(&state)?;
    let text = request.text.trim();
    if text.is_empty() {
        return Err(ServerError::InvalidRequest("text is empty".to_string()).into());
    }

    let saved = knowledge
        .worker
        .record(&request.session_id, text.to_string(), MANUAL_SOURCE, request.auto_organize)
        .await
        .map_err(|e| ServerError::Persistence(e.to_string()))?;
    tracing::info!(knowledge_id = %saved.id, category = %saved.category, "Knowledge recorded");
    Ok(Json(saved))
}

#[derive(Debug, Default, Deserialize)]
struct ListKnowledgeQuery {
    category: Option<String>,
}

/// Newest first, optionally narrowed to one category
async fn list_knowledge(
    State(state): State<AppState>,
    Query(query): Query<ListKnowledgeQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let knowledge = knowledge_services(&state)?;
    let mut records = knowledge
        .store
        .list()
        .await
        .map_err(|e| ServerError::Persistence(e.to_string()))?;
    if let Some(category) = query.category.filter(|c| !c.is_empty()) {
        records.retain(|k| k.category == category);
    }

    Ok(Json(serde_json::json!({
        "count": records.len(),
        "knowledge": records,
    })))
}

#[derive(Debug, Deserialize)]
struct SearchKnowledgeRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct KnowledgeHit {
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f32>,
    knowledge: Knowledge,
}

/// Semantic search when retrieval is configured, keyword search otherwise
async fn search_knowledge(
    State(state): State<AppState>,
    Json(request): Json<SearchKnowledgeRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let knowledge = knowledge_services(&state)?;
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ServerError::InvalidRequest("query is empty".to_string()).into());
    }
    let limit = request.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);

    let records = knowledge
        .store
        .list()
        .await
        .map_err(|e| ServerError::Persistence(e.to_string()))?;

    let semantic = match &knowledge.retriever {
        Some(retriever) => match retriever.retrieve(query).await {
            Ok(found) => Some(
                found
                    .into_iter()
                    .filter_map(|hit| {
                        let record = records.iter().find(|k| k.id == hit.id)?;
                        Some(KnowledgeHit {
                            score: Some(hit.score),
                            knowledge: record.clone(),
                        })
                    })
                    .take(limit)
                    .collect::<Vec<_>>(),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Semantic search failed, falling back to keywords");
                None
            }
        },
        None => None,
    };

    let (mode, hits) = match semantic {
        Some(hits) => ("semantic", hits),
        None => (
            "keyword",
            records
                .into_iter()
                .filter(|k| k.matches(query))
                .take(limit)
                .map(|knowledge| KnowledgeHit {
                    score: None,
                    knowledge,
                })
                .collect(),
        ),
    };

    Ok(Json(serde_json::json!({
        "query": query,
        "mode": mode,
        "count": hits.len(),
        "results": hits,
    })))
}
