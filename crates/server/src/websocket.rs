//! WebSocket Handler
//!
//! Adapts an axum websocket to the [`ConnectionHandler`]: text frames are
//! control messages, binary frames are audio, and every outbound write goes
//! through [`WsSink`].

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{Mutex, OwnedSemaphorePermit};
use voice_assistant_pipeline::{CancelReason, CancellationScope};

use crate::connection::ConnectionHandler;
use crate::frames::Outbound;
use crate::metrics::{record_connection_closed, record_connection_opened};
use crate::state::AppState;
use crate::turn::FrameSink;
use crate::ServerError;

/// Write half of a websocket, shared by the read loop and every run
pub struct WsSink {
    sender: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsSink {
    pub fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }

    async fn pong(&self, payload: Vec<u8>) -> Result<(), ServerError> {
        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Pong(payload))
            .await
            .map_err(|e| ServerError::WebSocket(e.to_string()))
    }

    async fn close(&self) -> Result<(), ServerError> {
        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Close(None))
            .await
            .map_err(|e| ServerError::WebSocket(e.to_string()))
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn deliver(&self, scope: &CancellationScope, item: Outbound) -> Result<bool, ServerError> {
        let message = match item {
            Outbound::Frame(frame) => Message::Text(
                frame
                    .to_json()
                    .map_err(|e| ServerError::Internal(e.to_string()))?,
            ),
            Outbound::Audio(audio) => Message::Binary(audio),
        };

        let mut sender = self.sender.lock().await;
        if scope.is_cancelled() {
            return Ok(false);
        }
        sender
            .send(message)
            .await
            .map_err(|e| ServerError::WebSocket(e.to_string()))?;
        Ok(true)
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub session_id: Option<String>,
}

/// `GET /ws?session_id=…`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
) -> Response {
    let Ok(permit) = state.connections.clone().try_acquire_owned() else {
        tracing::warn!("Connection limit reached, rejecting websocket");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let session_id = params
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(default_session_id);

    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id, permit))
}

fn default_session_id() -> String {
    format!("sess_{}", chrono::Utc::now().timestamp())
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    session_id: String,
    _permit: OwnedSemaphorePermit,
) {
    if let Err(e) = state.sessions.get_or_create(&session_id).await {
        tracing::warn!(session_id = %session_id, error = %e, "Failed to create session");
    }

    let (sender, mut receiver) = socket.split();
    let sink = Arc::new(WsSink::new(sender));
    let handler = ConnectionHandler::new(session_id.clone(), state.pipeline.clone(), sink.clone());

    record_connection_opened();
    tracing::info!(session_id = %session_id, "WebSocket connected");

    let mut shutdown = state.shutdown.clone();
    let reason = loop {
        if *shutdown.borrow() {
            break CancelReason::Shutdown;
        }
        let msg = tokio::select! {
            msg = receiver.next() => msg,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break CancelReason::Shutdown;
                }
                continue;
            }
        };

        match msg {
            Some(Ok(Message::Text(text))) => {
                handler.on_text(&text).await;
            }
            Some(Ok(Message::Binary(data))) => {
                handler.on_audio(data);
            }
            Some(Ok(Message::Ping(payload))) => {
                if let Err(e) = sink.pong(payload).await {
                    tracing::debug!(session_id = %session_id, error = %e, "Pong failed");
                    break CancelReason::ConnectionClosed;
                }
            }
            Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) | None => break CancelReason::ConnectionClosed,
            Some(Err(e)) => {
                tracing::warn!(session_id = %session_id, error = %e, "WebSocket error");
                break CancelReason::ConnectionClosed;
            }
        }
    };

    handler.close(reason);
    if reason == CancelReason::Shutdown {
        let _ = sink.close().await;
    }
    record_connection_closed();
    tracing::info!(session_id = %session_id, "WebSocket closed");
}
