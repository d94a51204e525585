//! Voice Assistant Server
//!
//! Websocket and HTTP endpoints for the voice assistant: one
//! [`ConnectionHandler`] per websocket, each with its own interruption
//! controller, all sharing a single conversation pipeline.

pub mod connection;
pub mod frames;
pub mod http;
pub mod interruption;
pub mod metrics;
pub mod state;
pub mod turn;
pub mod websocket;

pub use connection::{ConnectionHandler, TurnInput};
pub use frames::{Decoded, InboundMessage, Outbound, OutboundFrame, Status};
pub use http::create_router;
pub use interruption::InterruptionController;
pub use metrics::{init_metrics, TurnResult};
pub use state::{AppState, KnowledgeServices};
pub use turn::{run_turn, FrameSink};
pub use websocket::WsSink;

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Session not found: {0}")]
    Session(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0} is disabled")]
    Disabled(&'static str),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Session(_) => axum::http::StatusCode::NOT_FOUND,
            ServerError::WebSocket(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Persistence(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::InvalidRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::Disabled(_) => axum::http::StatusCode::NOT_FOUND,
        }
    }
}
