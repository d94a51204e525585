//! Websocket frame formats
//!
//! Inbound text frames are JSON control messages; inbound binary frames are
//! raw audio. Outbound frames are JSON status/result messages plus raw binary
//! for synthesized audio.

use serde::{Deserialize, Serialize};

/// Control message sent by the client as a text frame
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Cancel the current run without starting a new one
    Interrupt,
    /// Text-only turn; recognition is skipped
    Text {
        #[serde(default)]
        text: String,
    },
}

/// Result of decoding one inbound text frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Message(InboundMessage),
    /// Valid JSON with a `type` this server does not handle
    Unsupported(String),
    Malformed(String),
}

impl InboundMessage {
    /// Decode a text frame. The bare string `interrupt` is accepted for older clients.
    pub fn decode(raw: &str) -> Decoded {
        match serde_json::from_str::<InboundMessage>(raw) {
            Ok(message) => Decoded::Message(message),
            Err(err) => match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(value) => {
                    let kind = value
                        .get("type")
                        .and_then(|t| t.as_str())
                        .unwrap_or_default()
                        .to_string();
                    Decoded::Unsupported(kind)
                }
                Err(_) if raw.trim() == "interrupt" => Decoded::Message(InboundMessage::Interrupt),
                Err(_) => Decoded::Malformed(err.to_string()),
            },
        }
    }
}

/// Client-visible state of the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Processing,
    Speaking,
    Idle,
}

/// JSON frame sent to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    State { status: Status },
    SttFinal { text: String },
    LlmReply { text: String },
    Error { error: String },
}

impl OutboundFrame {
    pub fn state(status: Status) -> Self {
        OutboundFrame::State { status }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Anything written to the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(OutboundFrame),
    /// Synthesized audio, sent as one binary frame
    Audio(Vec<u8>),
}

impl From<OutboundFrame> for Outbound {
    fn from(frame: OutboundFrame) -> Self {
        Outbound::Frame(frame)
    }
}
