//! Gateway WebSocket event protocol (sendMessage, receiveMessage, error).

use serde::{Deserialize, Serialize};

/// Inbound client event carrying a message to relay.
pub const SEND_MESSAGE: &str = "sendMessage";
/// Outbound event carrying the completion reply.
pub const RECEIVE_MESSAGE: &str = "receiveMessage";
/// Outbound event reporting a failed relay.
pub const ERROR_EVENT: &str = "error";

/// Wire frame: `{ "event", "payload" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsEvent {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Payload for sendMessage and receiveMessage: `{ "text" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub text: String,
}

/// Payload for error events: `{ "kind", "message" }`. `kind` is a stable tag
/// ("network", "timeout", "malformed", "status"); `message` is human-readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

impl WsEvent {
    /// Build a receiveMessage frame for a completed relay.
    pub fn receive_message(text: impl Into<String>) -> Self {
        Self {
            event: RECEIVE_MESSAGE.to_string(),
            payload: serde_json::to_value(MessagePayload { text: text.into() })
                .unwrap_or_default(),
        }
    }

    /// Build an error frame for a failed relay.
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event: ERROR_EVENT.to_string(),
            payload: serde_json::to_value(ErrorPayload {
                kind: kind.into(),
                message: message.into(),
            })
            .unwrap_or_default(),
        }
    }

    /// Serialize to a wire string for the socket.
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"event":"error","payload":{}}"#.to_string())
    }
}
