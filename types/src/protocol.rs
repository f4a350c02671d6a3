//! Client wire protocol: JSON frames over a bidirectional stream.

use crate::records::PlayerState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "HELLO")]
    Hello {
        #[serde(default)]
        player_id: Option<String>,
    },
    #[serde(rename = "READY_UP")]
    ReadyUp,
    #[serde(rename = "UNREADY")]
    Unready,
    #[serde(rename = "HEARTBEAT")]
    Heartbeat,
    #[serde(rename = "LEAVE")]
    Leave,
}

/// Frames the server may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "WELCOME")]
    Welcome { player_id: String },
    #[serde(rename = "STATE")]
    State { state: PlayerState },
    #[serde(rename = "MATCH_FOUND")]
    MatchFound { game_id: String, session_id: String },
    #[serde(rename = "MATCH_ENDED")]
    MatchEnded { game_id: String, session_id: String },
    #[serde(rename = "ERROR")]
    Error { code: String, message: String },
}

impl ServerFrame {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Why an inbound frame was rejected. Unknown types are distinguished from
/// malformed JSON so the gateway can answer with the right error code.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

impl FrameError {
    pub fn code(&self) -> &'static str {
        match self {
            FrameError::Malformed(_) => "MALFORMED",
            FrameError::UnknownType(_) => "UNKNOWN",
        }
    }
}

impl ClientFrame {
    /// Parse a raw text frame, classifying failures.
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|err| FrameError::Malformed(err.to_string()))?;
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| FrameError::Malformed("missing type field".to_string()))?
            .to_string();
        match serde_json::from_value::<ClientFrame>(value) {
            Ok(frame) => Ok(frame),
            Err(err) => {
                if matches!(
                    kind.as_str(),
                    "HELLO" | "READY_UP" | "UNREADY" | "HEARTBEAT" | "LEAVE"
                ) {
                    Err(FrameError::Malformed(err.to_string()))
                } else {
                    Err(FrameError::UnknownType(kind))
                }
            }
        }
    }
}
