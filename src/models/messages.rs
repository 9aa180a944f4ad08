use actix::Message;
use serde::{Deserialize, Serialize};

use crate::game::{Move, Status, Stone};
use crate::models::SessionId;

/// Message sent from client to server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Handshake {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
    FetchState,
    Move {
        /// Kept loose so a non-numeric coordinate is reported as such
        /// instead of as a malformed message.
        x: serde_json::Value,
        y: serde_json::Value,
        #[serde(rename = "claimedSequenceNumber")]
        claimed_sequence_number: u64,
    },
}

/// Numeric value of a wire coordinate; NaN when it is not a number.
pub fn coordinate(value: &serde_json::Value) -> f64 {
    value.as_f64().unwrap_or(f64::NAN)
}

/// Bounding box of the stones on the board.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Extent {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl From<(i64, i64, i64, i64)> for Extent {
    fn from((min_x, min_y, max_x, max_y): (i64, i64, i64, i64)) -> Self {
        Extent {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

/// Full state of a game as pushed to every watcher.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub player1: Option<String>,
    pub player2: Option<String>,
    pub status: Status,
    pub moves: Vec<Move>,
    pub next_sequence_number: u64,
    pub next_color: Stone,
    pub extent: Option<Extent>,
}

/// Message sent from server to client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    HandshakeResponse {
        /// `None` for spectators.
        color: Option<Stone>,
        status: Status,
    },
    Update(Snapshot),
    Error {
        reason: String,
    },
}

impl ServerMessage {
    pub fn error(reason: impl Into<String>) -> Self {
        ServerMessage::Error {
            reason: reason.into(),
        }
    }
}

/// Serialized server message queued for delivery on one connection
#[derive(Message)]
#[rtype(result = "()")]
pub struct Outbound(pub String);
