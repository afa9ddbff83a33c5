//! Wire messages for both network variants.
//!
//! Peer games exchange [`PeerMessage`] as one JSON object per line. Server
//! games carry [`Action`] from client to server and [`GameStateUpdate`]
//! snapshots back, bincode-encoded in length-prefixed frames.

use serde::{Deserialize, Serialize};

use crate::common::ShotOutcome;
pub use crate::snapshot::{BoardView, GameStateUpdate, ShipView};

/// Errors decoding a message body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("unrecognized message type `{0}`")]
    UnknownType(String),
}

/// A message body that can travel in one frame.
pub trait Frame: Sized + Send + 'static {
    fn encode(&self) -> Result<Vec<u8>, ProtocolError>;
    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError>;
}

/// Seat named relative to the sender of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The sender.
    Player,
    /// The receiver.
    Opponent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireResult {
    Hit,
    Miss,
    Sunk,
}

impl WireResult {
    /// Sunk sizes are not carried on the wire; the receiving board recovers
    /// them from the revealed cells.
    pub fn outcome(self) -> ShotOutcome {
        match self {
            WireResult::Hit => ShotOutcome::Hit,
            WireResult::Miss => ShotOutcome::Miss,
            WireResult::Sunk => ShotOutcome::Sunk { size: 0 },
        }
    }
}

impl From<ShotOutcome> for WireResult {
    fn from(outcome: ShotOutcome) -> Self {
        match outcome {
            ShotOutcome::Hit => WireResult::Hit,
            ShotOutcome::Miss => WireResult::Miss,
            ShotOutcome::Sunk { .. } => WireResult::Sunk,
        }
    }
}

/// Peer-to-peer message, serialized as `{"type": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerMessage {
    Shot { row: usize, col: usize },
    ShotResult { result: WireResult, row: usize, col: usize },
    TurnChange { next_player: Side },
    GameStart { host_starts: bool },
    GameOver { winner: Side },
    Ready,
    Chat { text: String },
}

const PEER_TYPES: [&str; 7] = [
    "shot",
    "shot_result",
    "turn_change",
    "game_start",
    "game_over",
    "ready",
    "chat",
];

impl Frame for PeerMessage {
    fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ProtocolError::Malformed("missing `type` field".into()))?;
        if !PEER_TYPES.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_string()));
        }
        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// Client request in the server variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    PlaceShip {
        ship: usize,
        row: usize,
        col: usize,
        horizontal: bool,
    },
    PlayerReady,
    FireShot { row: usize, col: usize },
    ChatMessage { text: String },
}

fn bincode_encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serialize(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

fn bincode_decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    bincode::deserialize(bytes).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

impl Frame for Action {
    fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode_encode(self)
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        bincode_decode(bytes)
    }
}

impl Frame for GameStateUpdate {
    fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode_encode(self)
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        bincode_decode(bytes)
    }
}
