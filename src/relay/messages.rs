use std::collections::HashMap;

use serde::Serialize;
use serde_json::value::RawValue;
use thiserror::Error;

use super::types::{OutboundMessage, RoomId};

/// Reasons an inbound frame is discarded
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame has no type")]
    MissingType,

    #[error("frame type is not a string")]
    InvalidType,

    #[error("unknown frame type: {0}")]
    UnknownType(String),

    #[error("{kind} frame is missing {field}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("roomId is not a string")]
    InvalidRoomId,

    /// Valid JSON string with an escape Rust strings cannot hold (lone surrogate)
    #[error("roomId is not valid Unicode")]
    RoomIdNotUnicode,

    #[error("roomId is empty")]
    EmptyRoomId,
}

/// Messages sent from client to relay
#[derive(Debug)]
pub enum ClientMessage {
    /// Join a room, leaving the current one
    Join { room_id: RoomId },

    /// Opaque payload for the other members of the current room
    Msg { payload: Box<RawValue> },
}

impl ClientMessage {
    /// Parse one inbound frame.
    ///
    /// Fields are kept as raw JSON so that `payload` can be relayed exactly as
    /// it was received. Unknown fields are ignored.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let mut fields: HashMap<String, Box<RawValue>> = serde_json::from_str(text)?;

        let kind = fields.remove("type").ok_or(FrameError::MissingType)?;
        let kind: String =
            serde_json::from_str(kind.get()).map_err(|_| FrameError::InvalidType)?;

        match kind.as_str() {
            "join" => {
                let raw = fields.remove("roomId").ok_or(FrameError::MissingField {
                    kind: "join",
                    field: "roomId",
                })?;
                let room_id: RoomId = serde_json::from_str(raw.get()).map_err(|_| {
                    if raw.get().starts_with('"') {
                        FrameError::RoomIdNotUnicode
                    } else {
                        FrameError::InvalidRoomId
                    }
                })?;
                if room_id.is_empty() {
                    return Err(FrameError::EmptyRoomId);
                }
                Ok(ClientMessage::Join { room_id })
            }
            "msg" => {
                let payload = fields.remove("payload").ok_or(FrameError::MissingField {
                    kind: "msg",
                    field: "payload",
                })?;
                Ok(ClientMessage::Msg { payload })
            }
            _ => Err(FrameError::UnknownType(kind)),
        }
    }
}

/// Messages sent from relay to client
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Acknowledges a join, sent to the joiner only
    #[serde(rename = "joined")]
    Joined {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },

    /// Relayed payload, sent to every other member of the room
    #[serde(rename = "msg")]
    Msg { payload: Box<RawValue> },
}

impl ServerMessage {
    pub fn encode(&self) -> Result<OutboundMessage, serde_json::Error> {
        serde_json::to_string(self).map(OutboundMessage::from)
    }
}
