//! Socket protocol: one JSON object per text frame, discriminated by `type`.
//!
//! Inbound frames parse into a closed [`ClientMessage`] enum. Anything that
//! fails to parse or lacks a required field becomes a [`ProtocolError`] for
//! the socket boundary to log and drop. Unrecognized `type` values parse to
//! [`ClientMessage::Unknown`] and are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{normalize_room_code, ItemId, Match, Room};

/// Errors produced while decoding an inbound frame
#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomMessage {
    pub room_name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckRoomMessage {
    pub room_code: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinMessage {
    pub room_id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub preferences: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LikedMovieMessage {
    pub movie_id: ItemId,
    pub user_id: String,
    pub room_id: String,
}

/// Client → service messages
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    CreateRoom(CreateRoomMessage),
    CheckRoom(CheckRoomMessage),
    Join(JoinMessage),
    LikedMovie(LikedMovieMessage),
    #[serde(other)]
    Unknown,
}

fn required(value: &str, field: &'static str) -> Result<(), ProtocolError> {
    if value.trim().is_empty() {
        return Err(ProtocolError::MissingField(field));
    }
    Ok(())
}

impl ClientMessage {
    /// Decodes one text frame, rejecting empty required fields and
    /// upper-casing room codes
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let message: ClientMessage = serde_json::from_str(text)?;
        message.validated()
    }

    fn validated(self) -> Result<Self, ProtocolError> {
        Ok(match self {
            ClientMessage::CreateRoom(msg) => {
                required(&msg.room_name, "roomName")?;
                ClientMessage::CreateRoom(msg)
            }
            ClientMessage::CheckRoom(msg) => {
                required(&msg.room_code, "roomCode")?;
                ClientMessage::CheckRoom(CheckRoomMessage {
                    room_code: normalize_room_code(&msg.room_code),
                })
            }
            ClientMessage::Join(msg) => {
                required(&msg.room_id, "roomId")?;
                required(&msg.user_id, "userId")?;
                required(&msg.user_name, "userName")?;
                ClientMessage::Join(JoinMessage {
                    room_id: normalize_room_code(&msg.room_id),
                    ..msg
                })
            }
            ClientMessage::LikedMovie(msg) => {
                required(&msg.user_id, "userId")?;
                required(&msg.room_id, "roomId")?;
                ClientMessage::LikedMovie(LikedMovieMessage {
                    room_id: normalize_room_code(&msg.room_id),
                    ..msg
                })
            }
            ClientMessage::Unknown => ClientMessage::Unknown,
        })
    }
}

/// Public view of a room; `code` repeats `id` for clients that show it
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    pub code: String,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.clone(),
            name: room.name.clone(),
            code: room.id.clone(),
        }
    }
}

/// Service → client messages
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    RoomCreated {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        room: Option<RoomSummary>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    RoomChecked {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        room: Option<RoomSummary>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Joined {
        #[serde(rename = "roomId")]
        room_id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Match {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "match")]
        record: Match,
    },
}

impl ServerMessage {
    pub fn room_created(result: Result<&Room, String>) -> Self {
        match result {
            Ok(room) => ServerMessage::RoomCreated {
                success: true,
                room: Some(room.into()),
                error: None,
            },
            Err(error) => ServerMessage::RoomCreated {
                success: false,
                room: None,
                error: Some(error),
            },
        }
    }

    pub fn room_checked(room: Option<&Room>) -> Self {
        match room {
            Some(room) => ServerMessage::RoomChecked {
                success: true,
                room: Some(room.into()),
                error: None,
            },
            None => ServerMessage::RoomChecked {
                success: false,
                room: None,
                error: Some("Room not found".to_string()),
            },
        }
    }

    pub fn joined(room_id: &str, result: Result<(), String>) -> Self {
        ServerMessage::Joined {
            room_id: room_id.to_string(),
            success: result.is_ok(),
            error: result.err(),
        }
    }
}
