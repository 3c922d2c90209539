//! Wire event types for the realtime chat channel
//!
//! Every frame is `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::constants::{
    EVENT_CHAT_MESSAGES, EVENT_CHAT_REVOKE, EVENT_ERROR, EVENT_ROOM_JOIN, EVENT_ROOM_LEAVE,
    EVENT_ROOM_MESSAGE, EVENT_ROOM_REVOKE,
};
use crate::core::message::ChatUser;
use crate::error::{LiveChatError, Result};

/// Client-to-server events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Subscribe to a room and receive its recent history
    #[serde(rename = "chatroom.join")]
    JoinRoom { chat_room_identifier: String },

    /// Unsubscribe from a room
    #[serde(rename = "chatroom.leave")]
    LeaveRoom { chat_room_identifier: String },

    /// Send a chat message to a room
    #[serde(rename = "chatroom.message")]
    RoomMessage {
        chat_room_identifier: String,
        message: String,
        #[serde(default)]
        user: ChatUser,
    },

    /// Retract a message from the room history and all live displays
    #[serde(rename = "chatroom.revoke-message")]
    RevokeMessage {
        chat_room_identifier: String,
        message_id: String,
    },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => EVENT_ROOM_JOIN,
            Self::LeaveRoom { .. } => EVENT_ROOM_LEAVE,
            Self::RoomMessage { .. } => EVENT_ROOM_MESSAGE,
            Self::RevokeMessage { .. } => EVENT_ROOM_REVOKE,
        }
    }

    pub fn room_identifier(&self) -> &str {
        match self {
            Self::JoinRoom { chat_room_identifier }
            | Self::LeaveRoom { chat_room_identifier }
            | Self::RoomMessage { chat_room_identifier, .. }
            | Self::RevokeMessage { chat_room_identifier, .. } => chat_room_identifier,
        }
    }
}

/// Server-to-client events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// History snapshot on join, or a single live message
    #[serde(rename = "chat.messages")]
    Messages(Vec<MessagePayload>),

    /// A message was retracted
    #[serde(rename = "chat.revoke-message")]
    RevokeMessage { id: String },

    /// Error for the initiating connection only
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl ServerEvent {
    pub fn from_error(err: &LiveChatError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Messages(_) => EVENT_CHAT_MESSAGES,
            Self::RevokeMessage { .. } => EVENT_CHAT_REVOKE,
            Self::Error { .. } => EVENT_ERROR,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(LiveChatError::from)
    }
}

/// Message as displayed by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: String,
    pub username: String,
    pub photo_url: Option<String>,
    pub message: String,
}
