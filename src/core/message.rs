use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::message_types::MessagePayload;

/// Who sent a message: not an authenticated account, just the identifying
/// fields moderation can match on. Either half may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUserIdentity {
    pub username: Option<String>,
    pub ip_address: Option<String>,
}

impl ChatUserIdentity {
    /// Build an identity, treating blank fields as absent
    pub fn new(username: Option<String>, ip_address: Option<String>) -> Self {
        Self {
            username: non_blank(username),
            ip_address: non_blank(ip_address),
        }
    }

    pub fn from_username(username: impl Into<String>) -> Self {
        Self::new(Some(username.into()), None)
    }

    pub fn from_ip(ip_address: impl Into<String>) -> Self {
        Self::new(None, Some(ip_address.into()))
    }

    /// True when neither field is usable for moderation
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.ip_address.is_none()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Display profile sent along with a chat message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Deterministic message identifiers
pub struct MessageId;

impl MessageId {
    /// Hex SHA-256 over the sender identity, the text and the receipt instant
    pub fn derive(identity: &ChatUserIdentity, text: &str, received_at: DateTime<Utc>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(identity.username.as_deref().unwrap_or("").as_bytes());
        hasher.update([0u8]);
        hasher.update(identity.ip_address.as_deref().unwrap_or("").as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
        let nanos = received_at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| received_at.timestamp_micros().saturating_mul(1000));
        hasher.update(nanos.to_be_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A chat message accepted for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub room_id: u64,
    pub sender: ChatUserIdentity,
    pub username: String,
    pub photo_url: Option<String>,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a message and derive its identifier
    pub fn new(room_id: u64, sender: ChatUserIdentity, user: ChatUser, text: String) -> Self {
        let received_at = Utc::now();
        let id = MessageId::derive(&sender, &text, received_at);
        Self {
            id,
            room_id,
            sender,
            username: user.username,
            photo_url: user.photo_url,
            text,
            received_at,
        }
    }

    /// Client-facing shape of this message
    pub fn payload(&self) -> MessagePayload {
        MessagePayload {
            id: self.id.clone(),
            username: self.username.clone(),
            photo_url: self.photo_url.clone(),
            message: self.text.clone(),
        }
    }
}
