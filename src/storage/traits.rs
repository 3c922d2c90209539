//! Collaborator interfaces for room lookup and moderation state
//!
//! The relational store behind these traits is outside this crate; the
//! server only needs the narrow lookup/insert/update operations below.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::message::ChatUserIdentity;
use crate::error::Result;

/// A chat room as seen by the realtime layer. Never mutated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: u64,
    pub organization_id: u64,
    /// Stable external key, e.g. the stream slug
    pub identifier: String,
    #[serde(default)]
    pub title: String,
}

/// An organization-scoped restriction on a sender identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuteRecord {
    pub id: u64,
    pub organization_id: u64,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    /// None means permanent
    pub until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Soft-delete marker set by unmute
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MuteRecord {
    /// Not revoked and not yet expired
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.deleted_at.is_none() && self.until.map_or(true, |until| until > now)
    }

    /// Username (case-insensitive) or IP match. Absent fields never match.
    pub fn matches_identity(&self, identity: &ChatUserIdentity) -> bool {
        let username_match = match (&self.username, &identity.username) {
            (Some(recorded), Some(candidate)) => recorded.eq_ignore_ascii_case(candidate),
            _ => false,
        };
        let ip_match = match (&self.ip_address, &identity.ip_address) {
            (Some(recorded), Some(candidate)) => recorded == candidate,
            _ => false,
        };
        username_match || ip_match
    }
}

/// What happens to a sender whose message trips a banned-word rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Consequence {
    PermanentBan,
    TemporaryMute { seconds: u64 },
}

impl Consequence {
    /// Expiry of the mute this consequence produces
    pub fn mute_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::PermanentBan => None,
            Self::TemporaryMute { seconds } => {
                let seconds = i64::try_from(*seconds).unwrap_or(i64::MAX);
                Some(
                    Duration::try_seconds(seconds)
                        .and_then(|d| now.checked_add_signed(d))
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                )
            }
        }
    }
}

/// A platform-wide (no organization) or organization-scoped phrase trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannedWordRule {
    pub id: u64,
    pub organization_id: Option<u64>,
    pub word: String,
    pub consequence: Consequence,
}

impl BannedWordRule {
    pub fn is_platform_wide(&self) -> bool {
        self.organization_id.is_none()
    }

    /// Case-insensitive substring containment. `lowered_text` must already be lowercase.
    pub fn matches(&self, lowered_text: &str) -> bool {
        let phrase = self.word.trim().to_lowercase();
        !phrase.is_empty() && lowered_text.contains(&phrase)
    }
}

/// Room lookup interface
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Find a live room by its external identifier
    async fn get_room_by_identifier(&self, identifier: &str) -> Result<Option<ChatRoom>>;
}

/// Mute record storage interface
#[async_trait]
pub trait MuteStore: Send + Sync {
    /// Whether an active mute in the organization matches the identity
    async fn is_muted(&self, organization_id: u64, identity: &ChatUserIdentity) -> Result<bool>;

    /// Record a mute; `until` of None is permanent
    async fn mute(
        &self,
        organization_id: u64,
        identity: &ChatUserIdentity,
        until: Option<DateTime<Utc>>,
    ) -> Result<MuteRecord>;

    /// Soft-delete every active mute in the organization matching any provided
    /// identity field. Returns how many records were revoked.
    async fn unmute(&self, organization_id: u64, identity: &ChatUserIdentity) -> Result<usize>;

    /// Active mutes for an organization, oldest first
    async fn active_mutes(&self, organization_id: u64) -> Result<Vec<MuteRecord>>;
}

/// Banned-word rule storage interface
#[async_trait]
pub trait BannedWordStore: Send + Sync {
    /// Platform-wide rules followed by the organization's own rules,
    /// each group in ascending id order
    async fn get_rules(&self, organization_id: u64) -> Result<Vec<BannedWordRule>>;
}
