//! In-memory storage implementation for development and testing
//!
//! Implements every collaborator trait over `RwLock`-guarded collections.
//! Can be seeded from a JSON document so a standalone server has rooms and
//! banned words to work with.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::traits::*;
use crate::core::message::ChatUserIdentity;
use crate::error::{LiveChatError, Result};

/// Initial contents for a `MemoryStore`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub rooms: Vec<ChatRoom>,
    #[serde(default)]
    pub banned_words: Vec<BannedWordRule>,
    #[serde(default)]
    pub mutes: Vec<MuteRecord>,
}

impl SeedData {
    /// Read and parse a seed document from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LiveChatError::ConfigError(format!("Cannot read seed file {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            LiveChatError::ConfigError(format!("Invalid seed file {}: {}", path.display(), e))
        })
    }
}

/// In-memory rooms, mutes and banned words
pub struct MemoryStore {
    rooms: RwLock<HashMap<String, ChatRoom>>,
    mutes: RwLock<Vec<MuteRecord>>,
    rules: RwLock<Vec<BannedWordRule>>,
    next_mute_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_seed(SeedData::default())
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let next_mute_id = seed.mutes.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        let rooms = seed
            .rooms
            .into_iter()
            .map(|room| (room.identifier.clone(), room))
            .collect();

        Self {
            rooms: RwLock::new(rooms),
            mutes: RwLock::new(seed.mutes),
            rules: RwLock::new(seed.banned_words),
            next_mute_id: AtomicU64::new(next_mute_id),
        }
    }

    /// Add or replace a room
    pub async fn insert_room(&self, room: ChatRoom) {
        self.rooms.write().await.insert(room.identifier.clone(), room);
    }

    /// Add a banned-word rule
    pub async fn add_rule(&self, rule: BannedWordRule) {
        self.rules.write().await.push(rule);
    }

    /// Mute records including revoked and expired ones, oldest first
    pub async fn all_mutes(&self) -> Vec<MuteRecord> {
        self.mutes.read().await.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomDirectory for MemoryStore {
    async fn get_room_by_identifier(&self, identifier: &str) -> Result<Option<ChatRoom>> {
        Ok(self.rooms.read().await.get(identifier).cloned())
    }
}

#[async_trait]
impl MuteStore for MemoryStore {
    async fn is_muted(&self, organization_id: u64, identity: &ChatUserIdentity) -> Result<bool> {
        if identity.is_empty() {
            return Ok(false);
        }

        let now = Utc::now();
        let mutes = self.mutes.read().await;
        Ok(mutes.iter().any(|record| {
            record.organization_id == organization_id
                && record.is_active(now)
                && record.matches_identity(identity)
        }))
    }

    async fn mute(
        &self,
        organization_id: u64,
        identity: &ChatUserIdentity,
        until: Option<DateTime<Utc>>,
    ) -> Result<MuteRecord> {
        if identity.is_empty() {
            return Err(LiveChatError::ValidationError(
                "A mute needs a username or an IP address".to_string(),
            ));
        }

        let record = MuteRecord {
            id: self.next_mute_id.fetch_add(1, Ordering::Relaxed),
            organization_id,
            username: identity.username.clone(),
            ip_address: identity.ip_address.clone(),
            until,
            created_at: Utc::now(),
            deleted_at: None,
        };

        self.mutes.write().await.push(record.clone());
        Ok(record)
    }

    async fn unmute(&self, organization_id: u64, identity: &ChatUserIdentity) -> Result<usize> {
        if identity.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut mutes = self.mutes.write().await;
        let mut revoked = 0;

        for record in mutes.iter_mut() {
            if record.organization_id == organization_id
                && record.is_active(now)
                && record.matches_identity(identity)
            {
                record.deleted_at = Some(now);
                revoked += 1;
            }
        }

        Ok(revoked)
    }

    async fn active_mutes(&self, organization_id: u64) -> Result<Vec<MuteRecord>> {
        let now = Utc::now();
        Ok(self
            .mutes
            .read()
            .await
            .iter()
            .filter(|record| record.organization_id == organization_id && record.is_active(now))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BannedWordStore for MemoryStore {
    async fn get_rules(&self, organization_id: u64) -> Result<Vec<BannedWordRule>> {
        let rules = self.rules.read().await;

        let mut platform: Vec<BannedWordRule> = rules
            .iter()
            .filter(|rule| rule.is_platform_wide())
            .cloned()
            .collect();
        let mut scoped: Vec<BannedWordRule> = rules
            .iter()
            .filter(|rule| rule.organization_id == Some(organization_id))
            .cloned()
            .collect();

        platform.sort_by_key(|rule| rule.id);
        scoped.sort_by_key(|rule| rule.id);
        platform.extend(scoped);

        Ok(platform)
    }
}
