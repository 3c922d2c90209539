//! Moderation gate
//!
//! Decides whether a candidate message may be delivered. Checks run in a
//! fixed order: active mutes first, then banned-word rules. A banned-word
//! hit blocks the whole message (nothing is redacted) and mutes the sender
//! in the room's organization as a background task.
//!
//! Store failures abort evaluation so the caller never delivers a message
//! whose moderation state is unknown.

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::fmt;
use std::sync::Arc;

use crate::core::message::ChatUserIdentity;
use crate::error::Result;
use crate::storage::traits::{BannedWordRule, BannedWordStore, ChatRoom, MuteRecord, MuteStore};

/// Why a message was not delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    Muted,
    BannedWord { rule_id: u64, word: String },
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Muted => write!(f, "sender is muted"),
            Self::BannedWord { rule_id, word } => {
                write!(f, "banned word '{}' (rule {})", word, rule_id)
            }
        }
    }
}

/// Outcome of evaluating a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Blocked(BlockReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

pub struct ModerationGate {
    mutes: Arc<dyn MuteStore>,
    banned_words: Arc<dyn BannedWordStore>,
}

impl ModerationGate {
    pub fn new(mutes: Arc<dyn MuteStore>, banned_words: Arc<dyn BannedWordStore>) -> Self {
        Self {
            mutes,
            banned_words,
        }
    }

    /// Decide whether `text` from `sender` may be delivered in `room`
    pub async fn evaluate(
        &self,
        room: &ChatRoom,
        sender: &ChatUserIdentity,
        text: &str,
    ) -> Result<Decision> {
        let organization_id = room.organization_id;

        if self.mutes.is_muted(organization_id, sender).await? {
            return Ok(Decision::Blocked(BlockReason::Muted));
        }

        let rules = self.banned_words.get_rules(organization_id).await?;
        let lowered = text.to_lowercase();

        match rules.into_iter().find(|rule| rule.matches(&lowered)) {
            Some(rule) => {
                self.spawn_consequence(organization_id, sender.clone(), &rule);
                Ok(Decision::Blocked(BlockReason::BannedWord {
                    rule_id: rule.id,
                    word: rule.word,
                }))
            }
            None => Ok(Decision::Allowed),
        }
    }

    // Record the mute the rule calls for without holding up the decision
    fn spawn_consequence(&self, organization_id: u64, sender: ChatUserIdentity, rule: &BannedWordRule) {
        if sender.is_empty() {
            warn!(
                "Banned word rule {} matched an anonymous sender; nothing to mute",
                rule.id
            );
            return;
        }

        let mutes = Arc::clone(&self.mutes);
        let until = rule.consequence.mute_until(Utc::now());
        let rule_id = rule.id;

        tokio::spawn(async move {
            match mutes.mute(organization_id, &sender, until).await {
                Ok(record) => info!(
                    "Auto-muted {:?}/{:?} in organization {} until {} (rule {})",
                    record.username,
                    record.ip_address,
                    organization_id,
                    describe_until(record.until),
                    rule_id
                ),
                Err(e) => error!(
                    "Failed to record auto-mute for rule {} in organization {}: {}",
                    rule_id, organization_id, e
                ),
            }
        });
    }

    /// Manually mute an identity in an organization
    pub async fn mute(
        &self,
        organization_id: u64,
        identity: &ChatUserIdentity,
        until: Option<DateTime<Utc>>,
    ) -> Result<MuteRecord> {
        self.mutes.mute(organization_id, identity, until).await
    }

    /// Revoke active mutes matching whichever identity fields are provided
    pub async fn unmute(&self, organization_id: u64, identity: &ChatUserIdentity) -> Result<usize> {
        self.mutes.unmute(organization_id, identity).await
    }

    pub async fn is_muted(&self, organization_id: u64, identity: &ChatUserIdentity) -> Result<bool> {
        self.mutes.is_muted(organization_id, identity).await
    }
}

fn describe_until(until: Option<DateTime<Utc>>) -> String {
    until.map_or_else(|| "forever".to_string(), |t| t.to_rfc3339())
}
