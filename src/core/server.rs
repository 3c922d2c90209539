//! Realtime session handling
//!
//! `ChatServer` drives the per-connection lifecycle (connect, join, leave,
//! send, revoke, disconnect) over the room broadcaster, the history buffer
//! and the moderation gate.
//!
//! History pushes and removals run inline: they are short in-memory critical
//! sections, and a message must be in history before its ID is handed out so
//! a revoke can always find it. Room broadcasts are queued to a single
//! fan-out task and are best-effort: membership is captured when the event
//! is queued and the handler never waits for delivery, but events leave in
//! the order they were queued, so a revoke never overtakes the message it
//! retracts. All state here is process-local
//! and starts empty; a restart drops memberships and history.

use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::constants::{DEFAULT_HISTORY_LENGTH, DEFAULT_MAX_MESSAGE_LENGTH};
use crate::core::broadcaster::{RoomBroadcaster, SharedBroadcaster};
use crate::core::connection::Connection;
use crate::core::message::{ChatMessage, ChatUser, ChatUserIdentity};
use crate::core::message_types::ServerEvent;
use crate::error::{LiveChatError, Result};
use crate::moderation::{AcceptAllVerifier, BlockReason, Decision, IdentityVerifier, ModerationGate};
use crate::storage::history::{HistoryBuffer, SharedHistoryBuffer};
use crate::storage::memory::MemoryStore;
use crate::storage::traits::{BannedWordStore, ChatRoom, MuteStore, RoomDirectory};

/// Result of a send that passed validation and room lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Accepted; carries the assigned message ID
    Delivered(String),
    /// Dropped by moderation
    Blocked(BlockReason),
}

/// Session handler shared by every connection
pub struct ChatServer {
    rooms: Arc<dyn RoomDirectory>,
    broadcaster: SharedBroadcaster,
    history: SharedHistoryBuffer,
    gate: Arc<ModerationGate>,
    verifier: Arc<dyn IdentityVerifier>,
    fanout: mpsc::UnboundedSender<RoomEvent>,
    max_message_length: usize,
}

// An event queued for the members a room had when it was queued
struct RoomEvent {
    room_id: u64,
    members: Vec<String>,
    event: ServerEvent,
}

impl ChatServer {
    pub fn builder() -> ChatServerBuilder {
        ChatServerBuilder::new()
    }

    /// Register a freshly upgraded connection
    pub fn connect(&self, connection: Connection) {
        info!("Client connected: {}", connection.id);
        self.broadcaster.register(connection);
        info!("Current connections: {}", self.broadcaster.connection_count());
    }

    /// Drop a connection from every room immediately
    pub fn disconnect(&self, connection_id: &str) {
        let left = self.broadcaster.unregister(connection_id);
        info!("Client disconnected: {} (left {} rooms)", connection_id, left);
        info!("Current connections: {}", self.broadcaster.connection_count());
    }

    /// Look up a room by its external identifier
    pub async fn resolve_room(&self, identifier: &str) -> Result<ChatRoom> {
        self.rooms
            .get_room_by_identifier(identifier)
            .await?
            .ok_or_else(|| LiveChatError::RoomNotFound(identifier.to_string()))
    }

    /// Subscribe to a room and send the joiner the current history snapshot.
    /// Returns how many buffered messages were sent.
    pub async fn join_room(&self, connection_id: &str, identifier: &str) -> Result<usize> {
        let room = self.resolve_room(identifier).await?;

        self.broadcaster.join(connection_id, room.id);

        let history: Vec<_> = self
            .history
            .snapshot(room.id)
            .iter()
            .map(ChatMessage::payload)
            .collect();
        let count = history.len();

        if !self
            .broadcaster
            .send_to(connection_id, &ServerEvent::Messages(history))
        {
            warn!("Could not deliver history of {} to {}", room.identifier, connection_id);
        }

        info!("Joined room: {} {}", room.identifier, connection_id);
        Ok(count)
    }

    pub async fn leave_room(&self, connection_id: &str, identifier: &str) -> Result<()> {
        let room = self.resolve_room(identifier).await?;
        self.broadcaster.leave(connection_id, room.id);
        info!("Left room: {} {}", room.identifier, connection_id);
        Ok(())
    }

    /// Moderate a message and, if allowed, fan it out and remember it
    pub async fn send_message(
        &self,
        connection_id: &str,
        identifier: &str,
        user: ChatUser,
        text: String,
    ) -> Result<SendOutcome> {
        self.validate_text(&text)?;
        let room = self.resolve_room(identifier).await?;

        if !self.verifier.verify(&user) {
            warn!("Profile verification failed for {:?} on {}", user.username, connection_id);
        }

        let ip_address = self
            .broadcaster
            .connection(connection_id)
            .and_then(|conn| conn.ip_address)
            .map(|ip| ip.to_string());
        let sender = ChatUserIdentity::new(Some(user.username.clone()), ip_address);

        match self.gate.evaluate(&room, &sender, &text).await? {
            Decision::Blocked(reason) => {
                warn!(
                    "Dropped message from {} in {}: {}",
                    connection_id, room.identifier, reason
                );
                Ok(SendOutcome::Blocked(reason))
            }
            Decision::Allowed => {
                let room_id = room.id;
                let message = ChatMessage::new(room_id, sender, user, text);
                let message_id = message.id.clone();
                let event = ServerEvent::Messages(vec![message.payload()]);

                self.history.push(room_id, message_id.clone(), message);
                self.queue_broadcast(room_id, event);

                Ok(SendOutcome::Delivered(message_id))
            }
        }
    }

    /// Retract a message from history and from every member's display.
    /// Who may revoke is decided upstream.
    pub async fn revoke_message(
        &self,
        connection_id: &str,
        identifier: &str,
        message_id: &str,
    ) -> Result<()> {
        let room = self.resolve_room(identifier).await?;
        let room_id = room.id;

        let removed = self.history.revoke(room_id, message_id);
        self.queue_broadcast(
            room_id,
            ServerEvent::RevokeMessage {
                id: message_id.to_string(),
            },
        );

        info!(
            "Revoked message {} in {} by {} (buffered: {})",
            message_id, room.identifier, connection_id, removed
        );
        Ok(())
    }

    /// Send an event to one connection only
    pub fn send_to(&self, connection_id: &str, event: &ServerEvent) -> bool {
        self.broadcaster.send_to(connection_id, event)
    }

    pub fn broadcaster(&self) -> &RoomBroadcaster {
        &self.broadcaster
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn moderation(&self) -> &ModerationGate {
        &self.gate
    }

    // Snapshot the room's members now and hand delivery to the fan-out task
    fn queue_broadcast(&self, room_id: u64, event: ServerEvent) {
        let queued = RoomEvent {
            room_id,
            members: self.broadcaster.members(room_id),
            event,
        };
        if self.fanout.send(queued).is_err() {
            warn!("Fan-out task is gone; dropping event for room {}", room_id);
        }
    }

    fn validate_text(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(LiveChatError::ValidationError(
                "Message cannot be empty".to_string(),
            ));
        }
        let length = text.chars().count();
        if length > self.max_message_length {
            return Err(LiveChatError::ValidationError(format!(
                "Message too long: {} characters (max {})",
                length, self.max_message_length
            )));
        }
        Ok(())
    }
}

// Drains queued room events in order until the server is dropped
fn spawn_fanout(broadcaster: SharedBroadcaster) -> mpsc::UnboundedSender<RoomEvent> {
    let (tx, mut rx) = mpsc::unbounded_channel::<RoomEvent>();
    tokio::spawn(async move {
        while let Some(queued) = rx.recv().await {
            broadcaster.deliver(queued.room_id, &queued.members, &queued.event);
        }
        debug!("Fan-out task stopped");
    });
    tx
}

// Shared reference to the chat server
pub type SharedChatServer = Arc<ChatServer>;

/// Two-phase construction: components are built without references to each
/// other, then `build` wires them into one `ChatServer`.
pub struct ChatServerBuilder {
    history_length: usize,
    max_message_length: usize,
    rooms: Option<Arc<dyn RoomDirectory>>,
    mutes: Option<Arc<dyn MuteStore>>,
    banned_words: Option<Arc<dyn BannedWordStore>>,
    verifier: Arc<dyn IdentityVerifier>,
}

impl ChatServerBuilder {
    pub fn new() -> Self {
        Self {
            history_length: DEFAULT_HISTORY_LENGTH,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            rooms: None,
            mutes: None,
            banned_words: None,
            verifier: Arc::new(AcceptAllVerifier),
        }
    }

    pub fn history_length(mut self, history_length: usize) -> Self {
        self.history_length = history_length;
        self
    }

    pub fn max_message_length(mut self, max_message_length: usize) -> Self {
        self.max_message_length = max_message_length;
        self
    }

    pub fn room_directory(mut self, rooms: Arc<dyn RoomDirectory>) -> Self {
        self.rooms = Some(rooms);
        self
    }

    pub fn mute_store(mut self, mutes: Arc<dyn MuteStore>) -> Self {
        self.mutes = Some(mutes);
        self
    }

    pub fn banned_word_store(mut self, banned_words: Arc<dyn BannedWordStore>) -> Self {
        self.banned_words = Some(banned_words);
        self
    }

    /// Use one in-memory store for rooms, mutes and banned words
    pub fn memory_store(self, store: Arc<MemoryStore>) -> Self {
        self.room_directory(store.clone())
            .mute_store(store.clone())
            .banned_word_store(store)
    }

    pub fn verifier(mut self, verifier: Arc<dyn IdentityVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn build(self) -> Result<SharedChatServer> {
        let rooms = self
            .rooms
            .ok_or_else(|| LiveChatError::ConfigError("No room directory configured".to_string()))?;
        let mutes = self
            .mutes
            .ok_or_else(|| LiveChatError::ConfigError("No mute store configured".to_string()))?;
        let banned_words = self.banned_words.ok_or_else(|| {
            LiveChatError::ConfigError("No banned word store configured".to_string())
        })?;

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(LiveChatError::ConfigError(
                "ChatServer must be built inside a tokio runtime".to_string(),
            ));
        }

        // Phase one: independent components
        let broadcaster = Arc::new(RoomBroadcaster::new());
        let history = Arc::new(HistoryBuffer::with_capacity(self.history_length));
        let gate = Arc::new(ModerationGate::new(mutes, banned_words));

        // Phase two: wiring
        let fanout = spawn_fanout(Arc::clone(&broadcaster));
        Ok(Arc::new(ChatServer {
            rooms,
            broadcaster,
            history,
            gate,
            verifier: self.verifier,
            fanout,
            max_message_length: self.max_message_length,
        }))
    }
}

impl Default for ChatServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
