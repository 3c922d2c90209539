//! Bounded, revocable per-room message history
//!
//! Each room owns a small ring of recent messages used to seed new joiners.
//! Rooms are locked independently: the map only hands out the room's own
//! mutex, so pushes to unrelated rooms never wait on each other.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::constants::DEFAULT_HISTORY_LENGTH;
use crate::core::message::ChatMessage;

/// Recent messages of one room, oldest first
#[derive(Debug)]
pub struct RoomHistory {
    entries: VecDeque<(String, ChatMessage)>,
    max_size: usize,
}

impl RoomHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let max_size = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Append, evicting the oldest entry when full
    pub fn push(&mut self, message_id: String, message: ChatMessage) {
        if self.entries.len() >= self.max_size {
            self.entries.pop_front();
        }
        self.entries.push_back((message_id, message));
    }

    /// Remove the entry with this id. Returns whether one was removed.
    pub fn revoke(&mut self, message_id: &str) -> bool {
        match self.entries.iter().position(|(id, _)| id == message_id) {
            Some(index) => self.entries.remove(index).is_some(),
            None => false,
        }
    }

    /// Independent copy of the current contents
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.entries.iter().map(|(_, msg)| msg.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-room history buffers, created lazily on first push
pub struct HistoryBuffer {
    rooms: DashMap<u64, Arc<Mutex<RoomHistory>>>,
    max_length: usize,
}

impl HistoryBuffer {
    /// Create a history buffer with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_LENGTH)
    }

    /// Create a history buffer keeping `max_length` messages per room
    pub fn with_capacity(max_length: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            max_length: max_length.max(1),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn push(&self, room_id: u64, message_id: String, message: ChatMessage) {
        let room = self
            .rooms
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(RoomHistory::with_capacity(self.max_length))))
            .clone();
        lock(&room).push(message_id, message);
    }

    /// No-op when the room or message is unknown
    pub fn revoke(&self, room_id: u64, message_id: &str) -> bool {
        match self.room(room_id) {
            Some(room) => lock(&room).revoke(message_id),
            None => false,
        }
    }

    /// Oldest-first copy; empty when the room has no buffer yet
    pub fn snapshot(&self, room_id: u64) -> Vec<ChatMessage> {
        match self.room(room_id) {
            Some(room) => lock(&room).snapshot(),
            None => Vec::new(),
        }
    }

    /// Number of rooms that have a buffer
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    // Clone the Arc out so the shard guard is released before locking the room
    fn room(&self, room_id: u64) -> Option<Arc<Mutex<RoomHistory>>> {
        self.rooms.get(&room_id).map(|entry| entry.value().clone())
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// A panic mid-push cannot leave the deque half-updated, so a poisoned lock is still usable
fn lock(room: &Mutex<RoomHistory>) -> MutexGuard<'_, RoomHistory> {
    room.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Thread-safe handle to the history buffer
pub type SharedHistoryBuffer = Arc<HistoryBuffer>;

/// Create a new shared history buffer with custom capacity
pub fn create_history_buffer(max_length: usize) -> SharedHistoryBuffer {
    Arc::new(HistoryBuffer::with_capacity(max_length))
}
