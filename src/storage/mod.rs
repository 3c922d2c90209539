//! Room history and the stores moderation reads from

pub mod history;
pub mod memory;
pub mod traits;

pub use history::{create_history_buffer, HistoryBuffer, RoomHistory, SharedHistoryBuffer};
pub use memory::{MemoryStore, SeedData};
pub use traits::{
    BannedWordRule, BannedWordStore, ChatRoom, Consequence, MuteRecord, MuteStore, RoomDirectory,
};
