//! Rusty Livechat - realtime chat fan-out for live-stream rooms
//!
//! This library provides room membership and broadcast, a bounded
//! per-room history of recent messages, and a moderation gate that
//! enforces per-organization mutes and banned-word rules.

pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod moderation;
pub mod storage;

// Re-export main components
pub use config::ServerConfig;
pub use constants::*;
pub use error::{LiveChatError, Result};
