//! Core functionality for the chat server

pub mod broadcaster;
pub mod connection;
pub mod ip_extractor;
pub mod message;
pub mod message_handler;
pub mod message_types;
pub mod server;

// Re-export main components for convenience
pub use broadcaster::{RoomBroadcaster, SharedBroadcaster};
pub use connection::Connection;
pub use message::{ChatMessage, ChatUser, ChatUserIdentity, MessageId};
pub use message_handler::MessageHandler;
pub use message_types::{ClientEvent, MessagePayload, ServerEvent};
pub use server::{ChatServer, ChatServerBuilder, SendOutcome, SharedChatServer};
