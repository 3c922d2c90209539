// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const WS_PATH: &str = "ws";

// History buffer configuration constants
pub const DEFAULT_HISTORY_LENGTH: usize = 25;
pub const MAX_HISTORY_LENGTH: usize = 1000;

// Inbound message limits
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 500;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4096;

// Inbound event names
pub const EVENT_ROOM_JOIN: &str = "chatroom.join";
pub const EVENT_ROOM_LEAVE: &str = "chatroom.leave";
pub const EVENT_ROOM_MESSAGE: &str = "chatroom.message";
pub const EVENT_ROOM_REVOKE: &str = "chatroom.revoke-message";

// Outbound event names
pub const EVENT_CHAT_MESSAGES: &str = "chat.messages";
pub const EVENT_CHAT_REVOKE: &str = "chat.revoke-message";
pub const EVENT_ERROR: &str = "error";
