use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum LiveChatError {
    // Room errors
    RoomNotFound(String),

    // Moderation store errors
    StoreError(String),

    // Messages errors
    MessageParseError(String),
    MessageTooLarge(usize),

    // Validation errors
    ValidationError(String),

    // Handshake errors
    Forbidden,

    // Configuration errors
    ConfigError(String),
}

impl LiveChatError {
    /// Stable code sent to the client in `error` events
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "ROOM_NOT_FOUND",
            Self::StoreError(_) => "STORE_ERROR",
            Self::MessageParseError(_) | Self::ValidationError(_) => "INVALID_MESSAGE",
            Self::MessageTooLarge(_) => "MESSAGE_TOO_LARGE",
            Self::Forbidden => "FORBIDDEN",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }
}

impl fmt::Display for LiveChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoomNotFound(identifier) => write!(f, "Chat room not found: {}", identifier),
            Self::StoreError(msg) => write!(f, "Moderation store error: {}", msg),
            Self::MessageParseError(msg) => write!(f, "Message parse error: {}", msg),
            Self::MessageTooLarge(size) => write!(f, "Message too large: {} bytes", size),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::Forbidden => write!(f, "Origin not allowed"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for LiveChatError {}

impl From<serde_json::Error> for LiveChatError {
    fn from(err: serde_json::Error) -> Self {
        LiveChatError::MessageParseError(err.to_string())
    }
}

// Generic result type for the live chat server
pub type Result<T> = std::result::Result<T, LiveChatError>;
