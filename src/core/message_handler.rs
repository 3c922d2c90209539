//! Frame parsing and event routing for one connection

use log::{debug, warn};

use crate::constants::DEFAULT_MAX_FRAME_BYTES;
use crate::core::message_types::{ClientEvent, ServerEvent};
use crate::core::server::{SendOutcome, SharedChatServer};
use crate::error::{LiveChatError, Result};

/// Parses inbound frames and routes them to the chat server
pub struct MessageHandler {
    server: SharedChatServer,
    max_frame_bytes: usize,
}

impl MessageHandler {
    pub fn new(server: SharedChatServer) -> Self {
        Self::with_frame_limit(server, DEFAULT_MAX_FRAME_BYTES)
    }

    pub fn with_frame_limit(server: SharedChatServer, max_frame_bytes: usize) -> Self {
        Self {
            server,
            max_frame_bytes,
        }
    }

    /// Process one text frame. Any error is also reported to the sender.
    pub async fn handle_client_message(&self, connection_id: &str, frame: &str) -> Result<()> {
        let result = self.dispatch(connection_id, frame).await;

        if let Err(ref e) = result {
            warn!("Event from {} failed: {}", connection_id, e);
            if !self.server.send_to(connection_id, &ServerEvent::from_error(e)) {
                debug!("Could not report error to {}", connection_id);
            }
        }

        result
    }

    async fn dispatch(&self, connection_id: &str, frame: &str) -> Result<()> {
        if frame.len() > self.max_frame_bytes {
            return Err(LiveChatError::MessageTooLarge(frame.len()));
        }

        let event: ClientEvent = serde_json::from_str(frame)?;
        debug!(
            "{} from {} for room {}",
            event.name(),
            connection_id,
            event.room_identifier()
        );

        match event {
            ClientEvent::JoinRoom {
                chat_room_identifier,
            } => {
                self.server
                    .join_room(connection_id, &chat_room_identifier)
                    .await?;
            }

            ClientEvent::LeaveRoom {
                chat_room_identifier,
            } => {
                self.server
                    .leave_room(connection_id, &chat_room_identifier)
                    .await?;
            }

            ClientEvent::RoomMessage {
                chat_room_identifier,
                message,
                user,
            } => {
                let outcome = self
                    .server
                    .send_message(connection_id, &chat_room_identifier, user, message)
                    .await?;
                // Blocked senders get no feedback
                if let SendOutcome::Delivered(id) = outcome {
                    debug!("Message {} accepted from {}", id, connection_id);
                }
            }

            ClientEvent::RevokeMessage {
                chat_room_identifier,
                message_id,
            } => {
                self.server
                    .revoke_message(connection_id, &chat_room_identifier, &message_id)
                    .await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection::Connection;
    use crate::core::server::ChatServer;
    use crate::storage::memory::MemoryStore;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn setup() -> (MessageHandler, mpsc::UnboundedReceiver<warp::ws::Message>) {
        let server = ChatServer::builder()
            .memory_store(Arc::new(MemoryStore::new()))
            .build()
            .unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        server.connect(Connection::with_id("c1".to_string(), tx, None));
        (MessageHandler::with_frame_limit(server, 128), rx)
    }

    fn next_event(rx: &mut mpsc::UnboundedReceiver<warp::ws::Message>) -> serde_json::Value {
        let msg = rx.try_recv().unwrap();
        serde_json::from_str(msg.to_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let (handler, mut rx) = setup();
        let frame = "x".repeat(200);
        let err = handler.handle_client_message("c1", &frame).await.unwrap_err();
        assert!(matches!(err, LiveChatError::MessageTooLarge(200)));
        assert_eq!(next_event(&mut rx)["data"]["code"], "MESSAGE_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_malformed_frame_is_reported() {
        let (handler, mut rx) = setup();
        let err = handler.handle_client_message("c1", "{not json").await.unwrap_err();
        assert!(matches!(err, LiveChatError::MessageParseError(_)));
        assert_eq!(next_event(&mut rx)["data"]["code"], "INVALID_MESSAGE");
    }

    #[tokio::test]
    async fn test_unknown_room_is_reported_to_sender() {
        let (handler, mut rx) = setup();
        let frame = r#"{"event":"chatroom.join","data":{"chat_room_identifier":"nope"}}"#;
        assert!(handler.handle_client_message("c1", frame).await.is_err());

        let event = next_event(&mut rx);
        assert_eq!(event["event"], "error");
        assert_eq!(event["data"]["code"], "ROOM_NOT_FOUND");
    }
}
