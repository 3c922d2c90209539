//! WebSocket connection handle
//! A cheap, cloneable sender side of one client's outbound channel

use log::warn;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::Message;

/// Represents the outbound side of a single WebSocket connection
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: String,
    pub sender: mpsc::UnboundedSender<Message>,
    /// Resolved client address, used as the IP half of the sender identity
    pub ip_address: Option<IpAddr>,
    pub connected_at: Instant,
}

impl Connection {
    /// Create a new connection with a unique ID
    pub fn new(sender: mpsc::UnboundedSender<Message>, ip_address: Option<IpAddr>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), sender, ip_address)
    }

    /// Create a connection with a caller-chosen ID
    pub fn with_id(
        id: String,
        sender: mpsc::UnboundedSender<Message>,
        ip_address: Option<IpAddr>,
    ) -> Self {
        Self {
            id,
            sender,
            ip_address,
            connected_at: Instant::now(),
        }
    }

    /// Send a text frame through this connection
    pub fn send_text(&self, text: &str) -> bool {
        match self.sender.send(Message::text(text)) {
            Ok(_) => true,
            Err(_) => {
                warn!("Failed to send message to client {}", self.id);
                false
            }
        }
    }

    /// Whether the writer task on the other end has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Calculate the connection duration
    pub fn connection_duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
