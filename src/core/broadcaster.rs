//! Room membership and fan-out
//!
//! Tracks which live connections are subscribed to which room and delivers
//! events to every member. Membership is kept in sharded maps so joins and
//! broadcasts in unrelated rooms do not contend.

use dashmap::DashMap;
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;

use crate::core::connection::Connection;
use crate::core::message_types::ServerEvent;

/// Maps rooms to their subscribed connections
pub struct RoomBroadcaster {
    /// Live connections by ID
    connections: DashMap<String, Connection>,
    /// Room ID to member connection IDs
    rooms: DashMap<u64, HashSet<String>>,
    /// Connection ID to the rooms it joined
    client_rooms: DashMap<String, HashSet<u64>>,
}

impl RoomBroadcaster {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
            client_rooms: DashMap::new(),
        }
    }

    /// Register a live connection so it can receive events
    pub fn register(&self, connection: Connection) {
        self.connections.insert(connection.id.clone(), connection);
    }

    /// Leave every room and forget the connection
    pub fn unregister(&self, connection_id: &str) -> usize {
        let left = self.leave_all(connection_id);
        self.connections.remove(connection_id);
        left
    }

    /// Add a connection to a room. Returns false if it was already a member.
    ///
    /// Operations for one connection are serialized by its session, so the two
    /// maps are updated one after the other without holding both shards.
    pub fn join(&self, connection_id: &str, room_id: u64) -> bool {
        self.client_rooms
            .entry(connection_id.to_string())
            .or_default()
            .insert(room_id);
        self.rooms
            .entry(room_id)
            .or_default()
            .insert(connection_id.to_string())
    }

    /// Remove a connection from a room. No-op if it was not a member.
    pub fn leave(&self, connection_id: &str, room_id: u64) -> bool {
        let removed = match self.rooms.get_mut(&room_id) {
            Some(mut members) => members.remove(connection_id),
            None => false,
        };
        self.rooms.remove_if(&room_id, |_, members| members.is_empty());

        if let Some(mut joined) = self.client_rooms.get_mut(connection_id) {
            joined.remove(&room_id);
        }
        self.client_rooms
            .remove_if(connection_id, |_, joined| joined.is_empty());

        removed
    }

    /// Remove a connection from every room it joined
    pub fn leave_all(&self, connection_id: &str) -> usize {
        let joined = self
            .client_rooms
            .remove(connection_id)
            .map(|(_, rooms)| rooms)
            .unwrap_or_default();

        for room_id in &joined {
            if let Some(mut members) = self.rooms.get_mut(room_id) {
                members.remove(connection_id);
            }
            self.rooms.remove_if(room_id, |_, members| members.is_empty());
        }

        joined.len()
    }

    /// Deliver an event to the members of a room at the time of the call.
    /// A failed send to one member never stops delivery to the others.
    pub fn broadcast(&self, room_id: u64, event: &ServerEvent) -> usize {
        let members = self.members(room_id);
        self.deliver(room_id, &members, event)
    }

    /// Deliver an event to a previously taken membership snapshot
    pub fn deliver(&self, room_id: u64, members: &[String], event: &ServerEvent) -> usize {
        let payload = match event.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize {} for room {}: {}", event.name(), room_id, e);
                return 0;
            }
        };

        let mut delivered = 0;
        for member_id in members {
            let connection = self.connections.get(member_id).map(|c| c.value().clone());
            match connection {
                Some(connection) if connection.send_text(&payload) => delivered += 1,
                Some(_) => {}
                None => debug!("Member {} of room {} has no live connection", member_id, room_id),
            }
        }

        debug!(
            "Broadcast {} to {}/{} members of room {}",
            event.name(),
            delivered,
            members.len(),
            room_id
        );
        delivered
    }

    /// Deliver an event to a single connection
    pub fn send_to(&self, connection_id: &str, event: &ServerEvent) -> bool {
        let payload = match event.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize {} for {}: {}", event.name(), connection_id, e);
                return false;
            }
        };

        match self.connections.get(connection_id).map(|c| c.value().clone()) {
            Some(connection) => connection.send_text(&payload),
            None => false,
        }
    }

    /// Snapshot of a room's member IDs
    pub fn members(&self, room_id: u64) -> Vec<String> {
        self.rooms
            .get(&room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, connection_id: &str, room_id: u64) -> bool {
        self.rooms
            .get(&room_id)
            .map_or(false, |members| members.contains(connection_id))
    }

    /// Rooms a connection currently belongs to
    pub fn rooms_of(&self, connection_id: &str) -> Vec<u64> {
        self.client_rooms
            .get(connection_id)
            .map(|rooms| rooms.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn connection(&self, connection_id: &str) -> Option<Connection> {
        self.connections.get(connection_id).map(|c| c.value().clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for RoomBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

// Shared reference to the broadcaster
pub type SharedBroadcaster = Arc<RoomBroadcaster>;

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn connect(broadcaster: &RoomBroadcaster, id: &str) -> mpsc::UnboundedReceiver<warp::ws::Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        broadcaster.register(Connection::with_id(id.to_string(), tx, None));
        rx
    }

    #[test]
    fn test_join_is_idempotent() {
        let broadcaster = RoomBroadcaster::new();
        let _rx = connect(&broadcaster, "c1");

        assert!(broadcaster.join("c1", 7));
        assert!(!broadcaster.join("c1", 7));
        assert_eq!(broadcaster.members(7), vec!["c1".to_string()]);
    }

    #[test]
    fn test_leave_absent_is_noop() {
        let broadcaster = RoomBroadcaster::new();
        assert!(!broadcaster.leave("ghost", 7));
        assert!(broadcaster.members(7).is_empty());
    }

    #[test]
    fn test_leave_all_clears_every_room() {
        let broadcaster = RoomBroadcaster::new();
        let _rx = connect(&broadcaster, "c1");
        broadcaster.join("c1", 1);
        broadcaster.join("c1", 2);

        assert_eq!(broadcaster.leave_all("c1"), 2);
        assert!(!broadcaster.is_member("c1", 1));
        assert!(!broadcaster.is_member("c1", 2));
        assert!(broadcaster.rooms_of("c1").is_empty());
    }

    #[test]
    fn test_broadcast_skips_failed_member() {
        let broadcaster = RoomBroadcaster::new();
        let mut rx1 = connect(&broadcaster, "c1");
        let rx2 = connect(&broadcaster, "c2");
        let mut rx3 = connect(&broadcaster, "c3");
        for id in ["c1", "c2", "c3"] {
            broadcaster.join(id, 1);
        }
        drop(rx2);

        let event = ServerEvent::RevokeMessage { id: "m1".to_string() };
        assert_eq!(broadcaster.broadcast(1, &event), 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());
    }

    #[test]
    fn test_deliver_uses_given_snapshot() {
        let broadcaster = RoomBroadcaster::new();
        let mut rx1 = connect(&broadcaster, "c1");
        let mut rx2 = connect(&broadcaster, "c2");
        broadcaster.join("c1", 1);
        let members = broadcaster.members(1);
        broadcaster.join("c2", 1);

        let event = ServerEvent::RevokeMessage { id: "m1".to_string() };
        assert_eq!(broadcaster.deliver(1, &members, &event), 1);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_only_reaches_room_members() {
        let broadcaster = RoomBroadcaster::new();
        let mut inside = connect(&broadcaster, "in");
        let mut outside = connect(&broadcaster, "out");
        broadcaster.join("in", 1);
        broadcaster.join("out", 2);

        broadcaster.broadcast(1, &ServerEvent::RevokeMessage { id: "x".to_string() });
        assert!(inside.try_recv().is_ok());
        assert!(outside.try_recv().is_err());
    }
}
