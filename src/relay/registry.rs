use std::collections::HashMap;

use tokio::sync::mpsc;

use super::types::{ConnectionId, LinkState, OutboundMessage, RoomId};

/// Relay-side state of one live connection
#[derive(Debug)]
pub(crate) struct Connection {
    /// Channel feeding this connection's WebSocket writer.
    tx: mpsc::UnboundedSender<OutboundMessage>,
    /// Cache of the room holding this connection. Written by `RoomDirectory` only.
    room: Option<RoomId>,
}

/// Live connections keyed by identity
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly accepted connection with no room.
    pub fn register(&mut self, id: ConnectionId, tx: mpsc::UnboundedSender<OutboundMessage>) {
        self.connections.insert(id, Connection { tx, room: None });
    }

    /// Forget a connection. Callers leave its room first.
    pub(crate) fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn room_of(&self, id: ConnectionId) -> Option<&RoomId> {
        self.connections.get(&id).and_then(|c| c.room.as_ref())
    }

    pub fn state(&self, id: ConnectionId) -> LinkState {
        match self.connections.get(&id) {
            Some(conn) if conn.tx.is_closed() => LinkState::Closing,
            Some(_) => LinkState::Open,
            None => LinkState::Closed,
        }
    }

    /// Best-effort delivery; `false` if the connection is gone or its writer dropped.
    pub fn send(&self, id: ConnectionId, msg: OutboundMessage) -> bool {
        match self.connections.get(&id) {
            Some(conn) => conn.tx.send(msg).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Swap the room cache, returning the previous value.
    pub(super) fn set_room(&mut self, id: ConnectionId, room: Option<RoomId>) -> Option<RoomId> {
        match self.connections.get_mut(&id) {
            Some(conn) => std::mem::replace(&mut conn.room, room),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_starts_without_room() {
        let mut registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = ConnectionId::next();
        registry.register(id, tx);

        assert!(registry.contains(id));
        assert!(registry.room_of(id).is_none());
        assert_eq!(registry.state(id), LinkState::Open);
    }

    #[test]
    fn send_reaches_open_connection() {
        let mut registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = ConnectionId::next();
        registry.register(id, tx);

        assert!(registry.send(id, OutboundMessage::from("hi".to_string())));
        assert_eq!(rx.try_recv().unwrap().as_str(), "hi");
    }

    #[test]
    fn dropped_writer_is_closing() {
        let mut registry = ConnectionRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::next();
        registry.register(id, tx);
        drop(rx);

        assert_eq!(registry.state(id), LinkState::Closing);
        assert!(!registry.send(id, OutboundMessage::from("lost".to_string())));
    }

    #[test]
    fn removed_connection_is_closed() {
        let mut registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = ConnectionId::next();
        registry.register(id, tx);

        assert!(registry.remove(id).is_some());
        assert_eq!(registry.state(id), LinkState::Closed);
        assert!(!registry.send(id, OutboundMessage::from("lost".to_string())));
        assert!(registry.is_empty());
    }

    #[test]
    fn set_room_on_unknown_connection_is_noop() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::next();
        assert!(registry.set_room(id, Some(RoomId::from("r1"))).is_none());
        assert!(registry.room_of(id).is_none());
    }
}
