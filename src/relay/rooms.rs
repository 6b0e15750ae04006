use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use super::messages::ServerMessage;
use super::registry::ConnectionRegistry;
use super::types::{ConnectionId, LinkState, OutboundMessage, RoomId};

/// Room name to member set.
///
/// Rooms exist only while they have members: created on first join, dropped
/// on last leave. Each connection is in at most one room, and the registry's
/// room cache always names that room.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `id` into `room`, leaving its previous room if different.
    ///
    /// Returns the acknowledgment for the joiner, or `None` if the connection
    /// is no longer registered.
    pub fn join(
        &mut self,
        registry: &mut ConnectionRegistry,
        id: ConnectionId,
        room: RoomId,
    ) -> Option<ServerMessage> {
        if !registry.contains(id) {
            return None;
        }

        if registry.room_of(id) != Some(&room) {
            self.leave(registry, id);

            self.rooms.entry(room.clone()).or_default().insert(id);
            registry.set_room(id, Some(room.clone()));
            info!("Connection {} joined room {}", id, room);
        }

        Some(ServerMessage::Joined { room_id: room })
    }

    /// Remove `id` from its current room. Returns the room it left.
    pub fn leave(&mut self, registry: &mut ConnectionRegistry, id: ConnectionId) -> Option<RoomId> {
        let room = registry.set_room(id, None)?;

        if let Some(members) = self.rooms.get_mut(&room) {
            members.remove(&id);

            if members.is_empty() {
                self.rooms.remove(&room);
                info!("Room {} removed (empty)", room);
            }
        }
        info!("Connection {} left room {}", id, room);

        Some(room)
    }

    /// Deliver `msg` to every open member of `room` except `from`.
    ///
    /// A failed send to one member does not affect the others. Returns the
    /// number of members the message was handed to.
    pub fn broadcast(
        &self,
        registry: &ConnectionRegistry,
        from: ConnectionId,
        room: &RoomId,
        msg: &OutboundMessage,
    ) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };

        let mut delivered = 0;
        for &peer in members {
            if peer == from || registry.state(peer) != LinkState::Open {
                continue;
            }
            if registry.send(peer, msg.clone()) {
                delivered += 1;
            } else {
                debug!("Dropped message for {} in room {}", peer, room);
            }
        }
        delivered
    }

    pub fn contains(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn member_count(&self, room: &RoomId) -> usize {
        self.rooms.get(room).map_or(0, HashSet::len)
    }

    pub fn is_member(&self, room: &RoomId, id: ConnectionId) -> bool {
        self.rooms.get(room).is_some_and(|m| m.contains(&id))
    }

    /// Member counts of all live rooms
    pub fn sizes(&self) -> HashMap<RoomId, usize> {
        self.rooms
            .iter()
            .map(|(room, members)| (room.clone(), members.len()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
