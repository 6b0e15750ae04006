use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::registry::ConnectionRegistry;
use super::rooms::RoomDirectory;
use super::types::{ConnectionId, OutboundMessage, RelayError, RoomId};

/// Commands sent to the relay actor
pub(crate) enum RelayCommand {
    Open {
        id: ConnectionId,
        tx: mpsc::UnboundedSender<OutboundMessage>,
    },
    Join {
        id: ConnectionId,
        room: RoomId,
        reply: oneshot::Sender<()>,
    },
    Broadcast {
        id: ConnectionId,
        msg: OutboundMessage,
    },
    Close {
        id: ConnectionId,
    },
    Snapshot {
        reply: oneshot::Sender<RelaySnapshot>,
    },
}

/// Point-in-time view of relay membership
#[derive(Debug, Clone, Default)]
pub struct RelaySnapshot {
    rooms: HashMap<RoomId, usize>,
    connections: usize,
}

impl RelaySnapshot {
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Member count, or `None` if no such room exists
    pub fn room_size(&self, room: &str) -> Option<usize> {
        self.rooms.get(&RoomId::from(room)).copied()
    }

    pub fn connection_count(&self) -> usize {
        self.connections
    }
}

/// Owns all membership state. Commands are applied one at a time, and sends
/// only push onto unbounded per-connection queues, so a slow peer never
/// holds up the loop.
pub(crate) async fn relay_actor(mut rx: mpsc::Receiver<RelayCommand>) {
    let mut registry = ConnectionRegistry::new();
    let mut rooms = RoomDirectory::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RelayCommand::Open { id, tx } => {
                registry.register(id, tx);
                debug!("Connection {} registered", id);
            }

            RelayCommand::Join { id, room, reply } => {
                if let Some(ack) = rooms.join(&mut registry, id, room) {
                    match ack.encode() {
                        Ok(msg) => {
                            registry.send(id, msg);
                        }
                        Err(e) => warn!("Failed to encode ack for {}: {}", id, e),
                    }
                }
                let _ = reply.send(());
            }

            RelayCommand::Broadcast { id, msg } => {
                let Some(room) = registry.room_of(id).cloned() else {
                    debug!("Dropped message from {} (no room)", id);
                    continue;
                };
                let delivered = rooms.broadcast(&registry, id, &room, &msg);
                debug!("Message from {} relayed to {} peer(s) in {}", id, delivered, room);
            }

            RelayCommand::Close { id } => {
                rooms.leave(&mut registry, id);
                if registry.remove(id).is_some() {
                    info!("Connection {} closed", id);
                }
            }

            RelayCommand::Snapshot { reply } => {
                let _ = reply.send(RelaySnapshot {
                    rooms: rooms.sizes(),
                    connections: registry.len(),
                });
            }
        }
    }
}

/// Handle to communicate with the relay actor
#[derive(Clone)]
pub struct RelayHandle {
    pub(crate) tx: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    /// Spawn a relay actor on the current runtime
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel::<RelayCommand>(1024);
        tokio::spawn(relay_actor(rx));
        Self { tx }
    }

    /// Register a connection and the queue its writer drains
    pub async fn open(
        &self,
        id: ConnectionId,
        tx: mpsc::UnboundedSender<OutboundMessage>,
    ) -> Result<(), RelayError> {
        self.tx
            .send(RelayCommand::Open { id, tx })
            .await
            .map_err(|_| RelayError::ActorStopped)
    }

    /// Join a room. Resolves once the `joined` ack is queued for `id`, so
    /// any broadcast issued afterwards sees the new membership.
    pub async fn join(&self, id: ConnectionId, room: RoomId) -> Result<(), RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RelayCommand::Join {
                id,
                room,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RelayError::ActorStopped)?;
        reply_rx.await.map_err(|_| RelayError::ActorStopped)
    }

    /// Relay an encoded message to the rest of `id`'s room
    pub async fn broadcast(&self, id: ConnectionId, msg: OutboundMessage) -> Result<(), RelayError> {
        self.tx
            .send(RelayCommand::Broadcast { id, msg })
            .await
            .map_err(|_| RelayError::ActorStopped)
    }

    /// Leave any room and forget the connection
    pub async fn close(&self, id: ConnectionId) {
        let _ = self.tx.send(RelayCommand::Close { id }).await;
    }

    pub async fn snapshot(&self) -> Result<RelaySnapshot, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RelayCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| RelayError::ActorStopped)?;
        reply_rx.await.map_err(|_| RelayError::ActorStopped)
    }
}
