//! WebSocket room relay for end-to-end encrypted chat
//!
//! Payloads are opaque to the relay: they are moved between members of a room
//! without being parsed, stored or logged.

mod actor;
mod messages;
mod registry;
mod rooms;
mod server;
mod types;

pub use actor::{RelayHandle, RelaySnapshot};
pub use messages::{ClientMessage, FrameError, ServerMessage};
pub use registry::ConnectionRegistry;
pub use rooms::RoomDirectory;
pub use server::{DEFAULT_RELAY_PORT, RelayServer};
pub use types::{ConnectionId, LinkState, OutboundMessage, RelayError, RoomId};
