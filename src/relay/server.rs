use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, error, info, warn};

use super::actor::RelayHandle;
use super::messages::{ClientMessage, ServerMessage};
use super::types::{ConnectionId, OutboundMessage, RelayError};

pub const DEFAULT_RELAY_PORT: u16 = 8080;
const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RelayServer {
    listener: TcpListener,
    handle: RelayHandle,
}

impl RelayServer {
    /// Bind the listener and start the relay actor
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Relay server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            handle: RelayHandle::spawn(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> RelayHandle {
        self.handle.clone()
    }

    /// Accept connections until the listener fails
    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let handle = self.handle.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, handle).await {
                    error!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handle: RelayHandle,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let id = ConnectionId::next();
    info!("WebSocket connection {} from {}", id, addr);

    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<Message>();

    handle.open(id, tx).await?;

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // the first tick completes immediately
    ping_interval.tick().await;
    let mut pong_deadline: Option<tokio::time::Instant> = None;

    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    let ws_msg = Message::Text(msg.into_inner());
                    if ws_tx.send(ws_msg).await.is_err() {
                        break;
                    }
                }
                Some(ctrl_msg) = ctrl_rx.recv() => {
                    if ws_tx.send(ctrl_msg).await.is_err() {
                        break;
                    }
                }
                else => break,
            }
        }
    });

    loop {
        let pong_timeout = async move {
            match pong_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = ping_interval.tick() => {
                if ctrl_tx.send(Message::Ping(Bytes::new())).is_err() {
                    break;
                }
                pong_deadline = Some(tokio::time::Instant::now() + PONG_TIMEOUT);
                debug!("Ping sent to {}", id);
            }

            _ = pong_timeout => {
                warn!("Pong timeout, disconnecting {}", id);
                break;
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!("WebSocket error on {}: {}", id, e);
                        break;
                    }
                    None => break,
                };

                let result = match msg {
                    Message::Text(text) => handle_frame(id, text.as_str(), &handle).await,
                    Message::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => handle_frame(id, text, &handle).await,
                        Err(_) => {
                            debug!("Dropped non-UTF-8 frame from {}", id);
                            Ok(())
                        }
                    },
                    Message::Pong(_) => {
                        pong_deadline = None;
                        debug!("Pong received from {}", id);
                        Ok(())
                    }
                    Message::Close(_) => {
                        info!("Close received from {}", id);
                        break;
                    }
                    _ => Ok(()),
                };

                if let Err(e) = result {
                    error!("Dropping connection {}: {}", id, e);
                    break;
                }
            }
        }
    }

    handle.close(id).await;
    send_task.abort();
    info!("WebSocket disconnected: {}", id);

    Ok(())
}

/// Parse one inbound frame and forward it to the relay actor.
///
/// Frames that do not parse are dropped without a reply; only a stopped
/// actor is an error.
async fn handle_frame(id: ConnectionId, text: &str, handle: &RelayHandle) -> Result<(), RelayError> {
    let client_msg = match ClientMessage::parse(text) {
        Ok(m) => m,
        Err(e) => {
            debug!("Dropped frame from {}: {}", id, e);
            return Ok(());
        }
    };

    match client_msg {
        ClientMessage::Join { room_id } => handle.join(id, room_id).await,

        ClientMessage::Msg { payload } => match (ServerMessage::Msg { payload }).encode() {
            Ok(msg) => handle.broadcast(id, msg).await,
            Err(e) => {
                warn!("Failed to encode message from {}: {}", id, e);
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open(handle: &RelayHandle) -> (ConnectionId, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::next();
        handle.open(id, tx).await.unwrap();
        (id, rx)
    }

    #[tokio::test]
    async fn frame_join_then_msg() {
        let handle = RelayHandle::spawn();
        let (a, mut a_rx) = open(&handle).await;
        let (b, mut b_rx) = open(&handle).await;

        handle_frame(a, r#"{"type":"join","roomId":"r1"}"#, &handle).await.unwrap();
        handle_frame(b, r#"{"type":"join","roomId":"r1"}"#, &handle).await.unwrap();
        handle_frame(a, r#"{"type":"msg","payload":"hello"}"#, &handle).await.unwrap();
        handle.snapshot().await.unwrap();

        assert_eq!(a_rx.try_recv().unwrap().as_str(), r#"{"type":"joined","roomId":"r1"}"#);
        assert_eq!(b_rx.try_recv().unwrap().as_str(), r#"{"type":"joined","roomId":"r1"}"#);
        assert_eq!(b_rx.try_recv().unwrap().as_str(), r#"{"type":"msg","payload":"hello"}"#);
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_frames_change_nothing() {
        let handle = RelayHandle::spawn();
        let (a, mut a_rx) = open(&handle).await;

        for frame in [
            "not json",
            r#"{"type":"bogus"}"#,
            r#"{"type":"join"}"#,
            r#"{"type":"join","roomId":""}"#,
            r#"{"type":"msg","payload":"x"}"#,
        ] {
            handle_frame(a, frame, &handle).await.unwrap();
        }

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.room_count(), 0);
        assert_eq!(snapshot.connection_count(), 1);
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stopped_actor_is_reported() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = RelayHandle { tx };

        let result = handle_frame(ConnectionId::next(), r#"{"type":"join","roomId":"r1"}"#, &handle).await;
        assert!(matches!(result, Err(RelayError::ActorStopped)));
    }
}
