//! WebSocket relay connection and event loop.
//!
//! The page-side shim forwards every `message` event it receives from the map
//! frame as an [`InboundEnvelope`] text frame, and posts every
//! [`OutboundEnvelope`] it receives into the frame with the given target
//! origin.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming envelopes from the shim, forwarded into the bridge queue
//! - Outgoing envelopes posted by the bridge

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::bridge::BridgeHandle;
use crate::error::{Error, Result};
use crate::protocol::{InboundEnvelope, OutboundEnvelope};

use super::Outbox;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write an envelope to the socket.
    Post(OutboundEnvelope),
    /// Close the socket.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to the page-side shim.
///
/// Cloning shares the same event loop.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl Connection {
    /// Creates a connection from an upgraded stream and spawns its event loop.
    pub(crate) fn new(ws_stream: WebSocketStream<TcpStream>, bridge: BridgeHandle) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_event_loop(ws_stream, command_rx, bridge));

        Self { command_tx }
    }

    /// Queues an envelope for the shim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop has stopped.
    pub fn post(&self, envelope: OutboundEnvelope) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Post(envelope))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Closes the socket.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: WebSocketStream<TcpStream>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        bridge: BridgeHandle,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Envelopes from the shim
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if !Self::handle_incoming_text(&text, &bridge) {
                                debug!("Bridge stopped, closing relay");
                                let _ = ws_write.close().await;
                                break;
                            }
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("Relay closed by shim");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "Relay WebSocket error");
                            break;
                        }

                        None => {
                            debug!("Relay stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Envelopes from the bridge
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Post(envelope)) => {
                            let json = match envelope.to_text() {
                                Ok(json) => json,
                                Err(e) => {
                                    warn!(error = %e, "Failed to serialize envelope");
                                    continue;
                                }
                            };

                            if let Err(e) = ws_write.send(Message::Text(json.into())).await {
                                warn!(error = %e, "Failed to write envelope");
                                break;
                            }

                            trace!(
                                request_id = %envelope.data.message.request_id(),
                                "Envelope relayed"
                            );
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        debug!("Relay event loop terminated");
    }

    /// Forwards one text frame. Returns `false` if the bridge is gone.
    fn handle_incoming_text(text: &str, bridge: &BridgeHandle) -> bool {
        match InboundEnvelope::from_text(text) {
            Ok(envelope) => bridge.deliver(envelope).is_ok(),
            Err(e) => {
                warn!(error = %e, "Failed to parse relayed envelope");
                true
            }
        }
    }
}

// ============================================================================
// RelayOutbox
// ============================================================================

/// [`Outbox`] backed by whichever relay connection is currently attached.
///
/// Clones share the same slot, so the server can attach connections while
/// the bridge owns the outbox.
#[derive(Clone, Default)]
pub struct RelayOutbox {
    slot: Arc<Mutex<Option<Connection>>>,
}

impl RelayOutbox {
    /// Creates an outbox with no connection attached.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a connection, shutting down the one it replaces.
    pub fn attach(&self, connection: Connection) {
        if let Some(previous) = self.slot.lock().replace(connection) {
            debug!("Replacing relay connection");
            previous.shutdown();
        }
    }

    /// Detaches and returns the current connection.
    pub fn detach(&self) -> Option<Connection> {
        self.slot.lock().take()
    }

    /// Returns `true` if a live connection is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|connection| !connection.is_closed())
    }
}

impl Outbox for RelayOutbox {
    fn post(&mut self, envelope: OutboundEnvelope) -> Result<()> {
        let mut slot = self.slot.lock();
        let connection = slot.as_ref().ok_or(Error::RemoteUnavailable)?;

        if connection.post(envelope).is_err() {
            debug!("Relay connection gone, detaching");
            *slot = None;
            return Err(Error::RemoteUnavailable);
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr};

    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tokio_tungstenite::connect_async;

    use crate::bridge::BridgeEvent;
    use crate::protocol::{ChannelFrame, InboundMessage, OutboundMessage};
    use crate::transport::RelayServer;

    #[test]
    fn test_detached_outbox_is_unavailable() {
        let mut outbox = RelayOutbox::new();
        let envelope = OutboundEnvelope::new(
            "https://longtrainz.github.io",
            ChannelFrame::new("fmg-bridge-v1", OutboundMessage::hello()),
        );

        assert!(!outbox.is_attached());
        assert!(matches!(outbox.post(envelope), Err(Error::RemoteUnavailable)));
    }

    #[tokio::test]
    async fn test_relay_round_trip() {
        let server = RelayServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind");
        let url = server.ws_url();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let handle = BridgeHandle::from_sender(event_tx);

        let accept = tokio::spawn(async move { server.accept(handle).await });
        let (mut client, _) = connect_async(url.as_str()).await.expect("connect");
        let connection = accept.await.expect("join").expect("accept");

        // Shim → bridge
        let inbound = json!({
            "origin": "https://longtrainz.github.io",
            "data": { "chan": "fmg-bridge-v1", "type": "bridge-ready" }
        });
        client
            .send(Message::Text(inbound.to_string().into()))
            .await
            .expect("send");

        match event_rx.recv().await {
            Some(BridgeEvent::Inbound(envelope)) => {
                assert_eq!(
                    envelope.open("https://longtrainz.github.io", "fmg-bridge-v1"),
                    Some(InboundMessage::BridgeReady)
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // Bridge → shim
        let mut outbox = RelayOutbox::new();
        outbox.attach(connection);
        outbox
            .post(OutboundEnvelope::new(
                "https://longtrainz.github.io",
                ChannelFrame::new("fmg-bridge-v1", OutboundMessage::hello()),
            ))
            .expect("post");

        let frame = client.next().await.expect("frame").expect("ok");
        let value: Value = serde_json::from_str(frame.to_text().expect("text")).expect("json");
        assert_eq!(value["targetOrigin"], "https://longtrainz.github.io");
        assert_eq!(value["data"]["type"], "hello");
        assert_eq!(value["data"]["chan"], "fmg-bridge-v1");
    }
}
