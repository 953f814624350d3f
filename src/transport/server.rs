//! WebSocket relay server.
//!
//! The host page embeds a small shim that connects here and relays
//! `postMessage` traffic between the map frame and the bridge.
//!
//! # Connection Flow
//!
//! 1. Rust binds the relay to `localhost:0` (random port)
//! 2. The page shim connects to [`RelayServer::ws_url`]
//! 3. The connection is attached to a [`RelayOutbox`]; inbound envelopes
//!    flow into the bridge queue
//! 4. A page reload reconnects; the new connection replaces the old one

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::bridge::BridgeHandle;
use crate::error::{Error, Result};

use super::{Connection, RelayOutbox};

// ============================================================================
// Constants
// ============================================================================

/// Timeout for waiting for the shim to connect.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// RelayServer
// ============================================================================

/// A bound relay server.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use fmg_export_bridge::transport::{RelayOutbox, RelayServer};
///
/// let server = RelayServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// println!("shim should connect to {}", server.ws_url());
///
/// let outbox = RelayOutbox::new();
/// tokio::spawn(server.serve(handle, outbox.clone()));
/// ```
pub struct RelayServer {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Port the server is bound to.
    port: u16,
}

impl RelayServer {
    /// Binds the relay to the specified address and port.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let addr = SocketAddr::new(ip, port);
        let listener = TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        debug!(port = actual_port, "Relay server bound");

        Ok(Self {
            listener,
            port: actual_port,
        })
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the WebSocket URL for this server.
    ///
    /// Format: `ws://127.0.0.1:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Accepts one shim connection (30s timeout).
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if nothing connects in time
    /// - [`Error::Connection`] if the WebSocket upgrade fails
    pub async fn accept(&self, bridge: BridgeHandle) -> Result<Connection> {
        let (stream, addr) = timeout(CONNECTION_TIMEOUT, self.listener.accept())
            .await
            .map_err(|_| Error::connection_timeout(CONNECTION_TIMEOUT.as_millis() as u64))??;

        debug!(?addr, "TCP connection accepted");
        self.upgrade(stream, bridge).await
    }

    /// Accepts shim connections until the bridge stops, attaching each one.
    ///
    /// A new connection replaces the attached one. Once the bridge stops the
    /// attached connection is closed and this returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the listener fails.
    pub async fn serve(self, bridge: BridgeHandle, outbox: RelayOutbox) -> Result<()> {
        info!(url = %self.ws_url(), "Relay serving");

        loop {
            let (stream, addr) = tokio::select! {
                accepted = self.listener.accept() => accepted?,
                () = bridge.closed() => break,
            };
            debug!(?addr, "TCP connection accepted");

            match self.upgrade(stream, bridge.clone()).await {
                Ok(connection) => outbox.attach(connection),
                Err(e) => warn!(error = %e, "Relay upgrade failed"),
            }
        }

        if let Some(connection) = outbox.detach() {
            connection.shutdown();
        }

        debug!("Bridge stopped, relay no longer accepting");
        Ok(())
    }

    async fn upgrade(&self, stream: TcpStream, bridge: BridgeHandle) -> Result<Connection> {
        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        info!(port = self.port, "Relay connection established");

        Ok(Connection::new(ws_stream, bridge))
    }
}

// ============================================================================
// Tests
// ============================================================================
