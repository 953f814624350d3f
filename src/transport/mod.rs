//! Transport between the bridge and the remote context.
//!
//! The bridge only needs to post origin-addressed envelopes; inbound
//! envelopes are fed into its event queue by whoever owns the receiving end.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Bridge (Rust)  │         WebSocket            │  Page shim      │
//! │                 │◄────────────────────────────►│  postMessage ↔  │
//! │  RelayServer    │      localhost:PORT          │  map frame      │
//! │  → Connection   │                              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | In-memory outbox backed by a tokio channel |
//! | `connection` | WebSocket relay connection and event loop |
//! | `server` | WebSocket relay server binding and acceptance |

// ============================================================================
// Submodules
// ============================================================================

/// In-memory outbox.
pub mod channel;

/// WebSocket relay connection and event loop.
pub mod connection;

/// WebSocket relay server.
pub mod server;

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;
use crate::protocol::OutboundEnvelope;

// ============================================================================
// Outbox
// ============================================================================

/// Outbound side of the messaging channel.
pub trait Outbox {
    /// Posts an envelope to the remote context.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RemoteUnavailable`] if no remote context is
    /// attached. The envelope is dropped; there is no retry.
    fn post(&mut self, envelope: OutboundEnvelope) -> Result<()>;
}

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::ChannelOutbox;
pub use connection::{Connection, RelayOutbox};
pub use server::RelayServer;
