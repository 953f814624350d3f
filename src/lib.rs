//! FMG Export Bridge - host-side SVG export from an embedded map generator.
//!
//! The map generator runs in an isolated browsing context on a fixed origin.
//! This crate drives its export protocol from the host side: handshake,
//! export request, chunked transfer, reassembly, and a bounding-box repair of
//! the reassembled SVG before it is offered for preview and download.
//!
//! # Architecture
//!
//! - **Host (Rust)**: [`Bridge`] state machine, driven by [`BridgeRunner`]
//! - **Remote (map frame)**: answers `hello`/`export` over `postMessage`
//!
//! Key design principles:
//!
//! - One owned [`SessionState`]; handlers run to completion, no locks
//! - Closed message types; unknown tags are ignored explicitly
//! - Correlation tokens reject stale or foreign responses
//! - Transport behind the [`transport::Outbox`] trait
//!
//! # Quick Start
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! use fmg_export_bridge::transport::{RelayOutbox, RelayServer};
//! use fmg_export_bridge::{BridgeOptions, BridgeRunner, Result, TracingPresenter};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let outbox = RelayOutbox::new();
//!     let (runner, handle) =
//!         BridgeRunner::new(BridgeOptions::default(), outbox.clone(), TracingPresenter)?;
//!
//!     let server = RelayServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
//!     println!("page shim should connect to {}", server.ws_url());
//!     tokio::spawn(server.serve(handle.clone(), outbox));
//!     let bridge = tokio::spawn(runner.run());
//!
//!     handle.request_export()?;
//!     // ... later
//!     if let Some(artifact) = handle.download().await? {
//!         artifact.save_to(".")?;
//!     }
//!
//!     handle.shutdown();
//!     let _ = bridge.await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | State machine, reassembly, geometry repair, event loop |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Correlation tokens |
//! | [`protocol`] | Channel message types and envelopes |
//! | [`transport`] | Outbox trait, in-memory outbox, WebSocket relay |

// ============================================================================
// Modules
// ============================================================================

/// Host side of the export bridge.
///
/// - [`Bridge`] - protocol state machine
/// - [`BridgeRunner`] - event loop owning a bridge
/// - [`repair_bounds`] - bounding-box repair
pub mod bridge;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Correlation tokens.
pub mod identifiers;

/// Channel message types.
pub mod protocol;

/// Transport to the remote context.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{
    BoundsPadding, Bridge, BridgeEvent, BridgeHandle, BridgeOptions, BridgeRunner,
    DownloadArtifact, Phase, Presenter, ReassemblyBuffer, RecordingPresenter, SessionState,
    Status, TracingPresenter, repair_bounds,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, RequestKind};

// Protocol types
pub use protocol::{InboundEnvelope, InboundMessage, OutboundEnvelope, OutboundMessage};
