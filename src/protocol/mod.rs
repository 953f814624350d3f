//! Cross-context protocol message types.
//!
//! This module defines the message format for communication between the
//! host (Rust) and the embedded map generator (remote).
//!
//! # Protocol Overview
//!
//! | Step | Direction | Message |
//! |------|-----------|---------|
//! | 1 | Remote → Host | `bridge-ready` |
//! | 2 | Host → Remote | `hello` |
//! | 3 | Remote → Host | `hello-ok` |
//! | 4 | Host → Remote | `export` |
//! | 5 | Remote → Host | `export-start`, `export-chunk` × n, `export-end` |
//! | * | Remote → Host | `error` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Origin-tagged inbound/outbound envelopes |
//! | `message` | Inbound and outbound message types |

// ============================================================================
// Submodules
// ============================================================================

/// Origin-tagged envelopes.
pub mod envelope;

/// Channel message types.
pub mod message;

// ============================================================================
// Constants
// ============================================================================

/// Origin of the embedded map generator.
pub const TRUSTED_ORIGIN: &str = "https://longtrainz.github.io";

/// Channel discriminant of this protocol.
pub const CHANNEL: &str = "fmg-bridge-v1";

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{InboundEnvelope, OutboundEnvelope};
pub use message::{ChannelFrame, ExportFormat, InboundMessage, OutboundMessage};
