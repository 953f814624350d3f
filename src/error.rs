//! Error types for the export bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```
//! use fmg_export_bridge::{Result, repair_bounds, BoundsPadding};
//!
//! fn repair(svg: &str) -> Result<String> {
//!     let fixed = repair_bounds(svg, BoundsPadding::default())?;
//!     Ok(fixed)
//! }
//! # repair("<svg/>").unwrap();
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Transport | [`Error::RemoteUnavailable`], [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`], [`Error::FragmentOutOfRange`], [`Error::TooManyFragments`], [`Error::ExportNotStarted`] |
//! | Document | [`Error::MalformedDocument`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when bridge options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The remote context is not available yet.
    ///
    /// Returned when a message is posted before the embedded application
    /// (or the relay carrying its messages) is attached. Nothing is sent.
    #[error("Remote context not available")]
    RemoteUnavailable,

    /// Relay connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Timeout waiting for the relay to connect.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Relay connection or event loop closed.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or undecodable message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// A fragment index outside the announced range.
    #[error("Fragment index {index} out of range for {total} fragments")]
    FragmentOutOfRange {
        /// Index carried by the chunk.
        index: usize,
        /// Fragment count announced by `export-start`.
        total: usize,
    },

    /// `export-start` announced more fragments than the bridge accepts.
    #[error("Export announced {total} fragments, limit is {max}")]
    TooManyFragments {
        /// Fragment count announced by `export-start`.
        total: usize,
        /// Configured limit.
        max: usize,
    },

    /// Export data arrived before `export-start` for the active request.
    #[error("Export {request_id} has not started")]
    ExportNotStarted {
        /// The active request.
        request_id: RequestId,
    },

    // ========================================================================
    // Document Errors
    // ========================================================================
    /// The reassembled document is not well-formed markup.
    #[error("Malformed document: {message}")]
    MalformedDocument {
        /// Parser diagnostic.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a fragment out of range error.
    #[inline]
    pub fn fragment_out_of_range(index: usize, total: usize) -> Self {
        Self::FragmentOutOfRange { index, total }
    }

    /// Creates an export not started error.
    #[inline]
    pub fn export_not_started(request_id: RequestId) -> Self {
        Self::ExportNotStarted { request_id }
    }

    /// Creates a malformed document error.
    #[inline]
    pub fn malformed_document(message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            message: message.into(),
        }
    }

    /// Creates a too many fragments error.
    #[inline]
    pub fn too_many_fragments(total: usize, max: usize) -> Self {
        Self::TooManyFragments { total, max }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a transport error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable
                | Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error comes from reassembling an export.
    #[inline]
    #[must_use]
    pub fn is_reassembly_error(&self) -> bool {
        matches!(
            self,
            Self::FragmentOutOfRange { .. }
                | Self::TooManyFragments { .. }
                | Self::ExportNotStarted { .. }
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed when the user retries the export.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable
                | Self::ConnectionTimeout { .. }
                | Self::TooManyFragments { .. }
                | Self::MalformedDocument { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
