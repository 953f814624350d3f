//! Type-safe identifiers for bridge requests.
//!
//! The remote application echoes the correlation token it received on every
//! response, so tokens are opaque strings on the wire. Locally generated
//! tokens carry a prefix naming the request kind followed by a random
//! uniquifier.
//!
//! # Example
//!
//! ```
//! use fmg_export_bridge::RequestId;
//!
//! let hello = RequestId::handshake();
//! let export = RequestId::export();
//!
//! assert!(hello.as_str().starts_with("hello-"));
//! assert!(export.as_str().starts_with("exp-"));
//! assert_ne!(hello, export);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// RequestKind
// ============================================================================

/// Kind of logical request a correlation token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Handshake (`hello`) request.
    Handshake,
    /// Export request.
    Export,
}

impl RequestKind {
    /// Returns the token prefix for this kind.
    #[inline]
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Handshake => "hello-",
            Self::Export => "exp-",
        }
    }
}

// ============================================================================
// RequestId
// ============================================================================

/// Correlation token for one request/response cycle.
///
/// Serialized as a plain string (`requestId` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generates a fresh token of the given kind.
    #[must_use]
    pub fn generate(kind: RequestKind) -> Self {
        Self(format!("{}{}", kind.prefix(), Uuid::new_v4().simple()))
    }

    /// Generates a fresh handshake token (`hello-…`).
    #[inline]
    #[must_use]
    pub fn handshake() -> Self {
        Self::generate(RequestKind::Handshake)
    }

    /// Generates a fresh export token (`exp-…`).
    #[inline]
    #[must_use]
    pub fn export() -> Self {
        Self::generate(RequestKind::Export)
    }

    /// Wraps an existing token, e.g. one received from the remote.
    #[inline]
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the token as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the kind inferred from the prefix, if it is one of ours.
    #[must_use]
    pub fn kind(&self) -> Option<RequestKind> {
        [RequestKind::Handshake, RequestKind::Export]
            .into_iter()
            .find(|kind| self.0.starts_with(kind.prefix()))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(raw: &str) -> Self {
        Self::from_raw(raw)
    }
}

// ============================================================================
// Tests
// ============================================================================
