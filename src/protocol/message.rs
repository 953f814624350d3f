//! Channel message types.
//!
//! Every message crossing the context boundary is a JSON object carrying the
//! channel discriminant (`chan`), a `type` tag and, for correlated messages,
//! a `requestId`.
//!
//! # Message Types
//!
//! | Type | Direction | Payload |
//! |------|-----------|---------|
//! | `bridge-ready` | Remote → Host | none |
//! | `hello` | Host → Remote | `requestId` |
//! | `hello-ok` | Remote → Host | none |
//! | `export` | Host → Remote | `format`, `requestId` |
//! | `export-start` | Remote → Host | `requestId`, `total` |
//! | `export-chunk` | Remote → Host | `requestId`, `index`, `data` |
//! | `export-end` | Remote → Host | `requestId` |
//! | `error` | Remote → Host | `error` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// InboundMessage
// ============================================================================

/// A message sent by the remote application to the host.
///
/// Unrecognized `type` tags decode into [`InboundMessage::Unknown`] so the
/// bridge can ignore them explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundMessage {
    /// The remote finished loading and can accept a handshake.
    BridgeReady,

    /// The remote acknowledged a handshake.
    HelloOk,

    /// An export stream begins.
    ExportStart {
        /// Export correlation token.
        #[serde(rename = "requestId")]
        request_id: RequestId,
        /// Number of fragments to expect.
        total: usize,
    },

    /// One fragment of the exported document.
    ExportChunk {
        /// Export correlation token.
        #[serde(rename = "requestId")]
        request_id: RequestId,
        /// Zero-based fragment position.
        index: usize,
        /// Fragment text.
        data: String,
    },

    /// All fragments have been sent.
    ExportEnd {
        /// Export correlation token.
        #[serde(rename = "requestId")]
        request_id: RequestId,
    },

    /// The remote reports a failure.
    Error {
        /// Human-readable message.
        error: String,
        /// Correlation token, when the remote supplies one. Not used for filtering.
        #[serde(rename = "requestId", default)]
        request_id: Option<RequestId>,
    },

    /// Any other `type` tag.
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Decodes a message from the `data` object of an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if a known message type is missing
    /// required fields or has fields of the wrong type.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::protocol(e.to_string()))
    }

    /// Returns the correlation token carried by this message, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::ExportStart { request_id, .. }
            | Self::ExportChunk { request_id, .. }
            | Self::ExportEnd { request_id } => Some(request_id),
            Self::Error { request_id, .. } => request_id.as_ref(),
            Self::BridgeReady | Self::HelloOk | Self::Unknown => None,
        }
    }

    /// Returns the wire `type` tag of this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BridgeReady => "bridge-ready",
            Self::HelloOk => "hello-ok",
            Self::ExportStart { .. } => "export-start",
            Self::ExportChunk { .. } => "export-chunk",
            Self::ExportEnd { .. } => "export-end",
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
        }
    }
}

// ============================================================================
// OutboundMessage
// ============================================================================

/// A message sent by the host to the remote application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    /// Handshake request.
    Hello {
        /// Handshake correlation token.
        #[serde(rename = "requestId")]
        request_id: RequestId,
    },

    /// Export request.
    Export {
        /// Requested document format.
        format: ExportFormat,
        /// Export correlation token.
        #[serde(rename = "requestId")]
        request_id: RequestId,
    },
}

impl OutboundMessage {
    /// Creates a handshake request with a fresh token.
    #[inline]
    #[must_use]
    pub fn hello() -> Self {
        Self::Hello {
            request_id: RequestId::handshake(),
        }
    }

    /// Creates an SVG export request for the given token.
    #[inline]
    #[must_use]
    pub fn export(request_id: RequestId) -> Self {
        Self::Export {
            format: ExportFormat::Svg,
            request_id,
        }
    }

    /// Returns the correlation token of this message.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        match self {
            Self::Hello { request_id } | Self::Export { request_id, .. } => request_id,
        }
    }
}

// ============================================================================
// ExportFormat
// ============================================================================

/// Export format requested from the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Scalable vector graphics.
    Svg,
}

// ============================================================================
// ChannelFrame
// ============================================================================

/// An outbound message tagged with the channel discriminant.
///
/// # Format
///
/// ```json
/// { "chan": "fmg-bridge-v1", "type": "export", "format": "svg", "requestId": "exp-…" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelFrame {
    /// Channel discriminant.
    pub chan: String,

    /// The message itself.
    #[serde(flatten)]
    pub message: OutboundMessage,
}

impl ChannelFrame {
    /// Creates a frame on the given channel.
    #[inline]
    #[must_use]
    pub fn new(chan: impl Into<String>, message: OutboundMessage) -> Self {
        Self {
            chan: chan.into(),
            message,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_parse_bridge_ready() {
        let msg = InboundMessage::from_value(json!({ "chan": "fmg-bridge-v1", "type": "bridge-ready" }))
            .expect("parse");
        assert_eq!(msg, InboundMessage::BridgeReady);
        assert!(msg.request_id().is_none());
    }

    #[test]
    fn test_parse_export_chunk() {
        let msg = InboundMessage::from_value(json!({
            "chan": "fmg-bridge-v1",
            "type": "export-chunk",
            "requestId": "exp-1",
            "index": 2,
            "data": "<g/>"
        }))
        .expect("parse");

        assert_eq!(
            msg,
            InboundMessage::ExportChunk {
                request_id: RequestId::from_raw("exp-1"),
                index: 2,
                data: "<g/>".to_string(),
            }
        );
        assert_eq!(msg.kind(), "export-chunk");
    }

    #[test]
    fn test_parse_error_without_request_id() {
        let msg = InboundMessage::from_value(json!({ "type": "error", "error": "boom" }))
            .expect("parse");
        assert_eq!(
            msg,
            InboundMessage::Error {
                error: "boom".to_string(),
                request_id: None,
            }
        );
    }

    #[test]
    fn test_unknown_type_is_explicit() {
        let msg = InboundMessage::from_value(json!({ "type": "map-regenerated", "seed": 7 }))
            .expect("parse");
        assert_eq!(msg, InboundMessage::Unknown);
    }

    #[test]
    fn test_missing_field_is_protocol_error() {
        let err = InboundMessage::from_value(json!({ "type": "export-start", "requestId": "exp-1" }))
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_negative_index_is_protocol_error() {
        let err = InboundMessage::from_value(json!({
            "type": "export-chunk",
            "requestId": "exp-1",
            "index": -1,
            "data": ""
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_hello_frame_wire_format() {
        let frame = ChannelFrame::new(
            "fmg-bridge-v1",
            OutboundMessage::Hello {
                request_id: RequestId::from_raw("hello-1"),
            },
        );
        let value = serde_json::to_value(&frame).expect("serialize");
        assert_eq!(
            value,
            json!({ "chan": "fmg-bridge-v1", "type": "hello", "requestId": "hello-1" })
        );
    }

    #[test]
    fn test_export_frame_wire_format() {
        let frame = ChannelFrame::new(
            "fmg-bridge-v1",
            OutboundMessage::export(RequestId::from_raw("exp-9")),
        );
        let value = serde_json::to_value(&frame).expect("serialize");
        assert_eq!(
            value,
            json!({
                "chan": "fmg-bridge-v1",
                "type": "export",
                "format": "svg",
                "requestId": "exp-9"
            })
        );
    }

    #[test]
    fn test_fresh_hello_token() {
        let a = OutboundMessage::hello();
        let b = OutboundMessage::hello();
        assert_ne!(a.request_id(), b.request_id());
    }
}
