//! Origin-tagged envelopes.
//!
//! The messaging channel is origin-restricted: every inbound message arrives
//! with the origin of the context that posted it, and every outbound message
//! names the origin it may be delivered to.
//!
//! # Format
//!
//! Inbound:
//! ```json
//! { "origin": "https://longtrainz.github.io", "data": { "chan": "fmg-bridge-v1", "type": "hello-ok" } }
//! ```
//!
//! Outbound:
//! ```json
//! { "targetOrigin": "https://longtrainz.github.io", "data": { "chan": "fmg-bridge-v1", "type": "hello", "requestId": "hello-…" } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{trace, warn};

use crate::error::Result;

use super::{ChannelFrame, InboundMessage};

// ============================================================================
// InboundEnvelope
// ============================================================================

/// A raw message received from another browsing context.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InboundEnvelope {
    /// Origin of the posting context.
    pub origin: String,

    /// Message payload; any JSON value.
    #[serde(default)]
    pub data: Value,
}

impl InboundEnvelope {
    /// Creates an envelope.
    #[inline]
    #[must_use]
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }

    /// Decodes an envelope from a relay text frame.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if the text is not an envelope.
    pub fn from_text(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Returns `true` if the envelope comes from `trusted_origin` and carries
    /// the `channel` discriminant.
    #[must_use]
    pub fn is_on_channel(&self, trusted_origin: &str, channel: &str) -> bool {
        self.origin == trusted_origin
            && self.data.get("chan").and_then(Value::as_str) == Some(channel)
    }

    /// Filters and decodes the envelope.
    ///
    /// Returns `None` for foreign origins, foreign channels and payloads that
    /// do not decode as a channel message.
    #[must_use]
    pub fn open(self, trusted_origin: &str, channel: &str) -> Option<InboundMessage> {
        if self.origin != trusted_origin {
            trace!(origin = %self.origin, "Dropping message from untrusted origin");
            return None;
        }

        if self.data.get("chan").and_then(Value::as_str) != Some(channel) {
            trace!("Dropping message from foreign channel");
            return None;
        }

        match InboundMessage::from_value(self.data) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(error = %e, "Dropping undecodable channel message");
                None
            }
        }
    }
}

// ============================================================================
// OutboundEnvelope
// ============================================================================

/// A frame addressed to a specific origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEnvelope {
    /// Origin the frame may be delivered to.
    #[serde(rename = "targetOrigin")]
    pub target_origin: String,

    /// The frame.
    pub data: ChannelFrame,
}

impl OutboundEnvelope {
    /// Creates an envelope.
    #[inline]
    #[must_use]
    pub fn new(target_origin: impl Into<String>, data: ChannelFrame) -> Self {
        Self {
            target_origin: target_origin.into(),
            data,
        }
    }

    /// Encodes the envelope as a relay text frame.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::identifiers::RequestId;
    use crate::protocol::OutboundMessage;

    const ORIGIN: &str = "https://longtrainz.github.io";
    const CHAN: &str = "fmg-bridge-v1";

    #[test]
    fn test_open_accepts_trusted_message() {
        let envelope = InboundEnvelope::new(ORIGIN, json!({ "chan": CHAN, "type": "hello-ok" }));
        assert!(envelope.is_on_channel(ORIGIN, CHAN));
        assert_eq!(envelope.open(ORIGIN, CHAN), Some(InboundMessage::HelloOk));
    }

    #[test]
    fn test_open_rejects_foreign_origin() {
        let envelope = InboundEnvelope::new(
            "https://evil.example",
            json!({ "chan": CHAN, "type": "hello-ok" }),
        );
        assert_eq!(envelope.open(ORIGIN, CHAN), None);
    }

    #[test]
    fn test_open_rejects_foreign_channel() {
        let envelope = InboundEnvelope::new(ORIGIN, json!({ "chan": "other", "type": "hello-ok" }));
        assert_eq!(envelope.open(ORIGIN, CHAN), None);

        let envelope = InboundEnvelope::new(ORIGIN, json!({ "type": "hello-ok" }));
        assert_eq!(envelope.open(ORIGIN, CHAN), None);
    }

    #[test]
    fn test_open_rejects_non_object_payload() {
        let envelope = InboundEnvelope::new(ORIGIN, json!("hello"));
        assert_eq!(envelope.open(ORIGIN, CHAN), None);

        let envelope = InboundEnvelope::new(ORIGIN, Value::Null);
        assert_eq!(envelope.open(ORIGIN, CHAN), None);
    }

    #[test]
    fn test_from_text_rejects_garbage() {
        let err = InboundEnvelope::from_text("{\"data\": 1").unwrap_err();
        assert!(matches!(err, crate::Error::Json(_)));

        let err = InboundEnvelope::from_text(r#"{"data": {}}"#).unwrap_err();
        assert!(matches!(err, crate::Error::Json(_)));
    }

    #[test]
    fn test_inbound_envelope_from_json() {
        let text = r#"{"origin":"https://longtrainz.github.io","data":{"chan":"fmg-bridge-v1","type":"bridge-ready"}}"#;
        let envelope: InboundEnvelope = serde_json::from_str(text).expect("parse");
        assert_eq!(envelope.open(ORIGIN, CHAN), Some(InboundMessage::BridgeReady));
    }

    #[test]
    fn test_outbound_envelope_format() {
        let envelope = OutboundEnvelope::new(
            ORIGIN,
            ChannelFrame::new(
                CHAN,
                OutboundMessage::Hello {
                    request_id: RequestId::from_raw("hello-7"),
                },
            ),
        );
        let value = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(
            value,
            json!({
                "targetOrigin": ORIGIN,
                "data": { "chan": CHAN, "type": "hello", "requestId": "hello-7" }
            })
        );
    }
}
