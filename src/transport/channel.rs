//! In-memory outbox.
//!
//! Envelopes are pushed onto an unbounded tokio channel. Embedders that own
//! the real cross-context channel (e.g. a wasm host) drain the receiver and
//! forward; tests inspect it directly.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::OutboundEnvelope;

use super::Outbox;

// ============================================================================
// ChannelOutbox
// ============================================================================

/// Outbox writing into a tokio channel.
///
/// Posting fails with [`Error::RemoteUnavailable`] while detached or after
/// the receiver is dropped.
#[derive(Debug, Default)]
pub struct ChannelOutbox {
    tx: Option<mpsc::UnboundedSender<OutboundEnvelope>>,
}

impl ChannelOutbox {
    /// Creates an attached outbox and its receiving end.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Creates an outbox with no remote attached.
    #[inline]
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Attaches a receiving end, replacing any previous one.
    pub fn attach(&mut self) -> mpsc::UnboundedReceiver<OutboundEnvelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = Some(tx);
        rx
    }

    /// Returns `true` if a live receiver is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

impl Outbox for ChannelOutbox {
    fn post(&mut self, envelope: OutboundEnvelope) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(Error::RemoteUnavailable)?;
        trace!(request_id = %envelope.data.message.request_id(), "Posting envelope");
        tx.send(envelope).map_err(|_| Error::RemoteUnavailable)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::{ChannelFrame, OutboundMessage};

    fn envelope() -> OutboundEnvelope {
        OutboundEnvelope::new(
            "https://longtrainz.github.io",
            ChannelFrame::new("fmg-bridge-v1", OutboundMessage::hello()),
        )
    }

    #[test]
    fn test_post_reaches_receiver() {
        let (mut outbox, mut rx) = ChannelOutbox::new();
        let sent = envelope();

        outbox.post(sent.clone()).expect("post");

        assert_eq!(rx.try_recv().expect("received"), sent);
    }

    #[test]
    fn test_detached_is_unavailable() {
        let mut outbox = ChannelOutbox::detached();
        assert!(!outbox.is_attached());
        assert!(matches!(outbox.post(envelope()), Err(Error::RemoteUnavailable)));
    }

    #[test]
    fn test_dropped_receiver_is_unavailable() {
        let (mut outbox, rx) = ChannelOutbox::new();
        drop(rx);
        assert!(!outbox.is_attached());
        assert!(matches!(outbox.post(envelope()), Err(Error::RemoteUnavailable)));
    }

    #[test]
    fn test_attach_later() {
        let mut outbox = ChannelOutbox::detached();
        let mut rx = outbox.attach();
        outbox.post(envelope()).expect("post");
        assert!(rx.try_recv().is_ok());
    }
}
