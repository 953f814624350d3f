//! Event loop driving a [`Bridge`].
//!
//! All inbound envelopes, user triggers and scheduled events go through one
//! unbounded queue and are handled strictly one at a time on a single task.
//!
//! # Example
//!
//! ```no_run
//! use fmg_export_bridge::{BridgeOptions, BridgeRunner, TracingPresenter};
//! use fmg_export_bridge::transport::ChannelOutbox;
//!
//! # async fn example() -> fmg_export_bridge::Result<()> {
//! let (outbox, _outbound) = ChannelOutbox::new();
//! let (runner, handle) = BridgeRunner::new(BridgeOptions::default(), outbox, TracingPresenter)?;
//! let task = tokio::spawn(runner.run());
//!
//! // Forward `_outbound` to the map frame, feed its replies via `handle.deliver(..)`.
//! handle.request_export()?;
//!
//! if let Some(artifact) = handle.download().await? {
//!     artifact.save_to(".")?;
//! }
//!
//! handle.shutdown();
//! let _bridge = task.await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::InboundEnvelope;
use crate::transport::Outbox;

use super::machine::{Bridge, BridgeEvent};
use super::options::BridgeOptions;
use super::presenter::{DownloadArtifact, Presenter};
use super::scheduler::Scheduler;

// ============================================================================
// BridgeHandle
// ============================================================================

/// Cloneable trigger surface of a running bridge.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl BridgeHandle {
    /// Wraps the sending half of a bridge queue.
    #[inline]
    pub(crate) fn from_sender(tx: mpsc::UnboundedSender<BridgeEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: BridgeEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| Error::ConnectionClosed)
    }

    /// Feeds a message received from another browsing context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop has stopped.
    pub fn deliver(&self, envelope: InboundEnvelope) -> Result<()> {
        self.send(BridgeEvent::Inbound(envelope))
    }

    /// Export trigger.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop has stopped.
    pub fn request_export(&self) -> Result<()> {
        self.send(BridgeEvent::ExportRequested)
    }

    /// Download trigger: resolves to the last repaired document, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop has stopped.
    pub async fn download(&self) -> Result<Option<DownloadArtifact>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(BridgeEvent::DownloadRequested(reply_tx))?;
        Ok(reply_rx.await?)
    }

    /// Stops the event loop after queued events are handled.
    pub fn shutdown(&self) {
        let _ = self.tx.send(BridgeEvent::Shutdown);
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Completes once the event loop has stopped.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

// ============================================================================
// BridgeRunner
// ============================================================================

/// Owns a [`Bridge`] and its event queue.
pub struct BridgeRunner<O, P> {
    bridge: Bridge<O, P>,
    events: mpsc::UnboundedReceiver<BridgeEvent>,
}

impl<O: Outbox, P: Presenter> BridgeRunner<O, P> {
    /// Validates `options` and creates a runner plus its trigger handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] or [`Error::Url`] if the options are invalid.
    pub fn new(options: BridgeOptions, outbox: O, presenter: P) -> Result<(Self, BridgeHandle)> {
        options.validate()?;

        let (tx, events) = mpsc::unbounded_channel();
        let bridge = Bridge::new(options, outbox, presenter, Scheduler::new(tx.clone()));

        Ok((Self { bridge, events }, BridgeHandle::from_sender(tx)))
    }

    /// The bridge, for inspection before the loop starts.
    #[inline]
    #[must_use]
    pub fn bridge(&self) -> &Bridge<O, P> {
        &self.bridge
    }

    /// Handles events until [`BridgeHandle::shutdown`]; returns the bridge.
    pub async fn run(mut self) -> Bridge<O, P> {
        debug!("Bridge event loop started");

        while let Some(event) = self.events.recv().await {
            let stop = matches!(event, BridgeEvent::Shutdown);
            self.bridge.handle_event(event);
            if stop {
                break;
            }
        }

        debug!("Bridge event loop terminated");
        self.bridge
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};
    use tracing_subscriber::EnvFilter;

    use crate::bridge::presenter::{RecordingPresenter, Status};
    use crate::bridge::state::Phase;
    use crate::protocol::{OutboundEnvelope, OutboundMessage};
    use crate::transport::ChannelOutbox;

    const ORIGIN: &str = "https://longtrainz.github.io";

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn envelope(mut data: Value) -> InboundEnvelope {
        data["chan"] = json!("fmg-bridge-v1");
        InboundEnvelope::new(ORIGIN, data)
    }

    /// Plays the map frame: answers hello and export requests.
    async fn fake_remote(
        mut outbound: mpsc::UnboundedReceiver<OutboundEnvelope>,
        handle: BridgeHandle,
        fragments: Vec<&'static str>,
    ) -> usize {
        let mut exports = 0;
        while let Some(outgoing) = outbound.recv().await {
            match outgoing.data.message {
                OutboundMessage::Hello { .. } => {
                    let _ = handle.deliver(envelope_ok());
                }
                OutboundMessage::Export { request_id, .. } => {
                    exports += 1;
                    let total = fragments.len();
                    let _ = handle.deliver(envelope(
                        json!({ "type": "export-start", "requestId": request_id, "total": total }),
                    ));
                    for (index, data) in fragments.iter().enumerate().rev() {
                        let _ = handle.deliver(envelope(json!({
                            "type": "export-chunk",
                            "requestId": request_id,
                            "index": index,
                            "data": data
                        })));
                    }
                    let _ = handle.deliver(envelope(
                        json!({ "type": "export-end", "requestId": request_id }),
                    ));
                }
            }
        }
        exports
    }

    fn envelope_ok() -> InboundEnvelope {
        envelope(json!({ "type": "hello-ok" }))
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = BridgeOptions::new().with_channel("");
        let result = BridgeRunner::new(options, ChannelOutbox::detached(), RecordingPresenter::new());
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_clicked_before_handshake_completes() {
        init_tracing();

        let (outbox, outbound) = ChannelOutbox::new();
        let presenter = RecordingPresenter::new();
        let (runner, handle) =
            BridgeRunner::new(BridgeOptions::default(), outbox, presenter.clone()).expect("runner");
        let bridge_task = tokio::spawn(runner.run());

        // Ready arrives and the user clicks export before hello-ok is processed.
        handle
            .deliver(envelope(json!({ "type": "bridge-ready" })))
            .expect("deliver");
        handle.request_export().expect("export");

        let remote = tokio::spawn(fake_remote(
            outbound,
            handle.clone(),
            vec!["<svg>", "<g/>", "</svg>"],
        ));

        // Auto-advance carries the deferred export past its delay.
        let artifact = loop {
            if let Some(artifact) = handle.download().await.expect("download") {
                break artifact;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        };

        assert_eq!(
            artifact.contents,
            r#"<svg width="1480" height="1080" viewBox="-140 -140 1480 1080"><g/></svg>"#
        );

        handle.shutdown();
        let bridge = bridge_task.await.expect("join");
        assert_eq!(bridge.state().phase(), &Phase::Idle);

        // Dropping the bridge closes the outbox, which ends the fake remote.
        drop(bridge);
        assert_eq!(remote.await.expect("join"), 1);

        let log = presenter.snapshot();
        assert!(log.statuses.contains(&Status::WaitingForHandshake));
        assert!(matches!(log.last_status(), Some(Status::Done { .. })));
        assert!(log.download_enabled);
    }

    #[tokio::test]
    async fn test_handle_after_shutdown() {
        let (runner, handle) = BridgeRunner::new(
            BridgeOptions::default(),
            ChannelOutbox::detached(),
            RecordingPresenter::new(),
        )
        .expect("runner");

        handle.shutdown();
        let _bridge = runner.run().await;

        assert!(handle.is_closed());
        handle.closed().await;
        assert!(matches!(handle.request_export(), Err(Error::ConnectionClosed)));
        assert!(matches!(handle.download().await, Err(Error::ConnectionClosed)));
    }
}
