//! Bridge protocol state machine.
//!
//! Every handler runs to completion before the next event is processed, so
//! session state needs no locking. The only suspension is the short delay
//! between `hello-ok` and a deferred export, which is scheduled as an event.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{
    ChannelFrame, InboundEnvelope, InboundMessage, OutboundEnvelope, OutboundMessage,
};
use crate::transport::Outbox;

use super::geometry::repair_bounds;
use super::options::BridgeOptions;
use super::presenter::{DownloadArtifact, Presenter, Status};
use super::scheduler::{ScheduledTask, Scheduler};
use super::state::SessionState;

// ============================================================================
// BridgeEvent
// ============================================================================

/// Events consumed by the bridge, one at a time.
#[derive(Debug)]
pub enum BridgeEvent {
    /// A message from another browsing context.
    Inbound(InboundEnvelope),
    /// The user clicked export.
    ExportRequested,
    /// The user clicked download; the artifact is sent back, if any.
    DownloadRequested(oneshot::Sender<Option<DownloadArtifact>>),
    /// The post-handshake delay elapsed.
    DeferredExport,
    /// Stop the event loop.
    Shutdown,
}

// ============================================================================
// Bridge
// ============================================================================

/// Host side of the export protocol.
pub struct Bridge<O, P> {
    options: BridgeOptions,
    outbox: O,
    presenter: P,
    scheduler: Scheduler<BridgeEvent>,
    state: SessionState,
    deferred_export: Option<ScheduledTask>,
}

impl<O: Outbox, P: Presenter> Bridge<O, P> {
    /// Creates a bridge in the `Uninitialized` phase.
    ///
    /// `scheduler` must feed the queue this bridge is driven from.
    pub fn new(
        options: BridgeOptions,
        outbox: O,
        mut presenter: P,
        scheduler: Scheduler<BridgeEvent>,
    ) -> Self {
        presenter.set_export_enabled(false);
        presenter.set_download_enabled(false);

        Self {
            options,
            outbox,
            presenter,
            scheduler,
            state: SessionState::new(),
            deferred_export: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Session state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Options the bridge runs with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// The presenter.
    #[inline]
    #[must_use]
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// The outbox.
    #[inline]
    #[must_use]
    pub fn outbox(&self) -> &O {
        &self.outbox
    }

    /// Handle of the pending deferred export, if one was scheduled.
    #[inline]
    #[must_use]
    pub fn deferred_export(&self) -> Option<&ScheduledTask> {
        self.deferred_export.as_ref()
    }

    // ========================================================================
    // Event Dispatch
    // ========================================================================

    /// Handles one event.
    ///
    /// [`BridgeEvent::Shutdown`] only cancels a pending deferred export;
    /// stopping the loop is up to the caller.
    pub fn handle_event(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::Inbound(envelope) => self.handle_envelope(envelope),
            BridgeEvent::ExportRequested => self.request_export(),
            BridgeEvent::DownloadRequested(reply) => {
                let _ = reply.send(self.request_download());
            }
            BridgeEvent::DeferredExport => {
                self.deferred_export = None;
                self.send_export();
            }
            BridgeEvent::Shutdown => {
                if let Some(task) = self.deferred_export.take() {
                    task.cancel();
                }
            }
        }
    }

    /// Filters an envelope by origin and channel, then handles the message.
    pub fn handle_envelope(&mut self, envelope: InboundEnvelope) {
        if let Some(message) = envelope.open(&self.options.trusted_origin, &self.options.channel) {
            self.handle_message(message);
        }
    }

    /// Handles a decoded channel message.
    pub fn handle_message(&mut self, message: InboundMessage) {
        debug!(
            kind = message.kind(),
            phase = self.state.phase().name(),
            "Message from remote"
        );

        match message {
            InboundMessage::BridgeReady => self.on_bridge_ready(),
            InboundMessage::HelloOk => self.on_hello_ok(),
            InboundMessage::ExportStart { request_id, total } => {
                self.on_export_start(&request_id, total);
            }
            InboundMessage::ExportChunk {
                request_id,
                index,
                data,
            } => self.on_export_chunk(&request_id, index, data),
            InboundMessage::ExportEnd { request_id } => self.on_export_end(&request_id),
            InboundMessage::Error { error, .. } => self.on_remote_error(error),
            InboundMessage::Unknown => trace!("Ignoring unknown message type"),
        }
    }

    // ========================================================================
    // User Triggers
    // ========================================================================

    /// Export trigger.
    pub fn request_export(&mut self) {
        if !self.state.remote_ready() {
            self.presenter.status(&Status::RemoteNotReady);
            return;
        }
        self.send_export();
    }

    /// Download trigger: the last repaired document, if any.
    #[must_use]
    pub fn request_download(&self) -> Option<DownloadArtifact> {
        self.state
            .last_completed_document()
            .map(|document| DownloadArtifact::svg(self.options.file_name.clone(), document))
    }

    // ========================================================================
    // Handshake
    // ========================================================================

    fn on_bridge_ready(&mut self) {
        if self.state.mark_remote_ready() {
            info!("Remote ready");
        }
        self.presenter.status(&Status::RemoteReady);
        if self.state.active_request_id().is_none() {
            self.presenter.set_export_enabled(true);
        }
        self.send_hello();
    }

    fn on_hello_ok(&mut self) {
        let export_was_pending = self.state.acknowledge_handshake();
        info!(export_was_pending, "Handshake acknowledged");
        self.presenter.status(&Status::HandshakeEstablished);

        if export_was_pending {
            let task = self
                .scheduler
                .schedule(self.options.handshake_delay, BridgeEvent::DeferredExport);
            self.deferred_export = Some(task);
        }
    }

    fn send_hello(&mut self) {
        let message = OutboundMessage::hello();
        let request_id = message.request_id().clone();

        if self.post(message).is_ok() {
            debug!(%request_id, "Hello sent");
            self.presenter.status(&Status::SendingHello);
        }
    }

    // ========================================================================
    // Export
    // ========================================================================

    fn send_export(&mut self) {
        if !self.state.handshake_acknowledged() {
            self.state.defer_export();
            self.send_hello();
            self.presenter.status(&Status::WaitingForHandshake);
            return;
        }

        let request_id = RequestId::export();
        if self.post(OutboundMessage::export(request_id.clone())).is_err() {
            return;
        }

        info!(%request_id, "Export requested");
        self.state.begin_export(request_id);
        self.presenter.status(&Status::RequestingExport);
        self.presenter.set_export_enabled(false);
        self.presenter.set_download_enabled(false);
    }

    fn on_export_start(&mut self, request_id: &RequestId, total: usize) {
        match self
            .state
            .start_fragments(request_id, total, self.options.max_fragments)
        {
            Ok(Some(progress)) => {
                debug!(%request_id, total, "Export stream started");
                self.presenter.status(&Status::Receiving(progress));
            }
            Ok(None) => trace!(%request_id, "Ignoring export-start for inactive request"),
            Err(e) => {
                warn!(%request_id, error = %e, "Export abandoned");
                self.presenter.status(&Status::ExportFailed(e.to_string()));
                self.presenter.set_export_enabled(true);
                self.presenter
                    .set_download_enabled(self.state.last_completed_document().is_some());
            }
        }
    }

    fn on_export_chunk(&mut self, request_id: &RequestId, index: usize, data: String) {
        match self.state.write_fragment(request_id, index, data) {
            Ok(Some(progress)) => {
                trace!(%request_id, index, %progress, "Fragment stored");
                self.presenter.status(&Status::Receiving(progress));
            }
            Ok(None) => trace!(%request_id, "Ignoring export-chunk for inactive request"),
            Err(e) => warn!(%request_id, index, error = %e, "Discarding fragment"),
        }
    }

    fn on_export_end(&mut self, request_id: &RequestId) {
        let repaired = match self.state.finish_export(request_id) {
            Ok(None) => {
                trace!(%request_id, "Ignoring export-end for inactive request");
                return;
            }
            Ok(Some(raw)) => repair_bounds(&raw, self.options.padding),
            Err(e) => Err(e),
        };

        match repaired {
            Ok(document) => {
                let length = document.encode_utf16().count();
                info!(%request_id, length, "Export complete");
                self.presenter.show_preview(&document);
                self.presenter.status(&Status::Done { length });
                self.state.store_document(document);
                self.presenter.set_export_enabled(true);
                self.presenter.set_download_enabled(true);
            }
            Err(e) => {
                warn!(%request_id, error = %e, "Export failed");
                self.presenter.status(&Status::ExportFailed(e.to_string()));
                self.presenter.set_export_enabled(true);
                self.presenter
                    .set_download_enabled(self.state.last_completed_document().is_some());
            }
        }
    }

    fn on_remote_error(&mut self, error: String) {
        warn!(error = %error, "Remote reported an error");
        self.presenter.status(&Status::RemoteError(error));
        self.presenter.set_export_enabled(true);
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    fn post(&mut self, message: OutboundMessage) -> Result<()> {
        let envelope = OutboundEnvelope::new(
            self.options.trusted_origin.clone(),
            ChannelFrame::new(self.options.channel.clone(), message),
        );

        self.outbox.post(envelope).inspect_err(|e| {
            warn!(error = %e, "Message not sent");
            let status = match e {
                Error::RemoteUnavailable => Status::RemoteUnavailable,
                other => Status::ExportFailed(other.to_string()),
            };
            self.presenter.status(&status);
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
