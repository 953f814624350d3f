//! Session state owned by the bridge.
//!
//! The lifecycle is `Uninitialized → AwaitingHandshakeAck → Idle →
//! ExportInFlight → Idle`. Fields are private; the bridge mutates them only
//! through the transition methods below, which carry the correlation checks.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::reassembly::ReassemblyBuffer;

// ============================================================================
// Phase
// ============================================================================

/// Protocol phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Phase {
    /// No readiness signal received yet.
    #[default]
    Uninitialized,

    /// `hello` sent, waiting for `hello-ok`.
    AwaitingHandshakeAck,

    /// Handshake done, no export in flight.
    Idle,

    /// An export was requested.
    ExportInFlight {
        /// Active correlation token.
        request_id: RequestId,
        /// Allocated by `export-start`; `None` before it arrives.
        buffer: Option<ReassemblyBuffer>,
    },
}

impl Phase {
    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::AwaitingHandshakeAck => "awaiting-handshake-ack",
            Self::Idle => "idle",
            Self::ExportInFlight { .. } => "export-in-flight",
        }
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Fragment progress of the active export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Slots holding non-empty text.
    pub received: usize,
    /// Announced fragment count.
    pub total: usize,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.received, self.total)
    }
}

// ============================================================================
// SessionState
// ============================================================================

/// Per-page session state. Created once, all flags cleared.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    remote_ready: bool,
    handshake_acknowledged: bool,
    export_pending_handshake: bool,
    phase: Phase,
    last_completed_document: Option<String>,
}

impl SessionState {
    /// Creates an empty session.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current phase.
    #[inline]
    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// `true` once the remote sent `bridge-ready`.
    #[inline]
    #[must_use]
    pub fn remote_ready(&self) -> bool {
        self.remote_ready
    }

    /// `true` once the remote sent `hello-ok`.
    #[inline]
    #[must_use]
    pub fn handshake_acknowledged(&self) -> bool {
        self.handshake_acknowledged
    }

    /// `true` while an export waits for the handshake.
    #[inline]
    #[must_use]
    pub fn export_pending_handshake(&self) -> bool {
        self.export_pending_handshake
    }

    /// Token of the export in flight.
    #[must_use]
    pub fn active_request_id(&self) -> Option<&RequestId> {
        match &self.phase {
            Phase::ExportInFlight { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    /// Fragment count announced for the active export.
    #[must_use]
    pub fn expected_fragment_count(&self) -> Option<usize> {
        match &self.phase {
            Phase::ExportInFlight {
                buffer: Some(buffer),
                ..
            } => Some(buffer.total()),
            _ => None,
        }
    }

    /// Most recently repaired document.
    #[inline]
    #[must_use]
    pub fn last_completed_document(&self) -> Option<&str> {
        self.last_completed_document.as_deref()
    }

    /// Returns `true` if `request_id` is the active export token.
    #[inline]
    #[must_use]
    pub fn is_active(&self, request_id: &RequestId) -> bool {
        self.active_request_id() == Some(request_id)
    }

    // ========================================================================
    // Handshake Transitions
    // ========================================================================

    /// Records the readiness signal.
    ///
    /// Returns `true` the first time.
    pub fn mark_remote_ready(&mut self) -> bool {
        let first = !self.remote_ready;
        self.remote_ready = true;
        if self.phase == Phase::Uninitialized {
            self.phase = Phase::AwaitingHandshakeAck;
        }
        first
    }

    /// Records `hello-ok`.
    ///
    /// Returns `true` if an export was waiting for it; the flag is cleared.
    pub fn acknowledge_handshake(&mut self) -> bool {
        self.handshake_acknowledged = true;
        if matches!(
            self.phase,
            Phase::Uninitialized | Phase::AwaitingHandshakeAck
        ) {
            self.phase = Phase::Idle;
        }
        std::mem::take(&mut self.export_pending_handshake)
    }

    /// Marks an export as waiting for the handshake.
    pub fn defer_export(&mut self) {
        self.export_pending_handshake = true;
    }

    // ========================================================================
    // Export Transitions
    // ========================================================================

    /// Enters `ExportInFlight` for a fresh token, dropping any earlier export.
    pub fn begin_export(&mut self, request_id: RequestId) {
        self.phase = Phase::ExportInFlight {
            request_id,
            buffer: None,
        };
    }

    /// Allocates the fragment buffer for the active export.
    ///
    /// Returns `Ok(None)` if `request_id` is not the active token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyFragments`] if `total` exceeds `max_fragments`;
    /// the export is abandoned and the session returns to `Idle`.
    pub fn start_fragments(
        &mut self,
        request_id: &RequestId,
        total: usize,
        max_fragments: usize,
    ) -> Result<Option<Progress>> {
        if !self.is_active(request_id) {
            return Ok(None);
        }

        match ReassemblyBuffer::bounded(total, max_fragments) {
            Ok(fresh) => {
                if let Phase::ExportInFlight { buffer, .. } = &mut self.phase {
                    *buffer = Some(fresh);
                }
                Ok(Some(Progress { received: 0, total }))
            }
            Err(e) => {
                self.phase = Phase::Idle;
                Err(e)
            }
        }
    }

    /// Stores one fragment of the active export.
    ///
    /// Returns `Ok(None)` if `request_id` is not the active token.
    ///
    /// # Errors
    ///
    /// - [`Error::ExportNotStarted`] before `export-start`
    /// - [`Error::FragmentOutOfRange`] if `index` is past the announced count
    pub fn write_fragment(
        &mut self,
        request_id: &RequestId,
        index: usize,
        data: String,
    ) -> Result<Option<Progress>> {
        match &mut self.phase {
            Phase::ExportInFlight {
                request_id: active,
                buffer,
            } if active == request_id => {
                let buffer = buffer
                    .as_mut()
                    .ok_or_else(|| Error::export_not_started(request_id.clone()))?;
                buffer.write(index, data)?;
                Ok(Some(Progress {
                    received: buffer.filled(),
                    total: buffer.total(),
                }))
            }
            _ => Ok(None),
        }
    }

    /// Ends the active export and returns the raw concatenated document.
    ///
    /// The session returns to `Idle` whatever the outcome. Returns `Ok(None)`
    /// if `request_id` is not the active token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExportNotStarted`] if `export-start` never arrived.
    pub fn finish_export(&mut self, request_id: &RequestId) -> Result<Option<String>> {
        if !self.is_active(request_id) {
            return Ok(None);
        }

        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::ExportInFlight {
                buffer: Some(buffer),
                ..
            } => Ok(Some(buffer.finish())),
            _ => Err(Error::export_not_started(request_id.clone())),
        }
    }

    /// Stores a repaired document, replacing the previous one.
    pub fn store_document(&mut self, document: String) {
        self.last_completed_document = Some(document);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SessionState::new();
        assert_eq!(state.phase(), &Phase::Uninitialized);
        assert!(!state.remote_ready());
        assert!(!state.handshake_acknowledged());
        assert!(!state.export_pending_handshake());
        assert!(state.active_request_id().is_none());
        assert!(state.expected_fragment_count().is_none());
        assert!(state.last_completed_document().is_none());
    }

    #[test]
    fn test_handshake_transitions() {
        let mut state = SessionState::new();
        assert!(state.mark_remote_ready());
        assert!(!state.mark_remote_ready());
        assert_eq!(state.phase(), &Phase::AwaitingHandshakeAck);

        assert!(!state.acknowledge_handshake());
        assert_eq!(state.phase(), &Phase::Idle);
        assert!(state.handshake_acknowledged());
    }

    #[test]
    fn test_deferred_export_flag_is_consumed() {
        let mut state = SessionState::new();
        state.mark_remote_ready();
        state.defer_export();

        assert!(state.acknowledge_handshake());
        assert!(!state.export_pending_handshake());
        assert!(!state.acknowledge_handshake());
    }

    #[test]
    fn test_export_cycle() {
        let mut state = SessionState::new();
        state.mark_remote_ready();
        state.acknowledge_handshake();

        let id = RequestId::export();
        state.begin_export(id.clone());
        assert!(state.is_active(&id));

        let progress = state
            .start_fragments(&id, 2, 8)
            .expect("start")
            .expect("active");
        assert_eq!(progress.to_string(), "0/2");
        assert_eq!(state.expected_fragment_count(), Some(2));

        let progress = state
            .write_fragment(&id, 1, "b".into())
            .expect("write")
            .expect("active");
        assert_eq!(progress, Progress { received: 1, total: 2 });
        state.write_fragment(&id, 0, "a".into()).expect("write");

        assert_eq!(state.finish_export(&id).expect("finish").as_deref(), Some("ab"));
        assert_eq!(state.phase(), &Phase::Idle);
        assert!(state.active_request_id().is_none());
    }

    #[test]
    fn test_stale_token_is_ignored() {
        let mut state = SessionState::new();
        let active = RequestId::export();
        let stale = RequestId::export();
        state.begin_export(active.clone());

        assert!(state.start_fragments(&stale, 5, 8).expect("ignored").is_none());
        assert!(state.expected_fragment_count().is_none());
        assert!(state.write_fragment(&stale, 0, "x".into()).expect("ignored").is_none());
        assert!(state.finish_export(&stale).expect("ignored").is_none());
        assert!(state.is_active(&active));
    }

    #[test]
    fn test_chunk_before_start_is_error() {
        let mut state = SessionState::new();
        let id = RequestId::export();
        state.begin_export(id.clone());

        let err = state.write_fragment(&id, 0, "x".into()).unwrap_err();
        assert!(matches!(err, Error::ExportNotStarted { .. }));
        assert!(state.is_active(&id));
    }

    #[test]
    fn test_end_before_start_returns_to_idle() {
        let mut state = SessionState::new();
        let id = RequestId::export();
        state.begin_export(id.clone());

        let err = state.finish_export(&id).unwrap_err();
        assert!(matches!(err, Error::ExportNotStarted { .. }));
        assert_eq!(state.phase(), &Phase::Idle);
    }

    #[test]
    fn test_oversized_total_abandons_export() {
        let mut state = SessionState::new();
        let id = RequestId::export();
        state.begin_export(id.clone());

        let err = state.start_fragments(&id, usize::MAX, 8).unwrap_err();
        assert!(matches!(err, Error::TooManyFragments { max: 8, .. }));
        assert_eq!(state.phase(), &Phase::Idle);
        assert!(state.expected_fragment_count().is_none());
    }

    #[test]
    fn test_new_export_replaces_active_token() {
        let mut state = SessionState::new();
        let first = RequestId::export();
        let second = RequestId::export();
        state.begin_export(first.clone());
        state.start_fragments(&first, 1, 8).expect("start");
        state.begin_export(second.clone());

        assert!(!state.is_active(&first));
        assert!(state.is_active(&second));
        assert!(state.expected_fragment_count().is_none());
    }

    #[test]
    fn test_document_persists_across_cycles() {
        let mut state = SessionState::new();
        state.store_document("<svg/>".into());
        state.begin_export(RequestId::export());
        assert_eq!(state.last_completed_document(), Some("<svg/>"));
    }
}
