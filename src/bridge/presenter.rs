//! Presentation surface of the bridge.
//!
//! The bridge never touches a UI directly. It reports through a
//! [`Presenter`]: status text after every transition, enable/disable of the
//! export and download triggers, and the repaired document for preview.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::Result;

use super::options::SVG_MEDIA_TYPE;
use super::state::Progress;

// ============================================================================
// Status
// ============================================================================

/// Human-readable status reported after each transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Export clicked before `bridge-ready`.
    RemoteNotReady,
    /// The remote context is not attached; nothing was sent.
    RemoteUnavailable,
    /// `bridge-ready` received.
    RemoteReady,
    /// `hello` posted.
    SendingHello,
    /// `hello-ok` received.
    HandshakeEstablished,
    /// Export deferred until `hello-ok`.
    WaitingForHandshake,
    /// `export` posted.
    RequestingExport,
    /// Fragments arriving.
    Receiving(Progress),
    /// Export finished; carries the repaired document length in UTF-16 code units.
    Done {
        /// Repaired document length.
        length: usize,
    },
    /// The remote reported an error; text is verbatim.
    RemoteError(String),
    /// The export could not be completed locally.
    ExportFailed(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteNotReady => f.write_str("map frame has not sent bridge-ready yet"),
            Self::RemoteUnavailable => f.write_str("map frame is not available yet"),
            Self::RemoteReady => f.write_str("map frame ready (bridge-ready)"),
            Self::SendingHello => f.write_str("sending hello…"),
            Self::HandshakeEstablished => f.write_str("connection established (hello-ok)"),
            Self::WaitingForHandshake => {
                f.write_str("waiting for hello-ok, export will follow…")
            }
            Self::RequestingExport => f.write_str("requesting export…"),
            Self::Receiving(progress) => write!(f, "receiving SVG… ({progress})"),
            Self::Done { length } => write!(f, "DONE svgLen={length}"),
            Self::RemoteError(message) => write!(f, "error from map frame: {message}"),
            Self::ExportFailed(message) => write!(f, "export failed: {message}"),
        }
    }
}

// ============================================================================
// Presenter
// ============================================================================

/// UI collaborator driven by the bridge.
pub trait Presenter {
    /// Displays a status line.
    fn status(&mut self, status: &Status);

    /// Enables or disables the export trigger.
    fn set_export_enabled(&mut self, enabled: bool);

    /// Enables or disables the download trigger.
    fn set_download_enabled(&mut self, enabled: bool);

    /// Shows the repaired document.
    fn show_preview(&mut self, document: &str);
}

// ============================================================================
// TracingPresenter
// ============================================================================

/// Presenter for headless hosts: everything goes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn status(&mut self, status: &Status) {
        info!(status = %status, "Bridge status");
    }

    fn set_export_enabled(&mut self, enabled: bool) {
        debug!(enabled, "Export trigger");
    }

    fn set_download_enabled(&mut self, enabled: bool) {
        debug!(enabled, "Download trigger");
    }

    fn show_preview(&mut self, document: &str) {
        debug!(bytes = document.len(), "Preview updated");
    }
}

// ============================================================================
// RecordingPresenter
// ============================================================================

/// Snapshot of everything a [`RecordingPresenter`] has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenterLog {
    /// Every status, oldest first.
    pub statuses: Vec<Status>,
    /// Current export trigger state.
    pub export_enabled: bool,
    /// Current download trigger state.
    pub download_enabled: bool,
    /// Last previewed document.
    pub preview: Option<String>,
}

impl PresenterLog {
    /// Most recent status.
    #[inline]
    #[must_use]
    pub fn last_status(&self) -> Option<&Status> {
        self.statuses.last()
    }
}

/// Presenter that records calls; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    log: Arc<Mutex<PresenterLog>>,
}

impl RecordingPresenter {
    /// Creates an empty recorder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the log.
    #[must_use]
    pub fn snapshot(&self) -> PresenterLog {
        self.log.lock().clone()
    }
}

impl Presenter for RecordingPresenter {
    fn status(&mut self, status: &Status) {
        self.log.lock().statuses.push(status.clone());
    }

    fn set_export_enabled(&mut self, enabled: bool) {
        self.log.lock().export_enabled = enabled;
    }

    fn set_download_enabled(&mut self, enabled: bool) {
        self.log.lock().download_enabled = enabled;
    }

    fn show_preview(&mut self, document: &str) {
        self.log.lock().preview = Some(document.to_string());
    }
}

// ============================================================================
// DownloadArtifact
// ============================================================================

/// The repaired document packaged for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    /// Suggested file name.
    pub file_name: String,
    /// Media type.
    pub media_type: &'static str,
    /// Document text.
    pub contents: String,
}

impl DownloadArtifact {
    /// Packages an SVG document.
    #[inline]
    #[must_use]
    pub fn svg(file_name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: SVG_MEDIA_TYPE,
            contents: contents.into(),
        }
    }

    /// Writes the document into `dir` under its file name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the file cannot be written.
    pub fn save_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.file_name);
        fs::write(&path, self.contents.as_bytes())?;
        debug!(path = %path.display(), bytes = self.contents.len(), "Download saved");
        Ok(path)
    }

    /// Returns a percent-encoded `data:` URI for embedding.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};charset=utf-8,{}",
            self.media_type,
            urlencoding::encode(&self.contents)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(
            Status::Receiving(Progress { received: 2, total: 5 }).to_string(),
            "receiving SVG… (2/5)"
        );
        assert_eq!(Status::Done { length: 42 }.to_string(), "DONE svgLen=42");
        assert_eq!(
            Status::RemoteError("no map".into()).to_string(),
            "error from map frame: no map"
        );
    }

    #[test]
    fn test_recording_presenter_shares_log() {
        let recorder = RecordingPresenter::new();
        let mut handle = recorder.clone();

        handle.status(&Status::SendingHello);
        handle.set_export_enabled(true);
        handle.show_preview("<svg/>");

        let log = recorder.snapshot();
        assert_eq!(log.last_status(), Some(&Status::SendingHello));
        assert!(log.export_enabled);
        assert!(!log.download_enabled);
        assert_eq!(log.preview.as_deref(), Some("<svg/>"));
    }

    #[test]
    fn test_artifact_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = DownloadArtifact::svg("map.svg", "<svg/>");

        let path = artifact.save_to(dir.path()).expect("save");

        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("map.svg"));
        assert_eq!(fs::read_to_string(path).expect("read"), "<svg/>");
        assert_eq!(artifact.media_type, "image/svg+xml");
    }

    #[test]
    fn test_artifact_data_uri() {
        let artifact = DownloadArtifact::svg("map.svg", "<svg a=\"1 2\"/>");
        assert_eq!(
            artifact.to_data_uri(),
            "data:image/svg+xml;charset=utf-8,%3Csvg%20a%3D%221%202%22%2F%3E"
        );
    }
}
