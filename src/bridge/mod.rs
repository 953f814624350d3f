//! Host side of the export bridge.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `geometry` | Bounding-box repair of the exported SVG |
//! | `machine` | Protocol state machine |
//! | `options` | Bridge configuration |
//! | `presenter` | UI collaborator trait, status text, download artifact |
//! | `reassembly` | Fragment reassembly buffer |
//! | `runner` | Single-task event loop and trigger handle |
//! | `scheduler` | Delayed events with cancel handles |
//! | `state` | Session state and phases |

// ============================================================================
// Submodules
// ============================================================================

/// Bounding-box repair.
pub mod geometry;

/// Protocol state machine.
pub mod machine;

/// Bridge configuration.
pub mod options;

/// Presentation surface.
pub mod presenter;

/// Fragment reassembly.
pub mod reassembly;

/// Event loop.
pub mod runner;

/// Delayed events.
pub mod scheduler;

/// Session state.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use geometry::{BoundsPadding, ViewBox, repair_bounds};
pub use machine::{Bridge, BridgeEvent};
pub use options::BridgeOptions;
pub use presenter::{
    DownloadArtifact, Presenter, PresenterLog, RecordingPresenter, Status, TracingPresenter,
};
pub use reassembly::ReassemblyBuffer;
pub use runner::{BridgeHandle, BridgeRunner};
pub use scheduler::{ScheduledTask, Scheduler};
pub use state::{Phase, Progress, SessionState};
