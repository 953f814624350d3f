//! Delayed events for the bridge event loop.
//!
//! A scheduled task never touches session state itself: after its delay it
//! posts an event back into the loop's queue, so the handler for it runs to
//! completion like any other event. Tasks run on the tokio timer and follow
//! paused (virtual) time in tests.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::sleep;
use tracing::{debug, trace};

// ============================================================================
// Scheduler
// ============================================================================

/// Posts events into an event queue after a delay.
#[derive(Debug)]
pub struct Scheduler<E> {
    queue: mpsc::UnboundedSender<E>,
}

impl<E> Clone for Scheduler<E> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<E: Send + 'static> Scheduler<E> {
    /// Creates a scheduler feeding `queue`.
    #[inline]
    #[must_use]
    pub fn new(queue: mpsc::UnboundedSender<E>) -> Self {
        Self { queue }
    }

    /// Delivers `event` after `delay`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, delay: Duration, event: E) -> ScheduledTask {
        let queue = self.queue.clone();
        let delay_ms = delay.as_millis() as u64;

        let handle = tokio::spawn(async move {
            sleep(delay).await;
            if queue.send(event).is_err() {
                debug!(delay_ms, "Event loop gone, scheduled event dropped");
            } else {
                trace!(delay_ms, "Scheduled event delivered");
            }
        });

        ScheduledTask {
            handle: handle.abort_handle(),
        }
    }
}

// ============================================================================
// ScheduledTask
// ============================================================================

/// Handle to a scheduled event.
///
/// Dropping the handle does not cancel the task.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: AbortHandle,
}

impl ScheduledTask {
    /// Cancels delivery if the event has not been posted yet.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Returns `true` once the event was posted or the task was cancelled.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// ============================================================================
// Tests
// ============================================================================
