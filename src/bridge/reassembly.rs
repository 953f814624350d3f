//! Reassembly of chunked exports.
//!
//! The remote announces a fragment count, streams `(index, text)` pairs in
//! any order and then signals end-of-stream. Completion is never inferred from
//! slot occupancy: only the protocol layer's end-of-stream signal finishes a
//! buffer.

// ============================================================================
// Imports
// ============================================================================

use tracing::warn;

use crate::error::{Error, Result};

// ============================================================================
// ReassemblyBuffer
// ============================================================================

/// Fixed-length, index-addressed fragment store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReassemblyBuffer {
    slots: Vec<Option<String>>,
}

impl ReassemblyBuffer {
    /// Allocates `total` empty slots.
    #[must_use]
    pub fn with_total(total: usize) -> Self {
        Self {
            slots: vec![None; total],
        }
    }

    /// Allocates `total` empty slots, refusing counts above `max`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyFragments`] if `total > max`; nothing is
    /// allocated.
    pub fn bounded(total: usize, max: usize) -> Result<Self> {
        if total > max {
            return Err(Error::too_many_fragments(total, max));
        }
        Ok(Self::with_total(total))
    }

    /// Writes a fragment, replacing any earlier content at the same index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FragmentOutOfRange`] if `index >= total`; the buffer
    /// is left unchanged.
    pub fn write(&mut self, index: usize, fragment: impl Into<String>) -> Result<()> {
        let total = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| Error::fragment_out_of_range(index, total))?;
        *slot = Some(fragment.into());
        Ok(())
    }

    /// Number of slots announced by `export-start`.
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots holding non-empty text.
    ///
    /// Used for progress only: a fragment that is legitimately empty is not
    /// counted.
    #[must_use]
    pub fn filled(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.as_deref().is_some_and(|text| !text.is_empty()))
            .count()
    }

    /// Indices that were never written.
    #[must_use]
    pub fn missing(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.is_none().then_some(index))
            .collect()
    }

    /// Concatenates all slots in index order.
    ///
    /// Slots that were never written contribute nothing.
    #[must_use]
    pub fn finish(self) -> String {
        let missing = self.missing();
        if !missing.is_empty() {
            warn!(
                total = self.total(),
                missing = missing.len(),
                first_missing = missing[0],
                "Finishing export with unwritten fragments"
            );
        }

        self.slots.into_iter().flatten().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
