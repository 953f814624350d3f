//! Bridge configuration.
//!
//! Every endpoint and identifier has a fixed default; the builder exists so
//! hosts and tests can point the bridge at another deployment.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use fmg_export_bridge::BridgeOptions;
//!
//! let options = BridgeOptions::new()
//!     .with_padding(200.0)
//!     .with_handshake_delay(Duration::from_millis(250));
//!
//! assert_eq!(options.trusted_origin, "https://longtrainz.github.io");
//! options.validate().unwrap();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{CHANNEL, TRUSTED_ORIGIN};

use super::geometry::BoundsPadding;

// ============================================================================
// Constants
// ============================================================================

/// Delay between handshake acknowledgment and a deferred export.
pub const DEFAULT_HANDSHAKE_DELAY: Duration = Duration::from_millis(100);

/// Largest fragment count accepted from `export-start`.
pub const DEFAULT_MAX_FRAGMENTS: usize = 65_536;

/// File name offered for the downloaded document.
pub const DEFAULT_FILE_NAME: &str = "map.svg";

/// Media type of the downloaded document.
pub const SVG_MEDIA_TYPE: &str = "image/svg+xml";

// ============================================================================
// BridgeOptions
// ============================================================================

/// Bridge configuration options.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOptions {
    /// The only origin messages are accepted from and posted to.
    pub trusted_origin: String,

    /// Channel discriminant (`chan` field).
    pub channel: String,

    /// Outward padding applied to the exported document.
    pub padding: BoundsPadding,

    /// Delay before a deferred export is sent after `hello-ok`.
    pub handshake_delay: Duration,

    /// Upper bound on the fragment count announced by the remote.
    pub max_fragments: usize,

    /// File name of the download artifact.
    pub file_name: String,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl BridgeOptions {
    /// Creates options with the fixed production defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trusted_origin: TRUSTED_ORIGIN.to_string(),
            channel: CHANNEL.to_string(),
            padding: BoundsPadding::default(),
            handshake_delay: DEFAULT_HANDSHAKE_DELAY,
            max_fragments: DEFAULT_MAX_FRAGMENTS,
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BridgeOptions {
    /// Sets the trusted origin.
    #[inline]
    #[must_use]
    pub fn with_trusted_origin(mut self, origin: impl Into<String>) -> Self {
        self.trusted_origin = origin.into();
        self
    }

    /// Sets the channel discriminant.
    #[inline]
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Sets the padding magnitude, keeping the fallback canvas size.
    #[inline]
    #[must_use]
    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding.amount = padding;
        self
    }

    /// Sets the deferred export delay.
    #[inline]
    #[must_use]
    pub fn with_handshake_delay(mut self, delay: Duration) -> Self {
        self.handshake_delay = delay;
        self
    }

    /// Sets the largest accepted fragment count.
    #[inline]
    #[must_use]
    pub fn with_max_fragments(mut self, max_fragments: usize) -> Self {
        self.max_fragments = max_fragments;
        self
    }

    /// Sets the download file name.
    #[inline]
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl BridgeOptions {
    /// Checks that the options describe a usable channel.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if the trusted origin is not a URL
    /// - [`Error::Config`] if the origin carries a path/query, or the channel
    ///   is empty, the padding is not finite or the fragment limit is zero
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.trusted_origin)?;
        let origin = url.origin().ascii_serialization();
        if origin != self.trusted_origin {
            return Err(Error::config(format!(
                "trusted origin must be a bare origin, got {} (expected {})",
                self.trusted_origin, origin
            )));
        }

        if self.channel.is_empty() {
            return Err(Error::config("channel discriminant is empty"));
        }

        if !self.padding.amount.is_finite() {
            return Err(Error::config("padding must be finite"));
        }

        if self.max_fragments == 0 {
            return Err(Error::config("fragment limit must be positive"));
        }

        if self.file_name.is_empty() {
            return Err(Error::config("download file name is empty"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BridgeOptions::default();
        assert_eq!(options.trusted_origin, "https://longtrainz.github.io");
        assert_eq!(options.channel, "fmg-bridge-v1");
        assert_eq!(options.padding.amount, 140.0);
        assert_eq!(options.handshake_delay, Duration::from_millis(100));
        assert_eq!(options.file_name, "map.svg");
        assert_eq!(options.max_fragments, 65_536);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let options = BridgeOptions::new()
            .with_trusted_origin("http://localhost:8080")
            .with_channel("test-chan")
            .with_padding(10.0)
            .with_file_name("world.svg");

        assert_eq!(options.trusted_origin, "http://localhost:8080");
        assert_eq!(options.channel, "test-chan");
        assert_eq!(options.padding.amount, 10.0);
        assert_eq!(options.padding.fallback_width, 1200.0);
        assert_eq!(options.file_name, "world.svg");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_origin_with_path_is_rejected() {
        let options = BridgeOptions::new().with_trusted_origin("https://longtrainz.github.io/fmg/");
        assert!(matches!(options.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_unparseable_origin_is_rejected() {
        let options = BridgeOptions::new().with_trusted_origin("not an origin");
        assert!(matches!(options.validate(), Err(Error::Url(_))));
    }

    #[test]
    fn test_zero_fragment_limit_is_rejected() {
        let options = BridgeOptions::new().with_max_fragments(0);
        assert!(matches!(options.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_empty_channel_is_rejected() {
        let options = BridgeOptions::new().with_channel("");
        assert!(matches!(options.validate(), Err(Error::Config { .. })));
    }
}
