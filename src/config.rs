//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds the fixed knobs of the compression pipeline:
//! input size limit, output bitrate, frame rate, resolution bound, and the
//! ordered candidate encoding list. It is read-only during a run and safe to
//! share across invocations.
//!
//! [`PrepareOptions`] carries per-invocation settings (progress callback,
//! cancellation token) without polluting the entry-point signature.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::negotiate::EncodingCandidate;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Default maximum accepted input size: 50 MB.
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 50 * 1024 * 1024;

/// Default target video bitrate: 1.2 Mbps.
pub const DEFAULT_TARGET_BITRATE: usize = 1_200_000;

/// Default target frame rate.
pub const DEFAULT_TARGET_FRAME_RATE: u32 = 24;

/// Default maximum output dimensions: 1280x720.
pub const DEFAULT_MAX_DIMENSIONS: (u32, u32) = (1280, 720);

/// Fixed settings for the compression pipeline.
///
/// # Example
///
/// ```
/// use vidfit::PipelineConfig;
///
/// let config = PipelineConfig::default()
///     .with_target_bitrate(800_000)
///     .with_max_dimensions(854, 480);
/// assert_eq!(config.target_frame_rate(), 24);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    max_input_bytes: u64,
    target_bitrate: usize,
    target_frame_rate: u32,
    max_width: u32,
    max_height: u32,
    candidates: Vec<EncodingCandidate>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            target_bitrate: DEFAULT_TARGET_BITRATE,
            target_frame_rate: DEFAULT_TARGET_FRAME_RATE,
            max_width: DEFAULT_MAX_DIMENSIONS.0,
            max_height: DEFAULT_MAX_DIMENSIONS.1,
            candidates: EncodingCandidate::defaults(),
        }
    }
}

impl PipelineConfig {
    /// Set the maximum accepted input size in bytes.
    #[must_use]
    pub fn with_max_input_bytes(mut self, max: u64) -> Self {
        self.max_input_bytes = max;
        self
    }

    /// Set the target video bitrate in bits per second.
    #[must_use]
    pub fn with_target_bitrate(mut self, bitrate: usize) -> Self {
        self.target_bitrate = bitrate;
        self
    }

    /// Set the target output frame rate. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_target_frame_rate(mut self, fps: u32) -> Self {
        self.target_frame_rate = fps.max(1);
        self
    }

    /// Set the maximum output dimensions. Both values are clamped to a
    /// minimum of 2 (the smallest even dimension encoders accept).
    #[must_use]
    pub fn with_max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_width = width.max(2);
        self.max_height = height.max(2);
        self
    }

    /// Replace the ordered candidate encoding list (most preferred first).
    #[must_use]
    pub fn with_candidates(mut self, candidates: Vec<EncodingCandidate>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Maximum accepted input size in bytes.
    pub fn max_input_bytes(&self) -> u64 {
        self.max_input_bytes
    }

    /// Target video bitrate in bits per second.
    pub fn target_bitrate(&self) -> usize {
        self.target_bitrate
    }

    /// Target output frame rate.
    pub fn target_frame_rate(&self) -> u32 {
        self.target_frame_rate
    }

    /// Maximum output width in pixels.
    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    /// Maximum output height in pixels.
    pub fn max_height(&self) -> u32 {
        self.max_height
    }

    /// The ordered candidate encoding list.
    pub fn candidates(&self) -> &[EncodingCandidate] {
        &self.candidates
    }
}

/// Per-invocation options for [`prepare_attachment`](crate::prepare_attachment).
///
/// All fields have defaults: no progress callback, no cancellation.
#[derive(Clone)]
pub struct PrepareOptions {
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for PrepareOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PrepareOptions")
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PrepareOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Attach a progress callback, invoked with the completion fraction
    /// during the compression phase only.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// A cancelled compression tears down through the same finalization path
    /// as natural completion and resolves via passthrough fallback.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Whether cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_input_bytes(), 50 * 1024 * 1024);
        assert_eq!(config.target_bitrate(), 1_200_000);
        assert_eq!(config.target_frame_rate(), 24);
        assert_eq!(config.max_width(), 1280);
        assert_eq!(config.max_height(), 720);
        assert!(!config.candidates().is_empty());
    }

    #[test]
    fn builder_clamps_degenerate_values() {
        let config = PipelineConfig::default()
            .with_target_frame_rate(0)
            .with_max_dimensions(0, 1);
        assert_eq!(config.target_frame_rate(), 1);
        assert_eq!(config.max_width(), 2);
        assert_eq!(config.max_height(), 2);
    }
}
