//! Input intake validation.
//!
//! The first gate of the pipeline: oversized or non-video inputs are rejected
//! here, before any FFmpeg resource, temporary file, or encoder exists.
//! These are the only failures surfaced to the caller as blocking errors
//! rather than resolving via passthrough fallback.

use crate::config::PipelineConfig;
use crate::error::VidfitError;
use crate::source::SourceVideo;

/// Validate an input against the configured limits.
///
/// Checks, in order:
/// 1. byte length does not exceed [`PipelineConfig::max_input_bytes`], and
/// 2. the declared media type is a `video/*` type.
///
/// Has no side effects on rejection.
///
/// # Errors
///
/// - [`VidfitError::InputTooLarge`] when the size limit is exceeded.
/// - [`VidfitError::InvalidInputType`] for non-video media types.
pub fn validate(source: &SourceVideo, config: &PipelineConfig) -> Result<(), VidfitError> {
    if source.len() > config.max_input_bytes() {
        return Err(VidfitError::InputTooLarge {
            size: source.len(),
            max: config.max_input_bytes(),
        });
    }

    if !is_video_type(source.media_type()) {
        return Err(VidfitError::InvalidInputType {
            media_type: source.media_type().to_string(),
        });
    }

    Ok(())
}

/// Whether a declared media type names video content.
fn is_video_type(media_type: &str) -> bool {
    media_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("video/")
}
