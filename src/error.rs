//! Error types for the `vidfit` crate.
//!
//! This module defines [`VidfitError`], the unified error type returned by all
//! fallible operations in the crate. Only a small subset of variants ever
//! escapes [`prepare_attachment`](crate::prepare_attachment): failures that
//! occur before the pipeline commits to re-encoding. Everything after that
//! point is downgraded internally to a passthrough fallback.

use std::io::Error as IoError;

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `vidfit` operations.
///
/// Variants carry enough context to diagnose the problem without additional
/// logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VidfitError {
    /// The input exceeds the configured maximum byte size.
    ///
    /// Raised by intake validation before any FFmpeg resource is allocated.
    /// The caller should ask the user to pick a smaller file.
    #[error("Input is {size} bytes, which exceeds the {max}-byte limit")]
    InputTooLarge {
        /// Byte length of the rejected input.
        size: u64,
        /// The configured maximum.
        max: u64,
    },

    /// The declared media type of the input is not a video type.
    ///
    /// Raised by intake validation before any FFmpeg resource is allocated.
    #[error("Declared media type {media_type:?} is not a video type")]
    InvalidInputType {
        /// The media type that was declared for the input.
        media_type: String,
    },

    /// The source's header/metadata could not be read.
    ///
    /// Fatal: without a usable duration and native dimensions there is
    /// nothing to plan the re-encode around.
    #[error("Failed to load source metadata: {reason}")]
    MetadataLoadFailed {
        /// Underlying reason the probe failed.
        reason: String,
    },

    /// The off-screen frame-scaling surface could not be constructed.
    ///
    /// Treated as an unrecoverable environment error, equivalent to being
    /// unable to obtain a rendering context at all.
    #[error("Failed to construct frame render target: {reason}")]
    RenderTargetUnavailable {
        /// Underlying reason construction failed.
        reason: String,
    },

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// A frame could not be encoded to the negotiated video codec.
    #[error("Failed to encode video frame: {0}")]
    VideoEncodeError(String),

    /// Audio could not be decoded or routed to the recorder.
    #[error("Failed to route audio: {0}")]
    AudioRouteError(String),

    /// Audio could not be encoded to the negotiated audio codec.
    #[error("Failed to encode audio: {0}")]
    AudioEncodeError(String),

    /// The stream recorder (muxer) failed to arm, accept a frame, or
    /// finalize its payload.
    #[error("Stream recorder error: {0}")]
    RecorderError(String),

    /// The operation was cancelled via a
    /// [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while spilling or reading temporary files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl From<FfmpegError> for VidfitError {
    fn from(error: FfmpegError) -> Self {
        VidfitError::FfmpegError(error.to_string())
    }
}

impl VidfitError {
    /// Whether this error must surface to the caller instead of resolving
    /// via passthrough fallback.
    ///
    /// Intake rejections, metadata probe failures, and render-target
    /// construction failures are fatal; everything else is recoverable once
    /// the pipeline has committed to re-encoding.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(
            self,
            VidfitError::InputTooLarge { .. }
                | VidfitError::InvalidInputType { .. }
                | VidfitError::MetadataLoadFailed { .. }
                | VidfitError::RenderTargetUnavailable { .. }
        )
    }
}
