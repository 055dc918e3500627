//! Async entry point (requires the `async` feature).
//!
//! The pipeline is CPU-bound and blocking; this module runs it on a Tokio
//! blocking worker so async callers do not stall their executor.
//!
//! # Example
//!
//! ```no_run
//! use vidfit::{PipelineConfig, PrepareOptions, SourceVideo};
//!
//! # async fn run() -> Result<(), vidfit::VidfitError> {
//! let source = SourceVideo::from_path("clip.mp4")?;
//! let result = vidfit::prepare_attachment_async(
//!     source,
//!     PipelineConfig::default(),
//!     PrepareOptions::default(),
//! )
//! .await?;
//! println!("{} bytes", result.payload_len());
//! # Ok(())
//! # }
//! ```

use crate::config::{PipelineConfig, PrepareOptions};
use crate::error::VidfitError;
use crate::pipeline::prepare_attachment;
use crate::result::VideoAttachmentResult;
use crate::source::SourceVideo;

/// Run [`prepare_attachment`](crate::prepare_attachment) on a Tokio blocking
/// worker thread.
///
/// Takes owned arguments because the work outlives the calling frame.
/// [`SourceVideo`] shares its byte buffer internally, so passing a clone is
/// cheap.
///
/// # Errors
///
/// Returns the same errors as the synchronous entry point. A panicked or
/// aborted worker surfaces as [`VidfitError::RecorderError`].
pub async fn prepare_attachment_async(
    source: SourceVideo,
    config: PipelineConfig,
    options: PrepareOptions,
) -> Result<VideoAttachmentResult, VidfitError> {
    tokio::task::spawn_blocking(move || prepare_attachment(&source, &config, &options))
        .await
        .map_err(|error| VidfitError::RecorderError(format!("worker thread failed: {error}")))?
}
