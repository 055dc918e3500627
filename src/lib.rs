//! # vidfit
//!
//! Adaptive video recompression for attachments — shrink arbitrary video
//! files into a bounded, playback-friendly form before upload, powered by
//! FFmpeg via the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next)
//! crate.
//!
//! Given a video file's bytes, the pipeline validates the input, probes its
//! metadata, negotiates an output encoding the runtime can actually produce,
//! plans bounded output dimensions with the aspect ratio preserved, and
//! re-encodes video and audio into a single in-memory payload at a fixed
//! bitrate and frame rate. Its defining property is that an accepted input
//! is never rejected afterwards: if anything goes wrong once re-encoding has
//! started — a decoder error, a missing codec, cancellation — the original
//! file is returned unmodified instead.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vidfit::{PipelineConfig, PrepareOptions, SourceVideo};
//!
//! let source = SourceVideo::from_path("holiday.mov")?;
//! let result = vidfit::prepare_attachment(
//!     &source,
//!     &PipelineConfig::default(),
//!     &PrepareOptions::default(),
//! )?;
//!
//! if result.is_passthrough() {
//!     println!("Sent as-is ({} bytes)", result.payload_len());
//! } else {
//!     println!(
//!         "Compressed to {} bytes as {}",
//!         result.payload_len(),
//!         result.encoding().unwrap_or("?"),
//!     );
//! }
//! # Ok::<(), vidfit::VidfitError>(())
//! ```
//!
//! ## Progress and cancellation
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vidfit::{
//!     CancellationToken, PipelineConfig, PrepareOptions, ProgressCallback,
//!     SourceVideo,
//! };
//!
//! struct Bar;
//! impl ProgressCallback for Bar {
//!     fn on_progress(&self, fraction: f64) {
//!         eprint!("\r{:.0}%", fraction * 100.0);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = PrepareOptions::new()
//!     .with_progress(Arc::new(Bar))
//!     .with_cancellation(token.clone());
//!
//! let source = SourceVideo::from_path("clip.webm")?;
//! // token.cancel() from another thread resolves the call via passthrough.
//! let result = vidfit::prepare_attachment(&source, &PipelineConfig::default(), &options)?;
//! # Ok::<(), vidfit::VidfitError>(())
//! ```
//!
//! ## Features
//!
//! - **Intake validation** — size limit (50 MB by default) and media-type
//!   check before any decoding work
//! - **Encoding negotiation** — ordered candidate list (H.264/AAC MP4 first,
//!   then VP9 and VP8 WebM), first supported wins
//! - **Bounded output** — at most 1280×720 by default, aspect preserved,
//!   never upscaled
//! - **Synchronized audio** — decoded, resampled, and re-encoded alongside
//!   the video track
//! - **Progress & cancellation** — monotonic completion fractions and a
//!   cooperative [`CancellationToken`]
//! - **Passthrough fallback** — any post-commitment failure returns the
//!   original bytes instead of an error
//! - **In-memory output** — the payload is muxed into FFmpeg's dynamic
//!   buffer, no output files
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | [`prepare_attachment_async`] runs the pipeline on a Tokio blocking thread |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod audio;
pub mod config;
pub mod error;
mod fallback;
pub mod ffmpeg;
#[cfg(feature = "async")]
pub mod future;
pub mod intake;
pub mod negotiate;
mod pipeline;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod record;
pub mod render;
mod result;
pub mod source;

pub use audio::{AudioEncodingTarget, LivenessSink, NullSink};
pub use config::{
    DEFAULT_MAX_DIMENSIONS, DEFAULT_MAX_INPUT_BYTES, DEFAULT_TARGET_BITRATE,
    DEFAULT_TARGET_FRAME_RATE, PipelineConfig, PrepareOptions,
};
pub use error::VidfitError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
#[cfg(feature = "async")]
pub use future::prepare_attachment_async;
pub use negotiate::{CandidateProbe, EncodingCandidate, FfmpegCandidateProbe, negotiate};
pub use pipeline::prepare_attachment;
pub use plan::{PlanDimensions, plan_dimensions};
pub use probe::{ProbedMetadata, probe_source};
pub use progress::{CancellationToken, ProgressCallback};
pub use record::StreamRecorder;
pub use render::FrameRenderer;
pub use result::{PreviewHandle, VideoAttachmentResult};
pub use source::SourceVideo;
