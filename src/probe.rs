//! Source metadata probing.
//!
//! Before committing to a re-encode the pipeline needs the source's duration
//! and native dimensions. [`probe_source`] reads only the container header
//! (no frame decoding, no playback) and releases every resource it touched
//! before returning, success or failure.
//!
//! The fallback path uses [`probe_duration_best_effort`] instead: a fully
//! independent probe that never reuses the first probe's resources and never
//! fails, so a poisoned source can still resolve as a passthrough result
//! with a zero duration.

use std::io::Write;

use ffmpeg_next::media::Type;
use tempfile::NamedTempFile;

use crate::error::VidfitError;
use crate::source::SourceVideo;

/// Metadata extracted from the source header.
///
/// Derived once per pipeline invocation and never mutated afterwards.
#[derive(Debug, Clone, Copy)]
pub struct ProbedMetadata {
    /// Total duration in seconds.
    pub duration_seconds: f64,
    /// Native frame width in pixels.
    pub width: u32,
    /// Native frame height in pixels.
    pub height: u32,
    /// Whether the source carries an audio stream to route.
    pub has_audio: bool,
}

/// Probe the source for duration and native dimensions.
///
/// The bytes are spilled to a temporary file (FFmpeg demuxes from paths),
/// the demuxer reads the header, and both the demuxer and the temporary
/// file are dropped before this function returns on every path.
///
/// # Errors
///
/// Returns [`VidfitError::MetadataLoadFailed`] when the bytes cannot be
/// spilled, the container cannot be opened, no video stream exists, or the
/// stream reports degenerate dimensions. This is fatal to the invocation:
/// there is nothing to plan a re-encode around.
pub fn probe_source(source: &SourceVideo) -> Result<ProbedMetadata, VidfitError> {
    ffmpeg_next::init().map_err(|error| VidfitError::MetadataLoadFailed {
        reason: format!("FFmpeg initialisation failed: {error}"),
    })?;

    let spill = spill_to_temp_file(source).map_err(|error| VidfitError::MetadataLoadFailed {
        reason: format!("Failed to spill source bytes: {error}"),
    })?;

    let input_context = ffmpeg_next::format::input(&spill.path()).map_err(|error| {
        VidfitError::MetadataLoadFailed {
            reason: format!("Failed to open source container: {error}"),
        }
    })?;

    let duration_seconds = container_duration_seconds(&input_context);

    let video_stream = input_context.streams().best(Type::Video).ok_or_else(|| {
        VidfitError::MetadataLoadFailed {
            reason: "No video stream found in source".to_string(),
        }
    })?;

    let decoder_context =
        ffmpeg_next::codec::context::Context::from_parameters(video_stream.parameters()).map_err(
            |error| VidfitError::MetadataLoadFailed {
                reason: format!("Failed to read video codec parameters: {error}"),
            },
        )?;
    let video_decoder =
        decoder_context
            .decoder()
            .video()
            .map_err(|error| VidfitError::MetadataLoadFailed {
                reason: format!("Failed to inspect video stream: {error}"),
            })?;

    let width = video_decoder.width();
    let height = video_decoder.height();
    if width == 0 || height == 0 {
        return Err(VidfitError::MetadataLoadFailed {
            reason: format!("Source reports degenerate dimensions {width}x{height}"),
        });
    }

    let has_audio = input_context.streams().best(Type::Audio).is_some();

    log::debug!(
        "Probed source: {width}x{height}, {duration_seconds:.2}s, audio={has_audio}",
    );

    Ok(ProbedMetadata {
        duration_seconds,
        width,
        height,
        has_audio,
    })
    // `input_context` and `spill` drop here, releasing the demuxer and
    // deleting the temporary file.
}

/// Best-effort duration probe for the fallback path.
///
/// Opens a fresh demuxer on a fresh temporary file, so a failure in the
/// primary probe or mid-transcode never contaminates this one. Returns 0.0
/// on any trouble instead of an error.
pub fn probe_duration_best_effort(source: &SourceVideo) -> f64 {
    if ffmpeg_next::init().is_err() {
        return 0.0;
    }

    let Ok(spill) = spill_to_temp_file(source) else {
        return 0.0;
    };

    match ffmpeg_next::format::input(&spill.path()) {
        Ok(input_context) => container_duration_seconds(&input_context),
        Err(error) => {
            log::debug!("Best-effort duration probe failed: {error}");
            0.0
        }
    }
}

/// Container-level duration in seconds, or 0.0 when the header does not
/// report one.
fn container_duration_seconds(input_context: &ffmpeg_next::format::context::Input) -> f64 {
    let duration_micros = input_context.duration();
    if duration_micros > 0 {
        duration_micros as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE)
    } else {
        0.0
    }
}

/// Write the source bytes to a named temporary file FFmpeg can demux.
///
/// The file is deleted when the returned handle drops.
pub(crate) fn spill_to_temp_file(source: &SourceVideo) -> std::io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(source.bytes())?;
    file.flush()?;
    Ok(file)
}
