//! The compression pipeline orchestrator.
//!
//! [`prepare_attachment`] runs the whole flow: intake validation, metadata
//! probe, encoding negotiation, dimension planning, then the decode, paint,
//! encode loop that records the output payload. Failures before the pipeline
//! commits to re-encoding surface as errors; failures after that point
//! resolve through the passthrough fallback, so an accepted input always
//! produces a result.
//!
//! The pipeline is synchronous and blocking. Run it on a worker thread (or
//! via the `async` feature's entry point) when calling from a latency-
//! sensitive context.

use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::codec::decoder::Video as VideoDecoder;
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::media::Type;
use ffmpeg_next::{Error as FfmpegError, Packet, Rational};

use crate::audio::{AudioRoute, NullSink};
use crate::config::{PipelineConfig, PrepareOptions};
use crate::error::VidfitError;
use crate::fallback::passthrough;
use crate::intake;
use crate::negotiate::{EncodingCandidate, FfmpegCandidateProbe, negotiate};
use crate::plan::{PlanDimensions, plan_dimensions};
use crate::probe::{ProbedMetadata, probe_source, spill_to_temp_file};
use crate::progress::ProgressReporter;
use crate::record::{ENCODER_PIXEL_FORMAT, StreamRecorder};
use crate::render::FrameRenderer;
use crate::result::VideoAttachmentResult;
use crate::source::SourceVideo;

/// Prepare a video attachment from the source bytes.
///
/// Runs the full pipeline and resolves with either a re-encoded payload or,
/// when anything goes wrong after the input has been accepted, the original
/// file as a passthrough result. Cancellation likewise resolves via
/// passthrough.
///
/// # Errors
///
/// Only pre-commitment failures are returned as errors:
///
/// - [`VidfitError::InputTooLarge`] / [`VidfitError::InvalidInputType`]
///   when the input fails intake validation,
/// - [`VidfitError::MetadataLoadFailed`] when the source header cannot be
///   read,
/// - [`VidfitError::RenderTargetUnavailable`] when no frame-scaling surface
///   can be constructed.
///
/// # Example
///
/// ```no_run
/// use vidfit::{PipelineConfig, PrepareOptions, SourceVideo};
///
/// let source = SourceVideo::from_path("clip.mov")?;
/// let result = vidfit::prepare_attachment(
///     &source,
///     &PipelineConfig::default(),
///     &PrepareOptions::default(),
/// )?;
/// println!(
///     "{} bytes, {}s, passthrough={}",
///     result.payload_len(),
///     result.duration_seconds(),
///     result.is_passthrough(),
/// );
/// # Ok::<(), vidfit::VidfitError>(())
/// ```
pub fn prepare_attachment(
    source: &SourceVideo,
    config: &PipelineConfig,
    options: &PrepareOptions,
) -> Result<VideoAttachmentResult, VidfitError> {
    intake::validate(source, config)?;

    let metadata = probe_source(source)?;
    log::debug!(
        "Probed source: {}x{}, {:.2}s, audio={}",
        metadata.width,
        metadata.height,
        metadata.duration_seconds,
        metadata.has_audio,
    );

    let Some(candidate) = negotiate(config.candidates(), &FfmpegCandidateProbe) else {
        return Ok(passthrough(source, "no supported output encoding"));
    };

    let plan = plan_dimensions(
        metadata.width,
        metadata.height,
        config.max_width(),
        config.max_height(),
    );

    match record_compressed(source, config, options, &metadata, candidate, plan) {
        Ok(payload) => {
            log::info!(
                "Compressed {} bytes to {} bytes as {}",
                source.len(),
                payload.len(),
                candidate.label,
            );
            Ok(VideoAttachmentResult::compressed(
                payload,
                metadata.duration_seconds,
                candidate.label,
            ))
        }
        Err(error) if error.is_fatal() => Err(error),
        Err(error) => Ok(passthrough(source, &error.to_string())),
    }
}

/// Run the committed recording session and return the muxed payload.
fn record_compressed(
    source: &SourceVideo,
    config: &PipelineConfig,
    options: &PrepareOptions,
    metadata: &ProbedMetadata,
    candidate: &EncodingCandidate,
    plan: PlanDimensions,
) -> Result<Vec<u8>, VidfitError> {
    let spill = spill_to_temp_file(source)?;
    let mut input = ffmpeg_next::format::input(&spill.path())?;

    let video_stream = input
        .streams()
        .best(Type::Video)
        .ok_or_else(|| VidfitError::VideoDecodeError("video stream vanished".to_string()))?;
    let video_stream_index = video_stream.index();
    let video_time_base = video_stream.time_base();

    let mut video_decoder = CodecContext::from_parameters(video_stream.parameters())?
        .decoder()
        .video()
        .map_err(|error| VidfitError::VideoDecodeError(error.to_string()))?;

    // Audio is routed only when the probe saw a stream and the demux still
    // has one.
    let audio_stream = if metadata.has_audio {
        input.streams().best(Type::Audio)
    } else {
        None
    };
    let audio_info = match &audio_stream {
        Some(stream) => {
            let (rate, layout) = AudioRoute::source_parameters(stream.parameters())?;
            Some((stream.index(), stream.parameters(), rate, layout))
        }
        None => None,
    };

    let recorder_audio = audio_info
        .as_ref()
        .map(|(_, _, rate, layout)| (*rate, *layout));
    let mut recorder = StreamRecorder::arm(
        candidate,
        plan,
        config.target_frame_rate(),
        config.target_bitrate(),
        recorder_audio,
    )?;
    log::debug!("Recorder armed; re-encode committed");

    let mut audio_route = match (&audio_info, recorder.audio_target()) {
        (Some((_, parameters, _, _)), Some(target)) => Some(AudioRoute::build(
            parameters.clone(),
            target,
            Box::new(NullSink),
        )?),
        _ => None,
    };
    let audio_stream_index = audio_info.as_ref().map(|(index, ..)| *index);

    let mut session = VideoSession {
        renderer: None,
        decoded: VideoFrame::empty(),
        plan,
        video_time_base,
        frame_rate: config.target_frame_rate(),
        duration_seconds: metadata.duration_seconds,
        last_output_pts: -1,
        reporter: ProgressReporter::new(options.progress.clone()),
    };

    let mut packet = Packet::empty();
    loop {
        match packet.read(&mut input) {
            Ok(()) => {}
            Err(FfmpegError::Eof) => break,
            Err(error) => {
                return Err(VidfitError::VideoDecodeError(format!(
                    "demuxing failed mid-stream: {error}"
                )));
            }
        }

        if options.is_cancelled() {
            log::info!("Cancellation requested; abandoning recording session");
            return Err(VidfitError::Cancelled);
        }

        if packet.stream() == video_stream_index {
            video_decoder
                .send_packet(&packet)
                .map_err(|error| VidfitError::VideoDecodeError(error.to_string()))?;
            session.drain_decoder(&mut video_decoder, &mut recorder)?;
        } else if Some(packet.stream()) == audio_stream_index {
            if let Some(route) = audio_route.as_mut() {
                route.route_packet(&packet, &mut |frame| recorder.write_audio_frame(frame))?;
            }
        }
    }

    log::debug!("Finalizing recording session");
    let _ = video_decoder.send_eof();
    session.drain_decoder(&mut video_decoder, &mut recorder)?;
    if let Some(route) = audio_route.as_mut() {
        route.flush(&mut |frame| recorder.write_audio_frame(frame))?;
    }

    // A truncated file often demuxes to a clean EOF well before the header's
    // declared duration. Emitting that partial clip would silently lose the
    // tail, so treat a large shortfall as a decode failure instead.
    let encoded_seconds =
        session.last_output_pts.max(0) as f64 / f64::from(session.frame_rate);
    let allowance = (session.duration_seconds * 0.1).max(1.0);
    if session.duration_seconds > 0.0 && encoded_seconds + allowance < session.duration_seconds {
        return Err(VidfitError::VideoDecodeError(format!(
            "source ended early: {encoded_seconds:.2}s decoded of {:.2}s",
            session.duration_seconds,
        )));
    }

    let payload = recorder.finish()?;
    session.reporter.finish();
    Ok(payload)
}

/// Per-invocation video state threaded through the decode loop.
struct VideoSession {
    renderer: Option<FrameRenderer>,
    decoded: VideoFrame,
    plan: PlanDimensions,
    video_time_base: Rational,
    frame_rate: u32,
    duration_seconds: f64,
    /// Last PTS handed to the recorder, in output frames. -1 before the
    /// first frame.
    last_output_pts: i64,
    reporter: ProgressReporter,
}

impl VideoSession {
    /// Pull every decoded frame out of the decoder, paint it, and hand it
    /// to the recorder.
    fn drain_decoder(
        &mut self,
        decoder: &mut VideoDecoder,
        recorder: &mut StreamRecorder,
    ) -> Result<(), VidfitError> {
        while decoder.receive_frame(&mut self.decoded).is_ok() {
            // The renderer is built from the first decoded frame, which is
            // where the actual pixel format and dimensions are known.
            if self.renderer.is_none() {
                self.renderer = Some(FrameRenderer::new(
                    self.decoded.format(),
                    self.decoded.width(),
                    self.decoded.height(),
                    self.plan,
                    ENCODER_PIXEL_FORMAT,
                )?);
            }
            let renderer = self.renderer.as_mut().expect("renderer just constructed");

            let source_seconds = self
                .decoded
                .timestamp()
                .map(|ts| ts as f64 * f64::from(self.video_time_base));

            // Retime the frame onto the fixed output rate. Frames that land
            // on an already-emitted tick are dropped, which conforms
            // higher-rate sources down to the target rate.
            let output_pts = match source_seconds {
                Some(seconds) => (seconds * f64::from(self.frame_rate)).round() as i64,
                None => self.last_output_pts + 1,
            };
            if output_pts <= self.last_output_pts {
                continue;
            }
            self.last_output_pts = output_pts;

            let surface = renderer.paint(&self.decoded)?;
            surface.set_pts(Some(output_pts));
            recorder.write_video_frame(surface)?;

            if self.duration_seconds > 0.0 {
                if let Some(seconds) = source_seconds {
                    self.reporter.report(seconds / self.duration_seconds);
                }
            }
        }
        Ok(())
    }
}
