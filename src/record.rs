//! Stream recording: encoding rendered frames and routed audio into one
//! in-memory payload.
//!
//! [`StreamRecorder`] combines the renderer's painted video frames and the
//! audio route's resampled frames into a single container, encoding at the
//! configured bitrate and frame rate and accumulating the muxed output in an
//! FFmpeg dynamic memory buffer. [`finish`](StreamRecorder::finish) drains
//! both encoders *before* writing the trailer and detaching the buffer, so
//! no encoded data is lost at the tail.
//!
//! The recorder owns a raw muxer context for the lifetime of one recording
//! session. If `finish` is never reached (error or cancellation), `Drop`
//! discards the buffer and frees the context, so every exit path releases
//! the session's resources exactly once.

use std::ffi::{CString, c_void};

use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::codec::encoder::{Audio as OpenedAudioEncoder, Video as OpenedVideoEncoder};
use ffmpeg_next::format::{Pixel, Sample};
use ffmpeg_next::frame::{Audio as AudioFrame, Video as VideoFrame};
use ffmpeg_next::packet::Mut;
use ffmpeg_next::{ChannelLayout, Packet, Rational};
use ffmpeg_sys_next::{
    AVAudioFifo, AVFMT_GLOBALHEADER, AVFormatContext, AVRational, av_audio_fifo_alloc,
    av_audio_fifo_free, av_audio_fifo_read, av_audio_fifo_size, av_audio_fifo_write, av_free,
    av_interleaved_write_frame, av_write_trailer, avcodec_parameters_from_context,
    avformat_alloc_output_context2, avformat_free_context, avformat_new_stream,
    avio_close_dyn_buf, avio_open_dyn_buf,
};

use crate::audio::AudioEncodingTarget;
use crate::error::VidfitError;
use crate::negotiate::EncodingCandidate;
use crate::plan::PlanDimensions;

/// Pixel format fed to the video encoders. H.264, VP9, and VP8 all consume
/// 4:2:0 chroma-subsampled input.
pub(crate) const ENCODER_PIXEL_FORMAT: Pixel = Pixel::YUV420P;

/// Bitrate for the routed audio track.
const AUDIO_BITRATE: usize = 128_000;

/// Owns the raw in-memory muxer context.
///
/// The context is created with a dynamic buffer attached as its I/O; the
/// buffer grows as packets are written. Exactly one of
/// [`into_payload`](OwnedMuxer::into_payload) or `Drop` releases it.
struct OwnedMuxer {
    context: *mut AVFormatContext,
}

// The raw context is only touched from the invocation that owns the
// recorder; nothing is shared.
unsafe impl Send for OwnedMuxer {}

impl OwnedMuxer {
    /// Allocate a muxer for `container` backed by a dynamic memory buffer.
    fn open(container: &str) -> Result<Self, VidfitError> {
        let container_name = CString::new(container)
            .map_err(|error| VidfitError::RecorderError(format!("bad container name: {error}")))?;

        // SAFETY: standard FFmpeg allocation sequence. On any failure the
        // partially-built context is freed before returning; on success
        // ownership moves into `OwnedMuxer`, whose Drop nulls out `pb`
        // before freeing so FFmpeg never closes the buffer twice.
        unsafe {
            let mut context: *mut AVFormatContext = std::ptr::null_mut();
            let allocated = avformat_alloc_output_context2(
                &mut context,
                std::ptr::null_mut(),
                container_name.as_ptr(),
                std::ptr::null(),
            );
            if allocated < 0 || context.is_null() {
                return Err(VidfitError::RecorderError(format!(
                    "failed to allocate {container} muxer"
                )));
            }

            if avio_open_dyn_buf(&mut (*context).pb) < 0 {
                avformat_free_context(context);
                return Err(VidfitError::RecorderError(
                    "failed to open in-memory output buffer".to_string(),
                ));
            }

            Ok(Self { context })
        }
    }

    /// Whether the container requires global codec headers.
    fn needs_global_header(&self) -> bool {
        unsafe { ((*(*self.context).oformat).flags & AVFMT_GLOBALHEADER) != 0 }
    }

    /// Add a stream and return its index.
    fn add_stream(&mut self) -> Result<usize, VidfitError> {
        unsafe {
            let stream = avformat_new_stream(self.context, std::ptr::null());
            if stream.is_null() {
                return Err(VidfitError::RecorderError(
                    "failed to add output stream".to_string(),
                ));
            }
            Ok((*stream).index as usize)
        }
    }

    /// Copy opened-encoder parameters onto a stream and set its time base.
    fn configure_stream(
        &mut self,
        index: usize,
        encoder_ptr: *const ffmpeg_sys_next::AVCodecContext,
        time_base: Rational,
    ) {
        unsafe {
            let stream = *(*self.context).streams.add(index);
            avcodec_parameters_from_context((*stream).codecpar, encoder_ptr);
            (*stream).time_base = AVRational {
                num: time_base.numerator(),
                den: time_base.denominator(),
            };
        }
    }

    /// Write the container header. Muxers may adjust stream time bases here.
    fn write_header(&mut self) -> Result<(), VidfitError> {
        let written = unsafe {
            ffmpeg_sys_next::avformat_write_header(self.context, std::ptr::null_mut())
        };
        if written < 0 {
            return Err(VidfitError::RecorderError(
                "failed to write container header".to_string(),
            ));
        }
        Ok(())
    }

    /// The stream's time base as adjusted by the muxer.
    fn stream_time_base(&self, index: usize) -> Rational {
        unsafe {
            let stream = *(*self.context).streams.add(index);
            let tb = (*stream).time_base;
            Rational::new(tb.num, tb.den)
        }
    }

    /// Interleave one encoded packet into the output.
    fn write_packet(&mut self, packet: &mut Packet) -> Result<(), VidfitError> {
        let written = unsafe { av_interleaved_write_frame(self.context, packet.as_mut_ptr()) };
        if written < 0 {
            return Err(VidfitError::RecorderError(
                "failed to write encoded packet".to_string(),
            ));
        }
        Ok(())
    }

    /// Write the trailer, detach the dynamic buffer, and return its
    /// contents. Consumes the muxer.
    fn into_payload(mut self) -> Result<Vec<u8>, VidfitError> {
        // SAFETY: trailer must be written before the buffer is detached;
        // after avio_close_dyn_buf the buffer pointer is ours to copy and
        // free, and `pb` must be nulled before avformat_free_context.
        unsafe {
            av_write_trailer(self.context);

            let mut buffer: *mut u8 = std::ptr::null_mut();
            let size = avio_close_dyn_buf((*self.context).pb, &mut buffer);

            let payload = if size > 0 && !buffer.is_null() {
                std::slice::from_raw_parts(buffer, size as usize).to_vec()
            } else {
                Vec::new()
            };

            if !buffer.is_null() {
                av_free(buffer as *mut _);
            }

            (*self.context).pb = std::ptr::null_mut();
            avformat_free_context(self.context);
            self.context = std::ptr::null_mut();

            if payload.is_empty() {
                return Err(VidfitError::RecorderError(
                    "recorder produced an empty payload".to_string(),
                ));
            }
            Ok(payload)
        }
    }
}

impl Drop for OwnedMuxer {
    fn drop(&mut self) {
        if self.context.is_null() {
            return;
        }
        // Abandoned session: discard the buffer without writing a trailer.
        unsafe {
            let mut buffer: *mut u8 = std::ptr::null_mut();
            avio_close_dyn_buf((*self.context).pb, &mut buffer);
            if !buffer.is_null() {
                av_free(buffer as *mut _);
            }
            (*self.context).pb = std::ptr::null_mut();
            avformat_free_context(self.context);
            self.context = std::ptr::null_mut();
        }
    }
}

/// Sample-count FIFO bridging routed audio frames to the encoder.
///
/// Fixed-frame codecs (AAC at 1024 samples, Opus at 960) reject frames
/// whose sample count differs from their `frame_size`, and routed frames
/// arrive at whatever size the source decoder produced. The FIFO absorbs
/// frames of any size and yields exact `frame_size` chunks; the remainder
/// is drained as one short final frame, which encoders accept.
struct SampleFifo {
    fifo: *mut AVAudioFifo,
}

// Only touched from the invocation that owns the recorder.
unsafe impl Send for SampleFifo {}

impl SampleFifo {
    fn new(format: Sample, channels: i32, capacity: usize) -> Result<Self, VidfitError> {
        let fifo =
            unsafe { av_audio_fifo_alloc(format.into(), channels, capacity.max(1) as i32) };
        if fifo.is_null() {
            return Err(VidfitError::RecorderError(
                "failed to allocate audio sample buffer".to_string(),
            ));
        }
        Ok(Self { fifo })
    }

    /// Buffered sample count.
    fn len(&self) -> usize {
        unsafe { av_audio_fifo_size(self.fifo).max(0) as usize }
    }

    /// Append all samples of `frame`. The FIFO grows as needed.
    fn push(&mut self, frame: &AudioFrame) -> Result<(), VidfitError> {
        let samples = frame.samples() as i32;
        let written = unsafe {
            av_audio_fifo_write(
                self.fifo,
                (*frame.as_ptr()).extended_data as *mut *mut c_void,
                samples,
            )
        };
        if written < samples {
            return Err(VidfitError::AudioEncodeError(
                "failed to buffer audio samples".to_string(),
            ));
        }
        Ok(())
    }

    /// Move exactly `samples` samples into `frame`, which must have been
    /// allocated with at least that capacity.
    fn pop(&mut self, frame: &mut AudioFrame, samples: usize) -> Result<(), VidfitError> {
        let read = unsafe {
            av_audio_fifo_read(
                self.fifo,
                (*frame.as_mut_ptr()).extended_data as *mut *mut c_void,
                samples as i32,
            )
        };
        if read < samples as i32 {
            return Err(VidfitError::AudioEncodeError(
                "audio sample buffer underrun".to_string(),
            ));
        }
        Ok(())
    }
}

impl Drop for SampleFifo {
    fn drop(&mut self) {
        unsafe { av_audio_fifo_free(self.fifo) };
    }
}

/// The audio half of a recording session.
struct AudioTrack {
    encoder: OpenedAudioEncoder,
    stream_index: usize,
    time_base: Rational,
    target: AudioEncodingTarget,
    /// `None` when the codec accepts variable frame sizes (`frame_size` 0).
    fifo: Option<SampleFifo>,
    /// Reusable chunk frame sized to the encoder's `frame_size`.
    chunk: AudioFrame,
    frame_size: usize,
    /// Samples encoded so far; PTS source for chunked frames.
    samples_sent: i64,
}

/// Pull every pending packet out of the track's encoder into the muxer.
fn drain_audio_packets(
    track: &mut AudioTrack,
    muxer: &mut OwnedMuxer,
    packet: &mut Packet,
) -> Result<(), VidfitError> {
    let stream_time_base = muxer.stream_time_base(track.stream_index);
    while track.encoder.receive_packet(packet).is_ok() {
        packet.set_stream(track.stream_index);
        packet.rescale_ts(track.time_base, stream_time_base);
        muxer.write_packet(packet)?;
    }
    Ok(())
}

/// Encodes rendered frames and routed audio into one in-memory payload.
///
/// Created armed: [`arm`](StreamRecorder::arm) sets up the muxer, encoders,
/// and container header, so the first
/// [`write_video_frame`](StreamRecorder::write_video_frame) call begins
/// encoding immediately.
pub struct StreamRecorder {
    muxer: OwnedMuxer,
    video_encoder: OpenedVideoEncoder,
    video_stream_index: usize,
    video_time_base: Rational,
    audio: Option<AudioTrack>,
    packet: Packet,
    frames_encoded: u64,
}

impl StreamRecorder {
    /// Arm a recording session for the negotiated candidate.
    ///
    /// `audio_source` carries the source audio's sample rate and channel
    /// layout when the source has audio to route; `None` records a
    /// video-only payload.
    ///
    /// # Errors
    ///
    /// Returns [`VidfitError::RecorderError`], [`VidfitError::VideoEncodeError`],
    /// or [`VidfitError::AudioEncodeError`] when the muxer or either encoder
    /// cannot be set up.
    pub fn arm(
        candidate: &EncodingCandidate,
        plan: PlanDimensions,
        frame_rate: u32,
        bitrate: usize,
        audio_source: Option<(u32, ChannelLayout)>,
    ) -> Result<Self, VidfitError> {
        let mut muxer = OwnedMuxer::open(candidate.container)?;
        let needs_global_header = muxer.needs_global_header();

        // Video track.
        let video_stream_index = muxer.add_stream()?;
        let video_time_base = Rational::new(1, frame_rate as i32);
        let video_encoder = open_video_encoder(
            candidate,
            plan,
            frame_rate,
            bitrate,
            needs_global_header,
        )?;
        muxer.configure_stream(video_stream_index, unsafe { video_encoder.as_ptr() }, video_time_base);

        // Audio track, when the source has one.
        let audio = match audio_source {
            Some((source_rate, channel_layout)) => {
                let stream_index = muxer.add_stream()?;
                let (encoder, target) = open_audio_encoder(
                    candidate,
                    source_rate,
                    channel_layout,
                    needs_global_header,
                )?;
                let time_base = Rational::new(1, target.sample_rate as i32);
                muxer.configure_stream(stream_index, unsafe { encoder.as_ptr() }, time_base);

                let frame_size = encoder.frame_size() as usize;
                let (fifo, chunk) = if frame_size > 0 {
                    let fifo = SampleFifo::new(
                        target.sample_format,
                        target.channel_layout.channels(),
                        frame_size * 4,
                    )?;
                    let mut chunk =
                        AudioFrame::new(target.sample_format, frame_size, target.channel_layout);
                    chunk.set_rate(target.sample_rate);
                    (Some(fifo), chunk)
                } else {
                    (None, AudioFrame::empty())
                };

                Some(AudioTrack {
                    encoder,
                    stream_index,
                    time_base,
                    target,
                    fifo,
                    chunk,
                    frame_size,
                    samples_sent: 0,
                })
            }
            None => None,
        };

        muxer.write_header()?;

        log::info!(
            "Recorder armed: {} {}x{} @ {frame_rate} fps, {bitrate} bps, audio={}",
            candidate.label,
            plan.width,
            plan.height,
            audio.is_some(),
        );

        Ok(Self {
            muxer,
            video_encoder,
            video_stream_index,
            video_time_base,
            audio,
            packet: Packet::empty(),
            frames_encoded: 0,
        })
    }

    /// The format routed audio frames must arrive in, when recording audio.
    pub fn audio_target(&self) -> Option<AudioEncodingTarget> {
        self.audio.as_ref().map(|track| track.target)
    }

    /// Encode one painted frame. The frame's PTS must already be stamped in
    /// the recorder's video time base (frame index at the target rate).
    ///
    /// # Errors
    ///
    /// Returns [`VidfitError::VideoEncodeError`] or
    /// [`VidfitError::RecorderError`].
    pub fn write_video_frame(&mut self, frame: &VideoFrame) -> Result<(), VidfitError> {
        self.video_encoder
            .send_frame(frame)
            .map_err(|error| VidfitError::VideoEncodeError(error.to_string()))?;
        self.frames_encoded += 1;
        self.drain_video_packets()
    }

    /// Encode one routed audio frame.
    ///
    /// Frames may arrive at any sample count; fixed-frame codecs are fed
    /// through the sample FIFO in exact `frame_size` chunks with PTS
    /// re-stamped from the running sample counter. Variable-frame codecs
    /// take the frame directly (PTS stamped in samples by the route).
    ///
    /// # Errors
    ///
    /// Returns [`VidfitError::AudioEncodeError`] or
    /// [`VidfitError::RecorderError`].
    pub fn write_audio_frame(&mut self, frame: &AudioFrame) -> Result<(), VidfitError> {
        let Some(track) = self.audio.as_mut() else {
            return Ok(());
        };

        let Some(fifo) = track.fifo.as_mut() else {
            track
                .encoder
                .send_frame(frame)
                .map_err(|error| VidfitError::AudioEncodeError(error.to_string()))?;
            return drain_audio_packets(track, &mut self.muxer, &mut self.packet);
        };
        fifo.push(frame)?;

        while track.fifo.as_ref().map(SampleFifo::len).unwrap_or(0) >= track.frame_size {
            let fifo = track.fifo.as_mut().expect("fifo present in this branch");
            fifo.pop(&mut track.chunk, track.frame_size)?;
            track.chunk.set_pts(Some(track.samples_sent));
            track.samples_sent += track.frame_size as i64;
            track
                .encoder
                .send_frame(&track.chunk)
                .map_err(|error| VidfitError::AudioEncodeError(error.to_string()))?;
            drain_audio_packets(track, &mut self.muxer, &mut self.packet)?;
        }
        Ok(())
    }

    /// Finalize the session: drain both encoders, then write the trailer and
    /// return the accumulated payload.
    ///
    /// Draining happens strictly before the trailer/stop so the encoders'
    /// buffered tail packets are collected rather than dropped.
    ///
    /// # Errors
    ///
    /// Returns [`VidfitError::RecorderError`] when flushing or the trailer
    /// fails, or when the session produced no data at all.
    pub fn finish(mut self) -> Result<Vec<u8>, VidfitError> {
        let _ = self.video_encoder.send_eof();
        self.drain_video_packets()?;

        if let Some(track) = self.audio.as_mut() {
            // Any samples still buffered below frame_size go out as one
            // short final frame before the encoder is flushed.
            let remaining = track.fifo.as_ref().map(SampleFifo::len).unwrap_or(0);
            if remaining > 0 {
                let fifo = track.fifo.as_mut().expect("remaining samples imply a fifo");
                let mut tail =
                    AudioFrame::new(track.target.sample_format, remaining, track.target.channel_layout);
                tail.set_rate(track.target.sample_rate);
                fifo.pop(&mut tail, remaining)?;
                tail.set_pts(Some(track.samples_sent));
                track.samples_sent += remaining as i64;
                track
                    .encoder
                    .send_frame(&tail)
                    .map_err(|error| VidfitError::AudioEncodeError(error.to_string()))?;
                drain_audio_packets(track, &mut self.muxer, &mut self.packet)?;
            }

            let _ = track.encoder.send_eof();
            drain_audio_packets(track, &mut self.muxer, &mut self.packet)?;
        }

        log::debug!("Recorder finalizing after {} frames", self.frames_encoded);
        self.muxer.into_payload()
    }

    fn drain_video_packets(&mut self) -> Result<(), VidfitError> {
        let stream_time_base = self.muxer.stream_time_base(self.video_stream_index);
        while self.video_encoder.receive_packet(&mut self.packet).is_ok() {
            self.packet.set_stream(self.video_stream_index);
            self.packet.rescale_ts(self.video_time_base, stream_time_base);
            self.muxer.write_packet(&mut self.packet)?;
        }
        Ok(())
    }
}

/// Configure and open the video encoder for the candidate codec.
fn open_video_encoder(
    candidate: &EncodingCandidate,
    plan: PlanDimensions,
    frame_rate: u32,
    bitrate: usize,
    needs_global_header: bool,
) -> Result<OpenedVideoEncoder, VidfitError> {
    let codec = ffmpeg_next::encoder::find(candidate.video_codec).ok_or_else(|| {
        VidfitError::VideoEncodeError(format!(
            "encoder for {:?} not available",
            candidate.video_codec
        ))
    })?;

    let mut encoder = CodecContext::new()
        .encoder()
        .video()
        .map_err(|error| VidfitError::VideoEncodeError(error.to_string()))?;

    encoder.set_width(plan.width);
    encoder.set_height(plan.height);
    encoder.set_format(ENCODER_PIXEL_FORMAT);
    encoder.set_time_base(Rational::new(1, frame_rate as i32));
    encoder.set_frame_rate(Some(Rational::new(frame_rate as i32, 1)));
    encoder.set_bit_rate(bitrate);

    if needs_global_header {
        unsafe {
            (*encoder.as_mut_ptr()).flags |= ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
        }
    }

    encoder
        .open_as(codec)
        .map_err(|error| VidfitError::VideoEncodeError(error.to_string()))
}

/// Configure and open the audio encoder, picking a sample format and rate
/// the codec supports.
fn open_audio_encoder(
    candidate: &EncodingCandidate,
    source_rate: u32,
    channel_layout: ChannelLayout,
    needs_global_header: bool,
) -> Result<(OpenedAudioEncoder, AudioEncodingTarget), VidfitError> {
    let codec = ffmpeg_next::encoder::find(candidate.audio_codec).ok_or_else(|| {
        VidfitError::AudioEncodeError(format!(
            "encoder for {:?} not available",
            candidate.audio_codec
        ))
    })?;

    let audio_codec = codec
        .audio()
        .map_err(|error| VidfitError::AudioEncodeError(error.to_string()))?;

    // First supported sample format, falling back to packed i16.
    let sample_format = audio_codec
        .formats()
        .and_then(|mut formats| formats.next())
        .unwrap_or(Sample::I16(ffmpeg_next::format::sample::Type::Packed));

    // Codecs with a fixed rate table (e.g. Opus) get the nearest supported
    // rate; the route's resampler bridges the difference.
    let sample_rate = match audio_codec.rates() {
        Some(rates) => rates
            .min_by_key(|&rate| (rate - source_rate as i32).abs())
            .unwrap_or(source_rate as i32) as u32,
        None => source_rate,
    };

    let mut encoder = CodecContext::new()
        .encoder()
        .audio()
        .map_err(|error| VidfitError::AudioEncodeError(error.to_string()))?;

    encoder.set_rate(sample_rate as i32);
    encoder.set_channel_layout(channel_layout);
    encoder.set_format(sample_format);
    encoder.set_time_base(Rational::new(1, sample_rate as i32));
    encoder.set_bit_rate(AUDIO_BITRATE);

    if needs_global_header {
        unsafe {
            (*encoder.as_mut_ptr()).flags |= ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
        }
    }

    let opened = encoder
        .open_as(codec)
        .map_err(|error| VidfitError::AudioEncodeError(error.to_string()))?;

    let target = AudioEncodingTarget {
        sample_format,
        sample_rate,
        channel_layout,
    };

    Ok((opened, target))
}
