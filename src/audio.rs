//! Audio routing from the source's decoded stream to the recorder.
//!
//! [`AudioRoute`] is the decode-side half of the audio path: it decodes the
//! source's audio packets and resamples them into exactly the sample format,
//! rate, and channel layout the recorder's encoder consumes.
//!
//! Every routed frame is also offered to a [`LivenessSink`]. On some
//! platforms a decoded audio path produces no samples at all unless it
//! terminates in an output sink, so the tap is part of the routing contract;
//! on platforms without that quirk the default [`NullSink`] discards the
//! frames and costs nothing.

use ffmpeg_next::ChannelLayout;
use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::codec::decoder::Audio as AudioDecoder;
use ffmpeg_next::format::Sample;
use ffmpeg_next::frame::Audio as AudioFrame;
use ffmpeg_next::software::resampling::Context as ResamplingContext;

use crate::error::VidfitError;

/// The sample format, rate, and channel layout a recorder's audio encoder
/// expects routed frames to arrive in.
#[derive(Debug, Clone, Copy)]
pub struct AudioEncodingTarget {
    /// Sample format the encoder was opened with.
    pub sample_format: Sample,
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Channel layout.
    pub channel_layout: ChannelLayout,
}

/// Receives every frame that flows through the route.
///
/// This exists to keep the decoded audio path "hot" on platforms where an
/// unterminated path is silently dropped. Implementations must not block;
/// they observe frames, they do not own them.
pub trait LivenessSink: Send {
    /// Observe one routed frame.
    fn observe(&mut self, frame: &AudioFrame);
}

/// The default sink: discards every frame.
#[derive(Debug, Default)]
pub struct NullSink;

impl LivenessSink for NullSink {
    fn observe(&mut self, _frame: &AudioFrame) {}
}

/// Decodes and resamples source audio into recorder-ready frames.
///
/// Owns the audio decoder and the resampling context; both are torn down
/// exactly once when the route drops, on every exit path.
pub struct AudioRoute {
    decoder: AudioDecoder,
    resampler: ResamplingContext,
    sink: Box<dyn LivenessSink>,
    decoded: AudioFrame,
    resampled: AudioFrame,
    samples_routed: i64,
}

impl AudioRoute {
    /// Build the route from the source stream's codec parameters to the
    /// recorder's encoding target.
    ///
    /// # Errors
    ///
    /// Returns [`VidfitError::AudioRouteError`] when the decoder or
    /// resampler cannot be constructed.
    pub fn build(
        stream_parameters: ffmpeg_next::codec::Parameters,
        target: AudioEncodingTarget,
        sink: Box<dyn LivenessSink>,
    ) -> Result<Self, VidfitError> {
        let decoder_context = CodecContext::from_parameters(stream_parameters)
            .map_err(|error| VidfitError::AudioRouteError(error.to_string()))?;
        let decoder = decoder_context
            .decoder()
            .audio()
            .map_err(|error| VidfitError::AudioRouteError(error.to_string()))?;

        let resampler = ResamplingContext::get(
            decoder.format(),
            decoder.channel_layout(),
            decoder.rate(),
            target.sample_format,
            target.channel_layout,
            target.sample_rate,
        )
        .map_err(|error| VidfitError::AudioRouteError(error.to_string()))?;

        log::debug!(
            "Audio route ready: {} Hz {:?} -> {} Hz {:?}",
            decoder.rate(),
            decoder.format(),
            target.sample_rate,
            target.sample_format,
        );

        Ok(Self {
            decoder,
            resampler,
            sink,
            decoded: AudioFrame::empty(),
            resampled: AudioFrame::empty(),
            samples_routed: 0,
        })
    }

    /// The source stream's native sample rate and channel layout.
    ///
    /// The recorder uses these to pick compatible encoder settings before
    /// the route is built.
    pub fn source_parameters(
        stream_parameters: ffmpeg_next::codec::Parameters,
    ) -> Result<(u32, ChannelLayout), VidfitError> {
        let decoder_context = CodecContext::from_parameters(stream_parameters)
            .map_err(|error| VidfitError::AudioRouteError(error.to_string()))?;
        let decoder = decoder_context
            .decoder()
            .audio()
            .map_err(|error| VidfitError::AudioRouteError(error.to_string()))?;
        Ok((decoder.rate(), decoder.channel_layout()))
    }

    /// Route one demuxed audio packet: decode, resample, stamp sample-based
    /// timestamps, and deliver each resulting frame to `deliver`.
    ///
    /// # Errors
    ///
    /// Returns [`VidfitError::AudioRouteError`] on decode/resample failure,
    /// or whatever `deliver` returns.
    pub fn route_packet<F>(
        &mut self,
        packet: &ffmpeg_next::Packet,
        deliver: &mut F,
    ) -> Result<(), VidfitError>
    where
        F: FnMut(&AudioFrame) -> Result<(), VidfitError>,
    {
        self.decoder
            .send_packet(packet)
            .map_err(|error| VidfitError::AudioRouteError(error.to_string()))?;
        self.drain_decoder(deliver)
    }

    /// Flush the decoder and the resampler at end of stream, delivering any
    /// buffered frames.
    ///
    /// Rate conversion leaves a tail of samples inside swresample; without
    /// draining it the last few milliseconds of audio would be lost.
    pub fn flush<F>(&mut self, deliver: &mut F) -> Result<(), VidfitError>
    where
        F: FnMut(&AudioFrame) -> Result<(), VidfitError>,
    {
        let _ = self.decoder.send_eof();
        self.drain_decoder(deliver)?;

        while self.resampler.delay().is_some() {
            self.resampler
                .flush(&mut self.resampled)
                .map_err(|error| VidfitError::AudioRouteError(error.to_string()))?;
            if self.resampled.samples() == 0 {
                break;
            }

            self.resampled.set_pts(Some(self.samples_routed));
            self.samples_routed += self.resampled.samples() as i64;

            self.sink.observe(&self.resampled);
            deliver(&self.resampled)?;
        }
        Ok(())
    }

    fn drain_decoder<F>(&mut self, deliver: &mut F) -> Result<(), VidfitError>
    where
        F: FnMut(&AudioFrame) -> Result<(), VidfitError>,
    {
        while self.decoder.receive_frame(&mut self.decoded).is_ok() {
            self.resampler
                .run(&self.decoded, &mut self.resampled)
                .map_err(|error| VidfitError::AudioRouteError(error.to_string()))?;

            self.resampled.set_pts(Some(self.samples_routed));
            self.samples_routed += self.resampled.samples() as i64;

            self.sink.observe(&self.resampled);
            deliver(&self.resampled)?;
        }
        Ok(())
    }
}
