//! Off-screen frame rendering.
//!
//! [`FrameRenderer`] owns the scaling context and the reusable off-screen
//! frame the output video track is built from: every decoded source frame is
//! painted (converted and scaled) into it at the planned dimensions. That
//! painted frame is the single source of truth for the encoded video track.
//!
//! Failure to construct the renderer is an environment-level error
//! ([`VidfitError::RenderTargetUnavailable`]); failures while painting are
//! reported to the orchestrator through the same channel as decode errors.

use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};

use crate::error::VidfitError;
use crate::plan::PlanDimensions;

/// Paints decoded source frames onto an off-screen surface sized per the
/// dimension plan, in the pixel format the video encoder consumes.
pub struct FrameRenderer {
    scaler: ScalingContext,
    surface: VideoFrame,
}

impl FrameRenderer {
    /// Construct a renderer converting from the decoder's output format and
    /// size to `target_pixel` at the planned dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`VidfitError::RenderTargetUnavailable`] when the scaling
    /// context cannot be created (unsupported pixel format conversion or
    /// allocation failure).
    pub fn new(
        source_pixel: Pixel,
        source_width: u32,
        source_height: u32,
        plan: PlanDimensions,
        target_pixel: Pixel,
    ) -> Result<Self, VidfitError> {
        let scaler = ScalingContext::get(
            source_pixel,
            source_width,
            source_height,
            target_pixel,
            plan.width,
            plan.height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|error| VidfitError::RenderTargetUnavailable {
            reason: error.to_string(),
        })?;

        log::debug!(
            "Render target ready: {source_width}x{source_height} {source_pixel:?} -> {}x{} {target_pixel:?}",
            plan.width,
            plan.height,
        );

        Ok(Self {
            scaler,
            surface: VideoFrame::empty(),
        })
    }

    /// Paint one decoded frame onto the surface and return it.
    ///
    /// The returned reference is valid until the next `paint` call; the
    /// caller stamps the presentation timestamp and hands the frame to the
    /// recorder before painting again.
    ///
    /// # Errors
    ///
    /// Returns [`VidfitError::VideoDecodeError`] when scaling fails; the
    /// orchestrator treats this identically to a decoder error.
    pub fn paint(&mut self, decoded: &VideoFrame) -> Result<&mut VideoFrame, VidfitError> {
        self.scaler
            .run(decoded, &mut self.surface)
            .map_err(|error| VidfitError::VideoDecodeError(format!("frame paint failed: {error}")))?;
        Ok(&mut self.surface)
    }
}
