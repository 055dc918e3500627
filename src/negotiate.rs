//! Output encoding negotiation.
//!
//! The pipeline does not pick the "best" codec for a given input; it walks an
//! ordered list of [`EncodingCandidate`]s (most preferred first) and selects
//! the first one the runtime can actually produce. When none is supported the
//! pipeline falls back to returning the original file untouched.
//!
//! Capability probing sits behind the [`CandidateProbe`] trait so the
//! selection logic stays a pure function of candidate order and probe
//! answers. The production implementation, [`FfmpegCandidateProbe`], asks
//! FFmpeg whether the muxer and both encoders exist in the linked build.

use std::ffi::CString;

use ffmpeg_next::codec::Id;

/// One container/codec combination the recorder could produce.
///
/// `label` is the MIME-style identifier reported on the final
/// [`VideoAttachmentResult`](crate::VideoAttachmentResult);
/// `container` is the FFmpeg muxer name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingCandidate {
    /// FFmpeg muxer name (e.g. `"mp4"`, `"webm"`).
    pub container: &'static str,
    /// Video codec for the re-encoded track.
    pub video_codec: Id,
    /// Audio codec for the routed audio track.
    pub audio_codec: Id,
    /// MIME-style label (e.g. `"video/mp4;codecs=avc1,mp4a"`).
    pub label: &'static str,
}

impl EncodingCandidate {
    /// The default candidate order: H.264/AAC in MP4 first (widest playback
    /// support in chat clients), then VP9 and VP8 in WebM.
    pub fn defaults() -> Vec<EncodingCandidate> {
        vec![
            EncodingCandidate {
                container: "mp4",
                video_codec: Id::H264,
                audio_codec: Id::AAC,
                label: "video/mp4;codecs=avc1,mp4a",
            },
            EncodingCandidate {
                container: "webm",
                video_codec: Id::VP9,
                audio_codec: Id::OPUS,
                label: "video/webm;codecs=vp9,opus",
            },
            EncodingCandidate {
                container: "webm",
                video_codec: Id::VP8,
                audio_codec: Id::OPUS,
                label: "video/webm;codecs=vp8,opus",
            },
        ]
    }
}

/// Answers "can this runtime produce that candidate?".
///
/// Implementations must be deterministic for the lifetime of one pipeline
/// invocation; the negotiator probes each candidate exactly once.
pub trait CandidateProbe {
    /// Whether the candidate's container and codecs are available for
    /// recording.
    fn supports(&self, candidate: &EncodingCandidate) -> bool;
}

/// Probes the linked FFmpeg build for muxer and encoder availability.
#[derive(Debug, Default)]
pub struct FfmpegCandidateProbe;

impl CandidateProbe for FfmpegCandidateProbe {
    fn supports(&self, candidate: &EncodingCandidate) -> bool {
        if ffmpeg_next::encoder::find(candidate.video_codec).is_none() {
            return false;
        }
        if ffmpeg_next::encoder::find(candidate.audio_codec).is_none() {
            return false;
        }
        muxer_available(candidate.container)
    }
}

/// Whether FFmpeg can mux the named container format.
fn muxer_available(container: &str) -> bool {
    let Ok(name) = CString::new(container) else {
        return false;
    };
    // av_guess_format performs a pure table lookup; no resources are
    // allocated and the returned pointer is not owned by us.
    let format = unsafe {
        ffmpeg_sys_next::av_guess_format(name.as_ptr(), std::ptr::null(), std::ptr::null())
    };
    !format.is_null()
}

/// Select the first supported candidate, in priority order.
///
/// Returns `None` when the runtime supports none of them, which the caller
/// treats as the passthrough branch rather than an error.
///
/// # Example
///
/// ```no_run
/// use vidfit::{negotiate, EncodingCandidate, FfmpegCandidateProbe};
///
/// let candidates = EncodingCandidate::defaults();
/// match negotiate(&candidates, &FfmpegCandidateProbe) {
///     Some(chosen) => println!("Recording as {}", chosen.label),
///     None => println!("No supported encoding; will pass through"),
/// }
/// ```
pub fn negotiate<'a, P: CandidateProbe>(
    candidates: &'a [EncodingCandidate],
    probe: &P,
) -> Option<&'a EncodingCandidate> {
    for candidate in candidates {
        if probe.supports(candidate) {
            log::info!(
                "Negotiated output encoding: {} ({} in {})",
                candidate.label,
                candidate.video_codec.name(),
                candidate.container,
            );
            return Some(candidate);
        }
        log::debug!("Candidate {} not supported, trying next", candidate.label);
    }

    log::warn!("No candidate encoding is supported; compression unavailable");
    None
}
