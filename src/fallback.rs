//! Passthrough fallback.
//!
//! Once the pipeline has accepted an input, it never rejects it: any failure
//! past that point resolves as the original file, unmodified. This module
//! holds that terminal branch. It is deliberately infallible: it performs no
//! decoding, shares the source's byte buffer instead of copying it, and uses
//! only a best-effort duration probe that reports 0 rather than erroring.

use crate::probe::probe_duration_best_effort;
use crate::result::VideoAttachmentResult;
use crate::source::SourceVideo;

/// Resolve the invocation with the original file.
///
/// `reason` is logged for diagnosis; the caller sees only a normal result
/// with [`is_passthrough`](VideoAttachmentResult::is_passthrough) set.
pub(crate) fn passthrough(source: &SourceVideo, reason: &str) -> VideoAttachmentResult {
    log::warn!("Falling back to original file: {reason}");

    let duration_seconds = probe_duration_best_effort(source);
    VideoAttachmentResult::passthrough(source.shared_bytes(), duration_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_never_fails_on_garbage() {
        let source = SourceVideo::from_bytes(vec![0xFF; 128], "video/mp4");
        let result = passthrough(&source, "test");

        assert!(result.is_passthrough());
        assert_eq!(result.payload(), source.bytes());
        assert_eq!(result.duration_seconds(), 0);
        assert_eq!(result.encoding(), None);
    }

    #[test]
    fn passthrough_shares_rather_than_copies() {
        let source = SourceVideo::from_bytes(vec![1u8; 1024], "video/webm");
        let result = passthrough(&source, "test");
        assert!(std::sync::Arc::ptr_eq(
            &source.shared_bytes(),
            &result.into_payload()
        ));
    }
}
