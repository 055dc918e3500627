//! The resolved output of a pipeline invocation.
//!
//! [`VideoAttachmentResult`] is what every successful invocation resolves
//! to, whether the pipeline re-encoded the source or fell back to passing
//! the original through. The payload is reference-counted so the result, a
//! clone of it, and any outstanding [`PreviewHandle`]s share one buffer.

use std::sync::{Arc, Mutex};

/// A prepared video attachment: the payload plus the metadata a caller
/// needs to upload or display it.
#[derive(Debug, Clone)]
pub struct VideoAttachmentResult {
    payload: Arc<Vec<u8>>,
    duration_seconds: u64,
    encoding: Option<String>,
    is_passthrough: bool,
}

impl VideoAttachmentResult {
    /// A compressed result carrying the recorder's payload.
    pub(crate) fn compressed(
        payload: Vec<u8>,
        duration_seconds: f64,
        encoding: &str,
    ) -> Self {
        Self {
            payload: Arc::new(payload),
            duration_seconds: round_duration(duration_seconds),
            encoding: Some(encoding.to_string()),
            is_passthrough: false,
        }
    }

    /// A passthrough result sharing the source's byte buffer.
    pub(crate) fn passthrough(payload: Arc<Vec<u8>>, duration_seconds: f64) -> Self {
        Self {
            payload,
            duration_seconds: round_duration(duration_seconds),
            encoding: None,
            is_passthrough: true,
        }
    }

    /// The attachment bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Byte length of the payload.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Duration in whole seconds, rounded to nearest.
    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    /// The negotiated encoding label (e.g. `"video/mp4;codecs=avc1,mp4a"`),
    /// or `None` for a passthrough result.
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Whether the original file was passed through unmodified.
    pub fn is_passthrough(&self) -> bool {
        self.is_passthrough
    }

    /// Create a preview handle over the payload.
    ///
    /// The handle shares the payload buffer without copying it and can be
    /// revoked independently of this result, e.g. once the caller's preview
    /// UI is torn down.
    pub fn preview(&self) -> PreviewHandle {
        PreviewHandle {
            payload: Arc::new(Mutex::new(Some(Arc::clone(&self.payload)))),
        }
    }

    /// The shared payload buffer, for callers that want to keep the bytes
    /// alive without holding the whole result.
    pub fn into_payload(self) -> Arc<Vec<u8>> {
        self.payload
    }
}

fn round_duration(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    }
}

/// A revocable view of an attachment payload, for previewing.
///
/// Clones share revocation state: revoking any clone revokes them all.
/// Revocation releases this handle's reference to the buffer; the buffer
/// itself lives as long as the originating [`VideoAttachmentResult`] (or
/// any other reference) does.
#[derive(Debug, Clone)]
pub struct PreviewHandle {
    payload: Arc<Mutex<Option<Arc<Vec<u8>>>>>,
}

impl PreviewHandle {
    /// The payload bytes, or `None` after revocation.
    pub fn bytes(&self) -> Option<Arc<Vec<u8>>> {
        self.payload.lock().expect("preview lock poisoned").clone()
    }

    /// Revoke the handle. Idempotent.
    pub fn revoke(&self) {
        self.payload.lock().expect("preview lock poisoned").take();
    }

    /// Whether the handle still resolves to the payload.
    pub fn is_live(&self) -> bool {
        self.payload.lock().expect("preview lock poisoned").is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_shares_source_buffer() {
        let bytes = Arc::new(vec![1u8, 2, 3]);
        let result = VideoAttachmentResult::passthrough(Arc::clone(&bytes), 4.2);

        assert!(result.is_passthrough());
        assert_eq!(result.encoding(), None);
        assert_eq!(result.duration_seconds(), 4);
        assert_eq!(result.payload(), &[1, 2, 3]);
        // No copy was made.
        assert!(Arc::ptr_eq(&bytes, &result.into_payload()));
    }

    #[test]
    fn compressed_result_reports_encoding() {
        let result =
            VideoAttachmentResult::compressed(vec![9u8; 16], 10.6, "video/mp4;codecs=avc1,mp4a");
        assert!(!result.is_passthrough());
        assert_eq!(result.encoding(), Some("video/mp4;codecs=avc1,mp4a"));
        assert_eq!(result.duration_seconds(), 11);
        assert_eq!(result.payload_len(), 16);
    }

    #[test]
    fn duration_rounding_handles_degenerate_values() {
        let nan = VideoAttachmentResult::passthrough(Arc::new(Vec::new()), f64::NAN);
        assert_eq!(nan.duration_seconds(), 0);

        let negative = VideoAttachmentResult::passthrough(Arc::new(Vec::new()), -3.0);
        assert_eq!(negative.duration_seconds(), 0);
    }

    #[test]
    fn preview_revocation_is_shared_and_idempotent() {
        let result = VideoAttachmentResult::passthrough(Arc::new(vec![7u8; 4]), 1.0);
        let preview = result.preview();
        let clone = preview.clone();

        assert!(preview.is_live());
        assert_eq!(clone.bytes().as_deref().map(Vec::len), Some(4));

        preview.revoke();
        assert!(!clone.is_live());
        assert!(clone.bytes().is_none());

        // Revoking again is harmless, and the result still has its payload.
        clone.revoke();
        assert_eq!(result.payload_len(), 4);
    }

    #[test]
    fn independent_previews_do_not_share_revocation() {
        let result = VideoAttachmentResult::passthrough(Arc::new(vec![0u8; 2]), 1.0);
        let first = result.preview();
        let second = result.preview();

        first.revoke();
        assert!(!first.is_live());
        assert!(second.is_live());
    }
}
