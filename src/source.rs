//! Source video descriptor.
//!
//! [`SourceVideo`] wraps the caller's input: the raw file bytes plus the
//! declared media type. The pipeline never mutates it; the bytes are held
//! behind an [`Arc`] so the passthrough fallback can hand them back without
//! copying.

use std::path::Path;
use std::sync::Arc;

use crate::error::VidfitError;

/// A caller-provided input video.
///
/// Construct with [`from_bytes`](SourceVideo::from_bytes) when the bytes are
/// already in memory (e.g. received from a file picker), or
/// [`from_path`](SourceVideo::from_path) to read a file from disk. The
/// declared media type is what intake validation checks; it is the caller's
/// claim about the content, not a sniffed value.
///
/// # Example
///
/// ```no_run
/// use vidfit::SourceVideo;
///
/// let source = SourceVideo::from_path("clip.mp4")?;
/// assert_eq!(source.media_type(), "video/mp4");
/// # Ok::<(), vidfit::VidfitError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SourceVideo {
    bytes: Arc<Vec<u8>>,
    media_type: String,
    name: Option<String>,
}

impl SourceVideo {
    /// Wrap in-memory bytes with a declared media type (e.g. `"video/mp4"`).
    pub fn from_bytes(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: Arc::new(bytes),
            media_type: media_type.into(),
            name: None,
        }
    }

    /// Read a file from disk, deriving the declared media type from its
    /// extension.
    ///
    /// Unrecognised extensions map to `"application/octet-stream"`, which
    /// intake validation will reject.
    ///
    /// # Errors
    ///
    /// Returns [`VidfitError::IoError`] if the file cannot be read.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, VidfitError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let media_type = media_type_for_extension(
            path.extension().and_then(|ext| ext.to_str()).unwrap_or(""),
        );
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string);

        log::debug!(
            "Read source {:?} ({} bytes, declared type {media_type})",
            path.display(),
            bytes.len(),
        );

        Ok(Self {
            bytes: Arc::new(bytes),
            media_type: media_type.to_string(),
            name,
        })
    }

    /// Attach a display name (used only for log messages).
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The raw input bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Byte length of the input.
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Whether the input is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The declared media type (e.g. `"video/mp4"`).
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// The display name, if one is known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Shared handle to the payload bytes, for zero-copy passthrough.
    pub(crate) fn shared_bytes(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.bytes)
    }
}

/// Map a file extension to a declared media type.
fn media_type_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mpg" | "mpeg" => "video/mpeg",
        "3gp" => "video/3gpp",
        "ogv" => "video/ogg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping() {
        assert_eq!(media_type_for_extension("mp4"), "video/mp4");
        assert_eq!(media_type_for_extension("MOV"), "video/quicktime");
        assert_eq!(media_type_for_extension("webm"), "video/webm");
        assert_eq!(media_type_for_extension("txt"), "application/octet-stream");
        assert_eq!(media_type_for_extension(""), "application/octet-stream");
    }

    #[test]
    fn from_bytes_preserves_declared_type() {
        let source = SourceVideo::from_bytes(vec![0, 1, 2], "video/webm");
        assert_eq!(source.media_type(), "video/webm");
        assert_eq!(source.len(), 3);
        assert!(!source.is_empty());
    }
}
