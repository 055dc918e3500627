//! Async entry-point tests (require the `async` feature).

#![cfg(feature = "async")]

use std::path::Path;

use vidfit::{PipelineConfig, PrepareOptions, SourceVideo, VidfitError};

#[tokio::test]
async fn async_entry_point_matches_sync_errors() {
    let source = SourceVideo::from_bytes(vec![0u8; 16], "text/plain");
    let result = vidfit::prepare_attachment_async(
        source,
        PipelineConfig::default(),
        PrepareOptions::default(),
    )
    .await;
    assert!(matches!(result, Err(VidfitError::InvalidInputType { .. })));
}

#[tokio::test]
async fn async_entry_point_resolves_fixture() {
    let path = "tests/fixtures/sample_video.mp4";
    if !Path::new(path).exists() {
        return;
    }

    let source = SourceVideo::from_path(path).expect("Failed to read fixture");
    let result = vidfit::prepare_attachment_async(
        source,
        PipelineConfig::default(),
        PrepareOptions::default(),
    )
    .await
    .expect("Pipeline should resolve");

    assert!(result.payload_len() > 0);
}
