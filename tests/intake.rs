//! Intake validation behaviour through the public API.

use vidfit::{PipelineConfig, PrepareOptions, SourceVideo, VidfitError};

#[test]
fn boundary_size_is_accepted_past_intake() {
    // Exactly at the limit: intake passes, the probe then rejects the
    // garbage bytes. The point is which error comes back.
    let config = PipelineConfig::default().with_max_input_bytes(64);
    let source = SourceVideo::from_bytes(vec![0u8; 64], "video/mp4");

    let result = vidfit::prepare_attachment(&source, &config, &PrepareOptions::default());
    assert!(matches!(result, Err(VidfitError::MetadataLoadFailed { .. })));
}

#[test]
fn one_byte_over_the_limit_is_rejected() {
    let config = PipelineConfig::default().with_max_input_bytes(64);
    let source = SourceVideo::from_bytes(vec![0u8; 65], "video/mp4");

    let result = vidfit::prepare_attachment(&source, &config, &PrepareOptions::default());
    assert!(matches!(
        result,
        Err(VidfitError::InputTooLarge { size: 65, max: 64 })
    ));
}

#[test]
fn size_check_runs_before_type_check() {
    // Oversized *and* mistyped: the size rejection wins.
    let config = PipelineConfig::default().with_max_input_bytes(8);
    let source = SourceVideo::from_bytes(vec![0u8; 16], "text/plain");

    let result = vidfit::prepare_attachment(&source, &config, &PrepareOptions::default());
    assert!(matches!(result, Err(VidfitError::InputTooLarge { .. })));
}

#[test]
fn media_type_rejection_reports_the_declared_type() {
    let source = SourceVideo::from_bytes(vec![0u8; 4], "image/png");
    let result = vidfit::prepare_attachment(
        &source,
        &PipelineConfig::default(),
        &PrepareOptions::default(),
    );

    match result {
        Err(VidfitError::InvalidInputType { media_type }) => {
            assert_eq!(media_type, "image/png");
        }
        other => panic!("expected InvalidInputType, got {other:?}"),
    }
}
