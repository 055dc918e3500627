//! End-to-end pipeline integration tests.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use vidfit::{
    CancellationToken, EncodingCandidate, PipelineConfig, PrepareOptions, ProgressCallback,
    SourceVideo, VidfitError,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn sample_video_only_path() -> &'static str {
    "tests/fixtures/sample_video_only.mp4"
}

fn sample_portrait_path() -> &'static str {
    "tests/fixtures/sample_portrait.mp4"
}

fn sample_opus_path() -> &'static str {
    "tests/fixtures/sample_video_opus.webm"
}

/// Records every fraction the pipeline reports.
struct ProgressLog {
    values: Mutex<Vec<f64>>,
}

impl ProgressLog {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            values: Mutex::new(Vec::new()),
        })
    }

    fn values(&self) -> Vec<f64> {
        self.values.lock().unwrap().clone()
    }
}

impl ProgressCallback for ProgressLog {
    fn on_progress(&self, fraction: f64) {
        self.values.lock().unwrap().push(fraction);
    }
}

// ── Pre-commitment rejections ──────────────────────────────────────

#[test]
fn oversized_input_is_rejected() {
    let source = SourceVideo::from_bytes(vec![0u8; 1024], "video/mp4");
    let config = PipelineConfig::default().with_max_input_bytes(512);

    let result = vidfit::prepare_attachment(&source, &config, &PrepareOptions::default());
    assert!(matches!(
        result,
        Err(VidfitError::InputTooLarge { size: 1024, max: 512 })
    ));
}

#[test]
fn non_video_input_is_rejected() {
    let source = SourceVideo::from_bytes(vec![0u8; 16], "text/plain");
    let result = vidfit::prepare_attachment(
        &source,
        &PipelineConfig::default(),
        &PrepareOptions::default(),
    );
    assert!(matches!(result, Err(VidfitError::InvalidInputType { .. })));
}

#[test]
fn unreadable_bytes_fail_the_probe() {
    let source = SourceVideo::from_bytes(vec![0xAB; 2048], "video/mp4");
    let result = vidfit::prepare_attachment(
        &source,
        &PipelineConfig::default(),
        &PrepareOptions::default(),
    );
    assert!(matches!(result, Err(VidfitError::MetadataLoadFailed { .. })));
}

// ── Compression ────────────────────────────────────────────────────

#[test]
fn compresses_1080p_fixture_into_bounds() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = SourceVideo::from_path(path).expect("Failed to read fixture");
    let result = vidfit::prepare_attachment(
        &source,
        &PipelineConfig::default(),
        &PrepareOptions::default(),
    )
    .expect("Pipeline should resolve");

    assert!(result.payload_len() > 0);
    // The fixture is ~4 seconds long.
    assert!(
        (3..=5).contains(&result.duration_seconds()),
        "unexpected duration {}",
        result.duration_seconds()
    );

    if !result.is_passthrough() {
        assert!(result.encoding().is_some());
        // 4s of 1.2 Mbps video plus audio stays far below the original.
        assert!(result.payload_len() < source.bytes().len());
    }
}

#[test]
fn video_only_fixture_records_without_audio() {
    let path = sample_video_only_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = SourceVideo::from_path(path).expect("Failed to read fixture");
    let result = vidfit::prepare_attachment(
        &source,
        &PipelineConfig::default(),
        &PrepareOptions::default(),
    )
    .expect("Pipeline should resolve");

    assert!(result.payload_len() > 0);
}

#[test]
fn small_source_is_not_upscaled() {
    let path = sample_portrait_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = SourceVideo::from_path(path).expect("Failed to read fixture");
    let metadata = vidfit::probe_source(&source).expect("Fixture should probe");
    assert_eq!((metadata.width, metadata.height), (360, 640));

    let plan = vidfit::plan_dimensions(metadata.width, metadata.height, 1280, 720);
    assert_eq!((plan.width, plan.height), (360, 640));

    let result = vidfit::prepare_attachment(
        &source,
        &PipelineConfig::default(),
        &PrepareOptions::default(),
    )
    .expect("Pipeline should resolve");
    assert!(result.payload_len() > 0);
}

#[test]
fn progress_is_monotonic_and_ends_at_one() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = SourceVideo::from_path(path).expect("Failed to read fixture");
    let log = ProgressLog::new();
    let options = PrepareOptions::new().with_progress(log.clone());

    let result = vidfit::prepare_attachment(&source, &PipelineConfig::default(), &options)
        .expect("Pipeline should resolve");

    let values = log.values();
    if result.is_passthrough() {
        // The fallback reports nothing.
        assert!(values.is_empty());
        return;
    }

    assert!(!values.is_empty());
    for window in values.windows(2) {
        assert!(
            window[1] >= window[0],
            "progress went backwards: {:?}",
            values
        );
    }
    for value in &values {
        assert!((0.0..=1.0).contains(value));
    }
    assert_eq!(values.last().copied(), Some(1.0));
}

#[test]
fn opus_audio_source_is_recompressed() {
    let path = sample_opus_path();
    if !Path::new(path).exists() {
        return;
    }

    // Opus decodes in 960-sample frames while the AAC encoder consumes
    // 1024 at a time, so this source only records if the audio path
    // re-chunks between the two.
    let source = SourceVideo::from_path(path).expect("Failed to read fixture");
    let result = vidfit::prepare_attachment(
        &source,
        &PipelineConfig::default(),
        &PrepareOptions::default(),
    )
    .expect("Pipeline should resolve");

    assert!(
        !result.is_passthrough(),
        "opus fixture should re-encode, not fall back"
    );
    assert!(result.encoding().is_some());
    assert!(result.payload_len() > 0);
}

#[test]
fn rate_converted_audio_records_to_webm() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    // The fixture's AAC track is 44.1 kHz and Opus only encodes at 48 kHz,
    // so forcing the WebM candidates makes the route genuinely resample,
    // leaving a tail in swresample that must be flushed at end of stream.
    let webm_only: Vec<EncodingCandidate> = EncodingCandidate::defaults()
        .into_iter()
        .filter(|candidate| candidate.container == "webm")
        .collect();
    let source = SourceVideo::from_path(path).expect("Failed to read fixture");
    let config = PipelineConfig::default().with_candidates(webm_only);

    let result = vidfit::prepare_attachment(&source, &config, &PrepareOptions::default())
        .expect("Pipeline should resolve");

    if result.is_passthrough() {
        // No VP8/VP9 encoder in this FFmpeg build.
        return;
    }
    assert!(result.encoding().unwrap().starts_with("video/webm"));
    assert!(result.payload_len() > 0);

    // The payload must itself be a well-formed clip of the full length.
    let recorded = SourceVideo::from_bytes(result.payload().to_vec(), "video/webm");
    let metadata = vidfit::probe_source(&recorded).expect("payload should probe");
    assert!(metadata.has_audio);
    assert!((metadata.duration_seconds - 4.0).abs() < 1.0);
}

// ── Passthrough fallback ───────────────────────────────────────────

#[test]
fn no_supported_candidates_falls_back_to_original() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = SourceVideo::from_path(path).expect("Failed to read fixture");
    let config = PipelineConfig::default().with_candidates(Vec::new());

    let result = vidfit::prepare_attachment(&source, &config, &PrepareOptions::default())
        .expect("Pipeline should resolve");

    assert!(result.is_passthrough());
    assert_eq!(result.encoding(), None);
    assert_eq!(result.payload(), source.bytes());
}

#[test]
fn cancellation_resolves_via_passthrough() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = SourceVideo::from_path(path).expect("Failed to read fixture");
    let token = CancellationToken::new();
    token.cancel();
    let options = PrepareOptions::new().with_cancellation(token);

    let result = vidfit::prepare_attachment(&source, &PipelineConfig::default(), &options)
        .expect("Cancellation must not surface as an error");

    assert!(result.is_passthrough());
    assert_eq!(result.payload(), source.bytes());
}

#[test]
fn mid_stream_failure_falls_back_to_original() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    // A file cut off partway through decodes or demuxes only a fraction of
    // its declared duration. That failure happens after the pipeline has
    // committed, so it must resolve as passthrough, not an error.
    let bytes = std::fs::read(path).expect("Failed to read fixture");
    let truncated = bytes[..bytes.len() * 6 / 10].to_vec();
    let source = SourceVideo::from_bytes(truncated.clone(), "video/mp4");
    if vidfit::probe_source(&source).is_err() {
        // Header landed in the cut-off tail; regenerate fixtures to cover
        // this path.
        return;
    }

    let result = vidfit::prepare_attachment(
        &source,
        &PipelineConfig::default(),
        &PrepareOptions::default(),
    )
    .expect("Mid-stream failure must not surface as an error");

    assert!(result.is_passthrough());
    assert_eq!(result.encoding(), None);
    assert_eq!(result.payload(), truncated.as_slice());
}

// ── Repeated use ───────────────────────────────────────────────────

#[test]
fn sequential_invocations_are_independent() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = SourceVideo::from_path(path).expect("Failed to read fixture");
    let config = PipelineConfig::default();

    let first = vidfit::prepare_attachment(&source, &config, &PrepareOptions::default())
        .expect("First run should resolve");
    let second = vidfit::prepare_attachment(&source, &config, &PrepareOptions::default())
        .expect("Second run should resolve");

    assert_eq!(first.is_passthrough(), second.is_passthrough());
    assert_eq!(first.duration_seconds(), second.duration_seconds());
    assert!(second.payload_len() > 0);
}

#[test]
fn preview_handle_survives_result_drop() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let source = SourceVideo::from_path(path).expect("Failed to read fixture");
    let result = vidfit::prepare_attachment(
        &source,
        &PipelineConfig::default(),
        &PrepareOptions::default(),
    )
    .expect("Pipeline should resolve");

    let expected_len = result.payload_len();
    let preview = result.preview();
    drop(result);

    let bytes = preview.bytes().expect("preview should still be live");
    assert_eq!(bytes.len(), expected_len);

    preview.revoke();
    assert!(preview.bytes().is_none());
}
