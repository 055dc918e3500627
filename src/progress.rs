//! Progress reporting and cancellation support.
//!
//! Compression runs for a noticeable amount of time on long sources, so the
//! pipeline reports a completion fraction through [`ProgressCallback`] and
//! honours a cooperative [`CancellationToken`].
//!
//! Progress is only reported while the pipeline is actually re-encoding; the
//! passthrough fallback emits nothing.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vidfit::{
//!     PipelineConfig, PrepareOptions, ProgressCallback, SourceVideo,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, fraction: f64) {
//!         println!("{:.0}% complete", fraction * 100.0);
//!     }
//! }
//!
//! let source = SourceVideo::from_path("clip.mp4")?;
//! let options = PrepareOptions::new().with_progress(Arc::new(PrintProgress));
//! let result = vidfit::prepare_attachment(&source, &PipelineConfig::default(), &options)?;
//! # Ok::<(), vidfit::VidfitError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Trait for receiving progress updates during compression.
///
/// The fraction is always in `[0.0, 1.0]` and is monotonically non-decreasing
/// within one pipeline invocation; the last value reported before a
/// successful resolution is `1.0`.
///
/// Implementations must be [`Send`] and [`Sync`] because the async entry
/// point runs the pipeline on a blocking worker thread.
///
/// Progress callbacks are infallible observers. Use [`CancellationToken`]
/// to halt an in-flight compression.
pub trait ProgressCallback: Send + Sync {
    /// Called with the current completion fraction.
    fn on_progress(&self, fraction: f64);
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _fraction: f64) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to request
/// cancellation. The transcode loop checks
/// [`is_cancelled`](CancellationToken::is_cancelled) on every packet.
///
/// A cancelled compression resolves through the passthrough fallback, never
/// as a partial clip.
///
/// # Example
///
/// ```
/// use vidfit::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal helper that clamps, deduplicates, and monotonicity-enforces
/// progress fractions before they reach the user callback.
///
/// Raw timestamps can jitter backwards (B-frames, stream interleaving), but
/// the fractions delivered to the callback never decrease.
pub(crate) struct ProgressReporter {
    callback: Arc<dyn ProgressCallback>,
    last_reported: f64,
}

impl ProgressReporter {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>) -> Self {
        Self {
            callback,
            last_reported: 0.0,
        }
    }

    /// Report a raw fraction, clamped to `[0, 1]` and never below a value
    /// already reported in this invocation.
    pub(crate) fn report(&mut self, raw_fraction: f64) {
        let clamped = raw_fraction.clamp(0.0, 1.0);
        if clamped > self.last_reported {
            self.last_reported = clamped;
            self.callback.on_progress(clamped);
        }
    }

    /// Report completion. Always fires, even if `1.0` equals the previous
    /// report (the callback still only ever sees non-decreasing values).
    pub(crate) fn finish(&mut self) {
        if self.last_reported < 1.0 {
            self.last_reported = 1.0;
        }
        self.callback.on_progress(1.0);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recorder {
        values: Mutex<Vec<f64>>,
    }

    impl ProgressCallback for Recorder {
        fn on_progress(&self, fraction: f64) {
            self.values.lock().unwrap().push(fraction);
        }
    }

    #[test]
    fn reporter_clamps_to_unit_interval() {
        let recorder = Arc::new(Recorder {
            values: Mutex::new(Vec::new()),
        });
        let mut reporter = ProgressReporter::new(recorder.clone());

        reporter.report(-0.5);
        reporter.report(0.25);
        reporter.report(7.0);

        let values = recorder.values.lock().unwrap();
        assert_eq!(values.as_slice(), &[0.25, 1.0]);
    }

    #[test]
    fn reporter_is_monotonic() {
        let recorder = Arc::new(Recorder {
            values: Mutex::new(Vec::new()),
        });
        let mut reporter = ProgressReporter::new(recorder.clone());

        // Jittery raw values: only increases should reach the callback.
        for raw in [0.1, 0.3, 0.2, 0.3, 0.5, 0.4, 0.9] {
            reporter.report(raw);
        }

        let values = recorder.values.lock().unwrap();
        for window in values.windows(2) {
            assert!(window[1] > window[0]);
        }
        assert_eq!(values.as_slice(), &[0.1, 0.3, 0.5, 0.9]);
    }

    #[test]
    fn reporter_finish_reports_exactly_one() {
        let recorder = Arc::new(Recorder {
            values: Mutex::new(Vec::new()),
        });
        let mut reporter = ProgressReporter::new(recorder.clone());

        reporter.report(0.4);
        reporter.finish();

        let values = recorder.values.lock().unwrap();
        assert_eq!(values.last().copied(), Some(1.0));
    }
}
