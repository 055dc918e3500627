//! Output dimension planning.
//!
//! Given the source's native dimensions and the configured maxima, compute
//! the output frame size: unchanged when it already fits, otherwise scaled
//! down uniformly so aspect ratio is preserved. Upscaling never happens.

/// Planned output dimensions for the re-encoded video.
///
/// Invariants: `width <= max_width`, `height <= max_height`, both are
/// positive even integers, and the aspect ratio matches the source within
/// ±1 px of rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanDimensions {
    /// Output frame width in pixels.
    pub width: u32,
    /// Output frame height in pixels.
    pub height: u32,
}

/// Compute output dimensions bounded by `max_width` x `max_height`.
///
/// Pure function with no failure path: any positive native size produces a
/// valid plan. If the native size already fits it is kept (modulo the
/// even-dimension adjustment below); otherwise both dimensions are scaled by
/// `min(max_width / native_width, max_height / native_height)` and floored.
///
/// Both outputs are additionally floored to even values because 4:2:0
/// chroma-subsampled encoder input requires them; this stays within the
/// documented ±1 px aspect tolerance.
///
/// # Example
///
/// ```
/// use vidfit::plan_dimensions;
///
/// let plan = plan_dimensions(1920, 1080, 1280, 720);
/// assert_eq!((plan.width, plan.height), (1280, 720));
///
/// let untouched = plan_dimensions(640, 360, 1280, 720);
/// assert_eq!((untouched.width, untouched.height), (640, 360));
/// ```
pub fn plan_dimensions(
    native_width: u32,
    native_height: u32,
    max_width: u32,
    max_height: u32,
) -> PlanDimensions {
    debug_assert!(native_width > 0 && native_height > 0);

    let (width, height) = if native_width <= max_width && native_height <= max_height {
        (native_width, native_height)
    } else {
        let scale = f64::min(
            max_width as f64 / native_width as f64,
            max_height as f64 / native_height as f64,
        );
        (
            (native_width as f64 * scale).floor() as u32,
            (native_height as f64 * scale).floor() as u32,
        )
    };

    PlanDimensions {
        width: to_even(width),
        height: to_even(height),
    }
}

/// Floor to the nearest even value, with a minimum of 2.
fn to_even(value: u32) -> u32 {
    (value & !1).max(2)
}
