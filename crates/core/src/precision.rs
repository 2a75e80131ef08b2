//! Precision engine.
//!
//! Converts between floating-point coordinates and the integers stored on the
//! wire. A precision exponent `P` selects the scale factor `10^P`: a value is
//! multiplied by the scale and rounded, then divided by the same scale when
//! decoding.

/// Default cap on the precision exponent (scale factor 10^9).
pub const DEFAULT_MAX_PRECISION: u32 = 9;

/// Largest exponent whose scale factor is exact in an `f64`.
pub const PRECISION_LIMIT: u32 = 22;

/// Scale factor `10^precision`.
#[inline]
pub fn scale_factor(precision: u32) -> f64 {
    10f64.powi(precision as i32)
}

/// Smallest exponent `P <= max_precision` at which `value` survives the
/// integer round trip exactly.
///
/// Returns `None` when no exponent up to the cap reproduces the value; the
/// caller then encodes at `max_precision` and accepts rounding at the tail.
pub fn required_precision(value: f64, max_precision: u32) -> Option<u32> {
    (0..=max_precision).find(|&precision| {
        let scale = scale_factor(precision);
        (value * scale).round() / scale == value
    })
}

/// Scale and round a coordinate to its wire integer.
///
/// Values outside the `i64` range saturate; callers validate the range
/// beforehand with [`fits_precision`].
#[inline]
pub fn to_int(value: f64, precision: u32) -> i64 {
    (value * scale_factor(precision)).round() as i64
}

/// Convert a wire integer back to a coordinate.
#[inline]
pub fn to_float(value: i64, precision: u32) -> f64 {
    value as f64 / scale_factor(precision)
}

/// Whether `value` scaled by `10^precision` fits a signed 64-bit integer.
pub fn fits_precision(value: f64, precision: u32) -> bool {
    // 2^63 is exactly representable; i64::MAX is not.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    let scaled = (value * scale_factor(precision)).round();
    scaled.is_finite() && (-LIMIT..LIMIT).contains(&scaled)
}

/// Highest exponent `<= precision` at which `max_abs` still fits a signed
/// 64-bit integer, or `None` if it does not fit even at scale 1.
pub fn fitting_precision(max_abs: f64, precision: u32) -> Option<u32> {
    (0..=precision).rev().find(|&p| fits_precision(max_abs, p))
}
