//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert a count to f64, returning 0.0 if the value cannot be represented.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Convert a u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

/// Clamp a score into the unit interval, mapping non-finite values to 0.0.
#[must_use]
pub fn clamp_unit(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Cap a non-negative blend at 1.0 without raising it, mapping NaN to 0.0.
#[must_use]
pub fn cap_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.min(1.0)
}
