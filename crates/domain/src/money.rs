//! Currency rounding helpers
//!
//! Revenue sums are carried as unrounded `f64` through aggregation and only
//! rounded when a report is built.

/// Round to two decimal places, half away from zero
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Share of `part` in `total` as a percentage rounded to two decimals
///
/// A zero (or negative) total yields `0.0` instead of NaN or infinity.
#[must_use]
pub fn percentage(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        round2(part / total * 100.0)
    } else {
        0.0
    }
}

/// `numerator / denominator` rounded to two decimals, `0.0` for an empty denominator
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average(numerator: f64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        round2(numerator / denominator as f64)
    }
}
