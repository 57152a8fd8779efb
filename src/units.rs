//! Engine time units.
//!
//! The engine configures stop times and telemetry cadence in milliseconds;
//! these constants mirror its unit table so callers can write
//! `1.0 * units::DAY` instead of raw millisecond counts.

/// One millisecond, the engine's base unit.
pub const MSEC: f64 = 1.0;
/// One second in engine units.
pub const SEC: f64 = 1000.0 * MSEC;
/// One minute in engine units.
pub const MIN: f64 = 60.0 * SEC;
/// One hour in engine units.
pub const HOUR: f64 = 60.0 * MIN;
/// One day in engine units.
pub const DAY: f64 = 24.0 * HOUR;
/// One week in engine units.
pub const WEEK: f64 = 7.0 * DAY;

/// Inclusive stepped range, used to tabulate time grids for external
/// time-series inputs.
///
/// Produces `start, start + step, ...` and always appends `end` as the
/// final point.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn frange(start: f64, end: f64, step: f64) -> Vec<f64> {
    let count = ((end - start) / step).round().max(0.0) as usize;
    let mut points: Vec<f64> = (0..count).map(|i| step.mul_add(i as f64, start)).collect();
    points.push(end);
    points
}
