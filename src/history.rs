//! Synthetic 24-hour history following a daily sine pattern.

use std::f64::consts::PI;

use chrono::{DateTime, Duration, Timelike, Utc};
use rand::Rng;

use crate::model::TimeSeriesPoint;

pub const SERIES_LEN: usize = 24;

/// Daily congestion baseline for an hour of the day.
pub fn baseline(hour: u32) -> f64 {
    50.0 + 30.0 * (2.0 * PI * hour as f64 / 24.0).sin()
}

/// Hourly points for the 24 hours ending at `now`, oldest first.
///
/// The series does not depend on which location is being looked at; every
/// location shares the same daily pattern.
pub fn generate_series<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> Vec<TimeSeriesPoint> {
    (0..SERIES_LEN as i64)
        .rev()
        .map(|hours_ago| {
            let time = now - Duration::hours(hours_ago);
            let base = baseline(time.hour());
            TimeSeriesPoint {
                time,
                congestion: (base + rng.gen_range(-10.0..=10.0)).clamp(0.0, 100.0),
                speed: (60.0 - 0.4 * base).clamp(10.0, 60.0),
                volume: (2.0 * base + rng.gen_range(-20.0..=20.0)).clamp(20.0, 200.0),
            }
        })
        .collect()
}
