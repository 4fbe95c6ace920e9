//! Aggregates and display classifications over a sample snapshot.

use serde::{Deserialize, Serialize};

use crate::model::TrafficSample;

/// Congestion above this counts a location as a hotspot.
pub const HIGH_CONGESTION_THRESHOLD: f64 = 70.0;

/// Four-bucket congestion scale used for map markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionBand {
    Green,
    Yellow,
    Orange,
    Red,
}

impl CongestionBand {
    pub fn from_level(level: f64) -> Self {
        if level < 30.0 {
            CongestionBand::Green
        } else if level < 60.0 {
            CongestionBand::Yellow
        } else if level < 80.0 {
            CongestionBand::Orange
        } else {
            CongestionBand::Red
        }
    }

    pub fn hex_color(&self) -> &'static str {
        match self {
            CongestionBand::Green => "#22c55e",
            CongestionBand::Yellow => "#eab308",
            CongestionBand::Orange => "#f97316",
            CongestionBand::Red => "#ef4444",
        }
    }
}

/// Marker radius in pixels, proportional to congestion within [8, 20].
pub fn marker_radius(level: f64) -> f64 {
    (level / 5.0).clamp(8.0, 20.0)
}

/// Severity tint of a stat tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Normal,
    Elevated,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficStats {
    /// `None` when there are no samples.
    pub average_congestion: Option<f64>,
    pub average_speed: Option<f64>,
    pub total_vehicles: u64,
    pub high_congestion_areas: usize,
}

impl TrafficStats {
    pub fn from_samples(samples: &[TrafficSample]) -> Self {
        Self {
            average_congestion: average_congestion(samples),
            average_speed: mean(samples.iter().map(|s| s.speed)),
            total_vehicles: samples.iter().map(|s| u64::from(s.vehicle_count)).sum(),
            high_congestion_areas: samples
                .iter()
                .filter(|s| s.congestion_level > HIGH_CONGESTION_THRESHOLD)
                .count(),
        }
    }

    pub fn congestion_tone(&self) -> Tone {
        match self.average_congestion {
            Some(c) if c > 70.0 => Tone::Critical,
            Some(c) if c > 40.0 => Tone::Elevated,
            _ => Tone::Normal,
        }
    }

    pub fn speed_tone(&self) -> Tone {
        match self.average_speed {
            Some(s) if s < 20.0 => Tone::Critical,
            Some(s) if s < 35.0 => Tone::Elevated,
            _ => Tone::Normal,
        }
    }

    pub fn hotspot_tone(&self) -> Tone {
        if self.high_congestion_areas > 3 {
            Tone::Critical
        } else {
            Tone::Elevated
        }
    }
}

/// Mean congestion across samples, `None` for an empty slice.
pub fn average_congestion(samples: &[TrafficSample]) -> Option<f64> {
    mean(samples.iter().map(|s| s.congestion_level))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}
