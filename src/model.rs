//! Plain data records shared by the simulator and its consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Valid range of every congestion-like score.
pub const CONGESTION_RANGE: (f64, f64) = (0.0, 100.0);
/// Valid range of a sample's speed in km/h.
pub const SPEED_RANGE: (f64, f64) = (5.0, 60.0);
/// Valid range of a sample's vehicle count.
pub const VEHICLE_COUNT_RANGE: (u32, u32) = (10, 300);

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Current readings at one monitored location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSample {
    pub id: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
    /// 0-100
    pub congestion_level: f64,
    /// km/h
    pub speed: f64,
    pub timestamp: DateTime<Utc>,
    pub road_name: String,
    pub vehicle_count: u32,
    /// 0-100
    pub predicted_congestion: f64,
}

impl TrafficSample {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Pulls every reading back into its valid range.
    pub fn clamp_readings(&mut self) {
        let (c_min, c_max) = CONGESTION_RANGE;
        let (s_min, s_max) = SPEED_RANGE;
        let (v_min, v_max) = VEHICLE_COUNT_RANGE;
        self.congestion_level = self.congestion_level.clamp(c_min, c_max);
        self.predicted_congestion = self.predicted_congestion.clamp(c_min, c_max);
        self.speed = self.speed.clamp(s_min, s_max);
        self.vehicle_count = self.vehicle_count.clamp(v_min, v_max);
    }
}

/// A generated straight-line route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    pub start: GeoPoint,
    pub end: GeoPoint,
    #[serde(rename = "distance")]
    pub distance_km: f64,
    #[serde(rename = "duration")]
    pub duration_minutes: u32,
    /// 0-100
    pub congestion_score: f64,
    pub waypoints: Vec<GeoPoint>,
}

impl Route {
    /// Start, waypoints and end in travel order, as drawn on a map.
    pub fn polyline(&self) -> Vec<GeoPoint> {
        let mut points = Vec::with_capacity(self.waypoints.len() + 2);
        points.push(self.start);
        points.extend_from_slice(&self.waypoints);
        points.push(self.end);
        points
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Congestion,
    Accident,
    Construction,
    Event,
}

impl AlertKind {
    pub const ALL: [AlertKind; 4] = [
        AlertKind::Congestion,
        AlertKind::Accident,
        AlertKind::Construction,
        AlertKind::Event,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Congestion => "congestion",
            AlertKind::Accident => "accident",
            AlertKind::Construction => "construction",
            AlertKind::Event => "event",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn message(&self) -> &'static str {
        match self {
            AlertKind::Congestion => "Heavy traffic congestion detected",
            AlertKind::Accident => "Traffic accident reported",
            AlertKind::Construction => "Road construction causing delays",
            AlertKind::Event => "Special event affecting traffic flow",
        }
    }

    /// Icon shown next to the alert in the feed.
    pub fn icon_name(&self) -> &'static str {
        match self {
            AlertKind::Accident => "alert-triangle",
            AlertKind::Construction => "clock",
            AlertKind::Event => "map-pin",
            AlertKind::Congestion => "car",
        }
    }
}

/// Message for an alert kind given by name. Unknown names get a generic text.
pub fn alert_message(kind: &str) -> &'static str {
    AlertKind::parse(kind)
        .map(|kind| kind.message())
        .unwrap_or(GENERIC_ALERT_MESSAGE)
}

pub const GENERIC_ALERT_MESSAGE: &str = "Traffic alert";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

impl AlertSeverity {
    pub const ALL: [AlertSeverity; 3] = [AlertSeverity::Low, AlertSeverity::Medium, AlertSeverity::High];

    pub fn rank(&self) -> u8 {
        match self {
            AlertSeverity::Low => 0,
            AlertSeverity::Medium => 1,
            AlertSeverity::High => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficAlert {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub location: GeoPoint,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// One hourly point of a historical series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub time: DateTime<Utc>,
    pub congestion: f64,
    pub speed: f64,
    pub volume: f64,
}
