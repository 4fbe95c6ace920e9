//! Straight-line route scoring. There is no road graph: distance is the
//! great-circle distance and waypoints are linear interpolations.

use uuid::Uuid;

use crate::model::{GeoPoint, Route, CONGESTION_RANGE};

/// Earth radius in km
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Free-flow speed assumed before the congestion penalty, km/h.
const BASELINE_SPEED_KMH: f64 = 30.0;

/// Route legs; yields `WAYPOINT_STEPS - 1` intermediate points.
const WAYPOINT_STEPS: usize = 5;

/// Haversine distance between two points in km.
pub fn haversine_km(start: GeoPoint, end: GeoPoint) -> f64 {
    let lat1 = start.lat.to_radians();
    let lat2 = end.lat.to_radians();
    let dlat = (end.lat - start.lat).to_radians();
    let dlng = (end.lng - start.lng).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Travel time in whole minutes at the baseline speed, inflated by the
/// average congestion as a fractional penalty.
pub fn travel_minutes(distance_km: f64, avg_congestion: f64) -> u32 {
    let (lo, hi) = CONGESTION_RANGE;
    let penalty = 1.0 + avg_congestion.clamp(lo, hi) / 100.0;
    let minutes = (distance_km / BASELINE_SPEED_KMH) * 60.0 * penalty;
    minutes.round().max(0.0) as u32
}

/// Evenly spaced intermediate points, excluding both endpoints.
pub fn interpolate_waypoints(start: GeoPoint, end: GeoPoint) -> Vec<GeoPoint> {
    (1..WAYPOINT_STEPS)
        .map(|i| {
            let ratio = i as f64 / WAYPOINT_STEPS as f64;
            GeoPoint::new(
                start.lat + (end.lat - start.lat) * ratio,
                start.lng + (end.lng - start.lng) * ratio,
            )
        })
        .collect()
}

/// Builds a route scored against the given average congestion.
pub fn score_route(start: GeoPoint, end: GeoPoint, avg_congestion: f64) -> Route {
    let (lo, hi) = CONGESTION_RANGE;
    let distance_km = haversine_km(start, end);
    Route {
        id: format!("route-{}", Uuid::new_v4()),
        start,
        end,
        distance_km,
        duration_minutes: travel_minutes(distance_km, avg_congestion),
        congestion_score: avg_congestion.clamp(lo, hi),
        waypoints: interpolate_waypoints(start, end),
    }
}
