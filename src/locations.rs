//! Fixed place tables: the monitored intersections and the route gazetteer.

use crate::error::{Result, SimulatorError};
use crate::model::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Place {
    pub name: &'static str,
    pub point: GeoPoint,
}

const fn place(name: &'static str, lat: f64, lng: f64) -> Place {
    Place {
        name,
        point: GeoPoint::new(lat, lng),
    }
}

/// Major intersections seeded into every new simulation.
pub const MONITORED_LOCATIONS: [Place; 8] = [
    place("Times Square", 40.7128, -74.0060),
    place("Central Park South", 40.7614, -73.9776),
    place("Herald Square", 40.7505, -73.9934),
    place("Union Square", 40.7282, -73.9942),
    place("Financial District", 40.7178, -74.0014),
    place("Upper East Side", 40.7831, -73.9712),
    place("Midtown East", 40.7489, -73.9680),
    place("Theatre District", 40.7549, -73.9840),
];

/// Named places a route request may refer to.
pub const GAZETTEER: [Place; 4] = [
    place("Times Square", 40.7128, -74.0060),
    place("Central Park", 40.7614, -73.9776),
    place("Brooklyn Bridge", 40.7061, -73.9969),
    place("Empire State Building", 40.7484, -73.9857),
];

/// First gazetteer entry whose name contains `query`, ignoring case.
pub fn resolve(query: &str) -> Option<&'static Place> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    GAZETTEER
        .iter()
        .find(|place| place.name.to_lowercase().contains(&needle))
}

/// Resolves free-text route endpoints.
///
/// An unmatched start falls back to the first gazetteer entry and an
/// unmatched end to the second, so any non-blank pair yields a route.
pub fn resolve_route_endpoints(from: &str, to: &str) -> Result<(GeoPoint, GeoPoint)> {
    if from.trim().is_empty() || to.trim().is_empty() {
        return Err(SimulatorError::EmptyLocationQuery);
    }
    let start = resolve(from).unwrap_or_else(|| {
        tracing::warn!(query = from, fallback = GAZETTEER[0].name, "unknown start location");
        &GAZETTEER[0]
    });
    let end = resolve(to).unwrap_or_else(|| {
        tracing::warn!(query = to, fallback = GAZETTEER[1].name, "unknown end location");
        &GAZETTEER[1]
    });
    Ok((start.point, end.point))
}
