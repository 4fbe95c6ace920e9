//! Synthetic road-traffic simulation: congestion samples around fixed
//! intersections, a rolling alert feed, a 24-hour history generator and a
//! naive straight-line route scorer.

pub mod config;
pub mod error;
pub mod history;
pub mod locations;
pub mod model;
pub mod routing;
pub mod simulation;
pub mod stats;
pub mod subscription;

mod service;

pub use config::{SimRng, SimulatorConfig};
pub use error::{Result, SimulatorError};
pub use model::{
    AlertKind, AlertSeverity, GeoPoint, Route, TimeSeriesPoint, TrafficAlert, TrafficSample,
};
pub use service::{TrafficService, WeakTrafficService};
pub use stats::{CongestionBand, TrafficStats};
pub use subscription::Subscription;
