//! Simulation state and the per-tick mutation logic.
//!
//! `TrafficSimulator` owns the samples, the rolling alert list and the random
//! source. It knows nothing about timers or subscribers; the service drives it
//! and publishes the snapshots it returns.

use chrono::Utc;
use rand::{seq::SliceRandom, Rng};
use uuid::Uuid;

use crate::config::{SimRng, SimulatorConfig};
use crate::error::{Result, SimulatorError};
use crate::history;
use crate::locations::MONITORED_LOCATIONS;
use crate::model::{AlertKind, AlertSeverity, TimeSeriesPoint, TrafficAlert, TrafficSample};
use crate::stats;

/// Per-tick perturbation half-widths.
const CONGESTION_JITTER: f64 = 10.0;
const SPEED_JITTER: f64 = 5.0;
const VEHICLE_JITTER: i64 = 15;
const PREDICTION_JITTER: f64 = 7.5;

/// What a single tick changed.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub samples: Vec<TrafficSample>,
    /// Full alert list, present only when the tick raised a new alert.
    pub alerts: Option<Vec<TrafficAlert>>,
}

pub struct TrafficSimulator {
    samples: Vec<TrafficSample>,
    alerts: Vec<TrafficAlert>,
    alert_capacity: usize,
    alert_probability: f64,
    rng: SimRng,
}

impl TrafficSimulator {
    /// Seeds one sample per monitored location with random readings.
    pub fn new(config: &SimulatorConfig, mut rng: SimRng) -> Self {
        let now = Utc::now();
        let samples = MONITORED_LOCATIONS
            .iter()
            .enumerate()
            .map(|(index, place)| TrafficSample {
                id: format!("traffic-{index}"),
                latitude: place.point.lat,
                longitude: place.point.lng,
                congestion_level: rng.gen_range(0..100) as f64,
                speed: rng.gen_range(20.0..60.0),
                timestamp: now,
                road_name: place.name.to_string(),
                vehicle_count: rng.gen_range(50..250),
                predicted_congestion: rng.gen_range(0..100) as f64,
            })
            .collect();

        Self::from_parts(config, samples, rng)
    }

    /// Starts from a caller-provided sample set. Readings are clamped on entry.
    pub fn with_samples(
        config: &SimulatorConfig,
        mut samples: Vec<TrafficSample>,
        rng: SimRng,
    ) -> Result<Self> {
        if samples.is_empty() {
            return Err(SimulatorError::EmptySampleSet);
        }
        samples.iter_mut().for_each(TrafficSample::clamp_readings);
        Ok(Self::from_parts(config, samples, rng))
    }

    fn from_parts(config: &SimulatorConfig, samples: Vec<TrafficSample>, rng: SimRng) -> Self {
        TrafficSimulator {
            samples,
            alerts: Vec::with_capacity(config.alert_capacity + 1),
            alert_capacity: config.alert_capacity,
            alert_probability: config.alert_probability,
            rng,
        }
    }

    pub fn samples(&self) -> &[TrafficSample] {
        &self.samples
    }

    pub fn alerts(&self) -> &[TrafficAlert] {
        &self.alerts
    }

    pub fn average_congestion(&self) -> Option<f64> {
        stats::average_congestion(&self.samples)
    }

    /// Perturbs every sample, then maybe raises an alert.
    pub fn tick(&mut self) -> TickOutcome {
        self.perturb_samples();
        let alerts = self.maybe_raise_alert().then(|| self.alerts.clone());
        TickOutcome {
            samples: self.samples.clone(),
            alerts,
        }
    }

    pub fn historical_series(&mut self, now: chrono::DateTime<Utc>) -> Vec<TimeSeriesPoint> {
        history::generate_series(&mut self.rng, now)
    }

    fn perturb_samples(&mut self) {
        let now = Utc::now();
        for sample in &mut self.samples {
            sample.congestion_level += self.rng.gen_range(-CONGESTION_JITTER..=CONGESTION_JITTER);
            sample.speed += self.rng.gen_range(-SPEED_JITTER..=SPEED_JITTER);
            let vehicles = i64::from(sample.vehicle_count) + self.rng.gen_range(-VEHICLE_JITTER..=VEHICLE_JITTER);
            sample.vehicle_count = vehicles.clamp(0, i64::from(u32::MAX)) as u32;
            sample.predicted_congestion += self.rng.gen_range(-PREDICTION_JITTER..=PREDICTION_JITTER);
            sample.clamp_readings();
            sample.timestamp = now;
        }
    }

    /// Returns true when a new alert was prepended.
    fn maybe_raise_alert(&mut self) -> bool {
        if !self.rng.gen_bool(self.alert_probability) {
            return false;
        }
        let Some(location) = self.samples.choose(&mut self.rng).map(|s| s.location()) else {
            return false;
        };
        let kind = self.random_choice(&AlertKind::ALL);
        let severity = self.random_choice(&AlertSeverity::ALL);

        let alert = TrafficAlert {
            id: format!("alert-{}", Uuid::new_v4()),
            kind,
            severity,
            location,
            message: kind.message().to_string(),
            timestamp: Utc::now(),
        };
        tracing::info!(
            alert_id = %alert.id,
            kind = kind.as_str(),
            severity = ?severity,
            lat = location.lat,
            lng = location.lng,
            "raised traffic alert"
        );

        self.alerts.insert(0, alert);
        self.alerts.truncate(self.alert_capacity);
        true
    }

    fn random_choice<T: Copy>(&mut self, options: &[T]) -> T {
        options[self.rng.gen_range(0..options.len())]
    }
}
