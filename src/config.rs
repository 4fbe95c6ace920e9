//! Simulator configuration.

use std::time::Duration;

use rand::{rngs::StdRng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{Result, SimulatorError};

/// Longest accepted tick period.
pub const MAX_TICK_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Random source driving every perturbation in the simulation.
pub type SimRng = Box<dyn RngCore + Send>;

/// Tunables for a [`TrafficService`](crate::TrafficService).
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Period between two ticks of the update task.
    pub tick_period: Duration,
    /// Chance that a tick emits a new alert.
    pub alert_probability: f64,
    /// Number of alerts retained, newest first.
    pub alert_capacity: usize,
    /// Fixed seed for reproducible runs. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(5),
            alert_probability: 0.3,
            alert_capacity: 10,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }

    pub fn with_alert_probability(mut self, alert_probability: f64) -> Self {
        self.alert_probability = alert_probability;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_period.is_zero() {
            return Err(SimulatorError::config("tick period must be non-zero"));
        }
        if self.tick_period > MAX_TICK_PERIOD {
            return Err(SimulatorError::config(format!(
                "tick period {:?} exceeds {:?}",
                self.tick_period, MAX_TICK_PERIOD
            )));
        }
        if !(0.0..=1.0).contains(&self.alert_probability) {
            return Err(SimulatorError::config(format!(
                "alert probability {} is outside [0, 1]",
                self.alert_probability
            )));
        }
        if self.alert_capacity == 0 {
            return Err(SimulatorError::config("alert capacity must be at least 1"));
        }
        Ok(())
    }

    /// Builds the random source described by this config.
    pub fn build_rng(&self) -> SimRng {
        match self.seed {
            Some(seed) => Box::new(ChaCha8Rng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_entropy()),
        }
    }
}
