//! The traffic service: simulation state, subscriber fan-out and the
//! periodic update task.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{SimRng, SimulatorConfig};
use crate::error::{Result, SimulatorError};
use crate::locations;
use crate::model::{GeoPoint, Route, TimeSeriesPoint, TrafficAlert, TrafficSample};
use crate::routing;
use crate::simulation::TrafficSimulator;
use crate::stats::TrafficStats;
use crate::subscription::{Registry, Subscription};

/// Handle to a running traffic simulation.
///
/// Cloning is cheap and every clone drives the same state. The periodic
/// update task only holds a weak reference, so dropping the last handle
/// stops it.
#[derive(Clone)]
pub struct TrafficService {
    shared: Arc<Shared>,
}

struct Shared {
    config: SimulatorConfig,
    simulator: Mutex<TrafficSimulator>,
    /// Serializes whole ticks so publishes stay in mutation order.
    tick_gate: Mutex<()>,
    sample_subscribers: Registry<TrafficSample>,
    alert_subscribers: Registry<TrafficAlert>,
    updater: Mutex<Option<JoinHandle<()>>>,
}

impl TrafficService {
    /// Seeds the monitored locations using the random source from `config`.
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        let rng = config.build_rng();
        Self::with_rng(config, rng)
    }

    pub fn with_rng(config: SimulatorConfig, rng: SimRng) -> Result<Self> {
        config.validate()?;
        let simulator = TrafficSimulator::new(&config, rng);
        Ok(Self::from_simulator(config, simulator))
    }

    /// Starts from an explicit sample set instead of the seed locations.
    pub fn with_samples(
        config: SimulatorConfig,
        samples: Vec<TrafficSample>,
        rng: SimRng,
    ) -> Result<Self> {
        config.validate()?;
        let simulator = TrafficSimulator::with_samples(&config, samples, rng)?;
        Ok(Self::from_simulator(config, simulator))
    }

    fn from_simulator(config: SimulatorConfig, simulator: TrafficSimulator) -> Self {
        info!(
            locations = simulator.samples().len(),
            tick_period = ?config.tick_period,
            seeded = config.seed.is_some(),
            "traffic simulation initialized"
        );
        TrafficService {
            shared: Arc::new(Shared {
                config,
                simulator: Mutex::new(simulator),
                tick_gate: Mutex::new(()),
                sample_subscribers: Registry::default(),
                alert_subscribers: Registry::default(),
                updater: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.shared.config
    }

    /// A handle that does not keep the service alive. Callbacks that need to
    /// call back into the service should capture one of these; capturing a
    /// `TrafficService` clone keeps the update task ticking forever.
    pub fn downgrade(&self) -> WeakTrafficService {
        WeakTrafficService {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Registers a sample listener and immediately hands it the current
    /// snapshot. The callback must not subscribe to samples itself, and
    /// should reach the service through [`Self::downgrade`].
    pub fn subscribe_samples<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[TrafficSample]) + Send + Sync + 'static,
    {
        let sub = self
            .shared
            .sample_subscribers
            .subscribe(callback, || self.samples());
        debug!(subscription = sub.id(), "sample subscriber added");
        sub
    }

    /// Registers an alert listener and immediately hands it the current
    /// alert list. The callback must not subscribe to alerts itself.
    pub fn subscribe_alerts<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[TrafficAlert]) + Send + Sync + 'static,
    {
        let sub = self
            .shared
            .alert_subscribers
            .subscribe(callback, || self.alerts());
        debug!(subscription = sub.id(), "alert subscriber added");
        sub
    }

    /// Spawns the periodic update task on the current tokio runtime.
    ///
    /// Returns `Ok(false)` if the task is already running. The first tick
    /// fires one period after the call.
    pub fn start_periodic_updates(&self) -> Result<bool> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SimulatorError::NoRuntime)?;
        let mut updater = self.shared.updater.lock();
        if updater.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("periodic updates already running");
            return Ok(false);
        }

        let period = self.shared.config.tick_period;
        let first_tick = Instant::now().checked_add(period).ok_or_else(|| {
            SimulatorError::config(format!("tick period {period:?} overflows the clock"))
        })?;
        let weak = Arc::downgrade(&self.shared);
        *updater = Some(runtime.spawn(run_updates(weak, first_tick, period)));
        info!(period = ?period, "periodic updates started");
        Ok(true)
    }

    /// Cancels the update task. A tick already in progress completes first.
    pub fn stop_periodic_updates(&self) {
        if let Some(handle) = self.shared.updater.lock().take() {
            handle.abort();
            info!("periodic updates stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared
            .updater
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Runs one tick by hand: mutate, publish samples, maybe publish alerts.
    pub fn tick(&self) {
        self.shared.tick();
    }

    /// Current sample snapshot.
    pub fn samples(&self) -> Vec<TrafficSample> {
        self.shared.simulator.lock().samples().to_vec()
    }

    /// Current alerts, newest first.
    pub fn alerts(&self) -> Vec<TrafficAlert> {
        self.shared.simulator.lock().alerts().to_vec()
    }

    pub fn stats(&self) -> TrafficStats {
        TrafficStats::from_samples(self.shared.simulator.lock().samples())
    }

    /// 24 hourly points ending now. See [`Self::historical_series_at`].
    pub fn historical_series(&self, location: &str) -> Vec<TimeSeriesPoint> {
        self.historical_series_at(location, Utc::now())
    }

    /// 24 hourly points ending at `now`, oldest first.
    ///
    /// `location` is accepted for API compatibility but does not change the
    /// output: every location shares one daily pattern.
    pub fn historical_series_at(&self, location: &str, now: DateTime<Utc>) -> Vec<TimeSeriesPoint> {
        debug!(location, "generating location-agnostic historical series");
        self.shared.simulator.lock().historical_series(now)
    }

    /// Straight-line route scored by the current average congestion.
    pub fn generate_route(&self, start: GeoPoint, end: GeoPoint) -> Route {
        let avg = self.shared.simulator.lock().average_congestion();
        let avg = avg.unwrap_or_else(|| {
            warn!("no samples to average, scoring route as uncongested");
            0.0
        });
        let route = routing::score_route(start, end, avg);
        debug!(
            route_id = %route.id,
            distance_km = route.distance_km,
            duration_minutes = route.duration_minutes,
            "route generated"
        );
        route
    }

    /// Resolves free-text endpoints against the gazetteer, then routes.
    pub fn route_between(&self, from: &str, to: &str) -> Result<Route> {
        let (start, end) = locations::resolve_route_endpoints(from, to)?;
        Ok(self.generate_route(start, end))
    }
}

/// Non-owning counterpart of [`TrafficService`].
#[derive(Clone)]
pub struct WeakTrafficService {
    shared: Weak<Shared>,
}

impl WeakTrafficService {
    /// `None` once every `TrafficService` handle has been dropped.
    pub fn upgrade(&self) -> Option<TrafficService> {
        self.shared.upgrade().map(|shared| TrafficService { shared })
    }
}

impl Shared {
    fn tick(&self) {
        let _gate = self.tick_gate.lock();
        let outcome = self.simulator.lock().tick();
        debug!(
            samples = outcome.samples.len(),
            alerted = outcome.alerts.is_some(),
            "tick"
        );

        self.sample_subscribers.publish(&outcome.samples);
        if let Some(alerts) = outcome.alerts {
            self.alert_subscribers.publish(&alerts);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.updater.get_mut().take() {
            handle.abort();
        }
    }
}

async fn run_updates(shared: Weak<Shared>, first_tick: Instant, period: std::time::Duration) {
    let mut interval = time::interval_at(first_tick, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(shared) = shared.upgrade() else {
            debug!("traffic service dropped, update task exiting");
            break;
        };
        shared.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn service(seed: u64) -> TrafficService {
        TrafficService::new(SimulatorConfig::default().with_seed(seed)).unwrap()
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&[TrafficSample]) + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        (hits, move |_: &[TrafficSample]| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = SimulatorConfig::default().with_alert_probability(-0.1);
        assert!(TrafficService::new(cfg).is_err());
    }

    #[test]
    fn subscribe_delivers_current_snapshot_immediately() {
        let service = service(1);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let _sub = service.subscribe_samples(move |samples| sink.lock().push(samples.to_vec()));

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], service.samples());
    }

    #[test]
    fn alert_subscribers_get_initial_empty_list() {
        let service = service(2);
        let lens = Arc::new(Mutex::new(Vec::new()));
        let sink = lens.clone();
        let _sub = service.subscribe_alerts(move |alerts| sink.lock().push(alerts.len()));
        assert_eq!(*lens.lock(), vec![0]);
    }

    #[test]
    fn tick_publishes_to_live_subscribers_only() {
        let service = service(3);
        let (kept_hits, kept) = counter();
        let (dropped_hits, dropped) = counter();
        let _kept = service.subscribe_samples(kept);
        let dropped = service.subscribe_samples(dropped);

        service.tick();
        dropped.unsubscribe();
        service.tick();

        assert_eq!(kept_hits.load(Ordering::SeqCst), 3);
        assert_eq!(dropped_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn callbacks_may_read_the_service() {
        let service = service(4);
        let inner = service.downgrade();
        let routes = Arc::new(AtomicUsize::new(0));
        let seen = routes.clone();
        let _sub = service.subscribe_samples(move |samples| {
            let Some(inner) = inner.upgrade() else { return };
            let route = inner.generate_route(samples[0].location(), samples[1].location());
            assert!(route.distance_km > 0.0);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        service.tick();
        assert_eq!(routes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn route_between_uses_gazetteer() {
        let service = service(5);
        let route = service.route_between("times", "empire").unwrap();
        assert_eq!(route.start, locations::GAZETTEER[0].point);
        assert_eq!(route.end, locations::GAZETTEER[3].point);
        assert_eq!(route.waypoints.len(), 4);
        assert!(service.route_between("", "empire").is_err());
    }

    #[test]
    fn duration_tracks_average_congestion() {
        let start = GeoPoint::new(40.7061, -73.9969);
        let end = GeoPoint::new(40.7831, -73.9712);
        let base = service(6).samples();

        let mut previous = 0;
        for level in [0.0, 25.0, 50.0, 75.0, 100.0] {
            let samples = base
                .iter()
                .cloned()
                .map(|mut s| {
                    s.congestion_level = level;
                    s
                })
                .collect();
            let rng: SimRng = Box::new(ChaCha8Rng::seed_from_u64(0));
            let service = TrafficService::with_samples(SimulatorConfig::default(), samples, rng).unwrap();
            let route = service.generate_route(start, end);
            assert_eq!(route.congestion_score, level);
            assert!(route.duration_minutes >= previous);
            previous = route.duration_minutes;
        }
    }

    #[test]
    fn historical_series_ignores_location() {
        let now = Utc::now();
        let a = service(7).historical_series_at("Times Square", now);
        let b = service(7).historical_series_at("Brooklyn Bridge", now);
        assert_eq!(a, b);
        assert_eq!(a.len(), 24);
    }

    #[test]
    fn start_needs_a_runtime() {
        let service = service(8);
        assert_eq!(service.start_periodic_updates(), Err(SimulatorError::NoRuntime));
        assert!(!service.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let service = service(9);
        let (hits, callback) = counter();
        let _sub = service.subscribe_samples(callback);

        assert_eq!(service.start_periodic_updates(), Ok(true));
        assert_eq!(service.start_periodic_updates(), Ok(false));
        assert!(service.is_running());

        time::sleep(Duration::from_millis(5_100)).await;
        // one initial delivery plus exactly one tick
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        service.stop_periodic_updates();
        assert!(!service.is_running());
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // stopping twice is harmless, and updates can resume
        service.stop_periodic_updates();
        assert_eq!(service.start_periodic_updates(), Ok(true));
        time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_subscriber_keeps_updates_running() {
        let service = service(11);
        let deliveries = Arc::new(AtomicUsize::new(0));
        let seen = deliveries.clone();
        let _bad = service.subscribe_samples(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) >= 1 {
                panic!("subscriber failure");
            }
        });
        let (hits, callback) = counter();
        let _good = service.subscribe_samples(callback);

        service.start_periodic_updates().unwrap();
        time::sleep(Duration::from_secs(31)).await;

        assert!(service.is_running());
        // initial delivery plus six ticks
        assert_eq!(hits.load(Ordering::SeqCst), 7);
        service.stop_periodic_updates();
    }

    #[test]
    fn oversized_tick_period_is_rejected() {
        let cfg = SimulatorConfig::default().with_tick_period(Duration::from_secs(u64::MAX));
        assert!(matches!(TrafficService::new(cfg), Err(SimulatorError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn longest_tick_period_starts() {
        let cfg = SimulatorConfig::default()
            .with_seed(12)
            .with_tick_period(crate::config::MAX_TICK_PERIOD);
        let service = TrafficService::new(cfg).unwrap();
        assert_eq!(service.start_periodic_updates(), Ok(true));
        tokio::task::yield_now().await;
        assert!(service.is_running());
        service.stop_periodic_updates();
    }

    #[tokio::test(start_paused = true)]
    async fn weak_handle_in_callback_lets_the_task_end() {
        let service = service(13);
        let weak = service.downgrade();
        let (hits, count) = counter();
        let _sub = service.subscribe_samples(move |samples| {
            if let Some(service) = weak.upgrade() {
                let _ = service.generate_route(samples[0].location(), samples[2].location());
            }
            count(samples);
        });
        service.start_periodic_updates().unwrap();
        let weak = service.downgrade();
        drop(service);

        time::sleep(Duration::from_secs(20)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_service_ends_the_task() {
        let service = service(10);
        let (hits, callback) = counter();
        let sub = service.subscribe_samples(callback);
        service.start_periodic_updates().unwrap();
        drop(service);

        time::sleep(Duration::from_secs(20)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(sub.is_active());
    }
}
