//! Tests that drive a traffic service through its public API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use traffic_predictor::{GeoPoint, SimulatorConfig, TrafficAlert, TrafficSample, TrafficService};

fn seeded(seed: u64) -> TrafficService {
    TrafficService::new(SimulatorConfig::default().with_seed(seed)).unwrap()
}

/// Test that samples keep their identity and ranges under the update task.
#[tokio::test(start_paused = true)]
async fn periodic_updates_keep_samples_in_range() {
    let service = seeded(42);
    let snapshots: Arc<Mutex<Vec<Vec<TrafficSample>>>> = Arc::default();
    let sink = snapshots.clone();
    let _sub = service.subscribe_samples(move |samples| sink.lock().unwrap().push(samples.to_vec()));

    service.start_periodic_updates().unwrap();
    tokio::time::sleep(Duration::from_secs(5 * 20 + 1)).await;
    service.stop_periodic_updates();

    let snapshots = snapshots.lock().unwrap();
    assert_eq!(snapshots.len(), 21);
    let ids: Vec<_> = snapshots[0].iter().map(|s| s.id.clone()).collect();
    for snapshot in snapshots.iter() {
        assert_eq!(snapshot.iter().map(|s| s.id.clone()).collect::<Vec<_>>(), ids);
        for s in snapshot {
            assert!((0.0..=100.0).contains(&s.congestion_level));
            assert!((0.0..=100.0).contains(&s.predicted_congestion));
            assert!((5.0..=60.0).contains(&s.speed));
            assert!((10..=300).contains(&s.vehicle_count));
        }
    }
}

/// Test that the alert feed stays bounded and newest-first under constant alerting.
#[test]
fn alert_feed_is_bounded() {
    let config = SimulatorConfig::default()
        .with_seed(9)
        .with_alert_probability(1.0);
    let service = TrafficService::new(config).unwrap();
    let feeds: Arc<Mutex<Vec<Vec<TrafficAlert>>>> = Arc::default();
    let sink = feeds.clone();
    let _sub = service.subscribe_alerts(move |alerts| sink.lock().unwrap().push(alerts.to_vec()));

    for _ in 0..25 {
        service.tick();
    }

    let feeds = feeds.lock().unwrap();
    assert!(feeds[0].is_empty());
    assert_eq!(feeds.len(), 26);
    for feed in feeds.iter() {
        assert!(feed.len() <= 10);
        assert!(feed.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }
    assert_eq!(service.alerts(), *feeds.last().unwrap());
}

/// Test that identical endpoints give a zero-length route.
#[test]
fn identical_endpoints_route() {
    let service = seeded(1);
    let point = GeoPoint::new(40.0, -74.0);
    let route = service.generate_route(point, point);
    assert_eq!(route.distance_km, 0.0);
    assert_eq!(route.duration_minutes, 0);
    assert!(route.waypoints.iter().all(|w| *w == point));
    assert!((0.0..=100.0).contains(&route.congestion_score));
}

/// Test that the historical series has 24 increasing points.
#[test]
fn historical_series_shape() {
    let series = seeded(2).historical_series("Times Square");
    assert_eq!(series.len(), 24);
    assert!(series.windows(2).all(|w| w[0].time < w[1].time));
    let span = series[23].time - series[0].time;
    assert_eq!(span.num_hours(), 23);
}

/// Test that stats reflect the current snapshot.
#[test]
fn stats_match_snapshot() {
    let service = seeded(3);
    let stats = service.stats();
    let samples = service.samples();
    let total: u64 = samples.iter().map(|s| u64::from(s.vehicle_count)).sum();
    assert_eq!(stats.total_vehicles, total);
    assert!(stats.average_congestion.is_some());
}
