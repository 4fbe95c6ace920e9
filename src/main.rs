#![warn(keyword_idents_2024)]
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::{channel::mpsc, StreamExt};
use tokio::{signal, time};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use traffic_predictor::{
    stats::marker_radius, CongestionBand, SimulatorConfig, TrafficAlert, TrafficSample,
    TrafficService, TrafficStats,
};

#[derive(Parser, Debug)]
#[command(name = "traffic_predictor")]
#[command(about = "Synthetic real-time traffic simulator")]
#[command(version)]
struct Args {
    /// Seconds between simulation ticks
    #[arg(long, env = "TRAFFIC_TICK_SECS", default_value = "5")]
    tick_secs: u64,

    /// Fixed RNG seed for reproducible runs
    #[arg(long, env = "TRAFFIC_SEED")]
    seed: Option<u64>,

    /// Chance that a tick raises an alert
    #[arg(long, env = "TRAFFIC_ALERT_PROBABILITY", default_value = "0.3")]
    alert_probability: f64,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    run_secs: Option<u64>,

    /// Route start, matched against the gazetteer
    #[arg(long, requires = "route_to")]
    route_from: Option<String>,

    /// Route destination, matched against the gazetteer
    #[arg(long, requires = "route_from")]
    route_to: Option<String>,

    /// Print the 24-hour history for this location at startup
    #[arg(long)]
    history_location: Option<String>,

    /// Print snapshots as JSON lines on stdout
    #[arg(long)]
    json: bool,
}

enum Update {
    Samples(Vec<TrafficSample>),
    Alerts(Vec<TrafficAlert>),
}

// ===== Main Application =====
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = SimulatorConfig::default()
        .with_tick_period(Duration::from_secs(args.tick_secs))
        .with_alert_probability(args.alert_probability);
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let service = TrafficService::new(config).context("building traffic service")?;
    info!(
        locations = service.samples().len(),
        tick_secs = args.tick_secs,
        "Starting Traffic Predictor"
    );

    if let Some(location) = &args.history_location {
        let series = service.historical_series(location);
        for point in &series {
            println!("{}", serde_json::to_string(point)?);
        }
        info!(location = %location, points = series.len(), "historical series printed");
    }

    if let (Some(from), Some(to)) = (&args.route_from, &args.route_to) {
        let route = service
            .route_between(from, to)
            .with_context(|| format!("routing {from:?} -> {to:?}"))?;
        info!(
            distance_km = %format!("{:.1}", route.distance_km),
            duration_min = route.duration_minutes,
            congestion = %format!("{:.1}", route.congestion_score),
            "route generated"
        );
        println!("{}", serde_json::to_string(&route)?);
    }

    let (tx, mut updates) = mpsc::unbounded();
    let sample_tx = tx.clone();
    let _samples = service.subscribe_samples(move |samples| {
        let _ = sample_tx.unbounded_send(Update::Samples(samples.to_vec()));
    });
    let _alerts = service.subscribe_alerts(move |alerts| {
        let _ = tx.unbounded_send(Update::Alerts(alerts.to_vec()));
    });

    service.start_periodic_updates()?;

    let deadline = async {
        match args.run_secs {
            Some(secs) => time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            update = updates.next() => match update {
                Some(Update::Samples(samples)) => report_samples(&samples, args.json)?,
                Some(Update::Alerts(alerts)) => report_alerts(&alerts, args.json)?,
                None => break,
            },
            _ = &mut deadline => {
                info!("run time elapsed");
                break;
            }
            res = signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                info!("shutdown signal received");
                break;
            }
        }
    }

    service.stop_periodic_updates();
    Ok(())
}

fn report_samples(samples: &[TrafficSample], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(samples)?);
        return Ok(());
    }

    let stats = TrafficStats::from_samples(samples);
    info!(
        avg_congestion = %format!("{:.1}", stats.average_congestion.unwrap_or_default()),
        avg_speed = %format!("{:.1}", stats.average_speed.unwrap_or_default()),
        total_vehicles = stats.total_vehicles,
        hotspots = stats.high_congestion_areas,
        "traffic snapshot"
    );
    for sample in samples {
        let band = CongestionBand::from_level(sample.congestion_level);
        tracing::debug!(
            road = %sample.road_name,
            congestion = %format!("{:.0}", sample.congestion_level),
            band = ?band,
            radius = marker_radius(sample.congestion_level),
            speed = %format!("{:.1}", sample.speed),
            vehicles = sample.vehicle_count,
            "sample"
        );
    }
    Ok(())
}

fn report_alerts(alerts: &[TrafficAlert], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(alerts)?);
        return Ok(());
    }

    match alerts.first() {
        Some(latest) => info!(
            active = alerts.len(),
            kind = latest.kind.as_str(),
            severity = ?latest.severity,
            message = %latest.message,
            "alert feed updated"
        ),
        None => info!("no current alerts"),
    }
    Ok(())
}
