use std::sync::Arc;

use anyhow::{Context, Result};
use domain::errors::SensorError;
use pothole_monitor::config::Config;
use pothole_monitor::logging::init_logging;
use pothole_monitor::services::{HttpHazardSource, LogNotifier, TerminalBellLoader};
use pothole_monitor::sources::ReplayPositionSource;
use pothole_monitor::{HazardRepository, MonitorPhase, MonitorSettings, ProximityMonitor};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    init_logging(&config.logging);

    info!("Starting Pothole Monitor v{}", env!("CARGO_PKG_VERSION"));

    let hazard_source = HttpHazardSource::new(&config.hazards)?;
    info!(url = %hazard_source.url(), "Hazard source configured");
    let repository = Arc::new(HazardRepository::new(Arc::new(hazard_source)));

    let track_file = config
        .position
        .track_file
        .clone()
        .context("position.track_file must be set (PM__POSITION__TRACK_FILE)")?;
    let source = ReplayPositionSource::new(
        track_file,
        config.position.replay_speed,
        config.position.channel_capacity,
    );

    let mut monitor = ProximityMonitor::new(
        MonitorSettings::from_config(&config),
        repository,
        Box::new(source),
        Arc::new(TerminalBellLoader::from_config(&config.alert)),
        Arc::new(LogNotifier::new()),
    );

    monitor.start().await?;
    let mut phase = monitor.subscribe_phase();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl-C")?;
            info!("Interrupted, shutting down");
        }
        _ = phase.wait_for(|phase| *phase == MonitorPhase::Stopped) => {
            match monitor.take_sensor_error() {
                Some(SensorError::Closed) | None => info!("Track finished"),
                Some(e) => warn!(error = %e, "Monitoring ended by the position source"),
            }
        }
    }

    monitor.stop().await;

    let stats = monitor.stats();
    info!(
        samples = stats.samples_processed,
        alerts = stats.alerts_dispatched,
        "Pothole Monitor finished"
    );
    Ok(())
}
