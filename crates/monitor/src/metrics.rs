//! Monitor metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! host installs a recorder.
//!
//! - `hazard_refresh_total`: Counter with label (outcome)
//! - `hazard_refresh_duration_seconds`: Histogram
//! - `hazard_snapshot_size`: Gauge
//! - `position_samples_total` / `position_samples_dropped_total`: Counters
//! - `proximity_alerts_total`: Counter with label (audio)

use metrics::{counter, gauge, histogram};

/// Record the outcome of a hazard refresh.
pub fn record_hazard_refresh(success: bool, duration_secs: f64) {
    let outcome = if success { "success" } else { "failure" };
    counter!("hazard_refresh_total", "outcome" => outcome).increment(1);
    histogram!("hazard_refresh_duration_seconds").record(duration_secs);
}

/// Record the number of hazards in the current snapshot.
pub fn record_snapshot_size(size: usize) {
    gauge!("hazard_snapshot_size").set(size as f64);
}

/// Record a position sample evaluated by the monitor.
pub fn record_sample_processed() {
    counter!("position_samples_total").increment(1);
}

/// Record stale position samples evicted because the evaluator lagged.
pub fn record_samples_dropped(count: u64) {
    counter!("position_samples_dropped_total").increment(count);
}

/// Record a dispatched proximity alert.
pub fn record_alert_dispatched(with_audio: bool) {
    let audio = if with_audio { "played" } else { "visual_only" };
    counter!("proximity_alerts_total", "audio" => audio).increment(1);
}
