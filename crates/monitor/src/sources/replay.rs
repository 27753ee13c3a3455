//! Track replay position source.
//!
//! Replays a recorded drive from a JSON Lines file, one fix per line:
//!
//! ```text
//! {"latitude": 40.0, "longitude": -75.0, "timestamp": "2024-05-01T12:00:00Z"}
//! {"latitude": 40.0001, "longitude": -75.0001, "timestamp": "2024-05-01T12:00:02Z"}
//! ```
//!
//! Recorded gaps between timestamps are honored (scaled by the replay
//! speed); lines without a timestamp follow the policy interval. When the
//! track runs out the subscription closes.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use domain::errors::PermissionError;
use domain::models::{PositionSample, SamplingPolicy};
use domain::services::{position_channel, PositionSource, PositionSubscription, SourceEvent};
use serde::Deserialize;
use shared::validation::is_valid_coordinate;
use shared::Coordinate;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest wait between two replayed points, whatever the recorded gap
/// and replay speed.
const MAX_REPLAY_GAP: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackPoint {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    accuracy_meters: Option<f64>,
}

struct ReplayTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// [`PositionSource`] that replays a recorded track file.
pub struct ReplayPositionSource {
    path: PathBuf,
    speed: f64,
    capacity: usize,
    running: Option<ReplayTask>,
}

impl ReplayPositionSource {
    pub fn new(path: impl Into<PathBuf>, speed: f64, capacity: usize) -> Self {
        let speed = if speed.is_finite() && speed > 0.0 {
            speed
        } else {
            1.0
        };
        Self {
            path: path.into(),
            speed,
            capacity: capacity.max(1),
            running: None,
        }
    }
}

#[async_trait::async_trait]
impl PositionSource for ReplayPositionSource {
    async fn start(
        &mut self,
        policy: &SamplingPolicy,
    ) -> Result<PositionSubscription, PermissionError> {
        self.stop().await;

        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PermissionError::Unavailable(format!(
                "cannot read track {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let points = parse_track(&contents);
        if points.is_empty() {
            return Err(PermissionError::Unavailable(format!(
                "track {} has no usable samples",
                self.path.display()
            )));
        }

        let (tx, rx) = position_channel(self.capacity);
        let cancel = CancellationToken::new();

        info!(
            path = %self.path.display(),
            points = points.len(),
            speed = self.speed,
            accuracy = %policy.accuracy,
            "Track replay started"
        );

        let handle = tokio::spawn(replay(
            points,
            policy.clone(),
            self.speed,
            tx,
            cancel.clone(),
        ));
        self.running = Some(ReplayTask {
            cancel: cancel.clone(),
            handle,
        });

        Ok(PositionSubscription::new(rx, cancel))
    }

    async fn stop(&mut self) {
        if let Some(task) = self.running.take() {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                warn!("Track replay task panicked: {}", e);
            }
            info!(path = %self.path.display(), "Track replay stopped");
        }
    }
}

/// Parse a JSON Lines track. Blank lines and `#` comments are skipped;
/// malformed lines are logged and skipped.
fn parse_track(contents: &str) -> Vec<TrackPoint> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .filter_map(|(index, line)| match serde_json::from_str::<TrackPoint>(line) {
            Ok(point) if is_valid_coordinate(point.latitude, point.longitude) => Some(point),
            Ok(_) => {
                warn!(line = index + 1, "Skipping track point with invalid coordinates");
                None
            }
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping malformed track line");
                None
            }
        })
        .collect()
}

/// Delay before emitting a point recorded at `next`, capped at
/// [`MAX_REPLAY_GAP`].
fn replay_gap(
    previous: Option<DateTime<Utc>>,
    next: Option<DateTime<Utc>>,
    fallback: Duration,
    speed: f64,
) -> Duration {
    let recorded = match (previous, next) {
        (Some(prev), Some(next)) => (next - prev).to_std().unwrap_or(Duration::ZERO),
        _ => fallback,
    };
    Duration::try_from_secs_f64(recorded.as_secs_f64() / speed)
        .map_or(MAX_REPLAY_GAP, |gap| gap.min(MAX_REPLAY_GAP))
}

async fn replay(
    points: Vec<TrackPoint>,
    policy: SamplingPolicy,
    speed: f64,
    tx: broadcast::Sender<SourceEvent>,
    cancel: CancellationToken,
) {
    let mut previous_time: Option<DateTime<Utc>> = None;
    let mut last_emitted: Option<Coordinate> = None;

    for (index, point) in points.into_iter().enumerate() {
        if index > 0 {
            let delay = replay_gap(previous_time, point.timestamp, policy.interval, speed);
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        previous_time = point.timestamp.or(previous_time);

        let coordinate = Coordinate::new(point.latitude, point.longitude);
        if !policy.admits(last_emitted, coordinate) {
            continue;
        }

        let sample = PositionSample {
            latitude: point.latitude,
            longitude: point.longitude,
            timestamp: Utc::now(),
            accuracy_tier: policy.accuracy,
            accuracy_meters: point.accuracy_meters,
        };

        if tx.send(SourceEvent::Sample(sample)).is_err() {
            debug!(index, "Subscriber gone, ending replay");
            return;
        }
        last_emitted = Some(coordinate);
    }

    debug!("Track replay finished");
}
