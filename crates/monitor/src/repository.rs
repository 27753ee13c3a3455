//! Hazard repository: the last good hazard snapshot plus the means to
//! refresh it.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use domain::errors::FetchError;
use domain::models::{HazardPoint, HazardSnapshot};
use domain::services::HazardSource;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::metrics;

/// Caches the hazard set fetched from a [`HazardSource`].
///
/// Readers always get an immutable snapshot. A refresh replaces the set
/// wholesale on success and leaves it untouched on failure.
pub struct HazardRepository {
    source: Arc<dyn HazardSource>,
    snapshot: RwLock<HazardSnapshot>,
    /// Serializes refreshes so concurrent triggers don't stack requests.
    refresh_lock: Mutex<()>,
}

impl HazardRepository {
    pub fn new(source: Arc<dyn HazardSource>) -> Self {
        Self {
            source,
            snapshot: RwLock::new(HazardSnapshot::empty()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Fetch the hazard set and replace the snapshot.
    ///
    /// On failure the previous snapshot keeps being served and the error is
    /// returned for the caller to log. No retry happens here.
    pub async fn refresh(&self) -> Result<HazardSnapshot, FetchError> {
        let _guard = self.refresh_lock.lock().await;
        let start = Instant::now();

        let result = self.source.fetch().await;
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(points) => {
                let fetched = points.len();
                let hazards = retain_valid(points);

                let next = {
                    let mut slot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
                    let next = HazardSnapshot::succeeding(&slot, hazards);
                    *slot = next.clone();
                    next
                };

                metrics::record_hazard_refresh(true, elapsed);
                metrics::record_snapshot_size(next.len());
                info!(
                    generation = next.generation,
                    hazards = next.len(),
                    rejected = fetched - next.len(),
                    elapsed_ms = (elapsed * 1000.0) as u64,
                    "Hazard set refreshed"
                );
                Ok(next)
            }
            Err(e) => {
                metrics::record_hazard_refresh(false, elapsed);
                let current = self.snapshot();
                warn!(
                    error = %e,
                    generation = current.generation,
                    hazards = current.len(),
                    "Hazard refresh failed, serving last snapshot"
                );
                Err(e)
            }
        }
    }

    /// The last successfully fetched hazard set, or an empty one.
    pub fn snapshot(&self) -> HazardSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Drop hazards whose coordinates can't be evaluated.
fn retain_valid(points: Vec<HazardPoint>) -> Vec<HazardPoint> {
    points
        .into_iter()
        .filter(|hazard| match hazard.validate() {
            Ok(()) => true,
            Err(e) => {
                debug!(hazard_id = %hazard.id, error = %e, "Rejecting hazard with invalid coordinates");
                false
            }
        })
        .collect()
}
