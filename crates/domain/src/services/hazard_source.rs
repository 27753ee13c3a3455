//! Remote hazard data source.

use crate::errors::FetchError;
use crate::models::HazardPoint;

/// Fetches the current set of reported hazards.
///
/// Implementations perform a single attempt per call; retry policy belongs
/// to whoever schedules refreshes.
#[async_trait::async_trait]
pub trait HazardSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<HazardPoint>, FetchError>;
}
