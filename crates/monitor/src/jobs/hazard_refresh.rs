//! Background job that keeps the hazard set current during a session.

use std::sync::Arc;
use std::time::Duration;

use super::scheduler::{Job, JobFrequency};
use crate::repository::HazardRepository;

/// Job that periodically refetches the hazard set.
///
/// A failed fetch leaves the repository serving its last snapshot; the
/// error is reported to the scheduler, which logs it.
pub struct HazardRefreshJob {
    repository: Arc<HazardRepository>,
    frequency: JobFrequency,
}

impl HazardRefreshJob {
    pub fn new(repository: Arc<HazardRepository>, interval: Duration) -> Self {
        Self {
            repository,
            frequency: JobFrequency::from_duration(interval),
        }
    }
}

#[async_trait::async_trait]
impl Job for HazardRefreshJob {
    fn name(&self) -> &'static str {
        "hazard_refresh"
    }

    fn frequency(&self) -> JobFrequency {
        self.frequency
    }

    async fn execute(&self) -> Result<(), String> {
        self.repository
            .refresh()
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::errors::FetchError;
    use domain::models::HazardPoint;
    use domain::services::HazardSource;

    struct FixedSource(Result<Vec<HazardPoint>, FetchError>);

    #[async_trait::async_trait]
    impl HazardSource for FixedSource {
        async fn fetch(&self) -> Result<Vec<HazardPoint>, FetchError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_job_name_and_frequency() {
        let repo = Arc::new(HazardRepository::new(Arc::new(FixedSource(Ok(vec![])))));
        let job = HazardRefreshJob::new(repo, Duration::from_secs(300));
        assert_eq!(job.name(), "hazard_refresh");
        assert_eq!(job.frequency(), JobFrequency::Minutes(5));
    }

    #[tokio::test]
    async fn test_execute_refreshes_repository() {
        let repo = Arc::new(HazardRepository::new(Arc::new(FixedSource(Ok(vec![
            HazardPoint::new("7", 40.0, -75.0),
        ])))));
        let job = HazardRefreshJob::new(Arc::clone(&repo), Duration::from_secs(60));

        assert!(job.execute().await.is_ok());
        assert_eq!(repo.snapshot().len(), 1);
        assert_eq!(repo.snapshot().generation, 1);
    }

    #[tokio::test]
    async fn test_execute_reports_fetch_failure() {
        let repo = Arc::new(HazardRepository::new(Arc::new(FixedSource(Err(
            FetchError::Status { status: 503 },
        )))));
        let job = HazardRefreshJob::new(Arc::clone(&repo), Duration::from_secs(60));

        let err = job.execute().await.unwrap_err();
        assert!(err.contains("503"));
        assert!(repo.snapshot().is_empty());
    }
}
