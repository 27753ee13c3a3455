//! Host-fed position source.
//!
//! The embedding host owns the real location capability and pushes fixes
//! through a [`PositionFeed`]. Permission is a flag the host keeps current.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use domain::errors::{PermissionError, SensorError};
use domain::models::{PositionSample, SamplingPolicy};
use domain::services::{position_channel, PositionSource, PositionSubscription, SourceEvent};
use shared::Coordinate;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use validator::Validate;

/// [`PositionSource`] whose samples are pushed by the host.
pub struct ChannelPositionSource {
    capacity: usize,
    shared: Arc<FeedShared>,
}

/// Handle the host uses to deliver samples into a started source.
#[derive(Clone)]
pub struct PositionFeed {
    shared: Arc<FeedShared>,
}

struct FeedShared {
    permission: AtomicBool,
    active: Mutex<Option<ActiveFeed>>,
}

struct ActiveFeed {
    tx: broadcast::Sender<SourceEvent>,
    cancel: CancellationToken,
    policy: SamplingPolicy,
    last_emitted: Option<Coordinate>,
}

impl FeedShared {
    fn active(&self) -> MutexGuard<'_, Option<ActiveFeed>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChannelPositionSource {
    /// Create a source buffering at most `capacity` undelivered samples.
    /// Permission starts out granted.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            shared: Arc::new(FeedShared {
                permission: AtomicBool::new(true),
                active: Mutex::new(None),
            }),
        }
    }

    pub fn feed(&self) -> PositionFeed {
        PositionFeed {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl PositionFeed {
    pub fn set_permission(&self, granted: bool) {
        self.shared.permission.store(granted, Ordering::SeqCst);
    }

    /// Whether a subscriber is currently receiving samples.
    pub fn is_active(&self) -> bool {
        self.shared
            .active()
            .as_ref()
            .is_some_and(|feed| !feed.cancel.is_cancelled())
    }

    /// Deliver a sample. Returns false when it was not delivered: no active
    /// subscriber, invalid coordinates, or filtered by the policy's distance
    /// filter. A consumer that is behind loses its oldest unread samples,
    /// never this one.
    pub fn push(&self, sample: PositionSample) -> bool {
        if let Err(e) = sample.validate() {
            warn!(error = %e, "Discarding position sample with invalid coordinates");
            return false;
        }

        let mut active = self.shared.active();
        let Some(feed) = active.as_mut() else {
            return false;
        };
        if feed.cancel.is_cancelled() {
            *active = None;
            return false;
        }

        let coordinate = sample.coordinate();
        if !feed.policy.admits(feed.last_emitted, coordinate) {
            debug!("Position sample within distance filter, skipped");
            return false;
        }

        match feed.tx.send(SourceEvent::Sample(sample)) {
            Ok(_) => {
                feed.last_emitted = Some(coordinate);
                true
            }
            Err(_) => {
                *active = None;
                false
            }
        }
    }

    /// Report that the capability was lost. The subscriber receives the
    /// error after any samples already queued, and the feed deactivates.
    pub fn fail(&self, error: SensorError) -> bool {
        if matches!(error, SensorError::PermissionRevoked(_)) {
            self.set_permission(false);
        }

        let taken = self.shared.active().take();
        let Some(feed) = taken else {
            return false;
        };
        if feed.cancel.is_cancelled() {
            return false;
        }

        warn!(error = %error, "Position source failed");
        feed.tx.send(SourceEvent::Failed(error)).is_ok()
    }
}

#[async_trait::async_trait]
impl PositionSource for ChannelPositionSource {
    async fn start(
        &mut self,
        policy: &SamplingPolicy,
    ) -> Result<PositionSubscription, PermissionError> {
        if !self.shared.permission.load(Ordering::SeqCst) {
            return Err(PermissionError::Denied);
        }

        let (tx, rx) = position_channel(self.capacity);
        let cancel = CancellationToken::new();

        let previous = self.shared.active().replace(ActiveFeed {
            tx,
            cancel: cancel.clone(),
            policy: policy.clone(),
            last_emitted: None,
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }

        info!(
            accuracy = %policy.accuracy,
            interval_ms = policy.interval.as_millis() as u64,
            background_indicator = policy.show_background_indicator,
            "Channel position source started"
        );
        Ok(PositionSubscription::new(rx, cancel))
    }

    async fn stop(&mut self) {
        let stopped = self.shared.active().take();
        if let Some(feed) = stopped {
            feed.cancel.cancel();
            info!("Channel position source stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permission_denied() {
        let mut source = ChannelPositionSource::new(4);
        source.feed().set_permission(false);

        let result = source.start(&SamplingPolicy::default()).await;
        assert_eq!(result.unwrap_err(), PermissionError::Denied);
    }

    #[tokio::test]
    async fn test_push_before_start_is_not_delivered() {
        let source = ChannelPositionSource::new(4);
        assert!(!source.feed().push(PositionSample::now(40.0, -75.0)));
        assert!(!source.feed().is_active());
    }

    #[tokio::test]
    async fn test_push_delivers_in_order() {
        let mut source = ChannelPositionSource::new(4);
        let feed = source.feed();
        let mut sub = source.start(&SamplingPolicy::default()).await.unwrap();

        assert!(feed.is_active());
        assert!(feed.push(PositionSample::now(40.0, -75.0)));
        assert!(feed.push(PositionSample::now(41.0, -75.0)));

        assert!(matches!(sub.next().await, Some(SourceEvent::Sample(s)) if s.latitude == 40.0));
        assert!(matches!(sub.next().await, Some(SourceEvent::Sample(s)) if s.latitude == 41.0));
    }

    #[tokio::test]
    async fn test_lagging_consumer_gets_newest_fix() {
        let mut source = ChannelPositionSource::new(1);
        let feed = source.feed();
        let mut sub = source.start(&SamplingPolicy::default()).await.unwrap();

        assert!(feed.push(PositionSample::now(40.0, -75.0)));
        assert!(feed.push(PositionSample::now(40.5, -75.0)));

        assert!(matches!(sub.next().await, Some(SourceEvent::Sample(s)) if s.latitude == 40.5));
        assert_eq!(sub.take_dropped(), 1);
    }

    #[tokio::test]
    async fn test_invalid_sample_rejected() {
        let mut source = ChannelPositionSource::new(4);
        let feed = source.feed();
        let _sub = source.start(&SamplingPolicy::default()).await.unwrap();

        assert!(!feed.push(PositionSample::now(120.0, -75.0)));
    }

    #[tokio::test]
    async fn test_distance_filter_applied() {
        let mut source = ChannelPositionSource::new(4);
        let feed = source.feed();
        let policy = SamplingPolicy {
            distance_filter_meters: Some(50.0),
            ..SamplingPolicy::default()
        };
        let _sub = source.start(&policy).await.unwrap();

        assert!(feed.push(PositionSample::now(40.0, -75.0)));
        assert!(!feed.push(PositionSample::now(40.0001, -75.0)));
        assert!(feed.push(PositionSample::now(40.001, -75.0)));
    }

    #[tokio::test]
    async fn test_stop_deactivates_feed() {
        let mut source = ChannelPositionSource::new(4);
        let feed = source.feed();
        let mut sub = source.start(&SamplingPolicy::default()).await.unwrap();

        source.stop().await;
        assert!(!feed.is_active());
        assert!(!feed.push(PositionSample::now(40.0, -75.0)));
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_subscription_deactivates_feed() {
        let mut source = ChannelPositionSource::new(4);
        let feed = source.feed();
        let sub = source.start(&SamplingPolicy::default()).await.unwrap();

        drop(sub);
        assert!(!feed.is_active());
        assert!(!feed.push(PositionSample::now(40.0, -75.0)));
    }

    #[tokio::test]
    async fn test_fail_delivers_error_and_revokes() {
        let mut source = ChannelPositionSource::new(4);
        let feed = source.feed();
        let mut sub = source.start(&SamplingPolicy::default()).await.unwrap();

        assert!(feed.push(PositionSample::now(40.0, -75.0)));
        assert!(feed.fail(SensorError::PermissionRevoked("user disabled location".into())));

        assert!(matches!(sub.next().await, Some(SourceEvent::Sample(_))));
        assert!(matches!(
            sub.next().await,
            Some(SourceEvent::Failed(SensorError::PermissionRevoked(_)))
        ));
        assert!(sub.next().await.is_none());

        // Permission is gone until the host grants it again.
        assert!(source.start(&SamplingPolicy::default()).await.is_err());
    }
}
