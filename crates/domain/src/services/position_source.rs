//! Position source abstraction.
//!
//! A source is push-driven: once started it delivers samples at whatever
//! cadence the underlying capability produces them, through the
//! [`PositionSubscription`] returned by [`PositionSource::start`]. The
//! subscription is the only handle to the running source; dropping it
//! unsubscribes.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{PermissionError, SensorError};
use crate::models::{PositionSample, SamplingPolicy};

/// Item delivered through a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Sample(PositionSample),
    /// The capability was lost mid-session. No samples follow.
    Failed(SensorError),
}

/// Create the bounded, latest-wins channel a source delivers through.
///
/// Sending never waits: once `capacity` events are unread, each new one
/// evicts the oldest, so a lagging consumer always catches up to the newest
/// fix. Sending fails only when the subscription is gone.
pub fn position_channel(
    capacity: usize,
) -> (broadcast::Sender<SourceEvent>, broadcast::Receiver<SourceEvent>) {
    broadcast::channel(capacity.max(1))
}

/// Receiving end of a started position source.
#[derive(Debug)]
pub struct PositionSubscription {
    events: broadcast::Receiver<SourceEvent>,
    cancel: CancellationToken,
    /// Stale samples evicted before they were read, not yet taken.
    dropped: u64,
}

impl PositionSubscription {
    /// Wrap a receiver. `cancel` is triggered when the subscription is
    /// cancelled or dropped, telling the producer to stop.
    pub fn new(events: broadcast::Receiver<SourceEvent>, cancel: CancellationToken) -> Self {
        Self {
            events,
            cancel,
            dropped: 0,
        }
    }

    /// Next event, or `None` once the producer has gone away or the
    /// subscription was cancelled.
    pub async fn next(&mut self) -> Option<SourceEvent> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                received = self.events.recv() => received,
            };
            match received {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    self.dropped += skipped;
                    debug!(skipped, "Consumer behind, stale position samples evicted");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Number of stale samples evicted since the last call.
    pub fn take_dropped(&mut self) -> u64 {
        std::mem::take(&mut self.dropped)
    }

    /// Stop delivery. No event is returned by [`next`](Self::next) afterwards.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for PositionSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The device's location-sensing capability.
#[async_trait::async_trait]
pub trait PositionSource: Send {
    /// Start sampling with `policy`.
    ///
    /// Fails with [`PermissionError`] when the capability is unavailable or
    /// permission is denied. Each call yields a fresh subscription; a source
    /// is never resumed in place.
    async fn start(
        &mut self,
        policy: &SamplingPolicy,
    ) -> Result<PositionSubscription, PermissionError>;

    /// Stop sampling and release the capability. Safe to call when not
    /// started.
    async fn stop(&mut self);
}
