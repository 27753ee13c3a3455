//! Alert dispatcher.
//!
//! Owns the session's audio cue from acquisition to release. The cue is
//! released exactly once: explicitly through [`AlertDispatcher::release`]
//! or, failing that, when the dispatcher is dropped.

use std::sync::Arc;

use domain::models::AlertEvent;
use domain::services::{
    AlertNotification, AlertNotifier, AudioCue, AudioCueLoader, NotificationResult,
};
use tracing::{debug, info, warn};

use crate::metrics;

/// Notification text presented with every alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertText {
    pub title: String,
    pub message: String,
}

impl Default for AlertText {
    fn default() -> Self {
        Self {
            title: "Proximity Alert".to_string(),
            message: "You are close to a pothole!".to_string(),
        }
    }
}

pub struct AlertDispatcher {
    notifier: Arc<dyn AlertNotifier>,
    audio: Option<Box<dyn AudioCue>>,
    text: AlertText,
}

impl AlertDispatcher {
    /// Acquire the audio cue for a session.
    ///
    /// A load failure is logged and leaves the dispatcher visual-only.
    pub fn acquire(
        loader: &dyn AudioCueLoader,
        notifier: Arc<dyn AlertNotifier>,
        text: AlertText,
    ) -> Self {
        let audio = match loader.load() {
            Ok(cue) => Some(cue),
            Err(e) => {
                warn!(error = %e, "Audio cue unavailable, alerts will be visual only");
                None
            }
        };

        Self {
            notifier,
            audio,
            text,
        }
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Present the alert and play the cue. Failures of either are logged
    /// and never abort the dispatch.
    pub async fn dispatch(&mut self, event: &AlertEvent) {
        let notification =
            AlertNotification::from_event(event, &self.text.title, &self.text.message);

        if let NotificationResult::Failed(reason) = self.notifier.notify(&notification).await {
            warn!(hazard_id = %event.hazard_id, error = %reason, "Alert notification failed");
        }

        let played = match self.audio.as_mut() {
            Some(cue) => match cue.play() {
                Ok(()) => true,
                Err(e) => {
                    warn!(hazard_id = %event.hazard_id, error = %e, "Audio cue playback failed");
                    false
                }
            },
            None => false,
        };

        metrics::record_alert_dispatched(played);
        info!(
            hazard_id = %event.hazard_id,
            distance_m = event.distance_meters,
            audio = played,
            "Proximity alert dispatched"
        );
    }

    /// Release the audio cue. Subsequent calls are no-ops.
    pub fn release(&mut self) {
        if let Some(cue) = self.audio.take() {
            cue.release();
            debug!("Session audio released");
        }
    }
}

impl Drop for AlertDispatcher {
    fn drop(&mut self) {
        self.release();
    }
}
