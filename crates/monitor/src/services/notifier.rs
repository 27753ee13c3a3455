//! Notifier that presents alerts through the log.

use domain::services::{AlertNotification, AlertNotifier, NotificationResult};
use tracing::warn;

/// Presents proximity alerts as warning-level log events.
///
/// Used by the binary, where the terminal is the user-facing surface.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl AlertNotifier for LogNotifier {
    async fn notify(&self, notification: &AlertNotification) -> NotificationResult {
        warn!(
            hazard_id = %notification.hazard_id,
            distance_m = notification.distance_meters,
            label = notification.label.as_deref().unwrap_or("-"),
            "{}: {}",
            notification.title,
            notification.message
        );
        NotificationResult::Sent
    }
}
