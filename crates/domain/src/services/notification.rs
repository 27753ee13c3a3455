//! User-visible alert notifications.
//!
//! Provides the abstraction the alert dispatcher uses to put a proximity
//! alert in front of the user.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{AlertEvent, HazardId};

/// Notification payload for a proximity alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertNotification {
    pub title: String,
    pub message: String,
    pub hazard_id: HazardId,
    pub distance_meters: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub triggered_at: DateTime<Utc>,
}

impl AlertNotification {
    pub fn from_event(event: &AlertEvent, title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            hazard_id: event.hazard_id.clone(),
            distance_meters: event.distance_meters,
            label: event.label.clone(),
            triggered_at: event.triggered_at,
        }
    }
}

/// Result of a notification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationResult {
    /// Notification was shown.
    Sent,
    /// Notification failed (but was non-blocking).
    Failed(String),
}

/// Host capability that presents alerts to the user.
///
/// Implementations must not block: present the alert and return.
#[async_trait::async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, notification: &AlertNotification) -> NotificationResult;
}

/// Mock notifier for development and testing.
///
/// Logs and records notifications but doesn't present them.
#[derive(Debug, Default)]
pub struct MockAlertNotifier {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
    sent: Mutex<Vec<AlertNotification>>,
}

impl MockAlertNotifier {
    /// Create a new mock notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock notifier that simulates failures.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Notifications received so far, including simulated failures.
    pub fn sent(&self) -> Vec<AlertNotification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait::async_trait]
impl AlertNotifier for MockAlertNotifier {
    async fn notify(&self, notification: &AlertNotification) -> NotificationResult {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());

        if self.simulate_failure {
            tracing::warn!(
                hazard_id = %notification.hazard_id,
                "Mock notifier simulating failure"
            );
            return NotificationResult::Failed("Simulated failure".to_string());
        }

        tracing::info!(
            hazard_id = %notification.hazard_id,
            distance_m = notification.distance_meters,
            title = %notification.title,
            "Mock: Would present proximity alert"
        );

        NotificationResult::Sent
    }
}
