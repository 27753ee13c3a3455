//! Per-hazard proximity state and the alert events it produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::hazard::{HazardId, HazardPoint};

/// Alert status of a single hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityStatus {
    /// Outside the trigger radius (or never seen); the next approach fires.
    #[default]
    Armed,
    /// Fired during the current evaluation step.
    Fired,
    /// Already alerted for this approach; waiting for the user to leave.
    Cooling,
}

impl std::fmt::Display for ProximityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProximityStatus::Armed => write!(f, "armed"),
            ProximityStatus::Fired => write!(f, "fired"),
            ProximityStatus::Cooling => write!(f, "cooling"),
        }
    }
}

/// Transition reported by [`ProximityState::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityTransition {
    /// Armed → Fired → Cooling. Exactly one alert for this approach.
    Fired,
    /// Cooling → Armed. The user left the radius.
    Rearmed,
}

/// Alert state tracked for one hazard within a monitoring session.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityState {
    pub status: ProximityStatus,
    pub last_distance_meters: Option<f64>,
    pub fired_at: Option<DateTime<Utc>>,
}

impl ProximityState {
    /// Feed a new distance for this hazard.
    ///
    /// | Status  | distance        | Result                      |
    /// |---------|-----------------|-----------------------------|
    /// | Armed   | `d < radius`    | `Fired`, status → Cooling   |
    /// | Armed   | `d >= radius`   | none                        |
    /// | Cooling | `d >= radius`   | `Rearmed`, status → Armed   |
    /// | Cooling | `d < radius`    | none (suppressed)           |
    ///
    /// A distance exactly equal to the radius never fires. A NaN distance
    /// compares false both ways and leaves the status unchanged.
    pub fn observe(
        &mut self,
        distance_meters: f64,
        radius_meters: f64,
        at: DateTime<Utc>,
    ) -> Option<ProximityTransition> {
        self.last_distance_meters = Some(distance_meters);

        match self.status {
            ProximityStatus::Armed if distance_meters < radius_meters => {
                self.fired_at = Some(at);
                // Fired passes straight to Cooling within the same step.
                self.status = ProximityStatus::Cooling;
                Some(ProximityTransition::Fired)
            }
            ProximityStatus::Armed => None,
            ProximityStatus::Fired | ProximityStatus::Cooling
                if distance_meters >= radius_meters =>
            {
                self.status = ProximityStatus::Armed;
                Some(ProximityTransition::Rearmed)
            }
            ProximityStatus::Fired => {
                self.status = ProximityStatus::Cooling;
                None
            }
            ProximityStatus::Cooling => None,
        }
    }
}

/// A fired proximity alert, handed from the state machine to the
/// dispatcher. Not retained.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub hazard_id: HazardId,
    pub distance_meters: f64,
    pub triggered_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl AlertEvent {
    pub fn for_hazard(hazard: &HazardPoint, distance_meters: f64, at: DateTime<Utc>) -> Self {
        Self {
            hazard_id: hazard.id.clone(),
            distance_meters,
            triggered_at: at,
            latitude: hazard.latitude,
            longitude: hazard.longitude,
            label: hazard.label().map(str::to_string),
        }
    }
}
