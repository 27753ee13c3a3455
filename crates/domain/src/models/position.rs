//! Position samples and the policy used to request them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{haversine_distance, Coordinate};
use validator::Validate;

/// Accuracy tier requested from the location capability.
///
/// Mirrors the tiers mobile location APIs expose; higher tiers cost more
/// battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyTier {
    Lowest,
    Low,
    Balanced,
    High,
    #[default]
    Highest,
    BestForNavigation,
}

impl std::fmt::Display for AccuracyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccuracyTier::Lowest => write!(f, "lowest"),
            AccuracyTier::Low => write!(f, "low"),
            AccuracyTier::Balanced => write!(f, "balanced"),
            AccuracyTier::High => write!(f, "high"),
            AccuracyTier::Highest => write!(f, "highest"),
            AccuracyTier::BestForNavigation => write!(f, "best_for_navigation"),
        }
    }
}

/// One position fix delivered by a position source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub accuracy_tier: AccuracyTier,

    /// Horizontal accuracy radius reported by the sensor, in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "shared::validation::validate_accuracy"))]
    pub accuracy_meters: Option<f64>,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            accuracy_tier: AccuracyTier::default(),
            accuracy_meters: None,
        }
    }

    /// A sample stamped with the current time.
    pub fn now(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, Utc::now())
    }

    pub fn with_accuracy_tier(mut self, tier: AccuracyTier) -> Self {
        self.accuracy_tier = tier;
        self
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// How a position source should sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingPolicy {
    pub accuracy: AccuracyTier,
    /// Desired cadence. Push-driven sources treat this as a hint.
    pub interval: Duration,
    /// Minimum movement before another sample is emitted.
    pub distance_filter_meters: Option<f64>,
    pub show_background_indicator: bool,
}

impl SamplingPolicy {
    /// Whether a sample at `next` should be emitted given the last emitted
    /// coordinate.
    pub fn admits(&self, previous: Option<Coordinate>, next: Coordinate) -> bool {
        match (self.distance_filter_meters, previous) {
            (Some(filter), Some(prev)) if filter > 0.0 => {
                haversine_distance(prev, next) >= filter
            }
            _ => true,
        }
    }
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            accuracy: AccuracyTier::Highest,
            interval: Duration::from_secs(1),
            distance_filter_meters: None,
            show_background_indicator: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_tier_serde() {
        let tier: AccuracyTier = serde_json::from_str(r#""best_for_navigation""#).unwrap();
        assert_eq!(tier, AccuracyTier::BestForNavigation);
        assert_eq!(AccuracyTier::default(), AccuracyTier::Highest);
        assert_eq!(AccuracyTier::Balanced.to_string(), "balanced");
    }

    #[test]
    fn test_sample_deserialization_defaults() {
        let json = r#"{"latitude": 40.0, "longitude": -75.0, "timestamp": "2024-05-01T12:00:00Z"}"#;
        let sample: PositionSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.accuracy_tier, AccuracyTier::Highest);
        assert!(sample.accuracy_meters.is_none());
        assert_eq!(sample.coordinate(), Coordinate::new(40.0, -75.0));
    }

    #[test]
    fn test_sample_validation() {
        assert!(PositionSample::now(40.0, -75.0).validate().is_ok());
        assert!(PositionSample::now(-91.0, -75.0).validate().is_err());

        let mut sample = PositionSample::now(40.0, -75.0);
        sample.accuracy_meters = Some(-3.0);
        assert!(sample.validate().is_err());
    }

    #[test]
    fn test_policy_without_filter_admits_everything() {
        let policy = SamplingPolicy::default();
        let here = Coordinate::new(40.0, -75.0);
        assert!(policy.admits(None, here));
        assert!(policy.admits(Some(here), here));
    }

    #[test]
    fn test_policy_distance_filter() {
        let policy = SamplingPolicy {
            distance_filter_meters: Some(50.0),
            ..SamplingPolicy::default()
        };
        let origin = Coordinate::new(40.0, -75.0);
        assert!(policy.admits(None, origin));
        assert!(!policy.admits(Some(origin), Coordinate::new(40.0001, -75.0)));
        assert!(policy.admits(Some(origin), Coordinate::new(40.001, -75.0)));
    }
}
