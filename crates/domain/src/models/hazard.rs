//! Hazard domain model.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use shared::Coordinate;
use validator::Validate;

/// Server-assigned hazard identifier.
///
/// The reporting API has served both numeric and string ids, so either is
/// accepted and kept as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct HazardId(String);

impl HazardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HazardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HazardId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for HazardId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for HazardId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(i64),
            Text(String),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Number(n) => Ok(HazardId(n.to_string())),
            RawId::Text(s) if s.trim().is_empty() => {
                Err(serde::de::Error::custom("hazard id must not be empty"))
            }
            RawId::Text(s) => Ok(HazardId(s)),
        }
    }
}

/// A reported hazard location (pothole).
///
/// Only `id`, `latitude` and `longitude` matter to proximity evaluation. The
/// incident fields are carried through for notification text when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HazardPoint {
    pub id: HazardId,

    #[serde(deserialize_with = "lenient_degrees")]
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[serde(deserialize_with = "lenient_degrees")]
    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HazardPoint {
    pub fn new(id: impl Into<HazardId>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            name: None,
            incident: None,
            details: None,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Short human label for notifications, if the report carried one.
    pub fn label(&self) -> Option<&str> {
        self.incident
            .as_deref()
            .or(self.name.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

/// Accepts degrees as a JSON number or a numeric string.
fn lenient_degrees<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDegrees {
        Number(f64),
        Text(String),
    }

    match RawDegrees::deserialize(deserializer)? {
        RawDegrees::Number(v) => Ok(v),
        RawDegrees::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid coordinate '{s}'"))),
    }
}

/// Immutable copy of the most recently fetched hazard set.
///
/// `generation` increases by one on every successful refresh; generation 0
/// is the empty set served before any fetch succeeded.
#[derive(Debug, Clone)]
pub struct HazardSnapshot {
    pub generation: u64,
    pub hazards: Arc<[HazardPoint]>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl HazardSnapshot {
    pub fn empty() -> Self {
        Self {
            generation: 0,
            hazards: Arc::from(Vec::new()),
            fetched_at: None,
        }
    }

    /// Build the snapshot that replaces `previous` wholesale.
    pub fn succeeding(previous: &HazardSnapshot, hazards: Vec<HazardPoint>) -> Self {
        Self {
            generation: previous.generation + 1,
            hazards: Arc::from(hazards),
            fetched_at: Some(Utc::now()),
        }
    }

    pub fn len(&self) -> usize {
        self.hazards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hazards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HazardPoint> {
        self.hazards.iter()
    }
}

impl Default for HazardSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
