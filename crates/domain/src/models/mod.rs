//! Domain models for the proximity monitor.

pub mod hazard;
pub mod position;
pub mod proximity;

pub use hazard::{HazardId, HazardPoint, HazardSnapshot};
pub use position::{AccuracyTier, PositionSample, SamplingPolicy};
pub use proximity::{AlertEvent, ProximityState, ProximityStatus, ProximityTransition};
