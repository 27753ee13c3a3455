//! Domain layer for the pothole proximity monitor.
//!
//! This crate contains:
//! - Domain models (HazardPoint, PositionSample, ProximityState, AlertEvent)
//! - The per-hazard proximity state machine
//! - Traits for the host capabilities the monitor drives
//! - Domain error types

pub mod errors;
pub mod models;
pub mod services;
