//! Shared utilities and common types for the pothole proximity monitor.
//!
//! This crate provides common functionality used across all other crates:
//! - Great-circle distance between coordinates
//! - Coordinate validation logic

pub mod distance;
pub mod validation;

pub use distance::{haversine_distance, Coordinate, EARTH_RADIUS_METERS};
