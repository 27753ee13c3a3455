//! Domain error types.
//!
//! Only [`PermissionError`] is fatal to a session start. Everything else is
//! absorbed at the component boundary and logged.

use std::path::PathBuf;

use thiserror::Error;

/// The location capability could not be started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("Location permission denied")]
    Denied,

    #[error("Location capability unavailable: {0}")]
    Unavailable(String),
}

/// Fetching the hazard set from the remote source failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Hazard endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("Hazard request timed out after {0}ms")]
    Timeout(u64),

    #[error("Hazard request failed: {0}")]
    Transport(String),

    #[error("Invalid hazard payload: {0}")]
    Decode(String),
}

/// The audio cue could not be loaded. Alerts fall back to visual only.
#[derive(Debug, Error)]
pub enum AudioLoadError {
    #[error("Audio cue disabled by configuration")]
    Disabled,

    #[error("Audio asset not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read audio asset: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported audio asset: {0}")]
    Unsupported(String),
}

/// The position source failed after the session started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("Location permission revoked: {0}")]
    PermissionRevoked(String),

    #[error("Location sensor failed: {0}")]
    Failed(String),

    #[error("Position source closed")]
    Closed,
}

/// Errors surfaced synchronously by the monitor's start call.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error("Monitoring session already running")]
    AlreadyRunning,
}
