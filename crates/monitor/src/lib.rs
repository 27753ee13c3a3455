pub mod config;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod repository;
pub mod services;
pub mod sources;

pub use monitor::{MonitorPhase, MonitorSettings, ProximityMonitor, SessionStats};
pub use repository::HazardRepository;
