//! Background job scheduler and job implementations.

mod hazard_refresh;
mod scheduler;

pub use hazard_refresh::HazardRefreshJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
