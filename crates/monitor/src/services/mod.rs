//! Host capability implementations and external service integrations.

pub mod audio;
pub mod dispatcher;
pub mod hazard_client;
pub mod notifier;

pub use audio::{TerminalBellCue, TerminalBellLoader};
pub use dispatcher::{AlertDispatcher, AlertText};
pub use hazard_client::HttpHazardSource;
pub use notifier::LogNotifier;
