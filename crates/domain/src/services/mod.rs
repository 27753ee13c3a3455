//! Domain services for the proximity monitor.
//!
//! The state machine holds the business logic; the traits describe the host
//! capabilities the monitor drives.

pub mod audio;
pub mod hazard_source;
pub mod notification;
pub mod position_source;
pub mod proximity;

pub use audio::{AudioCue, AudioCueLoader};
pub use hazard_source::HazardSource;
pub use notification::{AlertNotification, AlertNotifier, MockAlertNotifier, NotificationResult};
pub use position_source::{position_channel, PositionSource, PositionSubscription, SourceEvent};
pub use proximity::ProximityStateMachine;
