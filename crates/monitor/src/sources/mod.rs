//! Position source implementations.

pub mod channel;
pub mod replay;

pub use channel::{ChannelPositionSource, PositionFeed};
pub use replay::ReplayPositionSource;
