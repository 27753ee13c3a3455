//! Audio cue abstraction.
//!
//! A cue is loaded once per monitoring session and released exactly once
//! when the session ends. Release consumes the cue, so a released cue
//! cannot be played.

use crate::errors::AudioLoadError;

/// A loaded, playable alert sound.
pub trait AudioCue: Send {
    /// Start playback from the beginning.
    fn play(&mut self) -> std::io::Result<()>;

    /// Release the underlying audio resource.
    fn release(self: Box<Self>);
}

/// Loads the session's audio cue.
pub trait AudioCueLoader: Send + Sync {
    fn load(&self) -> Result<Box<dyn AudioCue>, AudioLoadError>;
}
