//! Terminal audio cue.
//!
//! The loader checks the configured sound asset once per session so a
//! missing or empty asset degrades alerts to visual only, the same way a
//! failed decode would on a device. Playback rings the terminal bell.

use std::io::Write;
use std::path::{Path, PathBuf};

use domain::errors::AudioLoadError;
use domain::services::{AudioCue, AudioCueLoader};
use tracing::debug;

use crate::config::AlertConfig;

const BELL: &[u8] = b"\x07";

/// Loads a [`TerminalBellCue`] after verifying the sound asset.
#[derive(Debug, Clone)]
pub struct TerminalBellLoader {
    sound_file: PathBuf,
    enabled: bool,
}

impl TerminalBellLoader {
    pub fn new(sound_file: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            sound_file: sound_file.into(),
            enabled,
        }
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(config.sound_file.clone(), config.audio_enabled)
    }
}

impl AudioCueLoader for TerminalBellLoader {
    fn load(&self) -> Result<Box<dyn AudioCue>, AudioLoadError> {
        if !self.enabled {
            return Err(AudioLoadError::Disabled);
        }

        let asset = read_asset(&self.sound_file)?;
        debug!(
            path = %self.sound_file.display(),
            bytes = asset.len(),
            "Audio cue loaded"
        );

        Ok(Box::new(TerminalBellCue {
            path: self.sound_file.clone(),
            asset_bytes: asset.len(),
        }))
    }
}

fn read_asset(path: &Path) -> Result<Vec<u8>, AudioLoadError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AudioLoadError::NotFound(path.to_path_buf()),
        _ => AudioLoadError::Io(e),
    })?;

    if bytes.is_empty() {
        return Err(AudioLoadError::Unsupported(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(bytes)
}

/// Audio cue that rings the terminal bell on stderr.
#[derive(Debug)]
pub struct TerminalBellCue {
    path: PathBuf,
    asset_bytes: usize,
}

impl AudioCue for TerminalBellCue {
    fn play(&mut self) -> std::io::Result<()> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(BELL)?;
        stderr.flush()
    }

    fn release(self: Box<Self>) {
        debug!(
            path = %self.path.display(),
            bytes = self.asset_bytes,
            "Audio cue released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_asset(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "pothole-monitor-{}-{}",
            std::process::id(),
            name
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_disabled_loader() {
        let loader = TerminalBellLoader::new("assets/alert.mp3", false);
        assert!(matches!(loader.load(), Err(AudioLoadError::Disabled)));
    }

    #[test]
    fn test_missing_asset() {
        let loader = TerminalBellLoader::new("/definitely/not/here/alert.mp3", true);
        assert!(matches!(loader.load(), Err(AudioLoadError::NotFound(_))));
    }

    #[test]
    fn test_empty_asset_is_unsupported() {
        let path = temp_asset("empty.mp3", b"");
        let loader = TerminalBellLoader::new(&path, true);
        assert!(matches!(loader.load(), Err(AudioLoadError::Unsupported(_))));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_play_release() {
        let path = temp_asset("alert.mp3", b"ID3fake");
        let loader = TerminalBellLoader::new(&path, true);

        let mut cue = loader.load().expect("asset should load");
        assert!(cue.play().is_ok());
        cue.release();
        std::fs::remove_file(path).ok();
    }
}
