use std::path::PathBuf;
use std::time::Duration;

use domain::models::{AccuracyTier, SamplingPolicy};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub hazards: HazardsConfig,
    pub proximity: ProximityConfig,
    #[serde(default)]
    pub position: PositionConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HazardsConfig {
    /// Base URL of the incident API; hazards are read from `{base_url}/Products`.
    #[serde(default)]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Periodic refresh while a session runs; 0 disables it and hazards are
    /// only fetched on start and on explicit request.
    #[serde(default)]
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProximityConfig {
    /// Distance below which an approach counts as proximate, in meters.
    #[serde(default = "default_trigger_radius")]
    pub trigger_radius_meters: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionConfig {
    #[serde(default)]
    pub accuracy: AccuracyTier,

    /// Desired sampling cadence in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Minimum movement between emitted samples, in meters
    #[serde(default)]
    pub distance_filter_meters: Option<f64>,

    #[serde(default = "default_true")]
    pub show_background_indicator: bool,

    /// JSON Lines track replayed by the binary's position source
    #[serde(default)]
    pub track_file: Option<PathBuf>,

    /// Replay time scale; 2.0 replays twice as fast as recorded
    #[serde(default = "default_replay_speed")]
    pub replay_speed: f64,

    /// Samples buffered between source and evaluator before new ones are dropped
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            accuracy: AccuracyTier::default(),
            interval_ms: default_interval_ms(),
            distance_filter_meters: None,
            show_background_indicator: true,
            track_file: None,
            replay_speed: default_replay_speed(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_alert_title")]
    pub title: String,

    #[serde(default = "default_alert_message")]
    pub message: String,

    /// Audio asset played on each alert
    #[serde(default = "default_sound_file")]
    pub sound_file: PathBuf,

    #[serde(default = "default_true")]
    pub audio_enabled: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            title: default_alert_title(),
            message: default_alert_message(),
            sound_file: default_sound_file(),
            audio_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_trigger_radius() -> f64 {
    25.0
}
fn default_interval_ms() -> u64 {
    1_000
}
fn default_true() -> bool {
    true
}
fn default_replay_speed() -> f64 {
    1.0
}
fn default_channel_capacity() -> usize {
    16
}
fn default_alert_title() -> String {
    "Proximity Alert".to_string()
}
fn default_alert_message() -> String {
    "You are close to a pothole!".to_string()
}
fn default_sound_file() -> PathBuf {
    PathBuf::from("assets/alert.mp3")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with PM__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("PM").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds entirely from embedded defaults so tests don't depend on the
    /// working directory.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [hazards]
            base_url = ""
            request_timeout_ms = 10000
            refresh_interval_secs = 0

            [proximity]
            trigger_radius_meters = 25.0

            [position]
            accuracy = "highest"
            interval_ms = 1000
            show_background_indicator = true
            replay_speed = 1.0
            channel_capacity = 16

            [alert]
            title = "Proximity Alert"
            message = "You are close to a pothole!"
            sound_file = "assets/alert.mp3"
            audio_enabled = true

            [logging]
            level = "info"
            format = "pretty"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.hazards.base_url.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "PM__HAZARDS__BASE_URL environment variable must be set".to_string(),
            ));
        }

        let radius = self.proximity.trigger_radius_meters;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ConfigValidationError::InvalidValue(
                "trigger_radius_meters must be a positive number of meters".to_string(),
            ));
        }

        if self.position.channel_capacity == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "channel_capacity cannot be 0".to_string(),
            ));
        }

        if !self.position.replay_speed.is_finite() || self.position.replay_speed <= 0.0 {
            return Err(ConfigValidationError::InvalidValue(
                "replay_speed must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Sampling policy requested from the position source.
    pub fn sampling_policy(&self) -> SamplingPolicy {
        SamplingPolicy {
            accuracy: self.position.accuracy,
            interval: Duration::from_millis(self.position.interval_ms),
            distance_filter_meters: self.position.distance_filter_meters,
            show_background_indicator: self.position.show_background_indicator,
        }
    }

    /// Periodic hazard refresh interval, if enabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.hazards.refresh_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
