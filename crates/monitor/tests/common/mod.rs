//! Common test utilities for integration tests.
//!
//! Doubles for the host capabilities the monitor drives, plus a builder
//! that wires them to a monitor fed through a channel position source.

// Not every helper is used by every test binary.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use domain::errors::{AudioLoadError, FetchError};
use domain::models::HazardPoint;
use domain::services::{AudioCue, AudioCueLoader, HazardSource, MockAlertNotifier};
use pothole_monitor::sources::{ChannelPositionSource, PositionFeed};
use pothole_monitor::{HazardRepository, MonitorSettings, ProximityMonitor};

/// Hazard source whose answer can be changed between fetches.
#[derive(Default)]
pub struct StaticHazardSource {
    hazards: Mutex<Vec<HazardPoint>>,
    failure: Mutex<Option<FetchError>>,
    fetches: AtomicUsize,
}

impl StaticHazardSource {
    pub fn with_hazards(hazards: Vec<HazardPoint>) -> Arc<Self> {
        Arc::new(Self {
            hazards: Mutex::new(hazards),
            ..Self::default()
        })
    }

    pub fn failing(error: FetchError) -> Arc<Self> {
        Arc::new(Self {
            failure: Mutex::new(Some(error)),
            ..Self::default()
        })
    }

    pub fn set_hazards(&self, hazards: Vec<HazardPoint>) {
        *self.hazards.lock().unwrap() = hazards;
    }

    pub fn set_failure(&self, error: Option<FetchError>) {
        *self.failure.lock().unwrap() = error;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl HazardSource for StaticHazardSource {
    async fn fetch(&self) -> Result<Vec<HazardPoint>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.hazards.lock().unwrap().clone())
    }
}

/// Counts audio cue loads, plays and releases.
#[derive(Default)]
pub struct AudioCounters {
    pub loads: AtomicUsize,
    pub plays: AtomicUsize,
    pub releases: AtomicUsize,
}

impl AudioCounters {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

pub struct RecordingAudioLoader {
    pub counters: Arc<AudioCounters>,
    pub fail: bool,
}

impl RecordingAudioLoader {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(AudioCounters::default()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

struct RecordingCue(Arc<AudioCounters>);

impl AudioCue for RecordingCue {
    fn play(&mut self) -> std::io::Result<()> {
        self.0.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(self: Box<Self>) {
        self.0.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl AudioCueLoader for RecordingAudioLoader {
    fn load(&self) -> Result<Box<dyn AudioCue>, AudioLoadError> {
        if self.fail {
            return Err(AudioLoadError::Unsupported("test asset".to_string()));
        }
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingCue(Arc::clone(&self.counters))))
    }
}

/// A monitor wired to test doubles.
pub struct TestHarness {
    pub monitor: ProximityMonitor,
    pub feed: PositionFeed,
    pub hazards: Arc<StaticHazardSource>,
    pub notifier: Arc<MockAlertNotifier>,
    pub audio: Arc<AudioCounters>,
}

impl TestHarness {
    pub fn new(hazards: Arc<StaticHazardSource>, radius_meters: f64) -> Self {
        Self::with_loader(hazards, radius_meters, RecordingAudioLoader::new())
    }

    pub fn with_loader(
        hazards: Arc<StaticHazardSource>,
        radius_meters: f64,
        loader: RecordingAudioLoader,
    ) -> Self {
        let settings = MonitorSettings {
            trigger_radius_meters: radius_meters,
            ..MonitorSettings::default()
        };
        Self::with_settings(hazards, settings, loader)
    }

    pub fn with_settings(
        hazards: Arc<StaticHazardSource>,
        settings: MonitorSettings,
        loader: RecordingAudioLoader,
    ) -> Self {
        let source = ChannelPositionSource::new(32);
        let feed = source.feed();
        let notifier = Arc::new(MockAlertNotifier::new());
        let audio = Arc::clone(&loader.counters);
        let repository = Arc::new(HazardRepository::new(hazards.clone()));

        let monitor = ProximityMonitor::new(
            settings,
            repository,
            Box::new(source),
            Arc::new(loader),
            notifier.clone(),
        );

        Self {
            monitor,
            feed,
            hazards,
            notifier,
            audio,
        }
    }

    /// Wait until the monitor has evaluated `count` samples this session.
    pub async fn processed(&self, count: u64) {
        let monitor = &self.monitor;
        wait_until(|| monitor.stats().samples_processed >= count).await;
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
