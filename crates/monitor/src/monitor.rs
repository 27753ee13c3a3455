//! Proximity monitor: the session orchestrator.
//!
//! A session runs from [`ProximityMonitor::start`] to [`ProximityMonitor::stop`]
//! or until the position source fails. While it runs, a single evaluation
//! task consumes position samples in arrival order, evaluates them against
//! the latest hazard snapshot and dispatches alerts. The task owns the
//! proximity state and the alert dispatcher, so both are released when it
//! ends, whichever way it ends.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use domain::errors::{FetchError, MonitorError, SensorError};
use domain::models::{HazardSnapshot, SamplingPolicy};
use domain::services::{
    AlertNotifier, AudioCueLoader, PositionSource, PositionSubscription, ProximityStateMachine,
    SourceEvent,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::jobs::{HazardRefreshJob, JobScheduler};
use crate::metrics;
use crate::repository::HazardRepository;
use crate::services::{AlertDispatcher, AlertText};

/// How long `stop` waits for an in-flight periodic refresh.
const REFRESH_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle phase of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorPhase {
    #[default]
    Stopped,
    Starting,
    Running,
}

impl fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorPhase::Stopped => write!(f, "stopped"),
            MonitorPhase::Starting => write!(f, "starting"),
            MonitorPhase::Running => write!(f, "running"),
        }
    }
}

/// Session parameters.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub trigger_radius_meters: f64,
    pub policy: SamplingPolicy,
    pub alert_text: AlertText,
    /// Periodic hazard refresh while a session runs.
    pub refresh_interval: Option<Duration>,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            trigger_radius_meters: config.proximity.trigger_radius_meters,
            policy: config.sampling_policy(),
            alert_text: AlertText {
                title: config.alert.title.clone(),
                message: config.alert.message.clone(),
            },
            refresh_interval: config.refresh_interval(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            trigger_radius_meters: 25.0,
            policy: SamplingPolicy::default(),
            alert_text: AlertText::default(),
            refresh_interval: None,
        }
    }
}

/// Counters for the current (or last) session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub samples_processed: u64,
    pub alerts_dispatched: u64,
}

/// State shared between the monitor and its evaluation task.
struct SessionShared {
    phase: watch::Sender<MonitorPhase>,
    sensor_error: Mutex<Option<SensorError>>,
    samples_processed: AtomicU64,
    alerts_dispatched: AtomicU64,
}

impl SessionShared {
    fn new() -> Self {
        let (phase, _) = watch::channel(MonitorPhase::Stopped);
        Self {
            phase,
            sensor_error: Mutex::new(None),
            samples_processed: AtomicU64::new(0),
            alerts_dispatched: AtomicU64::new(0),
        }
    }

    fn set_phase(&self, next: MonitorPhase) {
        self.phase.send_if_modified(|phase| {
            if *phase == next {
                return false;
            }
            debug!(from = %phase, to = %next, "Monitor phase changed");
            *phase = next;
            true
        });
    }

    fn sensor_error(&self) -> std::sync::MutexGuard<'_, Option<SensorError>> {
        self.sensor_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn reset(&self) {
        self.sensor_error().take();
        self.samples_processed.store(0, Ordering::SeqCst);
        self.alerts_dispatched.store(0, Ordering::SeqCst);
    }

    fn stats(&self) -> SessionStats {
        SessionStats {
            samples_processed: self.samples_processed.load(Ordering::SeqCst),
            alerts_dispatched: self.alerts_dispatched.load(Ordering::SeqCst),
        }
    }
}

struct MonitoringSession {
    id: Uuid,
    cancel: CancellationToken,
    evaluator: JoinHandle<()>,
    refresher: Option<JobScheduler>,
}

/// Watches the user's position against the hazard set and raises an alert
/// on each approach.
pub struct ProximityMonitor {
    settings: MonitorSettings,
    repository: Arc<HazardRepository>,
    source: Box<dyn PositionSource>,
    audio_loader: Arc<dyn AudioCueLoader>,
    notifier: Arc<dyn AlertNotifier>,
    shared: Arc<SessionShared>,
    session: Option<MonitoringSession>,
}

impl ProximityMonitor {
    pub fn new(
        settings: MonitorSettings,
        repository: Arc<HazardRepository>,
        source: Box<dyn PositionSource>,
        audio_loader: Arc<dyn AudioCueLoader>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Self {
        Self {
            settings,
            repository,
            source,
            audio_loader,
            notifier,
            shared: Arc::new(SessionShared::new()),
            session: None,
        }
    }

    /// Start a monitoring session.
    ///
    /// Acquires the audio cue, fetches the hazard set (a failed fetch is
    /// logged and the session proceeds with the last known set) and starts
    /// the position source. If the source refuses to start, everything
    /// acquired is released and the monitor stays stopped.
    pub async fn start(&mut self) -> Result<(), MonitorError> {
        if self.phase() == MonitorPhase::Running {
            return Err(MonitorError::AlreadyRunning);
        }
        // A session that ended on a sensor error still has to be reaped.
        if self.session.is_some() {
            self.stop().await;
        }

        let session_id = Uuid::new_v4();
        self.shared.reset();
        self.shared.set_phase(MonitorPhase::Starting);
        info!(
            session_id = %session_id,
            radius_m = self.settings.trigger_radius_meters,
            accuracy = %self.settings.policy.accuracy,
            "Starting proximity monitor"
        );

        let dispatcher = AlertDispatcher::acquire(
            self.audio_loader.as_ref(),
            Arc::clone(&self.notifier),
            self.settings.alert_text.clone(),
        );

        if self.repository.refresh().await.is_err() {
            debug!(
                session_id = %session_id,
                hazards = self.repository.snapshot().len(),
                "Starting with last known hazard set"
            );
        }

        let subscription = match self.source.start(&self.settings.policy).await {
            Ok(subscription) => subscription,
            Err(e) => {
                drop(dispatcher);
                self.shared.set_phase(MonitorPhase::Stopped);
                warn!(session_id = %session_id, error = %e, "Position source refused to start");
                return Err(e.into());
            }
        };

        let cancel = CancellationToken::new();
        self.shared.set_phase(MonitorPhase::Running);

        let evaluator = tokio::spawn(run_session(
            session_id,
            subscription,
            dispatcher,
            ProximityStateMachine::new(self.settings.trigger_radius_meters),
            Arc::clone(&self.repository),
            Arc::clone(&self.shared),
            cancel.clone(),
        ));

        let refresher = self.settings.refresh_interval.map(|interval| {
            let mut scheduler = JobScheduler::new();
            scheduler.register(HazardRefreshJob::new(Arc::clone(&self.repository), interval));
            scheduler.start();
            scheduler
        });

        self.session = Some(MonitoringSession {
            id: session_id,
            cancel,
            evaluator,
            refresher,
        });

        info!(session_id = %session_id, "Proximity monitor running");
        Ok(())
    }

    /// Stop the session.
    ///
    /// Returns once the evaluation task has finished, the position source
    /// is stopped and the audio cue is released; no alert is dispatched
    /// after that. Calling it when nothing runs is a no-op.
    pub async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            self.shared.set_phase(MonitorPhase::Stopped);
            return;
        };

        session.cancel.cancel();

        if let Some(refresher) = session.refresher {
            refresher.shutdown();
            refresher.wait_for_shutdown(REFRESH_SHUTDOWN_TIMEOUT).await;
        }

        if let Err(e) = session.evaluator.await {
            error!(session_id = %session.id, "Evaluation task panicked: {}", e);
        }

        self.source.stop().await;
        self.shared.set_phase(MonitorPhase::Stopped);

        let stats = self.shared.stats();
        info!(
            session_id = %session.id,
            samples = stats.samples_processed,
            alerts = stats.alerts_dispatched,
            "Proximity monitor stopped"
        );
    }

    /// Refetch the hazard set now. The next sample is evaluated against the
    /// new set, with every hazard re-armed.
    pub async fn refresh_hazards(&self) -> Result<HazardSnapshot, FetchError> {
        self.repository.refresh().await
    }

    pub fn phase(&self) -> MonitorPhase {
        *self.shared.phase.borrow()
    }

    /// Watch phase changes, e.g. to notice a session ended by the source.
    pub fn subscribe_phase(&self) -> watch::Receiver<MonitorPhase> {
        self.shared.phase.subscribe()
    }

    /// The sensor error that ended the last session, if any. Cleared by
    /// taking it and by the next `start`.
    pub fn take_sensor_error(&self) -> Option<SensorError> {
        self.shared.sensor_error().take()
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.stats()
    }

    pub fn repository(&self) -> &Arc<HazardRepository> {
        &self.repository
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }
}

impl Drop for ProximityMonitor {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            session.cancel.cancel();
            if let Some(refresher) = &session.refresher {
                refresher.shutdown();
            }
        }
    }
}

/// The evaluation task. Ends on cancellation or when the source fails or
/// goes away; the latter two stop the session on their own.
async fn run_session(
    session_id: Uuid,
    mut subscription: PositionSubscription,
    mut dispatcher: AlertDispatcher,
    mut machine: ProximityStateMachine,
    repository: Arc<HazardRepository>,
    shared: Arc<SessionShared>,
    cancel: CancellationToken,
) {
    let ended_by = loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break None,
            event = subscription.next() => event,
        };

        let dropped = subscription.take_dropped();
        if dropped > 0 {
            metrics::record_samples_dropped(dropped);
        }

        let sample = match event {
            Some(SourceEvent::Sample(sample)) => sample,
            Some(SourceEvent::Failed(e)) => break Some(e),
            None => break Some(SensorError::Closed),
        };

        let snapshot = repository.snapshot();
        let alerts = machine.evaluate(&sample, &snapshot);

        for alert in &alerts {
            if cancel.is_cancelled() {
                break;
            }
            dispatcher.dispatch(alert).await;
            shared.alerts_dispatched.fetch_add(1, Ordering::SeqCst);
        }

        // Counted once fully handled, alerts included.
        shared.samples_processed.fetch_add(1, Ordering::SeqCst);
        metrics::record_sample_processed();
    };

    subscription.cancel();
    dispatcher.release();
    machine.clear();

    if let Some(error) = ended_by {
        match &error {
            SensorError::Closed => info!(session_id = %session_id, "Position source ended, stopping session"),
            other => warn!(session_id = %session_id, error = %other, "Position source failed, stopping session"),
        }
        *shared.sensor_error() = Some(error);
        shared.set_phase(MonitorPhase::Stopped);
    }
}
