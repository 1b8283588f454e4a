use chrono::Utc;
use restwise_ai::{
    AiAdvisor, BreakUrgency, Insight, LlmAdvisor, Recommendation, Recommender, UserProfile,
};
use restwise_storage::{
    ActivitySample, BreakTrigger, BreakType, ComplianceRecord, Database, FatigueLevel,
    FatigueMetrics,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::activity::{ActivityTracker, TrackerMode};
use crate::breaks::{BreakCoordinator, BreakRequest, BreakSession, BreakState};
use crate::config::{BreakConfig, Config};
use crate::error::CoreError;
use crate::fatigue::{AdvisorStats, FatigueEngine};
use crate::guard::{create_guard, ScreenGuard};
use crate::input::{create_input_source, InputSource};
use crate::notifier::{create_notifier, Notifier, Severity};
use crate::persistence::Persistence;

/// Everything the core talks to but does not own
pub struct Collaborators {
    pub input_source: Box<dyn InputSource>,
    pub guard: Arc<dyn ScreenGuard>,
    pub notifier: Arc<dyn Notifier>,
    pub persistence: Arc<dyn Persistence>,
    pub advisor: Option<Arc<dyn AiAdvisor>>,
}

impl Collaborators {
    /// Platform defaults for `config`. An advisor that cannot be built is
    /// logged and left out.
    #[must_use]
    pub fn from_config(config: &Config, persistence: Arc<dyn Persistence>) -> Self {
        let advisor: Option<Arc<dyn AiAdvisor>> = if config.advisor.enabled {
            match LlmAdvisor::from_config(&config.advisor) {
                Ok(advisor) => {
                    log::info!(
                        "AI advisor enabled ({} via {})",
                        advisor.model_name(),
                        config.advisor.provider
                    );
                    Some(Arc::new(advisor))
                }
                Err(e) => {
                    log::warn!("AI advisor disabled, using heuristics only: {e:#}");
                    None
                }
            }
        } else {
            None
        };

        Self {
            input_source: create_input_source(),
            guard: create_guard(config.breaks.os_actions),
            notifier: Arc::from(create_notifier(&config.notifications)),
            persistence,
            advisor,
        }
    }
}

/// Composite view of all three components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub tracker_mode: TrackerMode,
    pub activity: ActivitySample,
    pub dropped_events: u64,
    pub fatigue: FatigueMetrics,
    pub fatigue_level: FatigueLevel,
    pub break_session: BreakSession,
    pub advisor_enabled: bool,
    pub advisor: AdvisorStats,
}

struct Running {
    cancel: CancellationToken,
    watcher: JoinHandle<()>,
    interval: Option<JoinHandle<()>>,
}

/// Reacts to fatigue alerts: notifies and, when enabled, schedules a break
struct AlertWatcher {
    config: BreakConfig,
    engine: Arc<FatigueEngine>,
    breaks: Arc<BreakCoordinator>,
    notifier: Arc<dyn Notifier>,
}

impl AlertWatcher {
    async fn run(self, mut rx: watch::Receiver<FatigueMetrics>, cancel: CancellationToken) {
        let mut last_alert_tick = 0;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let metrics = rx.borrow_and_update().clone();
                    if metrics.alert_generated && metrics.tick != last_alert_tick {
                        last_alert_tick = metrics.tick;
                        self.on_alert(&metrics);
                    }
                }
            }
        }
    }

    fn on_alert(&self, metrics: &FatigueMetrics) {
        let level = metrics.level();
        let severity = if level == FatigueLevel::Critical {
            Severity::Critical
        } else {
            Severity::Warning
        };
        self.notifier.notify(
            &format!(
                "Fatigue is {level} ({:.0}%). Time to rest your eyes.",
                metrics.fatigue_score * 100.0
            ),
            severity,
        );

        if !self.config.auto_break {
            return;
        }
        let state = self.breaks.state();
        if state != BreakState::Idle {
            log::debug!("Fatigue alert ignored, break coordinator is {state}");
            return;
        }

        let request = auto_break_request(
            &self.config,
            metrics,
            self.engine.latest_insight().as_ref(),
        );
        match self.breaks.request_break(request) {
            Ok(session) => log::info!(
                "Fatigue alert scheduled a {} break ({}s)",
                session.break_type,
                session.requested.as_secs()
            ),
            Err(e) => log::warn!("Could not schedule break after fatigue alert: {e}"),
        }
    }
}

/// Requests a regular break every `period`. The clock restarts whenever an
/// enforced break ends, whatever scheduled it.
struct IntervalScheduler {
    config: BreakConfig,
    period: Duration,
    breaks: Arc<BreakCoordinator>,
}

impl IntervalScheduler {
    async fn run(self, cancel: CancellationToken) {
        let mut transitions = self.breaks.subscribe_transitions();
        let mut due = Instant::now() + self.period;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep_until(due) => {
                    self.on_due();
                    due = Instant::now() + self.period;
                }
                event = transitions.recv() => match event {
                    Ok(t) if t.from == BreakState::Enforcing => {
                        due = Instant::now() + self.period;
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    fn on_due(&self) {
        let state = self.breaks.state();
        if state != BreakState::Idle {
            log::debug!("Interval break skipped, break coordinator is {state}");
            return;
        }
        match self.breaks.request_break(interval_break_request(&self.config)) {
            Ok(session) => log::info!(
                "Interval scheduled a {} break ({}s)",
                session.break_type,
                session.requested.as_secs()
            ),
            Err(e) => log::warn!("Could not schedule interval break: {e}"),
        }
    }
}

/// Regular-length break for the fixed-interval schedule
#[must_use]
pub fn interval_break_request(config: &BreakConfig) -> BreakRequest {
    BreakRequest::new(Duration::from_secs(config.regular_secs), BreakType::Regular)
        .with_lead_time(config.lead_time())
        .with_lock_screen(config.lock_screen)
        .with_mute_input(config.mute_input)
        .with_trigger(BreakTrigger::Interval)
}

/// Size a break from the advisor's suggestion when it has one, otherwise
/// from the fatigue level.
#[must_use]
pub fn auto_break_request(
    config: &BreakConfig,
    metrics: &FatigueMetrics,
    insight: Option<&Insight>,
) -> BreakRequest {
    let (break_type, secs) = match insight.filter(|i| i.break_urgency != BreakUrgency::None) {
        Some(insight) => (
            BreakType::Personalized,
            (u64::from(insight.break_duration) * 60).clamp(config.micro_secs, config.long_secs),
        ),
        None => match metrics.level() {
            FatigueLevel::Critical => (BreakType::Long, config.long_secs),
            FatigueLevel::High => (BreakType::Regular, config.regular_secs),
            FatigueLevel::Moderate | FatigueLevel::Low => (BreakType::Micro, config.micro_secs),
        },
    };

    BreakRequest::new(Duration::from_secs(secs), break_type)
        .with_lead_time(config.lead_time())
        .with_lock_screen(config.lock_screen)
        .with_mute_input(config.mute_input)
        .with_trigger(BreakTrigger::FatigueAlert)
}

/// Owns the tracker, engine and break coordinator for the lifetime of the process
pub struct Orchestrator {
    config: Config,
    tracker: Arc<ActivityTracker>,
    engine: Arc<FatigueEngine>,
    breaks: Arc<BreakCoordinator>,
    recommender: Recommender,
    notifier: Arc<dyn Notifier>,
    persistence: Arc<dyn Persistence>,
    running: tokio::sync::Mutex<Option<Running>>,
    is_running: AtomicBool,
}

impl Orchestrator {
    /// Wire the components together. Nothing runs until [`Orchestrator::start`].
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if the configuration is invalid.
    pub fn new(config: Config, collaborators: Collaborators) -> Result<Self, CoreError> {
        config.validate()?;

        let Collaborators {
            input_source,
            guard,
            notifier,
            persistence,
            advisor,
        } = collaborators;

        let tracker = Arc::new(ActivityTracker::new(config.tracker.clone(), input_source));
        let engine = Arc::new(FatigueEngine::new(
            config.fatigue.clone(),
            &config.advisor,
            tracker.clone(),
            advisor.clone(),
            persistence.clone(),
        ));
        let breaks = Arc::new(BreakCoordinator::new(
            &config.breaks,
            guard,
            notifier.clone(),
            persistence.clone(),
        ));
        let recommender =
            Recommender::new(advisor, Duration::from_secs(config.advisor.timeout_secs));

        Ok(Self {
            config,
            tracker,
            engine,
            breaks,
            recommender,
            notifier,
            persistence,
            running: tokio::sync::Mutex::new(None),
            is_running: AtomicBool::new(false),
        })
    }

    /// Build with platform collaborators and the given database
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if the configuration is invalid.
    pub fn from_config(config: Config, db: Arc<Database>) -> Result<Self, CoreError> {
        let collaborators = Collaborators::from_config(&config, db);
        Self::new(config, collaborators)
    }

    /// Start tracking, evaluation and alert handling.
    ///
    /// An unavailable input source is not an error here; the tracker keeps
    /// running in idle-only mode.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AlreadyRunning` if already started.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(CoreError::AlreadyRunning("orchestrator"));
        }

        match self.tracker.start().await {
            Ok(()) | Err(CoreError::EventSourceUnavailable(_)) => {}
            Err(e) => return Err(e),
        }
        if let Err(e) = self.engine.start().await {
            self.tracker.stop().await;
            return Err(e);
        }

        let cancel = CancellationToken::new();
        let watcher = AlertWatcher {
            config: self.config.breaks.clone(),
            engine: self.engine.clone(),
            breaks: self.breaks.clone(),
            notifier: self.notifier.clone(),
        };
        let watcher = tokio::spawn(watcher.run(self.engine.subscribe(), cancel.clone()));
        let interval = self.config.breaks.interval().map(|period| {
            log::info!("Interval breaks every {} min", self.config.breaks.interval_mins);
            let scheduler = IntervalScheduler {
                config: self.config.breaks.clone(),
                period,
                breaks: self.breaks.clone(),
            };
            tokio::spawn(scheduler.run(cancel.clone()))
        });

        *running = Some(Running {
            cancel,
            watcher,
            interval,
        });
        self.is_running.store(true, Ordering::SeqCst);
        log::info!("restwise monitoring started");
        Ok(())
    }

    /// Stop every loop and restore the guard if a break is active. Safe to call twice.
    pub async fn stop(&self) {
        let running = self.running.lock().await.take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.watcher.await {
                log::warn!("Alert watcher ended abnormally: {e}");
            }
            if let Some(interval) = running.interval {
                if let Err(e) = interval.await {
                    log::warn!("Interval scheduler ended abnormally: {e}");
                }
            }
            self.engine.stop().await;
            self.tracker.stop().await;
            log::info!("restwise monitoring stopped");
        }
        self.breaks.shutdown().await;
        self.is_running.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        let fatigue = self.engine.current();
        StatusSnapshot {
            running: self.is_running.load(Ordering::SeqCst),
            tracker_mode: self.tracker.mode(),
            activity: self.tracker.snapshot(),
            dropped_events: self.tracker.dropped_events(),
            fatigue_level: fatigue.level(),
            fatigue,
            break_session: self.breaks.status(),
            advisor_enabled: self.engine.has_advisor(),
            advisor: self.engine.advisor_stats(),
        }
    }

    /// # Errors
    ///
    /// See [`BreakCoordinator::request_break`].
    pub fn request_break(&self, request: BreakRequest) -> Result<BreakSession, CoreError> {
        self.breaks.request_break(request)
    }

    /// # Errors
    ///
    /// See [`BreakCoordinator::cancel`].
    pub async fn cancel_break(&self) -> Result<Option<ComplianceRecord>, CoreError> {
        self.breaks.cancel().await
    }

    /// Drop activity and fatigue history older than `storage.retention_days`.
    /// Returns the number of rows removed; failures are logged.
    pub fn prune_history(&self) -> usize {
        let days = self.config.storage.retention_days;
        if days == 0 {
            return 0;
        }
        let Some(cutoff) = Utc::now().checked_sub_signed(chrono::Duration::days(i64::from(days)))
        else {
            return 0;
        };
        match self.persistence.prune_before(cutoff) {
            Ok(removed) => {
                if removed > 0 {
                    log::info!("Pruned {removed} history rows older than {days} days");
                }
                removed
            }
            Err(e) => {
                log::warn!("Failed to prune history: {e:#}");
                0
            }
        }
    }

    /// Suggest a break activity for the current fatigue level
    pub async fn recommend(&self, available_minutes: Option<u32>) -> Recommendation {
        let minutes = available_minutes.unwrap_or(self.config.breaks.default_available_minutes);
        let profile = UserProfile::new(self.engine.current().level(), minutes);
        self.recommender.recommend(&profile).await
    }

    #[must_use]
    pub fn advisor_stats(&self) -> AdvisorStats {
        self.engine.advisor_stats()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    #[must_use]
    pub fn engine(&self) -> &FatigueEngine {
        &self.engine
    }

    #[must_use]
    pub fn breaks(&self) -> &BreakCoordinator {
        &self.breaks
    }
}
