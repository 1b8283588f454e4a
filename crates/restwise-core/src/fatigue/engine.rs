use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use restwise_ai::{AdvisorConfig, AdvisorError, AiAdvisor, Insight, Parsed};
use restwise_storage::{ActivitySample, FatigueMetrics, MetricsSource};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::baseline;
use super::trend::compute_trend;
use crate::activity::ActivitySource;
use crate::config::FatigueConfig;
use crate::error::CoreError;
use crate::persistence::{self, Persistence};

/// Outcome counts of advisor enrichment attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisorStats {
    pub calls: u64,
    pub well_formed: u64,
    pub partial: u64,
    pub unusable: u64,
    pub unavailable: u64,
    pub timeouts: u64,
}

#[derive(Default)]
struct AdvisorCounters {
    calls: AtomicU64,
    well_formed: AtomicU64,
    partial: AtomicU64,
    unusable: AtomicU64,
    unavailable: AtomicU64,
    timeouts: AtomicU64,
}

impl AdvisorCounters {
    fn record(&self, outcome: &Result<Parsed<Insight>, AdvisorError>) {
        let counter = match outcome {
            Ok(Parsed::WellFormed(_)) => &self.well_formed,
            Ok(Parsed::PartiallyParsed(_)) => &self.partial,
            Ok(Parsed::Unusable) | Err(AdvisorError::Malformed(_)) => &self.unusable,
            Err(AdvisorError::Unavailable(_)) => &self.unavailable,
            Err(AdvisorError::Timeout(_)) => &self.timeouts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> AdvisorStats {
        AdvisorStats {
            calls: self.calls.load(Ordering::Relaxed),
            well_formed: self.well_formed.load(Ordering::Relaxed),
            partial: self.partial.load(Ordering::Relaxed),
            unusable: self.unusable.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

struct EngineState {
    tick: u64,
    history: VecDeque<f64>,
    last_alert: Option<Instant>,
    last_advisor_call: Option<Instant>,
    advisor_in_flight: bool,
    rng: StdRng,
    latest_insight: Option<Insight>,
}

impl EngineState {
    fn push_score(&mut self, score: f64, capacity: usize) {
        while self.history.len() >= capacity.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(score);
    }

    /// Raise an alert if the score crosses the threshold outside the cooldown
    fn check_alert(&mut self, score: f64, now: Instant, config: &FatigueConfig) -> bool {
        if score < config.alert_threshold {
            return false;
        }
        let cooled = self
            .last_alert
            .map_or(true, |at| now.saturating_duration_since(at) >= config.alert_cooldown());
        if cooled {
            self.last_alert = Some(now);
        }
        cooled
    }

    /// Claim the single advisor slot if it is free and the cooldown has passed
    fn begin_advisor_call(&mut self, now: Instant, cooldown: Duration) -> bool {
        if self.advisor_in_flight {
            return false;
        }
        if self
            .last_advisor_call
            .is_some_and(|at| now.saturating_duration_since(at) < cooldown)
        {
            return false;
        }
        self.advisor_in_flight = true;
        self.last_advisor_call = Some(now);
        true
    }
}

struct EngineShared {
    config: FatigueConfig,
    advisor_cooldown: Duration,
    advisor_timeout: Duration,
    source: Arc<dyn ActivitySource>,
    advisor: Option<Arc<dyn AiAdvisor>>,
    persistence: Arc<dyn Persistence>,
    state: Mutex<EngineState>,
    published: watch::Sender<FatigueMetrics>,
    counters: AdvisorCounters,
}

/// Clears the in-flight flag however the enrichment task ends
struct InFlight(Arc<EngineShared>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.state.lock().advisor_in_flight = false;
    }
}

impl EngineShared {
    fn evaluate_once(self: &Arc<Self>) -> FatigueMetrics {
        let sample = self.source.snapshot();
        let now = Instant::now();

        let (metrics, enrich) = {
            let mut state = self.state.lock();
            state.tick += 1;

            let base = baseline::compute(&sample, &self.config, &mut state.rng);
            state.push_score(base.fatigue_score, self.config.history_capacity);
            let trend = compute_trend(
                &state.history,
                self.config.trend_window,
                self.config.trend_epsilon,
            );
            let alert_generated = state.check_alert(base.fatigue_score, now, &self.config);

            let metrics = FatigueMetrics {
                tick: state.tick,
                fatigue_score: base.fatigue_score,
                eye_strain_level: base.eye_strain_level,
                posture_score: base.posture_score,
                blink_rate: base.blink_rate,
                facial_expression: base.facial_expression,
                trend,
                alert_generated,
                source: MetricsSource::Baseline,
                computed_at: Utc::now(),
            };
            self.published.send_replace(metrics.clone());

            let enrich =
                self.advisor.is_some() && state.begin_advisor_call(now, self.advisor_cooldown);
            (metrics, enrich)
        };

        persistence::report("activity sample", self.persistence.record_activity(&sample));
        persistence::report("fatigue metrics", self.persistence.record_fatigue(&metrics));

        if enrich {
            self.spawn_enrichment(sample, metrics.clone());
        }
        metrics
    }

    fn spawn_enrichment(self: &Arc<Self>, sample: ActivitySample, metrics: FatigueMetrics) {
        let guard = InFlight(self.clone());
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::debug!("No runtime available, skipping advisor for tick {}", metrics.tick);
            return;
        };
        let shared = self.clone();
        handle.spawn(async move {
            let _guard = guard;
            shared.enrich(sample, metrics).await;
        });
    }

    async fn enrich(&self, sample: ActivitySample, baseline: FatigueMetrics) {
        let Some(advisor) = self.advisor.clone() else {
            return;
        };
        self.counters.calls.fetch_add(1, Ordering::Relaxed);

        let outcome = tokio::time::timeout(
            self.advisor_timeout,
            advisor.analyze_fatigue(&sample, &baseline),
        )
        .await
        .unwrap_or(Err(AdvisorError::Timeout(self.advisor_timeout)));
        self.counters.record(&outcome);

        match outcome {
            Ok(Parsed::WellFormed(insight)) => self.merge(&sample, baseline.tick, insight),
            Ok(other) => log::debug!(
                "Advisor reply for tick {} was {}, keeping baseline",
                baseline.tick,
                other.kind()
            ),
            Err(e) => log::warn!("Advisor failed for tick {}: {e}", baseline.tick),
        }
    }

    fn merge(&self, sample: &ActivitySample, tick: u64, insight: Insight) {
        let now = Instant::now();
        let merged = {
            let mut state = self.state.lock();
            state.latest_insight = Some(insight.clone());

            let current = self.published.borrow().clone();
            if current.tick != tick {
                log::debug!(
                    "Dropping advisor result for tick {tick}, tick {} already published",
                    current.tick
                );
                return;
            }

            let score = insight
                .break_urgency
                .adjust_score(current.fatigue_score)
                .clamp(0.0, 1.0);
            if let Some(last) = state.history.back_mut() {
                *last = score;
            }
            let trend = compute_trend(
                &state.history,
                self.config.trend_window,
                self.config.trend_epsilon,
            );
            let alert_generated =
                current.alert_generated || state.check_alert(score, now, &self.config);

            let merged = FatigueMetrics {
                fatigue_score: score,
                trend,
                alert_generated,
                facial_expression: baseline::expression_for(score, sample, &self.config),
                source: MetricsSource::Enriched,
                computed_at: Utc::now(),
                ..current
            };
            self.published.send_replace(merged.clone());
            merged
        };

        log::info!(
            "Advisor adjusted fatigue to {:.2} ({:?}) for tick {tick}",
            merged.fatigue_score,
            insight.break_urgency
        );
        persistence::report("enriched fatigue metrics", self.persistence.record_fatigue(&merged));
    }
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic fatigue estimator with optional advisor enrichment
pub struct FatigueEngine {
    shared: Arc<EngineShared>,
    running: tokio::sync::Mutex<Option<Running>>,
}

impl FatigueEngine {
    #[must_use]
    pub fn new(
        config: FatigueConfig,
        advisor_config: &AdvisorConfig,
        source: Arc<dyn ActivitySource>,
        advisor: Option<Arc<dyn AiAdvisor>>,
        persistence: Arc<dyn Persistence>,
    ) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let (published, _) = watch::channel(FatigueMetrics::default());

        Self {
            shared: Arc::new(EngineShared {
                advisor_cooldown: Duration::from_secs(advisor_config.cooldown_secs),
                advisor_timeout: Duration::from_secs(advisor_config.timeout_secs),
                state: Mutex::new(EngineState {
                    tick: 0,
                    history: VecDeque::with_capacity(config.history_capacity),
                    last_alert: None,
                    last_advisor_call: None,
                    advisor_in_flight: false,
                    rng,
                    latest_insight: None,
                }),
                config,
                source,
                advisor,
                persistence,
                published,
                counters: AdvisorCounters::default(),
            }),
            running: tokio::sync::Mutex::new(None),
        }
    }

    /// Run one evaluation tick and publish the baseline result.
    ///
    /// Advisor enrichment, when due, runs on its own task and never delays
    /// this call.
    pub fn evaluate_once(&self) -> FatigueMetrics {
        self.shared.evaluate_once()
    }

    /// Start the evaluation loop
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AlreadyRunning` if the loop is already active.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(CoreError::AlreadyRunning("fatigue engine"));
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(self.shared.clone(), cancel.clone()));
        *running = Some(Running { cancel, handle });
        log::info!(
            "Fatigue engine started (every {}s)",
            self.shared.config.evaluation_interval_secs
        );
        Ok(())
    }

    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            log::warn!("Fatigue loop ended abnormally: {e}");
        }
        log::info!("Fatigue engine stopped");
    }

    /// Latest published metrics
    #[must_use]
    pub fn current(&self) -> FatigueMetrics {
        self.shared.published.borrow().clone()
    }

    /// Receiver that sees every published metrics record. Slow receivers only
    /// ever miss intermediate values; the engine never waits for them.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FatigueMetrics> {
        self.shared.published.subscribe()
    }

    /// Retained fatigue scores, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<f64> {
        self.shared.state.lock().history.iter().copied().collect()
    }

    /// Most recent well-formed advisor insight
    #[must_use]
    pub fn latest_insight(&self) -> Option<Insight> {
        self.shared.state.lock().latest_insight.clone()
    }

    #[must_use]
    pub fn advisor_stats(&self) -> AdvisorStats {
        self.shared.counters.snapshot()
    }

    #[must_use]
    pub fn has_advisor(&self) -> bool {
        self.shared.advisor.is_some()
    }
}

async fn run_loop(shared: Arc<EngineShared>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(shared.config.evaluation_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let metrics = shared.evaluate_once();
                log::debug!(
                    "Tick {}: fatigue {:.2} ({}), trend {:?}",
                    metrics.tick,
                    metrics.fatigue_score,
                    metrics.level(),
                    metrics.trend
                );
            }
        }
    }
}
