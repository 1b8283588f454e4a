use chrono::Utc;
use parking_lot::Mutex;
use restwise_storage::ComplianceRecord;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::session::{offset, BreakRequest, BreakSession};
use super::state::{BreakState, BreakTransition};
use crate::config::BreakConfig;
use crate::error::CoreError;
use crate::guard::{GuardAction, ScreenGuard};
use crate::notifier::{Notifier, Severity};
use crate::persistence::{self, Persistence};

const TRANSITION_CAPACITY: usize = 64;

struct Runner {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<Option<ComplianceRecord>>,
}

struct Inner {
    session: BreakSession,
    /// Bumped on every request; a runner whose generation is stale has been superseded
    generation: u64,
    runner: Option<Runner>,
}

/// Result of a lock or mute attempt
enum GuardOutcome {
    Applied,
    Failed,
    Cancelled,
}

struct Shared {
    cooldown: Duration,
    tick: Duration,
    guard_timeout: Duration,
    guard: Arc<dyn ScreenGuard>,
    notifier: Arc<dyn Notifier>,
    persistence: Arc<dyn Persistence>,
    inner: Mutex<Inner>,
    transitions: broadcast::Sender<BreakTransition>,
}

impl Shared {
    /// Move the session along a validated edge and broadcast the change.
    /// Returning to `Idle` clears the session.
    fn transition(&self, inner: &mut Inner, to: BreakState) -> bool {
        let from = inner.session.state;
        if !from.can_transition_to(to) {
            log::error!("Rejected break transition {from} -> {to}");
            return false;
        }

        let event = BreakTransition {
            session_id: inner.session.id,
            from,
            to,
            at: Utc::now(),
        };
        if to == BreakState::Idle {
            inner.session = BreakSession::idle();
        } else {
            inner.session.state = to;
        }
        log::debug!("Break {}: {from} -> {to}", event.session_id);
        let _ = self.transitions.send(event);
        true
    }

    fn update_progress(&self, generation: u64, started: Instant, requested: Duration) {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.session.state != BreakState::Enforcing {
            return;
        }
        let elapsed = started.elapsed().min(requested);
        inner.session.elapsed = elapsed;
        inner.session.remaining = requested.saturating_sub(elapsed);
    }

    /// Cancellation while still counting down. A superseded runner does nothing.
    async fn abort_scheduled(&self, generation: u64) -> Option<ComplianceRecord> {
        let owned = {
            let mut inner = self.inner.lock();
            inner.generation == generation
                && inner.session.state == BreakState::Scheduled
                && self.transition(&mut inner, BreakState::Idle)
        };
        if owned {
            if let Err(e) = self.restore_guard().await {
                log::warn!("Guard restore failed: {e}");
            }
            self.notifier.notify("Scheduled break cancelled", Severity::Info);
        }
        None
    }

    fn record_guard_failure(&self, generation: u64, error: &CoreError) {
        log::warn!("Continuing break without guard action: {error}");
        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.session.guard_failures.push(error.to_string());
        }
    }

    /// Run a lock or mute command, giving up at the guard timeout, the end of
    /// the break or cancellation, whichever comes first
    async fn apply_guard(
        &self,
        generation: u64,
        action: GuardAction,
        call: impl Future<Output = Result<(), CoreError>>,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> GuardOutcome {
        let limit = Instant::now()
            .checked_add(self.guard_timeout)
            .map_or(deadline, |t| t.min(deadline));

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return GuardOutcome::Cancelled,
            result = tokio::time::timeout_at(limit, call) => result,
        };
        let error = match result {
            Ok(Ok(())) => return GuardOutcome::Applied,
            Ok(Err(e)) => e,
            Err(_) => CoreError::GuardActionFailed {
                action,
                reason: format!("timed out after {}ms", self.guard_timeout.as_millis()),
            },
        };
        self.record_guard_failure(generation, &error);
        GuardOutcome::Failed
    }

    async fn restore_guard(&self) -> Result<(), CoreError> {
        tokio::time::timeout(self.guard_timeout, self.guard.restore())
            .await
            .unwrap_or_else(|_| {
                Err(CoreError::GuardActionFailed {
                    action: GuardAction::Restore,
                    reason: format!("timed out after {}ms", self.guard_timeout.as_millis()),
                })
            })
    }

    /// Return to `Idle` after a runner died without cleaning up
    fn reset_abandoned(&self, inner: &mut Inner, generation: u64) {
        if inner.generation != generation || inner.session.state == BreakState::Idle {
            return;
        }
        log::warn!(
            "Break {} abandoned in {}, resetting",
            inner.session.id,
            inner.session.state
        );
        self.transition(inner, BreakState::Idle);
    }
}

/// Restores the guard from a spawned task if the runner is dropped mid-break
struct RestoreOnDrop {
    guard: Option<Arc<dyn ScreenGuard>>,
}

impl RestoreOnDrop {
    fn disarm(&mut self) {
        self.guard = None;
    }
}

impl Drop for RestoreOnDrop {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = guard.restore().await {
                    log::warn!("Guard restore after abort failed: {e}");
                }
            });
        }
    }
}

async fn run_session(
    shared: Arc<Shared>,
    generation: u64,
    request: BreakRequest,
    cancel: CancellationToken,
) -> Option<ComplianceRecord> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => return shared.abort_scheduled(generation).await,
        () = tokio::time::sleep(request.lead_time) => {}
    }

    let started = Instant::now();
    let Some(deadline) = started.checked_add(request.duration) else {
        log::error!(
            "Break of {}s cannot be timed, dropping it",
            request.duration.as_secs()
        );
        return shared.abort_scheduled(generation).await;
    };
    let entered = {
        let mut inner = shared.inner.lock();
        if inner.generation != generation || cancel.is_cancelled() {
            false
        } else {
            let now = Utc::now();
            inner.session.started_at = Some(now);
            inner.session.ends_at = offset(now, request.duration);
            inner.session.elapsed = Duration::ZERO;
            inner.session.remaining = request.duration;
            shared.transition(&mut inner, BreakState::Enforcing)
        }
    };
    if !entered {
        return shared.abort_scheduled(generation).await;
    }

    log::info!(
        "Enforcing {} break for {}s",
        request.break_type,
        request.duration.as_secs()
    );
    shared.notifier.notify(
        &format!(
            "Time for a {} break ({}s)",
            request.break_type,
            request.duration.as_secs()
        ),
        Severity::Warning,
    );

    let mut restore = RestoreOnDrop {
        guard: Some(shared.guard.clone()),
    };
    let mut cancelled_early = false;
    if request.lock_screen {
        match shared
            .apply_guard(
                generation,
                GuardAction::Lock,
                shared.guard.lock(),
                deadline,
                &cancel,
            )
            .await
        {
            GuardOutcome::Applied => shared.inner.lock().session.screen_locked = true,
            GuardOutcome::Failed => {}
            GuardOutcome::Cancelled => cancelled_early = true,
        }
    }
    if request.mute_input && !cancelled_early {
        match shared
            .apply_guard(
                generation,
                GuardAction::MuteInput,
                shared.guard.mute_input(),
                deadline,
                &cancel,
            )
            .await
        {
            GuardOutcome::Applied => shared.inner.lock().session.input_muted = true,
            GuardOutcome::Failed => {}
            GuardOutcome::Cancelled => cancelled_early = true,
        }
    }

    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);
    let mut ticker = tokio::time::interval_at(started + shared.tick, shared.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let cancelled = cancelled_early
        || loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break true,
                () = &mut sleep => break false,
                _ = ticker.tick() => shared.update_progress(generation, started, request.duration),
            }
        };

    let elapsed = if cancelled {
        started.elapsed().min(request.duration)
    } else {
        request.duration
    };

    restore.disarm();
    if let Err(e) = shared.restore_guard().await {
        shared.record_guard_failure(generation, &e);
    }

    let record = {
        let mut inner = shared.inner.lock();
        inner.session.elapsed = elapsed;
        inner.session.remaining = request.duration.saturating_sub(elapsed);
        inner.session.screen_locked = false;
        inner.session.input_muted = false;
        let record = inner.session.compliance_record(cancelled, Utc::now());
        let next = if cancelled {
            BreakState::Idle
        } else {
            BreakState::Cooldown
        };
        shared.transition(&mut inner, next);
        record
    };

    persistence::report("break record", shared.persistence.record_break(&record));
    if cancelled {
        shared.notifier.notify(
            &format!(
                "Break cancelled after {}s of {}s",
                elapsed.as_secs(),
                request.duration.as_secs()
            ),
            Severity::Info,
        );
        return Some(record);
    }
    shared
        .notifier
        .notify("Break complete, welcome back", Severity::Info);

    tokio::select! {
        biased;
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(shared.cooldown) => {}
    }

    {
        let mut inner = shared.inner.lock();
        if inner.generation == generation && inner.session.state == BreakState::Cooldown {
            shared.transition(&mut inner, BreakState::Idle);
        }
        if inner
            .runner
            .as_ref()
            .is_some_and(|r| r.generation == generation)
        {
            inner.runner = None;
        }
    }
    Some(record)
}

/// Owns the break session and drives it through the state machine
pub struct BreakCoordinator {
    shared: Arc<Shared>,
}

impl BreakCoordinator {
    #[must_use]
    pub fn new(
        config: &BreakConfig,
        guard: Arc<dyn ScreenGuard>,
        notifier: Arc<dyn Notifier>,
        persistence: Arc<dyn Persistence>,
    ) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                cooldown: config.cooldown(),
                tick: config
                    .tick()
                    .clamp(Duration::from_millis(1), Duration::from_secs(3600)),
                guard_timeout: config.guard_timeout().max(Duration::from_millis(1)),
                guard,
                notifier,
                persistence,
                inner: Mutex::new(Inner {
                    session: BreakSession::idle(),
                    generation: 0,
                    runner: None,
                }),
                transitions,
            }),
        }
    }

    /// Schedule a break. A pending scheduled break is replaced.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::SessionAlreadyActive` while enforcing,
    /// `CoreError::InvalidTransition` during cooldown and
    /// `CoreError::InvalidBreakRequest` for a zero or oversized duration or
    /// when called outside a Tokio runtime.
    pub fn request_break(&self, request: BreakRequest) -> Result<BreakSession, CoreError> {
        request.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            CoreError::InvalidBreakRequest("no async runtime to run the break".to_string())
        })?;

        let mut inner = self.shared.inner.lock();
        if inner
            .runner
            .as_ref()
            .is_some_and(|r| r.handle.is_finished())
        {
            if let Some(dead) = inner.runner.take() {
                self.shared.reset_abandoned(&mut inner, dead.generation);
            }
        }
        match inner.session.state {
            BreakState::Enforcing => return Err(CoreError::SessionAlreadyActive),
            BreakState::Cooldown => {
                return Err(CoreError::InvalidTransition {
                    from: BreakState::Cooldown,
                    action: "request a break",
                })
            }
            BreakState::Scheduled => {
                if let Some(old) = inner.runner.take() {
                    old.cancel.cancel();
                }
                log::info!("Replacing scheduled break {}", inner.session.id);
                self.shared.transition(&mut inner, BreakState::Idle);
            }
            BreakState::Idle => {}
        }

        inner.generation += 1;
        let generation = inner.generation;
        inner.session = BreakSession::from_request(&request, Utc::now());
        self.shared.transition(&mut inner, BreakState::Scheduled);
        log::info!(
            "Scheduled {} break of {}s in {}s ({})",
            request.break_type,
            request.duration.as_secs(),
            request.lead_time.as_secs(),
            request.trigger
        );

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run_session(
            self.shared.clone(),
            generation,
            request,
            cancel.clone(),
        ));
        inner.runner = Some(Runner {
            generation,
            cancel,
            handle,
        });
        Ok(inner.session.clone())
    }

    /// Cancel a scheduled or enforcing break and wait for cleanup.
    ///
    /// Returns the compliance record when enforcement had started.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTransition` when idle or cooling down.
    pub async fn cancel(&self) -> Result<Option<ComplianceRecord>, CoreError> {
        let runner = {
            let mut inner = self.shared.inner.lock();
            let state = inner.session.state;
            if !state.is_active() {
                return Err(CoreError::InvalidTransition {
                    from: state,
                    action: "cancel a break",
                });
            }
            inner.runner.take()
        };

        let Some(runner) = runner else {
            return Ok(None);
        };
        Ok(self.finish(runner).await)
    }

    /// Stop any runner, including one in cooldown, and wait for it
    pub async fn shutdown(&self) {
        let runner = self.shared.inner.lock().runner.take();
        if let Some(runner) = runner {
            self.finish(runner).await;
        }
        let mut inner = self.shared.inner.lock();
        if inner.session.state != BreakState::Idle {
            log::warn!("Break session left in {} at shutdown", inner.session.state);
            inner.session = BreakSession::idle();
        }
    }

    async fn finish(&self, runner: Runner) -> Option<ComplianceRecord> {
        runner.cancel.cancel();
        match runner.handle.await {
            Ok(record) => record,
            Err(e) => {
                log::error!("Break runner ended abnormally: {e}");
                let mut inner = self.shared.inner.lock();
                self.shared.reset_abandoned(&mut inner, runner.generation);
                None
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> BreakSession {
        self.shared.inner.lock().session.clone()
    }

    #[must_use]
    pub fn state(&self) -> BreakState {
        self.shared.inner.lock().session.state
    }

    #[must_use]
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<BreakTransition> {
        self.shared.transitions.subscribe()
    }
}
