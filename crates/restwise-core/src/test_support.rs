//! Fakes shared by the component tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use restwise_ai::{AdvisorError, AiAdvisor, Insight, Parsed, Recommendation, UserProfile};
use restwise_storage::{ActivitySample, ComplianceRecord, FatigueMetrics};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::activity::ActivitySource;
use crate::error::CoreError;
use crate::guard::{GuardAction, ScreenGuard};
use crate::input::{EventSink, InputEvent, InputSource};
use crate::notifier::{Notifier, Severity};
use crate::persistence::Persistence;

/// Activity source returning whatever sample was last set
pub struct FixedSource {
    sample: Mutex<ActivitySample>,
}

impl FixedSource {
    pub fn new(idle_seconds: f64, activity_level: f64) -> Arc<Self> {
        Arc::new(Self {
            sample: Mutex::new(ActivitySample::new(idle_seconds, activity_level)),
        })
    }

    pub fn set(&self, idle_seconds: f64, activity_level: f64) {
        *self.sample.lock() = ActivitySample::new(idle_seconds, activity_level);
    }
}

impl ActivitySource for FixedSource {
    fn snapshot(&self) -> ActivitySample {
        self.sample.lock().clone()
    }
}

/// Input source that pushes a fixed batch of events on start
pub struct ScriptedInput {
    pub events: Vec<InputEvent>,
    pub fail: bool,
    pub stopped: Arc<AtomicBool>,
}

impl ScriptedInput {
    pub fn new(events: Vec<InputEvent>) -> Self {
        Self {
            events,
            fail: false,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn start(&mut self, sink: EventSink) -> Result<(), CoreError> {
        if self.fail {
            return Err(CoreError::EventSourceUnavailable(
                "permission denied".to_string(),
            ));
        }
        for event in &self.events {
            sink.push(*event);
        }
        Ok(())
    }

    async fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// What `CountingGuard::lock` does after counting the call
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub enum LockBehavior {
    #[default]
    Succeed,
    Fail,
    /// Never returns, like a wedged `loginctl`
    Hang,
    Panic,
}

/// Guard that counts calls and can be told to misbehave on lock
#[derive(Default)]
pub struct CountingGuard {
    pub locks: AtomicUsize,
    pub mutes: AtomicUsize,
    pub unlocks: AtomicUsize,
    pub restores: AtomicUsize,
    pub lock_behavior: LockBehavior,
}

impl CountingGuard {
    pub fn new() -> Arc<Self> {
        Self::with_lock(LockBehavior::Succeed)
    }

    pub fn failing() -> Arc<Self> {
        Self::with_lock(LockBehavior::Fail)
    }

    pub fn with_lock(lock_behavior: LockBehavior) -> Arc<Self> {
        Arc::new(Self {
            lock_behavior,
            ..Self::default()
        })
    }

    pub fn restores(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenGuard for CountingGuard {
    async fn lock(&self) -> Result<(), CoreError> {
        self.locks.fetch_add(1, Ordering::SeqCst);
        match self.lock_behavior {
            LockBehavior::Succeed => Ok(()),
            LockBehavior::Fail => Err(CoreError::GuardActionFailed {
                action: GuardAction::Lock,
                reason: "no session bus".to_string(),
            }),
            LockBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            LockBehavior::Panic => panic!("lock helper crashed"),
        }
    }

    async fn unlock(&self) -> Result<(), CoreError> {
        self.unlocks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn mute_input(&self) -> Result<(), CoreError> {
        self.mutes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn restore(&self) -> Result<(), CoreError> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Notifier that keeps every message
#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(Severity, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.messages.lock().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        self.messages.lock().push((severity, message.to_string()));
    }
}

/// Persistence sink that keeps everything in memory
#[derive(Default)]
pub struct RecordingSink {
    pub activity: Mutex<Vec<ActivitySample>>,
    pub fatigue: Mutex<Vec<FatigueMetrics>>,
    pub breaks: Mutex<Vec<ComplianceRecord>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn breaks(&self) -> Vec<ComplianceRecord> {
        self.breaks.lock().clone()
    }
}

impl Persistence for RecordingSink {
    fn record_activity(&self, sample: &ActivitySample) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("disk full");
        }
        self.activity.lock().push(sample.clone());
        Ok(())
    }

    fn record_fatigue(&self, metrics: &FatigueMetrics) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("disk full");
        }
        self.fatigue.lock().push(metrics.clone());
        Ok(())
    }

    fn record_break(&self, record: &ComplianceRecord) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("disk full");
        }
        self.breaks.lock().push(record.clone());
        Ok(())
    }

    fn prune_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<usize> {
        if self.fail {
            anyhow::bail!("disk full");
        }
        let mut activity = self.activity.lock();
        let mut fatigue = self.fatigue.lock();
        let before = activity.len() + fatigue.len();
        activity.retain(|s| s.captured_at >= cutoff);
        fatigue.retain(|m| m.computed_at >= cutoff);
        Ok(before - activity.len() - fatigue.len())
    }
}

/// What a scripted advisor does when asked for a fatigue analysis
#[derive(Clone)]
pub enum AdvisorScript {
    Reply(Parsed<Insight>),
    Fail,
    Hang,
}

/// Advisor with a canned behavior and an optional delay
pub struct ScriptedAdvisor {
    script: AdvisorScript,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl ScriptedAdvisor {
    pub fn new(script: AdvisorScript) -> Arc<Self> {
        Self::delayed(script, Duration::ZERO)
    }

    pub fn delayed(script: AdvisorScript, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiAdvisor for ScriptedAdvisor {
    async fn analyze_fatigue(
        &self,
        _sample: &ActivitySample,
        _metrics: &FatigueMetrics,
    ) -> Result<Parsed<Insight>, AdvisorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.script {
            AdvisorScript::Reply(parsed) => Ok(parsed.clone()),
            AdvisorScript::Fail => Err(AdvisorError::Unavailable("HTTP 502".to_string())),
            AdvisorScript::Hang => {
                std::future::pending::<()>().await;
                Ok(Parsed::Unusable)
            }
        }
    }

    async fn recommend(
        &self,
        _profile: &UserProfile,
        _recent: &[String],
    ) -> Result<Parsed<Recommendation>, AdvisorError> {
        Ok(Parsed::Unusable)
    }
}

/// Let spawned tasks run without moving a paused clock
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
