//! Input activity tracking.
//!
//! Platform sources push raw events into a bounded queue; a single consumer
//! task drains it in batches and applies each batch under one short lock.
//! Readers only ever receive copied [`ActivitySample`]s.

use chrono::Utc;
use parking_lot::Mutex;
use restwise_storage::ActivitySample;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::TrackerConfig;
use crate::error::CoreError;
use crate::input::{EventSink, InputEvent, InputSource};

/// Where activity snapshots come from. The fatigue engine only sees this seam.
pub trait ActivitySource: Send + Sync {
    fn snapshot(&self) -> ActivitySample;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerMode {
    Stopped,
    Listening,
    /// The input source failed; only idle time since start is reported
    IdleOnly,
}

impl std::fmt::Display for TrackerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Listening => write!(f, "listening"),
            Self::IdleOnly => write!(f, "idle-only"),
        }
    }
}

struct TrackerState {
    mouse_clicks: u64,
    key_presses: u64,
    last_event: Option<Instant>,
    started_at: Option<Instant>,
    /// Timestamps of counted events, oldest first, at most `saturation_events` long
    window: VecDeque<Instant>,
    mode: TrackerMode,
}

struct TrackerCore {
    config: TrackerConfig,
    state: Mutex<TrackerState>,
}

impl TrackerCore {
    fn apply(&self, state: &mut TrackerState, event: InputEvent, at: Instant) {
        state.last_event = Some(at);
        if !event.is_counted() {
            return;
        }
        if event == InputEvent::KeyPress {
            state.key_presses += 1;
        } else {
            state.mouse_clicks += 1;
        }
        if state.window.len() >= self.config.saturation_events as usize {
            state.window.pop_front();
        }
        state.window.push_back(at);
    }

    fn apply_batch(&self, events: &[InputEvent]) {
        let now = Instant::now();
        let mut state = self.state.lock();
        for event in events {
            self.apply(&mut state, *event, now);
        }
    }

    fn snapshot(&self) -> ActivitySample {
        let now = Instant::now();
        let mut state = self.state.lock();

        let window = self.config.window();
        while state
            .window
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) > window)
        {
            state.window.pop_front();
        }

        let idle = match (state.last_event, state.started_at) {
            (Some(last), _) => now.saturating_duration_since(last),
            (None, Some(started)) => now.saturating_duration_since(started),
            (None, None) => std::time::Duration::ZERO,
        };
        let idle_seconds = if idle < self.config.idle_resolution() {
            0.0
        } else {
            idle.as_secs_f64()
        };

        #[allow(clippy::cast_precision_loss)]
        let activity_level = (100.0 * state.window.len() as f64
            / f64::from(self.config.saturation_events))
        .min(100.0);

        ActivitySample {
            mouse_clicks: state.mouse_clicks,
            key_presses: state.key_presses,
            idle_seconds,
            activity_level,
            captured_at: Utc::now(),
        }
    }
}

struct Running {
    cancel: CancellationToken,
    consumer: JoinHandle<()>,
}

struct Lifecycle {
    source: Box<dyn InputSource>,
    running: Option<Running>,
}

/// Thread-safe counter of input events and idle time
pub struct ActivityTracker {
    core: Arc<TrackerCore>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    dropped: Arc<AtomicU64>,
    idle_only_logged: AtomicBool,
}

impl ActivityTracker {
    #[must_use]
    pub fn new(config: TrackerConfig, source: Box<dyn InputSource>) -> Self {
        Self {
            core: Arc::new(TrackerCore {
                config,
                state: Mutex::new(TrackerState {
                    mouse_clicks: 0,
                    key_presses: 0,
                    last_event: None,
                    started_at: None,
                    window: VecDeque::new(),
                    mode: TrackerMode::Stopped,
                }),
            }),
            lifecycle: tokio::sync::Mutex::new(Lifecycle {
                source,
                running: None,
            }),
            dropped: Arc::new(AtomicU64::new(0)),
            idle_only_logged: AtomicBool::new(false),
        }
    }

    /// Start consuming input events.
    ///
    /// When the source cannot be acquired the tracker still runs in idle-only
    /// mode and the failure is returned so the caller can report it.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AlreadyRunning` if already started and
    /// `CoreError::EventSourceUnavailable` if the input source failed.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.running.is_some() {
            return Err(CoreError::AlreadyRunning("activity tracker"));
        }

        let (sink, rx) = EventSink::channel(self.core.config.queue_capacity, self.dropped.clone());
        let cancel = CancellationToken::new();
        let consumer = tokio::spawn(consume(
            self.core.clone(),
            rx,
            self.core.config.batch_size,
            cancel.clone(),
        ));

        {
            let mut state = self.core.state.lock();
            state.started_at = Some(Instant::now());
            state.mode = TrackerMode::Listening;
        }

        let source_name = lifecycle.source.name();
        let result = lifecycle.source.start(sink).await;
        match &result {
            Ok(()) => log::info!("Activity tracker listening via {source_name}"),
            Err(e) => {
                self.core.state.lock().mode = TrackerMode::IdleOnly;
                if !self.idle_only_logged.swap(true, Ordering::SeqCst) {
                    log::warn!("Input source {source_name} unavailable, tracking idle time only: {e}");
                }
            }
        }

        lifecycle.running = Some(Running { cancel, consumer });
        result
    }

    /// Stop listening and release the input source. Safe to call when stopped.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(running) = lifecycle.running.take() else {
            return;
        };

        lifecycle.source.stop().await;
        running.cancel.cancel();
        if let Err(e) = running.consumer.await {
            log::warn!("Activity consumer ended abnormally: {e}");
        }
        self.core.state.lock().mode = TrackerMode::Stopped;
        log::info!("Activity tracker stopped");
    }

    /// Record a mouse event; clicks count, moves only reset the idle clock
    pub fn on_mouse_event(&self, clicked: bool) {
        self.record(if clicked {
            InputEvent::MouseClick
        } else {
            InputEvent::MouseMove
        });
    }

    pub fn on_key_event(&self) {
        self.record(InputEvent::KeyPress);
    }

    /// Apply one event directly, bypassing the queue
    pub fn record(&self, event: InputEvent) {
        self.core.apply_batch(&[event]);
    }

    #[must_use]
    pub fn snapshot(&self) -> ActivitySample {
        self.core.snapshot()
    }

    #[must_use]
    pub fn mode(&self) -> TrackerMode {
        self.core.state.lock().mode
    }

    /// Events discarded because the input queue was full
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl ActivitySource for ActivityTracker {
    fn snapshot(&self) -> ActivitySample {
        self.core.snapshot()
    }
}

async fn consume(
    core: Arc<TrackerCore>,
    mut rx: mpsc::Receiver<InputEvent>,
    batch_size: usize,
    cancel: CancellationToken,
) {
    let mut batch = Vec::with_capacity(batch_size);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            received = rx.recv_many(&mut batch, batch_size) => {
                if received == 0 {
                    log::debug!("Input queue closed");
                    break;
                }
                core.apply_batch(&batch);
                batch.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests;
