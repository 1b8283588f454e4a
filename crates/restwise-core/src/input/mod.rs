use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::CoreError;

#[cfg(target_os = "linux")]
pub mod linux;

/// Raw input observed by a platform source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    MouseClick,
    MouseMove,
    MouseScroll,
    KeyPress,
}

impl InputEvent {
    /// Whether the event counts toward clicks, key presses and the activity window.
    /// Moves and scrolls only reset the idle clock.
    #[must_use]
    pub const fn is_counted(self) -> bool {
        matches!(self, Self::MouseClick | Self::KeyPress)
    }
}

/// Producer half of the bounded input queue.
///
/// `push` never blocks: when the queue is full the event is dropped and
/// counted, so a slow consumer can never stall a platform callback.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<InputEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    /// Create a queue of `capacity` events; drops are added to `dropped`
    #[must_use]
    pub fn channel(
        capacity: usize,
        dropped: Arc<AtomicU64>,
    ) -> (Self, mpsc::Receiver<InputEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, dropped }, rx)
    }

    /// Enqueue an event. Returns false if it was dropped.
    pub fn push(&self, event: InputEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// True once the consumer has gone away
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Platform event source feeding the activity tracker
#[async_trait]
pub trait InputSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Acquire the underlying devices and start forwarding events into `sink`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::EventSourceUnavailable` if no device can be opened.
    async fn start(&mut self, sink: EventSink) -> Result<(), CoreError>;

    /// Release devices. Safe to call when not started.
    async fn stop(&mut self);
}

/// Source used where no capture backend exists; forces idle-only tracking
pub struct UnavailableSource {
    reason: String,
}

impl UnavailableSource {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl InputSource for UnavailableSource {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn start(&mut self, _sink: EventSink) -> Result<(), CoreError> {
        Err(CoreError::EventSourceUnavailable(self.reason.clone()))
    }

    async fn stop(&mut self) {}
}

/// Create the input source for the current platform
#[must_use]
pub fn create_input_source() -> Box<dyn InputSource> {
    #[cfg(target_os = "linux")]
    {
        Box::new(linux::EvdevSource::new("/dev/input"))
    }

    #[cfg(not(target_os = "linux"))]
    {
        Box::new(UnavailableSource::new(
            "no input capture backend for this platform",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counted_events() {
        assert!(InputEvent::MouseClick.is_counted());
        assert!(InputEvent::KeyPress.is_counted());
        assert!(!InputEvent::MouseMove.is_counted());
        assert!(!InputEvent::MouseScroll.is_counted());
    }

    #[tokio::test]
    async fn test_full_queue_drops_and_counts() {
        let dropped = Arc::new(AtomicU64::new(0));
        let (sink, mut rx) = EventSink::channel(2, dropped.clone());

        assert!(sink.push(InputEvent::KeyPress));
        assert!(sink.push(InputEvent::MouseClick));
        assert!(!sink.push(InputEvent::KeyPress));
        assert_eq!(dropped.load(Ordering::Relaxed), 1);

        assert_eq!(rx.recv().await, Some(InputEvent::KeyPress));
        assert!(sink.push(InputEvent::MouseMove));
    }

    #[tokio::test]
    async fn test_closed_queue_is_not_a_drop() {
        let dropped = Arc::new(AtomicU64::new(0));
        let (sink, rx) = EventSink::channel(4, dropped.clone());
        drop(rx);

        assert!(sink.is_closed());
        assert!(!sink.push(InputEvent::KeyPress));
        assert_eq!(dropped.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_unavailable_source_fails_to_start() {
        let dropped = Arc::new(AtomicU64::new(0));
        let (sink, _rx) = EventSink::channel(4, dropped);
        let mut source = UnavailableSource::new("denied");
        let err = source.start(sink).await.unwrap_err();
        assert!(matches!(err, CoreError::EventSourceUnavailable(msg) if msg == "denied"));
    }
}
