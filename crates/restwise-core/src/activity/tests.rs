use super::*;
use crate::test_support::{settle, ScriptedInput};
use std::time::Duration;

fn tracker_with(source: ScriptedInput) -> ActivityTracker {
    ActivityTracker::new(TrackerConfig::default(), Box::new(source))
}

// ============================================================================
// Idle time
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_grows_until_next_event() {
    let tracker = tracker_with(ScriptedInput::new(Vec::new()));
    tracker.start().await.unwrap();

    tokio::time::advance(Duration::from_secs(5)).await;
    let first = tracker.snapshot().idle_seconds;
    assert!((first - 5.0).abs() < 0.01);

    tokio::time::advance(Duration::from_secs(3)).await;
    let second = tracker.snapshot().idle_seconds;
    assert!(second >= first);
    assert!((second - 8.0).abs() < 0.01);

    tracker.on_key_event();
    assert!(tracker.snapshot().idle_seconds.abs() < f64::EPSILON);

    tracker.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_idle_below_resolution_reports_zero() {
    let tracker = tracker_with(ScriptedInput::new(Vec::new()));
    tracker.start().await.unwrap();
    tracker.on_mouse_event(false);

    tokio::time::advance(Duration::from_millis(400)).await;
    assert!(tracker.snapshot().idle_seconds.abs() < f64::EPSILON);

    tokio::time::advance(Duration::from_millis(1600)).await;
    assert!((tracker.snapshot().idle_seconds - 2.0).abs() < 0.01);
}

#[test]
fn test_snapshot_before_start_is_zeroed() {
    let tracker = tracker_with(ScriptedInput::new(Vec::new()));
    let sample = tracker.snapshot();
    assert_eq!(sample.total_events(), 0);
    assert!(sample.idle_seconds.abs() < f64::EPSILON);
    assert_eq!(tracker.mode(), TrackerMode::Stopped);
}

// ============================================================================
// Counting and activity level
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_moves_reset_idle_but_are_not_counted() {
    let tracker = tracker_with(ScriptedInput::new(Vec::new()));
    tracker.start().await.unwrap();

    for _ in 0..3 {
        tracker.on_mouse_event(false);
    }
    tracker.record(InputEvent::MouseScroll);
    tracker.on_mouse_event(true);
    tracker.on_key_event();

    let sample = tracker.snapshot();
    assert_eq!(sample.mouse_clicks, 1);
    assert_eq!(sample.key_presses, 1);
    assert!((sample.activity_level - 1.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_window_prunes_old_events() {
    let tracker = tracker_with(ScriptedInput::new(Vec::new()));
    tracker.start().await.unwrap();

    for _ in 0..10 {
        tracker.on_mouse_event(true);
    }
    assert!((tracker.snapshot().activity_level - 5.0).abs() < 1e-9);

    tokio::time::advance(Duration::from_secs(61)).await;
    let sample = tracker.snapshot();
    assert!(sample.activity_level.abs() < f64::EPSILON);
    // Totals are lifetime counters, only the window forgets
    assert_eq!(sample.mouse_clicks, 10);
}

#[tokio::test(start_paused = true)]
async fn test_activity_level_saturates() {
    let tracker = tracker_with(ScriptedInput::new(Vec::new()));
    tracker.start().await.unwrap();

    for _ in 0..300 {
        tracker.on_mouse_event(true);
    }
    let sample = tracker.snapshot();
    assert!((sample.activity_level - 100.0).abs() < f64::EPSILON);
    assert_eq!(sample.mouse_clicks, 300);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_failing_source_degrades_to_idle_only() {
    let tracker = tracker_with(ScriptedInput::failing());

    let err = tracker.start().await.unwrap_err();
    assert!(matches!(err, CoreError::EventSourceUnavailable(_)));
    assert_eq!(tracker.mode(), TrackerMode::IdleOnly);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!((tracker.snapshot().idle_seconds - 30.0).abs() < 0.01);

    let err = tracker.start().await.unwrap_err();
    assert!(matches!(err, CoreError::AlreadyRunning(_)));

    tracker.stop().await;
    assert_eq!(tracker.mode(), TrackerMode::Stopped);
}

#[tokio::test]
async fn test_stop_is_idempotent_and_releases_source() {
    let source = ScriptedInput::new(Vec::new());
    let stopped = source.stopped.clone();
    let tracker = tracker_with(source);

    tracker.stop().await;
    assert!(!stopped.load(Ordering::SeqCst));

    tracker.start().await.unwrap();
    assert_eq!(tracker.mode(), TrackerMode::Listening);
    tracker.stop().await;
    tracker.stop().await;
    assert!(stopped.load(Ordering::SeqCst));
    assert_eq!(tracker.mode(), TrackerMode::Stopped);
}

// ============================================================================
// Queue
// ============================================================================

#[tokio::test]
async fn test_burst_overflows_queue_and_counts_drops() {
    let tracker = tracker_with(ScriptedInput::new(vec![InputEvent::KeyPress; 2000]));
    tracker.start().await.unwrap();
    settle().await;

    assert_eq!(tracker.dropped_events(), 976);
    let sample = tracker.snapshot();
    assert_eq!(sample.key_presses, 1024);
    assert!((sample.activity_level - 100.0).abs() < f64::EPSILON);

    tracker.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_events_and_snapshots() {
    let tracker = Arc::new(tracker_with(ScriptedInput::new(Vec::new())));
    tracker.start().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..100 {
                tracker.on_mouse_event(i % 2 == 0);
                let sample = ActivitySource::snapshot(tracker.as_ref());
                assert!(sample.activity_level <= 100.0);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let sample = tracker.snapshot();
    assert_eq!(sample.mouse_clicks, 400);
    assert_eq!(sample.key_presses, 0);
    tracker.stop().await;
}
