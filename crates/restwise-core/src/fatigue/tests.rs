use super::*;
use crate::config::FatigueConfig;
use crate::error::CoreError;
use crate::test_support::{settle, AdvisorScript, FixedSource, RecordingSink, ScriptedAdvisor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use restwise_ai::{AdvisorConfig, AiAdvisor, BreakUrgency, Insight, Parsed, PartialFields};
use restwise_storage::{
    ActivitySample, BreakType, FacialExpression, FatigueLevel, MetricsSource, Trend,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

fn build(
    source: Arc<FixedSource>,
    advisor: Option<Arc<ScriptedAdvisor>>,
    sink: Arc<RecordingSink>,
) -> FatigueEngine {
    let config = FatigueConfig {
        seed: Some(42),
        ..FatigueConfig::default()
    };
    let advisor = advisor.map(|a| a as Arc<dyn AiAdvisor>);
    FatigueEngine::new(config, &AdvisorConfig::default(), source, advisor, sink)
}

fn insight(urgency: BreakUrgency) -> Insight {
    Insight {
        fatigue_level: FatigueLevel::High,
        break_urgency: urgency,
        break_duration: 5,
        break_type: BreakType::Micro,
        primary_factors: vec!["long session".to_string()],
        recommendations: Vec::new(),
    }
}

// ============================================================================
// Baseline
// ============================================================================

#[test]
fn test_active_user_is_focused_with_low_score() {
    let engine = build(FixedSource::new(0.0, 80.0), None, RecordingSink::new());
    let metrics = engine.evaluate_once();

    assert!((0.1..=0.3).contains(&metrics.fatigue_score));
    assert_eq!(metrics.facial_expression, FacialExpression::Focused);
    assert_eq!(metrics.source, MetricsSource::Baseline);
    assert_eq!(metrics.tick, 1);
}

#[test]
fn test_long_idle_is_tired() {
    let engine = build(FixedSource::new(400.0, 0.0), None, RecordingSink::new());
    let metrics = engine.evaluate_once();

    assert!((metrics.fatigue_score - 0.8).abs() < f64::EPSILON);
    assert_eq!(metrics.facial_expression, FacialExpression::Tired);
    assert!(metrics.eye_strain_level >= 90.0);
    assert_eq!(metrics.level(), FatigueLevel::Critical);
}

#[test]
fn test_idle_and_low_activity_thresholds() {
    let config = FatigueConfig::default();
    let cases = [
        (45.0, 50.0, 0.4),
        (60.0, 50.0, 0.4),
        (120.0, 50.0, 0.6),
        (300.0, 50.0, 0.6),
        (301.0, 50.0, 0.8),
        (10.0, 2.0, 0.5),
        (0.0, 100.0, 0.1),
        (0.0, 5.0, 0.29),
    ];
    for (idle, activity, expected) in cases {
        let score = baseline::fatigue_score(idle, activity, &config);
        assert!(
            (score - expected).abs() < 1e-9,
            "idle {idle}, activity {activity}: {score} != {expected}"
        );
    }
}

#[test]
fn test_baseline_outputs_stay_bounded() {
    let config = FatigueConfig::default();
    let mut rng = StdRng::seed_from_u64(1);
    let idles = [
        -5.0,
        0.0,
        29.9,
        30.0,
        45.0,
        61.0,
        301.0,
        1e9,
        f64::INFINITY,
        f64::NAN,
    ];
    let activities = [-10.0, 0.0, 4.9, 5.0, 50.0, 100.0, 250.0, f64::NAN];

    for idle in idles {
        for activity in activities {
            let base = baseline::compute(&ActivitySample::new(idle, activity), &config, &mut rng);
            assert!((0.0..=1.0).contains(&base.fatigue_score), "{idle}/{activity}");
            assert!((0.0..=100.0).contains(&base.eye_strain_level), "{idle}/{activity}");
            assert!((0.0..=1.0).contains(&base.posture_score), "{idle}/{activity}");
            assert!((8.0..=30.0).contains(&base.blink_rate), "{idle}/{activity}");
        }
    }
}

#[test]
fn test_posture_degrades_with_idle() {
    let config = FatigueConfig::default();
    assert!((baseline::posture(0.0, 100.0, &config) - 1.0).abs() < 1e-9);
    assert!((baseline::posture(120.0, 0.0, &config) - 0.8).abs() < 1e-9);
    assert!((baseline::posture(3000.0, 0.0, &config) - 0.5).abs() < 1e-9);
}

#[test]
fn test_seeded_engines_agree() {
    let a = build(FixedSource::new(0.0, 40.0), None, RecordingSink::new());
    let b = build(FixedSource::new(0.0, 40.0), None, RecordingSink::new());

    let blinks_a: Vec<f64> = (0..5).map(|_| a.evaluate_once().blink_rate).collect();
    let blinks_b: Vec<f64> = (0..5).map(|_| b.evaluate_once().blink_rate).collect();
    assert_eq!(blinks_a, blinks_b);
}

// ============================================================================
// Trend and history
// ============================================================================

#[test]
fn test_trend_windows() {
    let constant: VecDeque<f64> = std::iter::repeat(0.4).take(10).collect();
    assert_eq!(trend::compute_trend(&constant, 5, 0.05), Trend::Stable);

    let rising: VecDeque<f64> = [0.1; 5].into_iter().chain([0.5; 5]).collect();
    assert_eq!(trend::compute_trend(&rising, 5, 0.05), Trend::Increasing);

    let falling: VecDeque<f64> = rising.iter().rev().copied().collect();
    assert_eq!(trend::compute_trend(&falling, 5, 0.05), Trend::Decreasing);

    let within_epsilon: VecDeque<f64> = VecDeque::from(vec![0.50, 0.52]);
    assert_eq!(trend::compute_trend(&within_epsilon, 5, 0.05), Trend::Stable);
}

#[test]
fn test_trend_short_history_shrinks_window() {
    assert_eq!(trend::compute_trend(&VecDeque::new(), 5, 0.05), Trend::Stable);
    assert_eq!(
        trend::compute_trend(&VecDeque::from(vec![0.9]), 5, 0.05),
        Trend::Stable
    );
    assert_eq!(
        trend::compute_trend(&VecDeque::from(vec![0.1, 0.1, 0.9]), 5, 0.05),
        Trend::Increasing
    );
}

#[test]
fn test_history_is_capped() {
    let engine = build(FixedSource::new(0.0, 50.0), None, RecordingSink::new());
    for _ in 0..40 {
        engine.evaluate_once();
    }
    assert_eq!(engine.history().len(), 30);
    assert_eq!(engine.current().tick, 40);
    assert_eq!(engine.current().trend, Trend::Stable);
}

#[test]
fn test_rising_idle_reports_increasing_trend() {
    let source = FixedSource::new(0.0, 80.0);
    let engine = build(source.clone(), None, RecordingSink::new());
    for _ in 0..5 {
        engine.evaluate_once();
    }
    source.set(400.0, 0.0);
    let mut last = engine.evaluate_once();
    for _ in 0..4 {
        last = engine.evaluate_once();
    }
    assert_eq!(last.trend, Trend::Increasing);
}

// ============================================================================
// Alerts
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_alert_respects_cooldown() {
    let engine = build(FixedSource::new(400.0, 0.0), None, RecordingSink::new());

    assert!(engine.evaluate_once().alert_generated);
    assert!(!engine.evaluate_once().alert_generated);

    tokio::time::advance(Duration::from_secs(301)).await;
    assert!(engine.evaluate_once().alert_generated);
}

#[test]
fn test_alert_at_threshold_and_not_below() {
    let source = FixedSource::new(0.0, 80.0);
    let engine = build(source.clone(), None, RecordingSink::new());
    assert!(!engine.evaluate_once().alert_generated);

    source.set(120.0, 0.0);
    assert!(engine.evaluate_once().alert_generated);
}

// ============================================================================
// Advisor enrichment
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_well_formed_insight_is_merged() {
    let advisor = ScriptedAdvisor::new(AdvisorScript::Reply(Parsed::WellFormed(insight(
        BreakUrgency::Immediate,
    ))));
    let sink = RecordingSink::new();
    let engine = build(FixedSource::new(0.0, 80.0), Some(advisor.clone()), sink.clone());

    let baseline = engine.evaluate_once();
    assert_eq!(baseline.source, MetricsSource::Baseline);
    settle().await;

    let merged = engine.current();
    assert_eq!(merged.tick, baseline.tick);
    assert!((merged.fatigue_score - 0.9).abs() < f64::EPSILON);
    assert_eq!(merged.source, MetricsSource::Enriched);
    assert_eq!(merged.facial_expression, FacialExpression::Tired);
    assert!(merged.alert_generated);
    assert!((engine.history().last().copied().unwrap_or_default() - 0.9).abs() < f64::EPSILON);
    assert!(engine.latest_insight().is_some());

    let stats = engine.advisor_stats();
    assert_eq!(stats.calls, 1);
    assert_eq!(stats.well_formed, 1);
    assert_eq!(advisor.calls(), 1);

    assert_eq!(sink.activity.lock().len(), 1);
    let persisted = sink.fatigue.lock().clone();
    assert_eq!(persisted.len(), 2);
    assert_eq!(persisted[1].source, MetricsSource::Enriched);
}

#[tokio::test(start_paused = true)]
async fn test_soon_urgency_raises_score_floor() {
    let advisor =
        ScriptedAdvisor::new(AdvisorScript::Reply(Parsed::WellFormed(insight(BreakUrgency::Soon))));
    let engine = build(FixedSource::new(0.0, 80.0), Some(advisor), RecordingSink::new());

    engine.evaluate_once();
    settle().await;
    assert!((engine.current().fatigue_score - 0.75).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn test_degraded_replies_keep_baseline() {
    let mut fields = PartialFields::new();
    fields.insert("FATIGUE_LEVEL".to_string(), "high".to_string());

    for (script, expect_partial) in [
        (AdvisorScript::Reply(Parsed::PartiallyParsed(fields)), true),
        (AdvisorScript::Reply(Parsed::Unusable), false),
    ] {
        let engine = build(
            FixedSource::new(0.0, 80.0),
            Some(ScriptedAdvisor::new(script)),
            RecordingSink::new(),
        );
        let baseline = engine.evaluate_once();
        settle().await;

        assert_eq!(engine.current(), baseline);
        assert!(engine.latest_insight().is_none());
        let stats = engine.advisor_stats();
        assert_eq!(stats.partial, u64::from(expect_partial));
        assert_eq!(stats.unusable, u64::from(!expect_partial));
    }
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_advisor_keeps_baseline() {
    let engine = build(
        FixedSource::new(0.0, 80.0),
        Some(ScriptedAdvisor::new(AdvisorScript::Fail)),
        RecordingSink::new(),
    );
    let baseline = engine.evaluate_once();
    settle().await;

    assert_eq!(engine.current(), baseline);
    assert_eq!(engine.advisor_stats().unavailable, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_insight_is_not_published() {
    let advisor = ScriptedAdvisor::delayed(
        AdvisorScript::Reply(Parsed::WellFormed(insight(BreakUrgency::Immediate))),
        Duration::from_secs(5),
    );
    let engine = build(FixedSource::new(0.0, 80.0), Some(advisor.clone()), RecordingSink::new());

    engine.evaluate_once();
    settle().await;
    let second = engine.evaluate_once();
    assert_eq!(advisor.calls(), 1);

    tokio::time::sleep(Duration::from_secs(6)).await;
    settle().await;

    assert_eq!(engine.current(), second);
    assert_eq!(engine.current().source, MetricsSource::Baseline);
    assert_eq!(engine.advisor_stats().well_formed, 1);
    assert!(engine.latest_insight().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_advisor_calls_are_rate_limited() {
    let advisor = ScriptedAdvisor::new(AdvisorScript::Reply(Parsed::Unusable));
    let engine = build(FixedSource::new(0.0, 80.0), Some(advisor.clone()), RecordingSink::new());

    for _ in 0..3 {
        engine.evaluate_once();
        settle().await;
    }
    assert_eq!(advisor.calls(), 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    engine.evaluate_once();
    settle().await;
    assert_eq!(advisor.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_advisor_never_stalls_ticks() {
    let advisor = ScriptedAdvisor::new(AdvisorScript::Hang);
    let engine = build(FixedSource::new(0.0, 50.0), Some(advisor), RecordingSink::new());
    engine.start().await.unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    let mut last_tick = engine.current().tick;
    assert_eq!(last_tick, 1);
    for _ in 0..12 {
        tokio::time::sleep(Duration::from_secs(10)).await;
        let current = engine.current();
        assert_eq!(current.tick, last_tick + 1);
        assert_eq!(current.source, MetricsSource::Baseline);
        last_tick = current.tick;
    }
    engine.stop().await;

    let stats = engine.advisor_stats();
    assert!(stats.timeouts >= 2);
    assert_eq!(stats.well_formed, 0);
}

// ============================================================================
// Lifecycle and persistence
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_twice_is_rejected() {
    let engine = build(FixedSource::new(0.0, 50.0), None, RecordingSink::new());
    engine.start().await.unwrap();

    let err = engine.start().await.unwrap_err();
    assert!(matches!(err, CoreError::AlreadyRunning(_)));

    engine.stop().await;
    engine.stop().await;
    engine.start().await.unwrap();
    engine.stop().await;
}

#[test]
fn test_every_tick_is_persisted() {
    let sink = RecordingSink::new();
    let engine = build(FixedSource::new(0.0, 50.0), None, sink.clone());
    for _ in 0..3 {
        engine.evaluate_once();
    }
    assert_eq!(sink.activity.lock().len(), 3);
    assert_eq!(sink.fatigue.lock().len(), 3);
}

#[test]
fn test_persistence_failures_do_not_stop_ticks() {
    let engine = build(FixedSource::new(0.0, 50.0), None, RecordingSink::failing());
    engine.evaluate_once();
    assert_eq!(engine.evaluate_once().tick, 2);
}

#[test]
fn test_subscribers_see_published_metrics() {
    let engine = build(FixedSource::new(0.0, 50.0), None, RecordingSink::new());
    let mut rx = engine.subscribe();
    assert_eq!(engine.current().tick, 0);

    engine.evaluate_once();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().tick, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_while_evaluating() {
    let engine = Arc::new(build(FixedSource::new(10.0, 30.0), None, RecordingSink::new()));

    let writer = {
        let engine = engine.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                engine.evaluate_once();
                tokio::task::yield_now().await;
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let mut last = 0;
                for _ in 0..200 {
                    let metrics = engine.current();
                    assert!(metrics.tick >= last);
                    assert!((0.0..=1.0).contains(&metrics.fatigue_score));
                    last = metrics.tick;
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(engine.current().tick, 200);
}
