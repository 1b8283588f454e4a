//! Deterministic fatigue heuristics. Everything here is reproducible given the
//! same sample, configuration and RNG state.

use rand::Rng;
use restwise_storage::{ActivitySample, FacialExpression};

use crate::config::FatigueConfig;

const BASE_BLINK_RATE: f64 = 18.0;
const BLINK_SCORE_OFFSET: f64 = 5.0;
const BLINK_MIN: f64 = 8.0;
const BLINK_MAX: f64 = 30.0;
/// Idle seconds at which posture bottoms out
const POSTURE_IDLE_SPAN: f64 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub fatigue_score: f64,
    pub eye_strain_level: f64,
    pub posture_score: f64,
    pub blink_rate: f64,
    pub facial_expression: FacialExpression,
}

/// Idle seconds and activity level with NaN and out-of-range values folded in
fn sanitize(sample: &ActivitySample) -> (f64, f64) {
    let idle = if sample.idle_seconds.is_nan() {
        0.0
    } else {
        sample.idle_seconds.max(0.0)
    };
    let activity = if sample.activity_level.is_nan() {
        0.0
    } else {
        sample.activity_level.clamp(0.0, 100.0)
    };
    (idle, activity)
}

#[must_use]
pub fn fatigue_score(idle: f64, activity: f64, config: &FatigueConfig) -> f64 {
    let score = if idle > config.idle_severe_secs {
        config.score_severe
    } else if idle > config.idle_moderate_secs {
        config.score_moderate
    } else if idle > config.idle_mild_secs {
        config.score_mild
    } else if activity < config.low_activity_threshold {
        config.low_activity_score
    } else {
        0.3 - 0.2 * activity / 100.0
    };
    score.clamp(0.0, 1.0)
}

#[must_use]
pub fn eye_strain(idle: f64, activity: f64) -> f64 {
    (60.0 - activity / 2.0 + idle / 10.0).clamp(0.0, 100.0)
}

#[must_use]
pub fn posture(idle: f64, activity: f64, config: &FatigueConfig) -> f64 {
    let score = if idle > config.idle_mild_secs {
        (1.0 - idle / POSTURE_IDLE_SPAN).max(0.5)
    } else {
        0.7 + 0.3 * activity / 100.0
    };
    score.clamp(0.0, 1.0)
}

pub fn blink_rate(score: f64, jitter: f64, rng: &mut impl Rng) -> f64 {
    let noise = if jitter > 0.0 {
        rng.gen_range(-jitter..=jitter)
    } else {
        0.0
    };
    (BASE_BLINK_RATE - BLINK_SCORE_OFFSET * score + noise).clamp(BLINK_MIN, BLINK_MAX)
}

/// Expression for a (possibly advisor-adjusted) score
#[must_use]
pub fn expression_for(
    score: f64,
    sample: &ActivitySample,
    config: &FatigueConfig,
) -> FacialExpression {
    let (idle, activity) = sanitize(sample);
    if score > 0.7 {
        FacialExpression::Tired
    } else if idle <= config.idle_mild_secs && activity >= config.low_activity_threshold {
        FacialExpression::Focused
    } else {
        FacialExpression::Neutral
    }
}

pub fn compute(sample: &ActivitySample, config: &FatigueConfig, rng: &mut impl Rng) -> Baseline {
    let (idle, activity) = sanitize(sample);
    let score = fatigue_score(idle, activity, config);
    Baseline {
        fatigue_score: score,
        eye_strain_level: eye_strain(idle, activity),
        posture_score: posture(idle, activity, config),
        blink_rate: blink_rate(score, config.blink_jitter, rng),
        facial_expression: expression_for(score, sample, config),
    }
}
