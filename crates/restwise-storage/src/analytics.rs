//! Daily rollups and alert-threshold tuning over stored history

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{count_u32, mean, ComplianceRecord, FatigueMetrics};

/// Average fatigue above which alerts are considered late
pub const HIGH_AVERAGE_FATIGUE: f64 = 0.7;
const THRESHOLD_STEP: f64 = 0.1;
const MIN_ALERT_THRESHOLD: f64 = 0.1;

/// Breaks and fatigue for one UTC calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRollup {
    pub date: NaiveDate,
    pub breaks_taken: u32,
    pub breaks_completed: u32,
    pub break_seconds: f64,
    /// `None` when no fatigue was evaluated that day
    pub average_fatigue: Option<f64>,
    pub alerts: u32,
}

impl DailyRollup {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            breaks_taken: 0,
            breaks_completed: 0,
            break_seconds: 0.0,
            average_fatigue: None,
            alerts: 0,
        }
    }

    #[must_use]
    pub fn compliance_rate(&self) -> f64 {
        if self.breaks_taken == 0 {
            return 0.0;
        }
        f64::from(self.breaks_completed) / f64::from(self.breaks_taken)
    }
}

/// Group breaks by the day they started and fatigue by the day it was
/// computed. Days with neither are left out; the result is oldest first.
#[must_use]
pub fn daily_rollups(
    records: &[ComplianceRecord],
    metrics: &[FatigueMetrics],
) -> Vec<DailyRollup> {
    let mut days: BTreeMap<NaiveDate, DailyRollup> = BTreeMap::new();

    for record in records {
        let date = record.started_at.date_naive();
        let day = days.entry(date).or_insert_with(|| DailyRollup::empty(date));
        day.breaks_taken = day.breaks_taken.saturating_add(1);
        if record.compliant {
            day.breaks_completed = day.breaks_completed.saturating_add(1);
        }
        day.break_seconds += record.elapsed.as_secs_f64();
    }

    let mut scores: BTreeMap<NaiveDate, Vec<&FatigueMetrics>> = BTreeMap::new();
    for m in metrics {
        scores.entry(m.computed_at.date_naive()).or_default().push(m);
    }
    for (date, group) in scores {
        let day = days.entry(date).or_insert_with(|| DailyRollup::empty(date));
        day.average_fatigue = Some(mean(group.iter().map(|m| m.fatigue_score)));
        day.alerts = count_u32(group.iter().filter(|m| m.alert_generated).count());
    }

    days.into_values().collect()
}

/// Proposed change to `fatigue.alert_threshold`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSuggestion {
    pub current: f64,
    pub suggested: f64,
    pub average_fatigue: f64,
}

/// Suggest alerting earlier when fatigue has stayed high on average.
/// Returns `None` without history or when the threshold is already at its floor.
#[must_use]
pub fn suggest_alert_threshold(
    current: f64,
    metrics: &[FatigueMetrics],
) -> Option<ThresholdSuggestion> {
    if metrics.is_empty() {
        return None;
    }
    let average_fatigue = mean(metrics.iter().map(|m| m.fatigue_score));
    if average_fatigue <= HIGH_AVERAGE_FATIGUE {
        return None;
    }
    let suggested = (current - THRESHOLD_STEP).max(MIN_ALERT_THRESHOLD);
    (suggested < current).then_some(ThresholdSuggestion {
        current,
        suggested,
        average_fatigue,
    })
}
