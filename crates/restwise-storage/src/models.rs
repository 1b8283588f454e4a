use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Point-in-time copy of the input activity counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySample {
    pub mouse_clicks: u64,
    pub key_presses: u64,
    /// Seconds since the last input event
    pub idle_seconds: f64,
    /// Recent input intensity over the trailing window (0-100)
    pub activity_level: f64,
    pub captured_at: DateTime<Utc>,
}

impl ActivitySample {
    #[must_use]
    pub fn new(idle_seconds: f64, activity_level: f64) -> Self {
        Self {
            mouse_clicks: 0,
            key_presses: 0,
            idle_seconds,
            activity_level,
            captured_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn total_events(&self) -> u64 {
        self.mouse_clicks + self.key_presses
    }
}

impl Default for ActivitySample {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacialExpression {
    #[default]
    Neutral,
    Tired,
    Focused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

/// Where a published metrics record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetricsSource {
    #[default]
    Baseline,
    Enriched,
}

/// Coarse fatigue bucket used for prompts, recommendations and break sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FatigueLevel {
    #[serde(alias = "Low", alias = "LOW")]
    Low,
    #[serde(alias = "Moderate", alias = "MODERATE", alias = "medium", alias = "Medium")]
    Moderate,
    #[serde(alias = "High", alias = "HIGH")]
    High,
    #[serde(alias = "Critical", alias = "CRITICAL")]
    Critical,
}

impl FatigueLevel {
    /// Bucket a fatigue score
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score > 0.75 {
            Self::Critical
        } else if score > 0.6 {
            Self::High
        } else if score > 0.4 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for FatigueLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatigue estimate produced by one evaluation tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueMetrics {
    /// Evaluation sequence number; 0 means nothing has been evaluated yet
    pub tick: u64,
    pub fatigue_score: f64,
    pub eye_strain_level: f64,
    pub posture_score: f64,
    pub blink_rate: f64,
    pub facial_expression: FacialExpression,
    pub trend: Trend,
    pub alert_generated: bool,
    pub source: MetricsSource,
    pub computed_at: DateTime<Utc>,
}

impl FatigueMetrics {
    #[must_use]
    pub fn level(&self) -> FatigueLevel {
        FatigueLevel::from_score(self.fatigue_score)
    }
}

impl Default for FatigueMetrics {
    fn default() -> Self {
        Self {
            tick: 0,
            fatigue_score: 0.0,
            eye_strain_level: 0.0,
            posture_score: 1.0,
            blink_rate: 18.0,
            facial_expression: FacialExpression::Neutral,
            trend: Trend::Stable,
            alert_generated: false,
            source: MetricsSource::Baseline,
            computed_at: Utc::now(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum BreakType {
    #[default]
    #[serde(alias = "Micro", alias = "MICRO")]
    Micro,
    #[serde(alias = "Regular", alias = "Standard", alias = "standard")]
    Regular,
    #[serde(alias = "Long", alias = "LONG")]
    Long,
    #[serde(alias = "Personalized")]
    Personalized,
}

impl std::fmt::Display for BreakType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Micro => "micro",
            Self::Regular => "regular",
            Self::Long => "long",
            Self::Personalized => "personalized",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BreakType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "micro" => Ok(Self::Micro),
            "regular" | "standard" => Ok(Self::Regular),
            "long" => Ok(Self::Long),
            "personalized" | "personalised" => Ok(Self::Personalized),
            _ => Err(format!(
                "Unknown break type: {s}. Use: micro, regular, long, personalized"
            )),
        }
    }
}

/// What asked for a break
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BreakTrigger {
    #[default]
    Manual,
    FatigueAlert,
    /// Fixed work interval elapsed, regardless of fatigue
    Interval,
}

impl std::fmt::Display for BreakTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::FatigueAlert => write!(f, "fatigue_alert"),
            Self::Interval => write!(f, "interval"),
        }
    }
}

impl std::str::FromStr for BreakTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "fatigue_alert" => Ok(Self::FatigueAlert),
            "interval" => Ok(Self::Interval),
            _ => Err(format!("Unknown break trigger: {s}")),
        }
    }
}

/// Outcome of one enforced break, handed to persistence and analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRecord {
    pub session_id: Uuid,
    pub break_type: BreakType,
    pub trigger: BreakTrigger,
    pub requested: Duration,
    pub elapsed: Duration,
    /// True only when the full requested duration elapsed
    pub compliant: bool,
    pub cancelled: bool,
    pub guard_failures: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl ComplianceRecord {
    /// Fraction of the requested duration that was actually spent on break
    #[must_use]
    pub fn completion_ratio(&self) -> f64 {
        if self.requested.is_zero() {
            return 0.0;
        }
        (self.elapsed.as_secs_f64() / self.requested.as_secs_f64()).min(1.0)
    }
}

/// Compliance of a single break type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeCompliance {
    pub break_type: BreakType,
    pub taken: u32,
    pub completed: u32,
    pub average_completion: f64,
}

/// Aggregated break compliance over a period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub breaks_taken: u32,
    pub breaks_completed: u32,
    pub breaks_cancelled: u32,
    pub total_break_seconds: f64,
    pub average_completion: f64,
    /// One entry per break type seen, in `BreakType` order
    #[serde(default)]
    pub by_type: Vec<TypeCompliance>,
}

impl ComplianceSummary {
    /// Build a summary from individual records
    #[must_use]
    pub fn from_records(records: &[ComplianceRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let completed = records.iter().filter(|r| r.compliant).count();
        let cancelled = records.iter().filter(|r| r.cancelled).count();
        let total_seconds: f64 = records.iter().map(|r| r.elapsed.as_secs_f64()).sum();

        let mut groups: BTreeMap<BreakType, Vec<&ComplianceRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.break_type).or_default().push(record);
        }
        let by_type = groups
            .into_iter()
            .map(|(break_type, group)| TypeCompliance {
                break_type,
                taken: count_u32(group.len()),
                completed: count_u32(group.iter().filter(|r| r.compliant).count()),
                average_completion: mean(group.iter().map(|r| r.completion_ratio())),
            })
            .collect();

        Self {
            breaks_taken: count_u32(records.len()),
            breaks_completed: count_u32(completed),
            breaks_cancelled: count_u32(cancelled),
            total_break_seconds: total_seconds,
            average_completion: mean(records.iter().map(ComplianceRecord::completion_ratio)),
            by_type,
        }
    }

    /// Break type with the best average completion. Ties go to the type
    /// taken more often.
    #[must_use]
    pub fn most_effective_type(&self) -> Option<BreakType> {
        self.by_type
            .iter()
            .max_by(|a, b| {
                a.average_completion
                    .total_cmp(&b.average_completion)
                    .then(a.taken.cmp(&b.taken))
            })
            .map(|t| t.break_type)
    }

    /// Share of breaks that ran to completion
    #[must_use]
    pub fn compliance_rate(&self) -> f64 {
        if self.breaks_taken == 0 {
            return 0.0;
        }
        f64::from(self.breaks_completed) / f64::from(self.breaks_taken)
    }
}

pub(crate) fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Arithmetic mean; zero for an empty sequence
pub(crate) fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0_u32), |(sum, n), v| (sum + v, n.saturating_add(1)));
    if n == 0 {
        0.0
    } else {
        sum / f64::from(n)
    }
}

impl std::fmt::Display for ComplianceSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} breaks ({} completed, {} cancelled), {:.0}% compliance",
            self.breaks_taken,
            self.breaks_completed,
            self.breaks_cancelled,
            self.compliance_rate() * 100.0
        )
    }
}
