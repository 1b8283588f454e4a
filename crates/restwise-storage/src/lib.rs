pub mod analytics;
pub mod db;
pub mod migrations;
pub mod models;

pub use analytics::{daily_rollups, suggest_alert_threshold, DailyRollup, ThresholdSuggestion};
pub use db::{Database, PruneCounts};
pub use models::{
    ActivitySample, BreakTrigger, BreakType, ComplianceRecord, ComplianceSummary,
    FacialExpression, FatigueLevel, FatigueMetrics, MetricsSource, Trend, TypeCompliance,
};
