/// Compliance report and export command handler
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, Utc};
use clap::ValueEnum;
use restwise_core::config::Config;
use restwise_storage::{
    daily_rollups, suggest_alert_threshold, BreakType, ComplianceRecord, ComplianceSummary,
    DailyRollup, Database, FatigueLevel, ThresholdSuggestion, TypeCompliance,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tabled::{Table, Tabled};

use super::helpers::{escape_csv, format_duration, percent, truncate_str};

/// How `restwise report` renders its output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable tables
    #[default]
    Table,
    /// Full report as pretty-printed JSON
    Json,
    /// One row per break
    Csv,
}

/// Everything the report covers, as exported to JSON
#[derive(Debug, Serialize)]
struct ReportData {
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    summary: ComplianceSummary,
    most_effective_type: Option<BreakType>,
    daily: Vec<DailyRollup>,
    threshold_suggestion: Option<ThresholdSuggestion>,
    records: Vec<ComplianceRecord>,
}

impl ReportData {
    fn collect(
        db: &Database,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        alert_threshold: f64,
    ) -> Result<Self> {
        let records = db.get_compliance_records(since)?;
        let metrics = db.get_fatigue_metrics(since)?;
        let summary = ComplianceSummary::from_records(&records);
        Ok(Self {
            since,
            until,
            most_effective_type: summary.most_effective_type(),
            daily: daily_rollups(&records, &metrics),
            threshold_suggestion: suggest_alert_threshold(alert_threshold, &metrics),
            summary,
            records,
        })
    }
}

#[derive(Tabled)]
struct BreakRow {
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Type")]
    break_type: String,
    #[tabled(rename = "Trigger")]
    trigger: String,
    #[tabled(rename = "Length")]
    length: String,
    #[tabled(rename = "Completed")]
    completed: String,
    #[tabled(rename = "Notes")]
    notes: String,
}

impl From<&ComplianceRecord> for BreakRow {
    fn from(record: &ComplianceRecord) -> Self {
        let notes = if record.guard_failures.is_empty() {
            String::new()
        } else {
            truncate_str(&record.guard_failures.join("; "), 40)
        };
        Self {
            started: record
                .started_at
                .with_timezone(&Local)
                .format("%m-%d %H:%M")
                .to_string(),
            break_type: record.break_type.to_string(),
            trigger: record.trigger.to_string(),
            length: format!(
                "{} / {}",
                format_duration(record.elapsed),
                format_duration(record.requested)
            ),
            completed: completion_label(record).to_string(),
            notes,
        }
    }
}

#[derive(Tabled)]
struct TypeRow {
    #[tabled(rename = "Type")]
    break_type: String,
    #[tabled(rename = "Taken")]
    taken: u32,
    #[tabled(rename = "Completed")]
    completed: u32,
    #[tabled(rename = "Avg completion")]
    average_completion: String,
}

impl From<&TypeCompliance> for TypeRow {
    fn from(t: &TypeCompliance) -> Self {
        Self {
            break_type: t.break_type.to_string(),
            taken: t.taken,
            completed: t.completed,
            average_completion: percent(t.average_completion),
        }
    }
}

#[derive(Tabled)]
struct DayRow {
    #[tabled(rename = "Date (UTC)")]
    date: String,
    #[tabled(rename = "Breaks")]
    breaks: String,
    #[tabled(rename = "On break")]
    on_break: String,
    #[tabled(rename = "Fatigue")]
    fatigue: String,
    #[tabled(rename = "Alerts")]
    alerts: u32,
}

impl From<&DailyRollup> for DayRow {
    fn from(day: &DailyRollup) -> Self {
        Self {
            date: day.date.format("%Y-%m-%d").to_string(),
            breaks: format!("{}/{}", day.breaks_completed, day.breaks_taken),
            on_break: format_duration(std::time::Duration::from_secs_f64(
                day.break_seconds.max(0.0),
            )),
            fatigue: day
                .average_fatigue
                .map_or_else(|| "-".to_string(), percent),
            alerts: day.alerts,
        }
    }
}

fn completion_label(record: &ComplianceRecord) -> &'static str {
    if record.compliant {
        "yes"
    } else if record.cancelled {
        "cancelled"
    } else {
        "no"
    }
}

pub fn handle_report_command(
    days: u32,
    format: ReportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let db = Database::new(None)?;
    let config = Config::load(None)?;
    let until = Utc::now();
    let since = until
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let data = ReportData::collect(&db, since, until, config.fatigue.alert_threshold)?;

    let text = match format {
        ReportFormat::Table => render_table(&db, days, &data)?,
        ReportFormat::Json => serde_json::to_string_pretty(&data)? + "\n",
        ReportFormat::Csv => render_csv(&data.records),
    };

    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported {} break(s) to {}", data.records.len(), path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn render_csv(records: &[ComplianceRecord]) -> String {
    let mut out = String::from(
        "session_id,break_type,trigger,started_at,ended_at,requested_seconds,elapsed_seconds,completed,guard_failures\n",
    );
    for record in records {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{}",
            record.session_id,
            record.break_type,
            record.trigger,
            record.started_at.to_rfc3339(),
            record.ended_at.to_rfc3339(),
            record.requested.as_secs(),
            record.elapsed.as_secs(),
            completion_label(record),
            escape_csv(&record.guard_failures.join("; ")),
        );
    }
    out
}

fn render_table(db: &Database, days: u32, data: &ReportData) -> Result<String> {
    let mut out = String::new();

    writeln!(out, "\nBreak Compliance Report: last {days} day(s)")?;
    writeln!(out, "{}", "=".repeat(40))?;

    if data.records.is_empty() {
        writeln!(out, "No breaks recorded in this period.")?;
    } else {
        let rows: Vec<BreakRow> = data.records.iter().map(BreakRow::from).collect();
        writeln!(out, "\n{}", Table::new(rows))?;

        let summary = &data.summary;
        writeln!(out, "\n{summary}")?;
        writeln!(
            out,
            "Time on break: {}  Average completion: {}",
            format_duration(std::time::Duration::from_secs_f64(
                summary.total_break_seconds.max(0.0)
            )),
            percent(summary.average_completion)
        )?;

        let types: Vec<TypeRow> = summary.by_type.iter().map(TypeRow::from).collect();
        writeln!(out, "\nBy type:\n{}", Table::new(types))?;
        if let Some(best) = data.most_effective_type {
            writeln!(out, "Most completed break type: {best}")?;
        }
    }

    if !data.daily.is_empty() {
        let day_rows: Vec<DayRow> = data.daily.iter().map(DayRow::from).collect();
        writeln!(out, "\nDaily:\n{}", Table::new(day_rows))?;
    }

    let samples = db.get_activity_samples(data.since)?;
    if !samples.is_empty() {
        #[allow(clippy::cast_precision_loss)]
        let average =
            samples.iter().map(|s| s.activity_level).sum::<f64>() / samples.len() as f64;
        writeln!(
            out,
            "\nActivity: {} samples, average level {average:.0}%",
            samples.len()
        )?;
    }

    let scored: Vec<f64> = data.daily.iter().filter_map(|d| d.average_fatigue).collect();
    if !scored.is_empty() {
        #[allow(clippy::cast_precision_loss)]
        let average = scored.iter().sum::<f64>() / scored.len() as f64;
        let alerts: u32 = data.daily.iter().map(|d| d.alerts).sum();
        writeln!(
            out,
            "Fatigue: daily average {} ({}), {alerts} alert(s)",
            percent(average),
            FatigueLevel::from_score(average)
        )?;
    }

    if let Some(s) = &data.threshold_suggestion {
        writeln!(
            out,
            "\nFatigue averaged {} this period. Consider lowering fatigue.alert_threshold from {:.2} to {:.2} for earlier alerts.",
            percent(s.average_fatigue),
            s.current,
            s.suggested
        )?;
    }

    Ok(out)
}
