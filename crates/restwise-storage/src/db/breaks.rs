use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use std::time::Duration;

use crate::models::{ComplianceRecord, ComplianceSummary};

use super::helpers::{parse_datetime, parse_text, parse_uuid};
use super::Database;

impl Database {
    /// Insert a break compliance record
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the database insert fails
    pub fn insert_compliance_record(&self, record: &ComplianceRecord) -> Result<()> {
        let failures = serde_json::to_string(&record.guard_failures)?;
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO break_records (session_id, break_type, break_trigger, requested_seconds,
                                                   elapsed_seconds, compliant, cancelled, guard_failures,
                                                   started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.session_id.to_string(),
                record.break_type.to_string(),
                record.trigger.to_string(),
                record.requested.as_secs_f64(),
                record.elapsed.as_secs_f64(),
                i32::from(record.compliant),
                i32::from(record.cancelled),
                failures,
                record.started_at.to_rfc3339(),
                record.ended_at.to_rfc3339(),
            ],
        )?;
        log::debug!(
            "Recorded {} break {} (compliant: {})",
            record.break_type,
            record.session_id,
            record.compliant
        );
        Ok(())
    }

    /// Get compliance records for breaks started since `since`, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_compliance_records(&self, since: DateTime<Utc>) -> Result<Vec<ComplianceRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT session_id, break_type, break_trigger, requested_seconds, elapsed_seconds,
                    compliant, cancelled, guard_failures, started_at, ended_at
             FROM break_records
             WHERE started_at >= ?1
             ORDER BY started_at ASC",
        )?;

        let records = stmt
            .query_map([since.to_rfc3339()], Self::row_to_compliance_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Summarize break compliance since `since`
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_compliance_summary(&self, since: DateTime<Utc>) -> Result<ComplianceSummary> {
        let records = self.get_compliance_records(since)?;
        Ok(ComplianceSummary::from_records(&records))
    }

    fn row_to_compliance_record(row: &Row<'_>) -> rusqlite::Result<ComplianceRecord> {
        let session_id: String = row.get(0)?;
        let break_type: String = row.get(1)?;
        let trigger: String = row.get(2)?;
        let requested: f64 = row.get(3)?;
        let elapsed: f64 = row.get(4)?;
        let compliant: i32 = row.get(5)?;
        let cancelled: i32 = row.get(6)?;
        let guard_failures: String = row.get(7)?;
        let started_at: String = row.get(8)?;
        let ended_at: String = row.get(9)?;

        Ok(ComplianceRecord {
            session_id: parse_uuid(&session_id)?,
            break_type: parse_text(&break_type)?,
            trigger: parse_text(&trigger)?,
            requested: Duration::from_secs_f64(requested.max(0.0)),
            elapsed: Duration::from_secs_f64(elapsed.max(0.0)),
            compliant: compliant != 0,
            cancelled: cancelled != 0,
            guard_failures: serde_json::from_str(&guard_failures).unwrap_or_default(),
            started_at: parse_datetime(&started_at)?,
            ended_at: parse_datetime(&ended_at)?,
        })
    }
}
