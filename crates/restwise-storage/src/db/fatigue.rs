use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::models::FatigueMetrics;

use super::helpers::{enum_from_text, enum_to_text, parse_datetime};
use super::Database;

impl Database {
    /// Insert a fatigue metrics record
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert operation fails
    pub fn insert_fatigue_metrics(&self, metrics: &FatigueMetrics) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO fatigue_metrics (tick, computed_at, fatigue_score, eye_strain_level, posture_score,
                                          blink_rate, facial_expression, trend, alert_generated, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                i64::try_from(metrics.tick).unwrap_or(i64::MAX),
                metrics.computed_at.to_rfc3339(),
                metrics.fatigue_score,
                metrics.eye_strain_level,
                metrics.posture_score,
                metrics.blink_rate,
                enum_to_text(&metrics.facial_expression),
                enum_to_text(&metrics.trend),
                i32::from(metrics.alert_generated),
                enum_to_text(&metrics.source),
            ],
        )?;
        Ok(())
    }

    /// Get the most recent fatigue records, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_recent_fatigue_metrics(&self, limit: usize) -> Result<Vec<FatigueMetrics>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT tick, computed_at, fatigue_score, eye_strain_level, posture_score,
                    blink_rate, facial_expression, trend, alert_generated, source
             FROM fatigue_metrics
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let metrics = stmt
            .query_map([i64::try_from(limit).unwrap_or(i64::MAX)], Self::row_to_fatigue_metrics)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(metrics)
    }

    /// Get fatigue records computed since `since`, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_fatigue_metrics(&self, since: DateTime<Utc>) -> Result<Vec<FatigueMetrics>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT tick, computed_at, fatigue_score, eye_strain_level, posture_score,
                    blink_rate, facial_expression, trend, alert_generated, source
             FROM fatigue_metrics
             WHERE computed_at >= ?1
             ORDER BY computed_at ASC, id ASC",
        )?;

        let metrics = stmt
            .query_map([since.to_rfc3339()], Self::row_to_fatigue_metrics)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(metrics)
    }

    fn row_to_fatigue_metrics(row: &Row<'_>) -> rusqlite::Result<FatigueMetrics> {
        let tick: i64 = row.get(0)?;
        let computed_at: String = row.get(1)?;
        let facial_expression: String = row.get(6)?;
        let trend: String = row.get(7)?;
        let alert_generated: i32 = row.get(8)?;
        let source: String = row.get(9)?;

        Ok(FatigueMetrics {
            tick: u64::try_from(tick).unwrap_or_default(),
            computed_at: parse_datetime(&computed_at)?,
            fatigue_score: row.get(2)?,
            eye_strain_level: row.get(3)?,
            posture_score: row.get(4)?,
            blink_rate: row.get(5)?,
            facial_expression: enum_from_text(&facial_expression)?,
            trend: enum_from_text(&trend)?,
            alert_generated: alert_generated != 0,
            source: enum_from_text(&source)?,
        })
    }
}
