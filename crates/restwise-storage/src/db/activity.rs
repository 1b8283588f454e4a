use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::models::ActivitySample;

use super::helpers::parse_datetime;
use super::Database;

impl Database {
    /// Insert an activity sample
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert operation fails
    pub fn insert_activity_sample(&self, sample: &ActivitySample) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO activity_samples (captured_at, mouse_clicks, key_presses, idle_seconds, activity_level)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                sample.captured_at.to_rfc3339(),
                i64::try_from(sample.mouse_clicks).unwrap_or(i64::MAX),
                i64::try_from(sample.key_presses).unwrap_or(i64::MAX),
                sample.idle_seconds,
                sample.activity_level,
            ],
        )?;
        Ok(())
    }

    /// Get activity samples captured since `since`, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub fn get_activity_samples(&self, since: DateTime<Utc>) -> Result<Vec<ActivitySample>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT captured_at, mouse_clicks, key_presses, idle_seconds, activity_level
             FROM activity_samples
             WHERE captured_at >= ?1
             ORDER BY captured_at ASC",
        )?;

        let samples = stmt
            .query_map([since.to_rfc3339()], |row| {
                let captured_at: String = row.get(0)?;
                let mouse_clicks: i64 = row.get(1)?;
                let key_presses: i64 = row.get(2)?;
                Ok(ActivitySample {
                    mouse_clicks: u64::try_from(mouse_clicks).unwrap_or_default(),
                    key_presses: u64::try_from(key_presses).unwrap_or_default(),
                    idle_seconds: row.get(3)?,
                    activity_level: row.get(4)?,
                    captured_at: parse_datetime(&captured_at)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(samples)
    }
}
