use anyhow::Result;
use rusqlite::Connection;

/// Initialize database schema
///
/// # Errors
///
/// Returns an error if database table creation or index creation fails
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Activity samples - one row per fatigue evaluation tick
    conn.execute(
        "CREATE TABLE IF NOT EXISTS activity_samples (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            captured_at TEXT NOT NULL,
            mouse_clicks INTEGER NOT NULL,
            key_presses INTEGER NOT NULL,
            idle_seconds REAL NOT NULL,
            activity_level REAL NOT NULL
        )",
        [],
    )?;

    // Fatigue metrics - baseline and enriched records share the tick number
    conn.execute(
        "CREATE TABLE IF NOT EXISTS fatigue_metrics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tick INTEGER NOT NULL,
            computed_at TEXT NOT NULL,
            fatigue_score REAL NOT NULL,
            eye_strain_level REAL NOT NULL,
            posture_score REAL NOT NULL,
            blink_rate REAL NOT NULL,
            facial_expression TEXT NOT NULL,
            trend TEXT NOT NULL,
            alert_generated INTEGER NOT NULL,
            source TEXT NOT NULL
        )",
        [],
    )?;

    // Break compliance records
    conn.execute(
        "CREATE TABLE IF NOT EXISTS break_records (
            session_id TEXT PRIMARY KEY,
            break_type TEXT NOT NULL,
            break_trigger TEXT NOT NULL,
            requested_seconds REAL NOT NULL,
            elapsed_seconds REAL NOT NULL,
            compliant INTEGER NOT NULL,
            cancelled INTEGER NOT NULL,
            guard_failures TEXT NOT NULL,
            started_at TEXT NOT NULL,
            ended_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_activity_captured_at ON activity_samples(captured_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_fatigue_computed_at ON fatigue_metrics(computed_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_break_started_at ON break_records(started_at)",
        [],
    )?;

    Ok(())
}
