//! Database operations split into domain-specific modules.
//!
//! This module re-exports the main Database struct and all its operations.

mod activity;
mod breaks;
mod fatigue;
mod helpers;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::PathBuf;

use crate::migrations;

/// Rows removed by [`Database::prune_history`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneCounts {
    pub activity_samples: usize,
    pub fatigue_metrics: usize,
}

impl PruneCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.activity_samples + self.fatigue_metrics
    }
}

/// Database connection wrapper
///
/// The connection sits behind a mutex so one `Database` can be shared by the
/// fatigue loop, the break runner and the IPC handlers.
pub struct Database {
    pub(crate) conn: Mutex<Connection>,
}

impl Database {
    /// Create a new database connection
    ///
    /// # Errors
    ///
    /// Returns an error if database directory creation, connection opening, or schema initialization fails
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = db_path.unwrap_or_else(Self::default_db_path);

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(&path).context("Failed to open database connection")?;
        migrations::init_schema(&conn)?;

        log::info!("Database initialized at: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a throwaway in-memory database
    ///
    /// # Errors
    ///
    /// Returns an error if schema initialization fails
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        migrations::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Delete activity samples and fatigue metrics older than `cutoff`.
    /// Break records are kept; they back the compliance reports.
    ///
    /// # Errors
    ///
    /// Returns an error if either delete fails
    pub fn prune_history(&self, cutoff: DateTime<Utc>) -> Result<PruneCounts> {
        let cutoff = cutoff.to_rfc3339();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let activity_samples =
            tx.execute("DELETE FROM activity_samples WHERE captured_at < ?1", [&cutoff])?;
        let fatigue_metrics =
            tx.execute("DELETE FROM fatigue_metrics WHERE computed_at < ?1", [&cutoff])?;
        tx.commit()?;
        Ok(PruneCounts {
            activity_samples,
            fatigue_metrics,
        })
    }

    /// Get default database path
    fn default_db_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("restwise");
        path.push("restwise.db");
        path
    }
}
