use anyhow::Result;
use chrono::{DateTime, Utc};
use restwise_storage::{ActivitySample, ComplianceRecord, Database, FatigueMetrics};

/// Write-only sink for everything the core produces.
///
/// The core never depends on these calls succeeding; failures are logged by
/// the caller and the data point is dropped.
pub trait Persistence: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the sample could not be stored.
    fn record_activity(&self, sample: &ActivitySample) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the metrics could not be stored.
    fn record_fatigue(&self, metrics: &FatigueMetrics) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the record could not be stored.
    fn record_break(&self, record: &ComplianceRecord) -> Result<()>;

    /// Drop activity and fatigue history older than `cutoff`, returning the
    /// number of rows removed. Break records are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the history could not be pruned.
    fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

impl Persistence for Database {
    fn record_activity(&self, sample: &ActivitySample) -> Result<()> {
        self.insert_activity_sample(sample)
    }

    fn record_fatigue(&self, metrics: &FatigueMetrics) -> Result<()> {
        self.insert_fatigue_metrics(metrics)
    }

    fn record_break(&self, record: &ComplianceRecord) -> Result<()> {
        self.insert_compliance_record(record)
    }

    fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        Ok(self.prune_history(cutoff)?.total())
    }
}

/// Log a failed write and carry on
pub(crate) fn report(what: &str, result: Result<()>) {
    if let Err(e) = result {
        log::warn!("Failed to persist {what}: {e:#}");
    }
}
