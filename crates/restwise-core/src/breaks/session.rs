use chrono::{DateTime, Utc};
use restwise_storage::{BreakTrigger, BreakType, ComplianceRecord};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::state::BreakState;
use crate::error::CoreError;

pub const DEFAULT_LEAD_TIME: Duration = Duration::from_secs(5);
/// Longest break the coordinator will enforce
pub const MAX_BREAK_DURATION: Duration = Duration::from_secs(24 * 60 * 60);
pub const MAX_LEAD_TIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Parameters of a requested break
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakRequest {
    pub duration: Duration,
    pub break_type: BreakType,
    /// Countdown spent in `Scheduled` before enforcement starts
    pub lead_time: Duration,
    pub lock_screen: bool,
    pub mute_input: bool,
    pub trigger: BreakTrigger,
}

impl BreakRequest {
    #[must_use]
    pub const fn new(duration: Duration, break_type: BreakType) -> Self {
        Self {
            duration,
            break_type,
            lead_time: DEFAULT_LEAD_TIME,
            lock_screen: false,
            mute_input: false,
            trigger: BreakTrigger::Manual,
        }
    }

    #[must_use]
    pub const fn with_lead_time(mut self, lead_time: Duration) -> Self {
        self.lead_time = lead_time;
        self
    }

    #[must_use]
    pub const fn with_lock_screen(mut self, lock: bool) -> Self {
        self.lock_screen = lock;
        self
    }

    #[must_use]
    pub const fn with_mute_input(mut self, mute: bool) -> Self {
        self.mute_input = mute;
        self
    }

    #[must_use]
    pub const fn with_trigger(mut self, trigger: BreakTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// # Errors
    ///
    /// Returns `CoreError::InvalidBreakRequest` for a zero duration, or when
    /// the duration or lead time exceeds a day.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.duration.is_zero() {
            return Err(CoreError::InvalidBreakRequest(
                "break duration must be positive".to_string(),
            ));
        }
        if self.duration > MAX_BREAK_DURATION {
            return Err(CoreError::InvalidBreakRequest(format!(
                "break duration {}s exceeds the {}s maximum",
                self.duration.as_secs(),
                MAX_BREAK_DURATION.as_secs()
            )));
        }
        if self.lead_time > MAX_LEAD_TIME {
            return Err(CoreError::InvalidBreakRequest(format!(
                "lead time {}s exceeds the {}s maximum",
                self.lead_time.as_secs(),
                MAX_LEAD_TIME.as_secs()
            )));
        }
        Ok(())
    }
}

/// Snapshot of the current break. Idle sessions carry a nil id and zero durations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakSession {
    pub id: Uuid,
    pub state: BreakState,
    pub break_type: BreakType,
    pub trigger: BreakTrigger,
    pub requested: Duration,
    pub elapsed: Duration,
    pub remaining: Duration,
    pub lock_screen: bool,
    pub mute_input: bool,
    pub screen_locked: bool,
    pub input_muted: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub starts_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub guard_failures: Vec<String>,
}

impl BreakSession {
    #[must_use]
    pub fn idle() -> Self {
        Self {
            id: Uuid::nil(),
            state: BreakState::Idle,
            break_type: BreakType::default(),
            trigger: BreakTrigger::default(),
            requested: Duration::ZERO,
            elapsed: Duration::ZERO,
            remaining: Duration::ZERO,
            lock_screen: false,
            mute_input: false,
            screen_locked: false,
            input_muted: false,
            scheduled_at: None,
            starts_at: None,
            started_at: None,
            ends_at: None,
            guard_failures: Vec::new(),
        }
    }

    /// New session for `request`. It stays `Idle` until the coordinator
    /// transitions it.
    #[must_use]
    pub fn from_request(request: &BreakRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            break_type: request.break_type,
            trigger: request.trigger,
            requested: request.duration,
            remaining: request.duration,
            lock_screen: request.lock_screen,
            mute_input: request.mute_input,
            scheduled_at: Some(now),
            starts_at: offset(now, request.lead_time),
            ..Self::idle()
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == BreakState::Idle
    }

    /// Outcome of an enforced break
    #[must_use]
    pub fn compliance_record(&self, cancelled: bool, ended_at: DateTime<Utc>) -> ComplianceRecord {
        ComplianceRecord {
            session_id: self.id,
            break_type: self.break_type,
            trigger: self.trigger,
            requested: self.requested,
            elapsed: self.elapsed,
            compliant: !cancelled && self.elapsed >= self.requested,
            cancelled,
            guard_failures: self.guard_failures.clone(),
            started_at: self.started_at.unwrap_or(ended_at),
            ended_at,
        }
    }
}

/// `at + by`, or `None` when the sum leaves chrono's range
#[must_use]
pub(super) fn offset(at: DateTime<Utc>, by: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|d| at.checked_add_signed(d))
}

impl Default for BreakSession {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = BreakRequest::new(Duration::from_secs(60), BreakType::Regular)
            .with_lead_time(Duration::from_secs(1))
            .with_lock_screen(true)
            .with_mute_input(true)
            .with_trigger(BreakTrigger::FatigueAlert);
        assert_eq!(request.lead_time, Duration::from_secs(1));
        assert!(request.lock_screen && request.mute_input);
        assert_eq!(request.trigger, BreakTrigger::FatigueAlert);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_zero_duration_rejected() {
        let err = BreakRequest::new(Duration::ZERO, BreakType::Micro)
            .validate()
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidBreakRequest(_)));
    }

    #[test]
    fn test_oversized_duration_and_lead_rejected() {
        let huge = BreakRequest::new(Duration::from_secs(10_000_000_000_000), BreakType::Micro);
        let err = huge.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds"), "{err}");

        let at_limit = BreakRequest::new(MAX_BREAK_DURATION, BreakType::Long)
            .with_lead_time(MAX_LEAD_TIME);
        assert!(at_limit.validate().is_ok());

        let late = BreakRequest::new(Duration::from_secs(60), BreakType::Micro)
            .with_lead_time(MAX_LEAD_TIME + Duration::from_secs(1));
        assert!(matches!(
            late.validate(),
            Err(CoreError::InvalidBreakRequest(msg)) if msg.contains("lead time")
        ));
    }

    #[test]
    fn test_unrepresentable_lead_leaves_start_unknown() {
        let request = BreakRequest::new(Duration::from_secs(60), BreakType::Micro)
            .with_lead_time(Duration::MAX);
        let session = BreakSession::from_request(&request, Utc::now());
        assert_eq!(session.starts_at, None);
        assert!(offset(DateTime::<Utc>::MAX_UTC, Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_session_from_request() {
        let now = Utc::now();
        let request = BreakRequest::new(Duration::from_secs(30), BreakType::Micro);
        let session = BreakSession::from_request(&request, now);

        assert!(!session.id.is_nil());
        assert!(session.is_idle());
        assert_eq!(session.remaining, Duration::from_secs(30));
        assert_eq!(session.starts_at, Some(now + chrono::Duration::seconds(5)));
        assert!(BreakSession::default().id.is_nil());
    }

    #[test]
    fn test_compliance_record_flags() {
        let mut session = BreakSession::from_request(
            &BreakRequest::new(Duration::from_secs(10), BreakType::Micro),
            Utc::now(),
        );
        session.elapsed = Duration::from_secs(4);
        let cancelled = session.compliance_record(true, Utc::now());
        assert!(cancelled.cancelled);
        assert!(!cancelled.compliant);

        session.elapsed = Duration::from_secs(10);
        let completed = session.compliance_record(false, Utc::now());
        assert!(completed.compliant);
        assert_eq!(completed.elapsed, completed.requested);
    }
}
