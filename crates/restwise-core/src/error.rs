use thiserror::Error;

use crate::breaks::BreakState;
use crate::guard::GuardAction;

/// Errors surfaced by the monitoring core.
///
/// Loop-internal failures (advisor timeouts, persistence errors) never become
/// a `CoreError`; they are logged where they happen.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid thresholds or intervals. Fatal at startup.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("{0} is already running")]
    AlreadyRunning(&'static str),

    /// The platform input source could not be acquired; tracking continues idle-only.
    #[error("input event source unavailable: {0}")]
    EventSourceUnavailable(String),

    #[error("a break is already being enforced")]
    SessionAlreadyActive,

    #[error("cannot {action} while the break coordinator is {from}")]
    InvalidTransition {
        from: BreakState,
        action: &'static str,
    },

    #[error("invalid break request: {0}")]
    InvalidBreakRequest(String),

    #[error("screen guard action `{action}` failed: {reason}")]
    GuardActionFailed { action: GuardAction, reason: String },
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
