use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Break coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakState {
    #[default]
    Idle,
    /// Counting down to enforcement
    Scheduled,
    Enforcing,
    /// Break finished; new requests are refused until this elapses
    Cooldown,
}

impl BreakState {
    /// Whether `self -> next` is an edge of the state machine
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Scheduled)
                | (Self::Scheduled, Self::Enforcing | Self::Idle)
                | (Self::Enforcing, Self::Cooldown | Self::Idle)
                | (Self::Cooldown, Self::Idle)
        )
    }

    /// Scheduled or enforcing
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Scheduled | Self::Enforcing)
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Idle => "No break pending",
            Self::Scheduled => "Break starting soon",
            Self::Enforcing => "On break",
            Self::Cooldown => "Break finished, cooling down",
        }
    }
}

impl std::fmt::Display for BreakState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Enforcing => write!(f, "enforcing"),
            Self::Cooldown => write!(f, "cooldown"),
        }
    }
}

/// A state change, broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakTransition {
    pub session_id: Uuid,
    pub from: BreakState,
    pub to: BreakState,
    pub at: DateTime<Utc>,
}
