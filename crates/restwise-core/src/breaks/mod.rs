//! Break scheduling and enforcement.
//!
//! ```text
//! Idle --request--> Scheduled --countdown--> Enforcing --elapsed--> Cooldown --> Idle
//!                   Scheduled --cancel--> Idle
//!                                         Enforcing --cancel--> Idle
//! ```

mod coordinator;
mod session;
mod state;

pub use coordinator::BreakCoordinator;
pub use session::{
    BreakRequest, BreakSession, DEFAULT_LEAD_TIME, MAX_BREAK_DURATION, MAX_LEAD_TIME,
};
pub use state::{BreakState, BreakTransition};
