pub mod activity;
pub mod breaks;
pub mod config;
#[cfg(unix)]
pub mod daemon;
pub mod error;
pub mod fatigue;
pub mod guard;
pub mod input;
#[cfg(unix)]
pub mod ipc;
pub mod notifier;
pub mod orchestrator;
pub mod persistence;

#[cfg(test)]
pub(crate) mod test_support;

pub use activity::{ActivitySource, ActivityTracker, TrackerMode};
pub use breaks::{BreakCoordinator, BreakRequest, BreakSession, BreakState, BreakTransition};
pub use config::Config;
#[cfg(unix)]
pub use daemon::Daemon;
pub use error::{CoreError, CoreResult};
pub use fatigue::{AdvisorStats, FatigueEngine};
pub use orchestrator::{Collaborators, Orchestrator, StatusSnapshot};
pub use persistence::Persistence;
