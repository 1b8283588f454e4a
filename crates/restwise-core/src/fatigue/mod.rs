//! Fatigue estimation.
//!
//! Every tick publishes a deterministic baseline first. Advisor enrichment is
//! rate-limited, runs on its own task under a timeout, and is merged only if
//! no newer tick has been published in the meantime.

pub mod baseline;
mod engine;
pub mod trend;

pub use engine::{AdvisorStats, FatigueEngine};

#[cfg(test)]
mod tests;
