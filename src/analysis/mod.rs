//! Multi-phase decision analysis.
//!
//! A run goes through fixed phases:
//! 1. validation of the input
//! 2. decomposition into one mission per specialist
//! 3. foundations wave: logical, causal, risk in parallel
//! 4. challenge wave: skeptic contests the logical report, stress
//!    amplifies the risk report
//! 5. synthesis of every report into a [`FinalVerdict`]
//!
//! A wave completes only when all of its members have. Any failure ends
//! the run; no partial verdict is produced.

mod agent;
mod events;
mod orchestrator;
mod types;

pub use agent::*;
pub use events::*;
pub use orchestrator::*;
pub use types::*;
