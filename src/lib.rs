//! runboard - a mock test-run dashboard
//!
//! This library provides a simulated test-run engine that executes ordered
//! test cases with pseudo-random outcomes and broadcasts lifecycle events,
//! and a dashboard controller that folds those events into a bounded
//! history and per-project pass/fail summaries.

pub mod catalog;
pub mod cli;
pub mod commands;
pub mod common;
pub mod dashboard;
pub mod simulator;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use dashboard::Dashboard;
pub use simulator::{RunEvent, RunId, RunRequest, Simulator};
