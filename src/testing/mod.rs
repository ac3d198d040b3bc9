//! Scenario runner
//!
//! Reads YAML scenarios describing user intents (select, toggle, reorder,
//! start, stop) and expectations, and replays them against an in-process
//! dashboard. Assertions are made against the dashboard's structured
//! state rather than printed output.

mod config;
mod runner;

pub use config::*;
pub use runner::{execute_scenario, load_scenario, run_scenario, TestResult};
