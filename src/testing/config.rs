//! Scenario file types
//!
//! Defines the data structures for deserializing YAML dashboard scenarios.

use serde::Deserialize;

use crate::catalog::TestStatus;
use crate::dashboard::Direction;

/// A complete scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct TestScenario {
    /// Name of the scenario
    pub name: String,
    /// Optional description of what the scenario verifies
    pub description: Option<String>,
    /// Simulator settings overriding the defaults
    #[serde(default)]
    pub simulator: SimulatorOverrides,
    /// Dashboard history limit override
    pub history_limit: Option<usize>,
    /// Start with the two historical demo rows (default: true)
    #[serde(default = "default_seed_history")]
    pub seed_history: bool,
    /// The sequence of steps to execute
    pub steps: Vec<TestStep>,
}

fn default_seed_history() -> bool {
    true
}

/// Optional simulator settings for a scenario
#[derive(Deserialize, Debug, Default)]
pub struct SimulatorOverrides {
    pub seed: Option<u32>,
    pub min_delay_ms: Option<u64>,
    pub delay_span_ms: Option<u64>,
    pub pass_threshold: Option<f64>,
}

/// A single scenario step: a user intent or an expectation
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Select a project in the sidebar
    SelectProject {
        project: String,
        /// Whether the selection is expected to take effect
        expect_changed: Option<bool>,
    },
    /// Toggle a test case in the selector
    Toggle { test_case: String },
    /// Select every test case of the current project
    SelectAll,
    /// Clear the selection
    ClearSelection,
    /// Reorder a selected test case
    Move {
        test_case: String,
        direction: Direction,
    },
    /// Press start
    Start {
        /// Whether a run is expected to start (default: true)
        expect_started: Option<bool>,
    },
    /// Press stop
    Stop,
    /// Wait until no run is active
    WaitIdle {
        /// Timeout in milliseconds (default: 30000)
        timeout_ms: Option<u64>,
    },
    /// Let time pass
    Sleep { ms: u64 },
    /// Check the ordered selection
    ExpectSelection { equals: Vec<String> },
    /// Check the running flag
    ExpectRunning { value: bool },
    /// Check the pass/fail summary of the selected project
    ExpectSummary {
        pass: Option<usize>,
        fail: Option<usize>,
    },
    /// Check the dashboard history log
    ExpectHistory {
        /// Exact number of rows
        len: Option<usize>,
        /// Upper bound on the number of rows
        max_len: Option<usize>,
        /// Row count per status
        #[serde(default)]
        counts: Vec<StatusCount>,
        /// Status of individual test cases in the last started run
        #[serde(default)]
        rows: Vec<RowAssertion>,
    },
}

/// Expected number of rows with a status
#[derive(Deserialize, Debug)]
pub struct StatusCount {
    pub status: TestStatus,
    pub count: usize,
    /// Only count rows of this project
    pub project: Option<String>,
}

/// Expected status of one test case in the last started run
#[derive(Deserialize, Debug)]
pub struct RowAssertion {
    pub test_case: String,
    pub status: TestStatus,
}
