//! Error types for the runboard CLI
//!
//! The simulator and dashboard core never fail: unknown ids degrade to
//! empty results or no-ops. These errors belong to the outer surfaces
//! (configuration, command-line input, scenario files) and carry hints on
//! how to fix the input.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for runboard
#[derive(Error, Debug)]
pub enum Error {
    // === Input Errors ===
    #[error("Project '{0}' not found. Use 'runboard projects' to list available projects")]
    ProjectNotFound(String),

    #[error("Test case '{test_case}' does not belong to project '{project}'. Use 'runboard cases {project}' to list them")]
    TestCaseNotFound { project: String, test_case: String },

    #[error("No test cases selected. Pass --case <id> or --all")]
    NothingSelected,

    #[error("Run could not be started: {0}")]
    RunNotStarted(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === Scenario Errors ===
    #[error("Invalid scenario file: {0}")]
    ScenarioParse(String),

    #[error("Scenario assertion failed: {0}")]
    ScenarioAssertion(String),

    #[error("Timed out after {0} ms waiting for the run to finish")]
    Timeout(u64),

    // === IO Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a test case not found error
    pub fn test_case_not_found(project: &str, test_case: &str) -> Self {
        Self::TestCaseNotFound {
            project: project.to_string(),
            test_case: test_case.to_string(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: &io::Error) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Build a scenario assertion error
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::ScenarioAssertion(message.into())
    }
}
