//! Run lifecycle events
//!
//! Events serialize as JSON objects tagged by `type`, e.g.
//! `{"type":"TEST_RUNNING","runId":"run-0003",...}`.

use serde::{Deserialize, Serialize};

use crate::catalog::{HistoryRow, TestStatus};

/// Final status carried by a terminal event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Completed,
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Payload of a per-test event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEvent {
    pub run_id: String,
    pub project_id: String,
    pub test_case_id: String,
    pub test_case_name: String,
    pub status: TestStatus,
    pub duration_ms: Option<u64>,
    pub timestamp: i64,
    pub logs_url: String,
}

impl TestEvent {
    /// History row for this event
    pub fn to_row(&self, project_name: String) -> HistoryRow {
        HistoryRow {
            test_id: HistoryRow::composite_id(&self.run_id, &self.test_case_id),
            project_id: self.project_id.clone(),
            project_name,
            status: self.status,
            duration_ms: self.duration_ms,
            timestamp: self.timestamp,
            logs_url: self.logs_url.clone(),
            test_case_id: Some(self.test_case_id.clone()),
            test_case_name: Some(self.test_case_name.clone()),
        }
    }
}

/// Payload of a terminal event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub run_id: String,
    pub project_id: String,
    pub status: RunStatus,
    pub timestamp: i64,
}

/// A lifecycle event broadcast to run subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunEvent {
    TestQueued(TestEvent),
    TestRunning(TestEvent),
    TestCompleted(TestEvent),
    RunCompleted(RunOutcome),
    RunCancelled(RunOutcome),
}

/// Discriminant of a [`RunEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TestQueued,
    TestRunning,
    TestCompleted,
    RunCompleted,
    RunCancelled,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TestQueued => "TEST_QUEUED",
            Self::TestRunning => "TEST_RUNNING",
            Self::TestCompleted => "TEST_COMPLETED",
            Self::RunCompleted => "RUN_COMPLETED",
            Self::RunCancelled => "RUN_CANCELLED",
        };
        f.write_str(s)
    }
}

impl RunEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::TestQueued(_) => EventKind::TestQueued,
            Self::TestRunning(_) => EventKind::TestRunning,
            Self::TestCompleted(_) => EventKind::TestCompleted,
            Self::RunCompleted(_) => EventKind::RunCompleted,
            Self::RunCancelled(_) => EventKind::RunCancelled,
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            Self::TestQueued(e) | Self::TestRunning(e) | Self::TestCompleted(e) => &e.run_id,
            Self::RunCompleted(o) | Self::RunCancelled(o) => &o.run_id,
        }
    }

    /// Per-test payload, `None` for terminal events
    pub fn test_event(&self) -> Option<&TestEvent> {
        match self {
            Self::TestQueued(e) | Self::TestRunning(e) | Self::TestCompleted(e) => Some(e),
            Self::RunCompleted(_) | Self::RunCancelled(_) => None,
        }
    }

    /// Whether this event ends the run's event stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunCompleted(_) | Self::RunCancelled(_))
    }
}
