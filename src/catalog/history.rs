//! History rows and the upsert-ordered history log

use serde::{Deserialize, Serialize};

/// Status of a single test case within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Queued,
    Running,
    Pass,
    Fail,
}

impl TestStatus {
    /// Whether the status is a final outcome
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Pass | Self::Fail)
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "QUEUED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

impl std::str::FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(Self::Queued),
            "RUNNING" => Ok(Self::Running),
            "PASS" => Ok(Self::Pass),
            "FAIL" => Ok(Self::Fail),
            _ => Err(format!("unknown test status '{s}'")),
        }
    }
}

/// Display record of one test case's outcome within one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    /// Composite `runId:testCaseId` key (just the run id for seeded rows)
    pub test_id: String,
    pub project_id: String,
    pub project_name: String,
    pub status: TestStatus,
    pub duration_ms: Option<u64>,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub logs_url: String,
    pub test_case_id: Option<String>,
    pub test_case_name: Option<String>,
}

impl HistoryRow {
    /// Composite key identifying a test case within a run
    pub fn composite_id(run_id: &str, test_case_id: &str) -> String {
        format!("{run_id}:{test_case_id}")
    }

    /// The two historical rows a fresh store starts with
    pub fn seed_rows(now: i64) -> Vec<HistoryRow> {
        const MINUTE_MS: i64 = 60 * 1000;
        vec![
            HistoryRow {
                test_id: "run-0001".to_string(),
                project_id: "proj-smoke".to_string(),
                project_name: "Smoke Tests".to_string(),
                status: TestStatus::Pass,
                duration_ms: Some(1530),
                timestamp: now - 22 * MINUTE_MS,
                logs_url: "#/logs/run-0001".to_string(),
                test_case_id: None,
                test_case_name: None,
            },
            HistoryRow {
                test_id: "run-0002".to_string(),
                project_id: "proj-cable".to_string(),
                project_name: "Cable Modem Tests".to_string(),
                status: TestStatus::Fail,
                duration_ms: Some(2480),
                timestamp: now - 58 * MINUTE_MS,
                logs_url: "#/logs/run-0002".to_string(),
                test_case_id: None,
                test_case_name: None,
            },
        ]
    }
}

/// Logs link for a test case within a run
pub fn logs_url(run_id: &str, test_case_id: &str) -> String {
    format!("#/logs/{run_id}-{test_case_id}")
}

/// History rows keyed by `test_id`, most recent insert first
///
/// Upserting an existing key replaces the row in place; a new key is
/// prepended. The log never holds two rows with the same key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HistoryLog {
    rows: Vec<HistoryRow>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from rows already ordered most recent first.
    /// Later duplicates of a key are dropped.
    pub fn from_rows(rows: Vec<HistoryRow>) -> Self {
        let mut log = Self::new();
        for row in rows {
            if log.position(&row.test_id).is_none() {
                log.rows.push(row);
            }
        }
        log
    }

    /// Replace the row with the same key in place, or prepend it
    pub fn upsert(&mut self, row: HistoryRow) {
        match self.position(&row.test_id) {
            Some(idx) => self.rows[idx] = row,
            None => self.rows.insert(0, row),
        }
    }

    /// Keep only the `limit` most recent rows
    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }

    pub fn get(&self, test_id: &str) -> Option<&HistoryRow> {
        self.position(test_id).map(|idx| &self.rows[idx])
    }

    pub fn rows(&self) -> &[HistoryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy of all rows sorted by timestamp, most recent first.
    /// Rows with equal timestamps keep their log order.
    pub fn sorted_by_recency(&self) -> Vec<HistoryRow> {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows
    }

    fn position(&self, test_id: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.test_id == test_id)
    }
}
