//! Pass/fail summary derived from the history log

use serde::{Deserialize, Serialize};

use crate::catalog::{HistoryRow, TestStatus};

/// Pass and fail counts for one project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub pass: usize,
    pub fail: usize,
}

impl Summary {
    /// Count terminal outcomes of `project_id` from scratch
    pub fn compute(rows: &[HistoryRow], project_id: &str) -> Self {
        rows.iter()
            .filter(|r| r.project_id == project_id)
            .fold(Self::default(), |mut acc, r| {
                match r.status {
                    TestStatus::Pass => acc.pass += 1,
                    TestStatus::Fail => acc.fail += 1,
                    TestStatus::Queued | TestStatus::Running => {}
                }
                acc
            })
    }

    pub fn total(&self) -> usize {
        self.pass + self.fail
    }

    /// Share of passing outcomes, `None` without any outcome
    pub fn pass_rate(&self) -> Option<f64> {
        (self.total() > 0).then(|| self.pass as f64 / self.total() as f64)
    }
}
