//! Run registry and per-run lifecycle state

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::events::{RunEvent, RunStatus};

/// Callback invoked synchronously for every event of a subscribed run
pub type RunListener = Arc<dyn Fn(&RunEvent) + Send + Sync>;

pub(super) type SubscriberId = u64;

/// Identifier of a run, formatted as `run-NNNN`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn from_number(number: u32) -> Self {
        Self(format!("run-{number:04}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Parameters of a new run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub project_id: String,
    pub ordered_test_case_ids: Vec<String>,
}

/// Run lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Registered, background sequence not yet running
    Created,
    /// Announcing queued test cases
    Queueing,
    /// Executing test cases one by one
    Executing,
    /// Terminal event `RUN_COMPLETED` emitted
    Completed,
    /// Terminal event `RUN_CANCELLED` emitted
    Cancelled,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Queueing => write!(f, "queueing"),
            Self::Executing => write!(f, "executing"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

pub(super) struct RunEntry {
    pub project_id: String,
    pub ordered_test_case_ids: Vec<String>,
    pub cancelled: bool,
    pub state: RunState,
    subscribers: Vec<(SubscriberId, RunListener)>,
}

/// All runs of one simulator, retained for subscription lookup
pub(super) struct RunRegistry {
    runs: HashMap<RunId, RunEntry>,
    next_number: u32,
    next_subscriber: SubscriberId,
}

impl RunRegistry {
    pub fn new(first_number: u32) -> Self {
        Self {
            runs: HashMap::new(),
            next_number: first_number,
            next_subscriber: 1,
        }
    }

    pub fn register(&mut self, request: RunRequest) -> RunId {
        let run_id = RunId::from_number(self.next_number);
        self.next_number += 1;
        self.runs.insert(
            run_id.clone(),
            RunEntry {
                project_id: request.project_id,
                ordered_test_case_ids: request.ordered_test_case_ids,
                cancelled: false,
                state: RunState::Created,
                subscribers: Vec::new(),
            },
        );
        run_id
    }

    pub fn get(&self, run_id: &RunId) -> Option<&RunEntry> {
        self.runs.get(run_id)
    }

    pub fn get_mut(&mut self, run_id: &RunId) -> Option<&mut RunEntry> {
        self.runs.get_mut(run_id)
    }

    /// Register a listener. `None` for unknown runs and for runs that
    /// already emitted their terminal event.
    pub fn add_subscriber(&mut self, run_id: &RunId, listener: RunListener) -> Option<SubscriberId> {
        let id = self.next_subscriber;
        let entry = self.runs.get_mut(run_id)?;
        if entry.state.is_terminal() {
            return None;
        }
        entry.subscribers.push((id, listener));
        self.next_subscriber += 1;
        Some(id)
    }

    pub fn remove_subscriber(&mut self, run_id: &RunId, id: SubscriberId) -> bool {
        match self.runs.get_mut(run_id) {
            Some(entry) => {
                let before = entry.subscribers.len();
                entry.subscribers.retain(|(sid, _)| *sid != id);
                entry.subscribers.len() != before
            }
            None => false,
        }
    }

    /// Snapshot of the listeners for a non-terminal event.
    ///
    /// Empty once the run has emitted its terminal event, so nothing is
    /// delivered after it.
    pub fn listeners(&self, run_id: &RunId) -> Vec<RunListener> {
        match self.runs.get(run_id) {
            Some(entry) if !entry.state.is_terminal() => {
                entry.subscribers.iter().map(|(_, l)| l.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Move a run to its terminal state.
    ///
    /// Returns the project id and the listeners to notify, or `None` when
    /// the run is unknown or already terminated. The listeners are removed
    /// from the run: once the caller drops them, their captured state (such
    /// as channel senders) goes with them.
    pub fn terminate(
        &mut self,
        run_id: &RunId,
        status: RunStatus,
    ) -> Option<(String, Vec<RunListener>)> {
        let entry = self.runs.get_mut(run_id)?;
        if entry.state.is_terminal() {
            return None;
        }
        entry.state = match status {
            RunStatus::Completed => RunState::Completed,
            RunStatus::Cancelled => RunState::Cancelled,
        };
        let listeners = std::mem::take(&mut entry.subscribers)
            .into_iter()
            .map(|(_, l)| l)
            .collect();
        Some((entry.project_id.clone(), listeners))
    }

    pub fn subscriber_count(&self, run_id: &RunId) -> usize {
        self.runs
            .get(run_id)
            .map(|e| e.subscribers.len())
            .unwrap_or(0)
    }
}
