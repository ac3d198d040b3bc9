//! Dashboard state controller
//!
//! Mediates between a presentation layer and the [`Simulator`]: holds the
//! project selection, the ordered test-case selection, a bounded history
//! log and the pass/fail summary, and folds run events into them.
//!
//! At most one run is active at a time. Stopping a run resets the running
//! state right away instead of waiting for the terminal event, so the
//! simulator may still be finishing its current delay when the dashboard
//! already reports idle.
//!
//! The controller attaches its listener right after the run is started.
//! On a current-thread runtime the run task cannot emit anything before
//! that. On a multi-threaded runtime early `TEST_QUEUED`/`TEST_RUNNING`
//! events may be missed; the history then catches up at the next completed
//! test or at the resync that follows the terminal event.

mod selection;
mod summary;

pub use selection::{Direction, Selection};
pub use summary::Summary;

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;

use crate::catalog::{HistoryLog, Project, TestCase};
use crate::common::config::DashboardConfig;
use crate::common::now_millis;
use crate::simulator::{RunEvent, RunId, RunRequest, Simulator, Subscription};

/// Reference to the run the dashboard is following
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRun {
    pub run_id: RunId,
    pub project_id: String,
    /// Epoch milliseconds
    pub started_at: i64,
}

/// Observable dashboard state
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub projects: Vec<Project>,
    pub selected_project_id: Option<String>,
    pub test_cases: Vec<TestCase>,
    pub selected_test_case_ids: Selection,
    pub history: HistoryLog,
    pub summary: Summary,
    pub active_run: Option<ActiveRun>,
    pub is_running: bool,
}

impl DashboardView {
    pub fn selected_project(&self) -> Option<&Project> {
        let id = self.selected_project_id.as_deref()?;
        self.projects.iter().find(|p| p.id == id)
    }

    fn refresh_summary(&mut self) {
        self.summary = match &self.selected_project_id {
            Some(id) => Summary::compute(self.history.rows(), id),
            None => Summary::default(),
        };
    }

    fn is_following(&self, run_id: &str) -> bool {
        self.active_run
            .as_ref()
            .is_some_and(|a| a.run_id.as_str() == run_id)
    }
}

/// Handle to the dashboard controller; clones share the same state
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<Shared>,
}

struct Shared {
    simulator: Simulator,
    history_limit: usize,
    state: Mutex<State>,
    /// Revision counter bumped on every state change
    changes: watch::Sender<u64>,
}

struct State {
    view: DashboardView,
    subscription: Option<Subscription>,
}

impl Dashboard {
    /// Load projects and history, select the first project
    pub fn load(simulator: Simulator, config: &DashboardConfig) -> Self {
        let projects = simulator.list_projects();
        let mut history = HistoryLog::from_rows(simulator.list_history());
        history.truncate(config.history_limit);

        let selected_project_id = projects.first().map(|p| p.id.clone());
        let test_cases = selected_project_id
            .as_deref()
            .map(|id| simulator.list_test_cases(id))
            .unwrap_or_default();

        let mut view = DashboardView {
            projects,
            selected_project_id,
            test_cases,
            history,
            ..DashboardView::default()
        };
        view.refresh_summary();

        tracing::debug!(
            projects = view.projects.len(),
            history = view.history.len(),
            selected = ?view.selected_project_id,
            "Dashboard loaded"
        );

        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Shared {
                simulator,
                history_limit: config.history_limit,
                state: Mutex::new(State {
                    view,
                    subscription: None,
                }),
                changes,
            }),
        }
    }

    pub fn simulator(&self) -> &Simulator {
        &self.inner.simulator
    }

    /// Copy of the current observable state
    pub fn snapshot(&self) -> DashboardView {
        self.inner.state.lock().view.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().view.is_running
    }

    pub fn summary(&self) -> Summary {
        self.inner.state.lock().view.summary
    }

    /// Receiver notified on every state change
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    /// Resolve once no run is active
    pub async fn wait_idle(&self) {
        let mut changes = self.changes();
        while self.is_running() {
            if changes.changed().await.is_err() {
                break;
            }
        }
    }

    /// Switch the active project. Ignored while a run is active or when
    /// the project is already selected.
    pub fn select_project(&self, project_id: &str) -> bool {
        let test_cases = self.inner.simulator.list_test_cases(project_id);
        {
            let mut state = self.inner.state.lock();
            let view = &mut state.view;
            if view.is_running {
                tracing::debug!(project = %project_id, "Project selection locked while running");
                return false;
            }
            if view.selected_project_id.as_deref() == Some(project_id) {
                return false;
            }
            view.selected_project_id = Some(project_id.to_string());
            view.test_cases = test_cases;
            view.selected_test_case_ids.clear();
            view.refresh_summary();
        }
        self.notify();
        true
    }

    /// Add or remove a test case of the current project.
    /// Returns whether the selection changed.
    pub fn toggle_test_case(&self, test_case_id: &str) -> bool {
        {
            let mut state = self.inner.state.lock();
            let view = &mut state.view;
            if !view.test_cases.iter().any(|tc| tc.id == test_case_id) {
                tracing::debug!(test_case = %test_case_id, "Ignoring toggle of unknown test case");
                return false;
            }
            view.selected_test_case_ids.toggle(test_case_id);
        }
        self.notify();
        true
    }

    /// Select every test case of the current project, or none
    pub fn set_select_all(&self, checked: bool) {
        {
            let mut state = self.inner.state.lock();
            let view = &mut state.view;
            if checked {
                view.selected_test_case_ids.select_all(&view.test_cases);
            } else {
                view.selected_test_case_ids.clear();
            }
        }
        self.notify();
    }

    /// Move a selected test case one position up or down
    pub fn move_selected(&self, test_case_id: &str, direction: Direction) -> bool {
        let moved = self
            .inner
            .state
            .lock()
            .view
            .selected_test_case_ids
            .move_item(test_case_id, direction);
        if moved {
            self.notify();
        }
        moved
    }

    /// Start a run over the current selection and follow its events.
    ///
    /// Returns `None` without a project, without a selection, or while a
    /// run is already active. Outside a Tokio runtime the simulator cancels
    /// the run on the spot, so the dashboard is idle again on return.
    pub fn begin_run(&self) -> Option<RunId> {
        let request = {
            let mut state = self.inner.state.lock();
            let view = &mut state.view;
            let project_id = view.selected_project_id.clone()?;
            if view.is_running || view.selected_test_case_ids.is_empty() {
                return None;
            }
            view.is_running = true;
            RunRequest {
                project_id,
                ordered_test_case_ids: view.selected_test_case_ids.ids().to_vec(),
            }
        };

        let project_id = request.project_id.clone();
        let run_id = self.inner.simulator.start_run(request);

        self.inner.state.lock().view.active_run = Some(ActiveRun {
            run_id: run_id.clone(),
            project_id,
            started_at: now_millis(),
        });

        let weak: Weak<Shared> = Arc::downgrade(&self.inner);
        let subscription = self.inner.simulator.subscribe(&run_id, move |event| {
            if let Some(inner) = weak.upgrade() {
                Dashboard { inner }.on_event(event);
            }
        });

        let stale = {
            let mut state = self.inner.state.lock();
            if state.view.is_following(run_id.as_str()) {
                state.subscription.replace(subscription)
            } else {
                // Terminal event already handled
                Some(subscription)
            }
        };
        if let Some(stale) = stale {
            stale.unsubscribe();
        }

        // The run may have finished before the listener was attached
        if self
            .inner
            .simulator
            .run_state(&run_id)
            .is_some_and(|s| s.is_terminal())
        {
            self.finish_run(run_id.as_str());
        }

        self.notify();
        Some(run_id)
    }

    /// Cancel the active run and reset right away.
    /// Returns false when no run is active.
    pub fn stop_run(&self) -> bool {
        let run_id = match &self.inner.state.lock().view.active_run {
            Some(active) => active.run_id.clone(),
            None => return false,
        };

        self.inner.simulator.cancel_run(&run_id);

        // The cancel announcement usually finished the run already
        self.finish_run(run_id.as_str());
        self.resync_history();
        true
    }

    fn on_event(&self, event: &RunEvent) {
        let Some(test) = event.test_event() else {
            self.finish_run(event.run_id());
            return;
        };

        {
            let mut state = self.inner.state.lock();
            let view = &mut state.view;
            if !view.is_following(event.run_id()) {
                return;
            }
            let project_name = self.inner.simulator.catalog().project_name(&test.project_id);
            view.history.upsert(test.to_row(project_name));
            view.history.truncate(self.inner.history_limit);
            view.refresh_summary();
        }
        self.notify();
    }

    /// Leave running state for `run_id`, drop the listener and resync.
    /// No-op unless `run_id` is the active run.
    fn finish_run(&self, run_id: &str) {
        let subscription = {
            let mut state = self.inner.state.lock();
            if !state.view.is_following(run_id) {
                return;
            }
            state.view.is_running = false;
            state.view.active_run = None;
            state.subscription.take()
        };
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        tracing::debug!(run_id = %run_id, "Dashboard run finished");
        self.resync_history();
    }

    /// Replace the log with the store's rows
    fn resync_history(&self) {
        let mut history = HistoryLog::from_rows(self.inner.simulator.list_history());
        history.truncate(self.inner.history_limit);
        {
            let mut state = self.inner.state.lock();
            state.view.history = history;
            state.view.refresh_summary();
        }
        self.notify();
    }

    fn notify(&self) {
        self.inner.changes.send_modify(|rev| *rev += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, HistoryRow, TestStatus};
    use crate::common::config::{Config, SimulatorConfig};
    use crate::simulator::RunState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn dashboard() -> Dashboard {
        let config = Config::default();
        Dashboard::load(Simulator::from_config(&config), &config.dashboard)
    }

    #[tokio::test]
    async fn test_load_selects_first_project() {
        let dash = dashboard();
        let view = dash.snapshot();
        assert_eq!(view.projects.len(), 2);
        assert_eq!(view.selected_project_id.as_deref(), Some("proj-cable"));
        assert_eq!(view.selected_project().unwrap().name, "Cable Modem Tests");
        assert_eq!(view.test_cases.len(), 5);
        assert_eq!(view.history.len(), 2);
        // Seeded run-0002 failed for proj-cable
        assert_eq!(view.summary, Summary { pass: 0, fail: 1 });
        assert!(!view.is_running);
    }

    #[tokio::test]
    async fn test_load_without_projects() {
        let sim = Simulator::new(Catalog::new(), SimulatorConfig::default());
        let dash = Dashboard::load(sim, &DashboardConfig::default());
        let view = dash.snapshot();
        assert!(view.selected_project_id.is_none());
        assert!(view.test_cases.is_empty());
        assert!(dash.begin_run().is_none());
    }

    #[tokio::test]
    async fn test_select_project_resets_selection() {
        let dash = dashboard();
        dash.set_select_all(true);
        assert_eq!(dash.snapshot().selected_test_case_ids.len(), 5);

        assert!(dash.select_project("proj-smoke"));
        let view = dash.snapshot();
        assert_eq!(view.test_cases.len(), 4);
        assert!(view.selected_test_case_ids.is_empty());
        assert_eq!(view.summary, Summary { pass: 1, fail: 0 });

        // Unknown project: selectable, empty catalog
        assert!(dash.select_project("proj-unknown"));
        assert!(dash.snapshot().test_cases.is_empty());
        assert_eq!(dash.summary(), Summary::default());
    }

    #[tokio::test]
    async fn test_selection_intents() {
        let dash = dashboard();
        assert!(dash.toggle_test_case("tc-cm-001"));
        assert!(dash.toggle_test_case("tc-cm-003"));
        assert!(!dash.toggle_test_case("tc-sm-001"));
        assert_eq!(
            dash.snapshot().selected_test_case_ids.ids(),
            ["tc-cm-001", "tc-cm-003"]
        );

        assert!(dash.move_selected("tc-cm-003", Direction::Up));
        assert_eq!(
            dash.snapshot().selected_test_case_ids.ids(),
            ["tc-cm-003", "tc-cm-001"]
        );
        assert!(!dash.move_selected("tc-cm-003", Direction::Up));
        assert!(!dash.move_selected("tc-cm-002", Direction::Down));

        dash.set_select_all(true);
        dash.set_select_all(false);
        assert!(dash.snapshot().selected_test_case_ids.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_to_completion() {
        let dash = dashboard();
        dash.toggle_test_case("tc-cm-002");
        dash.toggle_test_case("tc-cm-001");

        let run_id = dash.begin_run().unwrap();
        assert_eq!(run_id.as_str(), "run-0003");
        assert!(dash.is_running());
        assert!(dash.begin_run().is_none());
        assert!(!dash.select_project("proj-smoke"));
        assert_eq!(dash.simulator().subscriber_count(&run_id), 1);

        dash.wait_idle().await;

        let view = dash.snapshot();
        assert!(!view.is_running);
        assert!(view.active_run.is_none());
        assert_eq!(dash.simulator().subscriber_count(&run_id), 0);
        assert_eq!(dash.simulator().run_state(&run_id), Some(RunState::Completed));

        // Seed 1337: first executed case passes, second fails
        let first = view.history.get("run-0003:tc-cm-002").unwrap();
        assert_eq!(first.status, TestStatus::Pass);
        let second = view.history.get("run-0003:tc-cm-001").unwrap();
        assert_eq!(second.status, TestStatus::Fail);
        assert_eq!(view.summary, Summary { pass: 1, fail: 2 });

        // Selection survives the run
        assert_eq!(view.selected_test_case_ids.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_resets_optimistically() {
        let dash = dashboard();
        dash.select_project("proj-smoke");
        dash.toggle_test_case("tc-sm-001");
        dash.toggle_test_case("tc-sm-002");

        let run_id = dash.begin_run().unwrap();
        tokio::task::yield_now().await;
        assert!(dash.stop_run());

        let view = dash.snapshot();
        assert!(!view.is_running);
        assert!(view.active_run.is_none());
        assert_eq!(dash.simulator().run_state(&run_id), Some(RunState::Cancelled));
        for tc in ["tc-sm-001", "tc-sm-002"] {
            let row = view.history.get(&format!("{run_id}:{tc}")).unwrap();
            assert_eq!(row.status, TestStatus::Queued);
        }
        assert!(!dash.stop_run());

        // Nothing changes once the abandoned delay elapses
        tokio::time::sleep(Duration::from_secs(2)).await;
        let later = dash.snapshot();
        assert_eq!(later.history, view.history);
        assert_eq!(later.summary, Summary { pass: 1, fail: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_capped_after_every_fold() {
        let config = Config::default();
        let dash = Dashboard::load(
            Simulator::from_config(&config),
            &DashboardConfig { history_limit: 3 },
        );
        assert_eq!(dash.snapshot().history.len(), 2);
        dash.set_select_all(true);

        let run_id = dash.begin_run().unwrap();
        // Listener panics are swallowed, so record what the probe saw
        let checks = Arc::new(AtomicUsize::new(0));
        let max_len = Arc::new(AtomicUsize::new(0));
        let probe = {
            let dash = dash.clone();
            let checks = checks.clone();
            let max_len = max_len.clone();
            dash.simulator().clone().subscribe(&run_id, move |_| {
                max_len.fetch_max(dash.snapshot().history.len(), Ordering::SeqCst);
                checks.fetch_add(1, Ordering::SeqCst);
            })
        };

        dash.wait_idle().await;
        probe.unsubscribe();
        assert_eq!(checks.load(Ordering::SeqCst), 16);
        assert_eq!(max_len.load(Ordering::SeqCst), 3);

        let view = dash.snapshot();
        assert_eq!(view.history.len(), 3);
        assert!(dash.simulator().list_history().len() > 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_ignores_other_projects() {
        let rows = vec![HistoryRow {
            test_id: "run-0001:tc-sm-001".to_string(),
            project_id: "proj-smoke".to_string(),
            project_name: "Smoke Tests".to_string(),
            status: TestStatus::Pass,
            duration_ms: Some(500),
            timestamp: now_millis(),
            logs_url: "#/logs/run-0001-tc-sm-001".to_string(),
            test_case_id: Some("tc-sm-001".to_string()),
            test_case_name: Some("Login Smoke".to_string()),
        }];
        let sim = Simulator::with_history(Catalog::builtin(), SimulatorConfig::default(), rows);
        let dash = Dashboard::load(sim, &DashboardConfig::default());

        dash.select_project("proj-smoke");
        let before = dash.summary();
        assert_eq!(before, Summary { pass: 1, fail: 0 });

        // A cable run that fails once leaves the smoke summary alone
        dash.select_project("proj-cable");
        dash.toggle_test_case("tc-cm-001");
        dash.toggle_test_case("tc-cm-002");
        dash.begin_run().unwrap();
        dash.wait_idle().await;
        assert_eq!(dash.summary(), Summary { pass: 1, fail: 1 });

        dash.select_project("proj-smoke");
        assert_eq!(dash.summary(), before);
    }

    #[test]
    fn test_begin_run_outside_runtime_returns_to_idle() {
        let dash = dashboard();
        dash.toggle_test_case("tc-cm-001");
        let run_id = dash.begin_run().unwrap();

        let view = dash.snapshot();
        assert!(!view.is_running);
        assert!(view.active_run.is_none());
        assert_eq!(dash.simulator().run_state(&run_id), Some(RunState::Cancelled));
        assert_eq!(view.history.len(), 2);
        assert!(!dash.stop_run());
    }

    #[tokio::test]
    async fn test_changes_are_notified() {
        let dash = dashboard();
        let mut changes = dash.changes();
        dash.toggle_test_case("tc-cm-001");
        assert!(changes.has_changed().unwrap());
        changes.borrow_and_update();
        assert!(!dash.move_selected("tc-cm-001", Direction::Down));
        assert!(!changes.has_changed().unwrap());
    }
}
