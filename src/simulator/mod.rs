//! Mock run simulator
//!
//! Owns the catalog, the history store and the run registry of one
//! simulator instance. A started run executes on a background Tokio task:
//!
//! 1. every selected test case gets a QUEUED history row up front
//! 2. `TEST_QUEUED` is announced for each test case, in order
//! 3. test cases execute one at a time: `TEST_RUNNING`, a pseudo-random
//!    delay, then `TEST_COMPLETED` with a PASS/FAIL outcome
//! 4. exactly one terminal event closes the stream
//!
//! Cancellation is cooperative: the flag is checked before each test case
//! and again after its delay, never interrupting a delay in flight.

mod events;
mod rng;
mod run;

pub use events::{EventKind, RunEvent, RunOutcome, RunStatus, TestEvent};
pub use rng::Lcg;
pub use run::{RunId, RunListener, RunRequest, RunState};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::catalog::{logs_url, Catalog, HistoryLog, HistoryRow, Project, TestCase, TestStatus};
use crate::common::config::{Config, SimulatorConfig};
use crate::common::now_millis;

use run::{RunRegistry, SubscriberId};

/// Handle to a simulator instance; clones share the same state
#[derive(Clone)]
pub struct Simulator {
    inner: Arc<Inner>,
}

struct Inner {
    catalog: Catalog,
    config: SimulatorConfig,
    history: Mutex<HistoryLog>,
    runs: Mutex<RunRegistry>,
    /// One generator for all runs of this instance
    rng: Mutex<Lcg>,
    clock: Clock,
}

/// Epoch-millisecond timestamps derived from the Tokio clock, so that
/// timestamps and durations agree (including under paused test time)
struct Clock {
    wall_origin: i64,
    mono_origin: Instant,
}

impl Clock {
    fn new() -> Self {
        Self {
            wall_origin: now_millis(),
            mono_origin: Instant::now(),
        }
    }

    fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.mono_origin.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.wall_origin.saturating_add(elapsed)
    }
}

impl Simulator {
    /// Create a simulator with an empty history store
    pub fn new(catalog: Catalog, config: SimulatorConfig) -> Self {
        Self::with_history(catalog, config, Vec::new())
    }

    /// Create a simulator whose store starts with `rows` (most recent
    /// first). Run numbering continues after the highest `run-NNNN` found.
    pub fn with_history(catalog: Catalog, config: SimulatorConfig, rows: Vec<HistoryRow>) -> Self {
        let first_number = rows
            .iter()
            .filter_map(|r| run_number(&r.test_id))
            .max()
            .map_or(1, |n| n + 1);

        Self {
            inner: Arc::new(Inner {
                catalog,
                rng: Mutex::new(Lcg::new(config.seed)),
                config,
                history: Mutex::new(HistoryLog::from_rows(rows)),
                runs: Mutex::new(RunRegistry::new(first_number)),
                clock: Clock::new(),
            }),
        }
    }

    /// Build a simulator from the full configuration, seeding the demo
    /// history when enabled
    pub fn from_config(config: &Config) -> Self {
        let catalog = Catalog::from_config(&config.catalog);
        let rows = if config.catalog.seed_history {
            HistoryRow::seed_rows(now_millis())
        } else {
            Vec::new()
        };
        Self::with_history(catalog, config.simulator.clone(), rows)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub fn list_projects(&self) -> Vec<Project> {
        self.inner.catalog.projects().to_vec()
    }

    pub fn list_test_cases(&self, project_id: &str) -> Vec<TestCase> {
        self.inner.catalog.test_cases(project_id).to_vec()
    }

    /// All history rows, most recent first
    pub fn list_history(&self) -> Vec<HistoryRow> {
        self.inner.history.lock().sorted_by_recency()
    }

    /// Register a run and start executing it in the background.
    ///
    /// Returns immediately; subscribe to the returned id to follow
    /// progress. Outside a Tokio runtime nothing can execute, so the run is
    /// registered as cancelled without queueing any test case.
    pub fn start_run(&self, request: RunRequest) -> RunId {
        let run_id = self.inner.runs.lock().register(request.clone());

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(run_id = %run_id, "No Tokio runtime; run cancelled before start");
            self.inner.runs.lock().terminate(&run_id, RunStatus::Cancelled);
            return run_id;
        };

        let project_id = request.project_id;
        let project_name = self.inner.catalog.project_name(&project_id);

        let queued: Vec<TestEvent> = request
            .ordered_test_case_ids
            .iter()
            .map(|tc_id| TestEvent {
                run_id: run_id.to_string(),
                project_id: project_id.clone(),
                test_case_id: tc_id.clone(),
                test_case_name: self.inner.catalog.test_case_name(&project_id, tc_id),
                status: TestStatus::Queued,
                duration_ms: None,
                timestamp: self.inner.clock.now_ms(),
                logs_url: logs_url(run_id.as_str(), tc_id),
            })
            .collect();

        {
            let mut history = self.inner.history.lock();
            for event in &queued {
                history.upsert(event.to_row(project_name.clone()));
            }
        }

        tracing::info!(
            run_id = %run_id,
            project = %project_id,
            test_cases = queued.len(),
            "Run started"
        );

        let sim = self.clone();
        let id = run_id.clone();
        runtime.spawn(async move { sim.drive(id, queued).await });

        run_id
    }

    /// Register `listener` for every later event of `run_id`.
    ///
    /// Unknown and finished runs yield an inert subscription. Listeners are
    /// released after the terminal event, whether or not the subscription
    /// is unsubscribed.
    pub fn subscribe<F>(&self, run_id: &RunId, listener: F) -> Subscription
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.subscribe_listener(run_id, Arc::new(listener))
    }

    pub fn subscribe_listener(&self, run_id: &RunId, listener: RunListener) -> Subscription {
        match self.inner.runs.lock().add_subscriber(run_id, listener) {
            Some(id) => Subscription {
                target: Some((run_id.clone(), id)),
                simulator: Arc::downgrade(&self.inner),
            },
            None => {
                tracing::debug!(run_id = %run_id, "Subscribe to unknown or finished run; returning inert subscription");
                Subscription::inert()
            }
        }
    }

    /// Subscribe through an unbounded channel.
    ///
    /// The receiver yields `None` after the terminal event. For unknown or
    /// finished runs it is closed immediately.
    pub fn subscribe_channel(
        &self,
        run_id: &RunId,
    ) -> (Subscription, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(run_id, move |event| {
            // Receiver gone: nothing left to deliver to
            let _ = tx.send(event.clone());
        });
        (subscription, rx)
    }

    /// Request cancellation and announce `RUN_CANCELLED`.
    ///
    /// Returns whether the run exists. A run that already emitted its
    /// terminal event gets no second one.
    pub fn cancel_run(&self, run_id: &RunId) -> bool {
        let terminated = {
            let mut runs = self.inner.runs.lock();
            match runs.get_mut(run_id) {
                Some(entry) => entry.cancelled = true,
                None => return false,
            }
            runs.terminate(run_id, RunStatus::Cancelled)
        };

        match terminated {
            Some((project_id, listeners)) => {
                tracing::info!(run_id = %run_id, "Run cancelled");
                self.announce_terminal(run_id, project_id, RunStatus::Cancelled, &listeners);
            }
            None => tracing::debug!(run_id = %run_id, "Cancel requested for a finished run"),
        }
        true
    }

    pub fn run_state(&self, run_id: &RunId) -> Option<RunState> {
        self.inner.runs.lock().get(run_id).map(|e| e.state)
    }

    pub fn subscriber_count(&self, run_id: &RunId) -> usize {
        self.inner.runs.lock().subscriber_count(run_id)
    }

    async fn drive(self, run_id: RunId, queued: Vec<TestEvent>) {
        let Some((project_id, test_case_ids)) = self.enter(&run_id, RunState::Queueing) else {
            return;
        };

        for event in queued {
            self.emit(&run_id, &RunEvent::TestQueued(event));
        }

        if self.enter(&run_id, RunState::Executing).is_none() {
            return;
        }

        let project_name = self.inner.catalog.project_name(&project_id);

        for tc_id in &test_case_ids {
            if self.is_cancelled(&run_id) {
                break;
            }

            let test_case_name = self.inner.catalog.test_case_name(&project_id, tc_id);
            let logs_url = logs_url(run_id.as_str(), tc_id);
            let started = Instant::now();

            self.emit(
                &run_id,
                &RunEvent::TestRunning(TestEvent {
                    run_id: run_id.to_string(),
                    project_id: project_id.clone(),
                    test_case_id: tc_id.clone(),
                    test_case_name: test_case_name.clone(),
                    status: TestStatus::Running,
                    duration_ms: None,
                    timestamp: self.inner.clock.now_ms(),
                    logs_url: logs_url.clone(),
                }),
            );

            let delay = self.next_delay();
            tracing::debug!(run_id = %run_id, test_case = %tc_id, delay_ms = delay.as_millis() as u64, "Executing test case");
            tokio::time::sleep(delay).await;

            if self.is_cancelled(&run_id) {
                break;
            }

            let completed = TestEvent {
                run_id: run_id.to_string(),
                project_id: project_id.clone(),
                test_case_id: tc_id.clone(),
                test_case_name,
                status: self.next_outcome(),
                duration_ms: Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)),
                timestamp: self.inner.clock.now_ms(),
                logs_url,
            };

            self.inner
                .history
                .lock()
                .upsert(completed.to_row(project_name.clone()));
            self.emit(&run_id, &RunEvent::TestCompleted(completed));
        }

        if self.is_cancelled(&run_id) {
            return;
        }

        let terminated = self.inner.runs.lock().terminate(&run_id, RunStatus::Completed);
        if let Some((project_id, listeners)) = terminated {
            tracing::info!(run_id = %run_id, "Run completed");
            self.announce_terminal(&run_id, project_id, RunStatus::Completed, &listeners);
        }
    }

    /// Advance a live run to `state`, returning its project and test cases.
    /// `None` if the run is gone or already terminated.
    fn enter(&self, run_id: &RunId, state: RunState) -> Option<(String, Vec<String>)> {
        let mut runs = self.inner.runs.lock();
        let entry = runs.get_mut(run_id)?;
        if entry.state.is_terminal() {
            return None;
        }
        entry.state = state;
        Some((entry.project_id.clone(), entry.ordered_test_case_ids.clone()))
    }

    fn is_cancelled(&self, run_id: &RunId) -> bool {
        self.inner
            .runs
            .lock()
            .get(run_id)
            .map_or(true, |e| e.cancelled)
    }

    fn next_delay(&self) -> Duration {
        let draw = self.inner.rng.lock().next_f64();
        let span = (draw * self.inner.config.delay_span_ms as f64).floor() as u64;
        Duration::from_millis(self.inner.config.min_delay_ms.saturating_add(span))
    }

    fn next_outcome(&self) -> TestStatus {
        let draw = self.inner.rng.lock().next_f64();
        if draw > self.inner.config.pass_threshold {
            TestStatus::Pass
        } else {
            TestStatus::Fail
        }
    }

    fn emit(&self, run_id: &RunId, event: &RunEvent) {
        // Snapshot first: listeners may subscribe or unsubscribe while running
        let listeners = self.inner.runs.lock().listeners(run_id);
        deliver(&listeners, event);
    }

    fn announce_terminal(
        &self,
        run_id: &RunId,
        project_id: String,
        status: RunStatus,
        listeners: &[RunListener],
    ) {
        let outcome = RunOutcome {
            run_id: run_id.to_string(),
            project_id,
            status,
            timestamp: self.inner.clock.now_ms(),
        };
        let event = match status {
            RunStatus::Completed => RunEvent::RunCompleted(outcome),
            RunStatus::Cancelled => RunEvent::RunCancelled(outcome),
        };
        deliver(listeners, &event);
    }
}

fn deliver(listeners: &[RunListener], event: &RunEvent) {
    for listener in listeners {
        if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
            tracing::warn!(
                run_id = event.run_id(),
                kind = %event.kind(),
                "Run listener panicked; continuing delivery"
            );
        }
    }
}

/// Parse `NNNN` out of `run-NNNN` or `run-NNNN:<test case>`
fn run_number(test_id: &str) -> Option<u32> {
    test_id
        .split(':')
        .next()?
        .strip_prefix("run-")?
        .parse()
        .ok()
}

/// Registration of a run listener
///
/// Dropping a subscription leaves the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "the listener stays registered until unsubscribe() is called"]
pub struct Subscription {
    target: Option<(RunId, SubscriberId)>,
    simulator: Weak<Inner>,
}

impl Subscription {
    fn inert() -> Self {
        Self {
            target: None,
            simulator: Weak::new(),
        }
    }

    /// Whether this subscription is attached to a known run
    pub fn is_active(&self) -> bool {
        self.target.is_some()
    }

    /// Remove the listener. Safe to call from inside a listener callback.
    pub fn unsubscribe(self) {
        if let (Some((run_id, id)), Some(inner)) = (self.target, self.simulator.upgrade()) {
            inner.runs.lock().remove_subscriber(&run_id, id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("run_id", &self.target.as_ref().map(|(r, _)| r))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(project: &str, ids: &[&str]) -> RunRequest {
        RunRequest {
            project_id: project.to_string(),
            ordered_test_case_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn simulator() -> Simulator {
        Simulator::new(Catalog::builtin(), SimulatorConfig::default())
    }

    async fn collect(rx: &mut mpsc::UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = event.is_terminal();
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    fn kinds(events: &[RunEvent]) -> Vec<EventKind> {
        events.iter().map(RunEvent::kind).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_sequence_and_outcomes() {
        let sim = simulator();
        let run_id = sim.start_run(request("proj-smoke", &["tc-sm-001", "tc-sm-002"]));
        let (sub, mut rx) = sim.subscribe_channel(&run_id);
        assert_eq!(sim.run_state(&run_id), Some(RunState::Created));

        let events = collect(&mut rx).await;
        assert_eq!(
            kinds(&events),
            [
                EventKind::TestQueued,
                EventKind::TestQueued,
                EventKind::TestRunning,
                EventKind::TestCompleted,
                EventKind::TestRunning,
                EventKind::TestCompleted,
                EventKind::RunCompleted,
            ]
        );

        // Seed 1337: delay 626 ms then PASS, delay 482 ms then FAIL
        let first = events[3].test_event().unwrap();
        assert_eq!(first.test_case_id, "tc-sm-001");
        assert_eq!(first.status, TestStatus::Pass);
        assert_eq!(first.duration_ms, Some(626));
        let second = events[5].test_event().unwrap();
        assert_eq!(second.status, TestStatus::Fail);
        assert_eq!(second.duration_ms, Some(482));

        match &events[6] {
            RunEvent::RunCompleted(outcome) => assert_eq!(outcome.status, RunStatus::Completed),
            other => panic!("expected RUN_COMPLETED, got {other:?}"),
        }
        assert_eq!(sim.run_state(&run_id), Some(RunState::Completed));
        sub.unsubscribe();

        let history = sim.list_history();
        assert_eq!(history.len(), 2);
        let row = history
            .iter()
            .find(|r| r.test_id == "run-0001:tc-sm-001")
            .unwrap();
        assert_eq!(row.status, TestStatus::Pass);
        assert_eq!(row.project_name, "Smoke Tests");
        assert_eq!(row.logs_url, "#/logs/run-0001-tc-sm-001");
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_precedes_completed_per_test() {
        let sim = simulator();
        let ids = ["tc-cm-001", "tc-cm-002", "tc-cm-003", "tc-cm-004"];
        let run_id = sim.start_run(request("proj-cable", &ids));
        let (_sub, mut rx) = sim.subscribe_channel(&run_id);
        let events = collect(&mut rx).await;

        let position = |kind: EventKind, tc: &str| {
            events
                .iter()
                .position(|e| {
                    e.kind() == kind && e.test_event().is_some_and(|t| t.test_case_id == tc)
                })
                .unwrap()
        };
        let last_queued = events
            .iter()
            .rposition(|e| e.kind() == EventKind::TestQueued)
            .unwrap();
        for tc in ids {
            assert!(last_queued < position(EventKind::TestRunning, tc));
            assert!(position(EventKind::TestRunning, tc) < position(EventKind::TestCompleted, tc));
        }
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_delay_elapses() {
        let sim = simulator();
        let run_id = sim.start_run(request("proj-smoke", &["tc-sm-001", "tc-sm-002"]));
        let (_sub, mut rx) = sim.subscribe_channel(&run_id);

        // Let the background task reach its first delay
        tokio::task::yield_now().await;
        assert_eq!(sim.run_state(&run_id), Some(RunState::Executing));
        assert!(sim.cancel_run(&run_id));

        let events = collect(&mut rx).await;
        assert_eq!(
            kinds(&events),
            [
                EventKind::TestQueued,
                EventKind::TestQueued,
                EventKind::TestRunning,
                EventKind::RunCancelled,
            ]
        );

        // The loop wakes up, sees the flag and emits nothing more
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(sim.run_state(&run_id), Some(RunState::Cancelled));

        let history = sim.list_history();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.status == TestStatus::Queued));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_task_starts() {
        let sim = simulator();
        let run_id = sim.start_run(request("proj-smoke", &["tc-sm-001"]));
        let (_sub, mut rx) = sim.subscribe_channel(&run_id);
        assert!(sim.cancel_run(&run_id));

        let events = collect(&mut rx).await;
        assert_eq!(kinds(&events), [EventKind::RunCancelled]);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(sim.list_history()[0].status, TestStatus::Queued);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_terminal_event_per_run() {
        let sim = simulator();
        let run_id = sim.start_run(request("proj-smoke", &["tc-sm-001"]));
        let (_sub, mut rx) = sim.subscribe_channel(&run_id);
        tokio::task::yield_now().await;

        assert!(sim.cancel_run(&run_id));
        assert!(sim.cancel_run(&run_id));
        tokio::time::sleep(Duration::from_secs(5)).await;

        let mut terminals = 0;
        while let Ok(event) = rx.try_recv() {
            if event.is_terminal() {
                terminals += 1;
            }
        }
        assert_eq!(terminals, 1);

        // Cancelling a completed run reports it found but stays silent
        let done = sim.start_run(request("proj-smoke", &["tc-sm-002"]));
        let (_sub, mut rx) = sim.subscribe_channel(&done);
        let events = collect(&mut rx).await;
        assert_eq!(events.last().unwrap().kind(), EventKind::RunCompleted);
        assert!(sim.cancel_run(&done));
        assert!(rx.try_recv().is_err());
        assert_eq!(sim.run_state(&done), Some(RunState::Completed));
    }

    #[tokio::test]
    async fn test_unknown_run_ids() {
        let sim = simulator();
        let unknown = RunId::from("run-0404");
        assert!(!sim.cancel_run(&unknown));
        assert!(sim.run_state(&unknown).is_none());

        let sub = sim.subscribe(&unknown, |_| {});
        assert!(!sub.is_active());
        sub.unsubscribe();

        let (sub, mut rx) = sim.subscribe_channel(&unknown);
        assert!(!sub.is_active());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_run_only_terminates() {
        let sim = simulator();
        let run_id = sim.start_run(request("proj-smoke", &[]));
        let (_sub, mut rx) = sim.subscribe_channel(&run_id);
        let events = collect(&mut rx).await;
        assert_eq!(kinds(&events), [EventKind::RunCompleted]);
        assert!(sim.list_history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_listener_does_not_stop_delivery() {
        let sim = simulator();
        let run_id = sim.start_run(request("proj-smoke", &["tc-sm-001"]));
        let _bad = sim.subscribe(&run_id, |_| panic!("listener failure"));
        let (_sub, mut rx) = sim.subscribe_channel(&run_id);

        let events = collect(&mut rx).await;
        assert_eq!(events.len(), 4);
        assert_eq!(sim.run_state(&run_id), Some(RunState::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_from_inside_listener() {
        let sim = simulator();
        let run_id = sim.start_run(request("proj-smoke", &["tc-sm-001", "tc-sm-002"]));

        let seen = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let sub = {
            let seen = seen.clone();
            let slot = slot.clone();
            sim.subscribe(&run_id, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = slot.lock().take() {
                    sub.unsubscribe();
                }
            })
        };
        *slot.lock() = Some(sub);
        let (_other, mut rx) = sim.subscribe_channel(&run_id);
        assert_eq!(sim.subscriber_count(&run_id), 2);

        let events = collect(&mut rx).await;
        assert_eq!(events.len(), 7);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(sim.subscriber_count(&run_id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_subscriber_gets_no_replay() {
        let sim = simulator();
        let run_id = sim.start_run(request("proj-smoke", &["tc-sm-001"]));
        tokio::task::yield_now().await;

        let (_sub, mut rx) = sim.subscribe_channel(&run_id);
        let events = collect(&mut rx).await;
        assert_eq!(
            kinds(&events),
            [EventKind::TestCompleted, EventKind::RunCompleted]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_simulators_replay_identically() {
        async fn outcomes() -> Vec<(TestStatus, Option<u64>)> {
            let sim = simulator();
            let run_id = sim.start_run(request(
                "proj-cable",
                &["tc-cm-001", "tc-cm-002", "tc-cm-003", "tc-cm-004", "tc-cm-005"],
            ));
            let (_sub, mut rx) = sim.subscribe_channel(&run_id);
            collect(&mut rx)
                .await
                .iter()
                .filter(|e| e.kind() == EventKind::TestCompleted)
                .filter_map(|e| e.test_event().map(|t| (t.status, t.duration_ms)))
                .collect()
        }

        let first = outcomes().await;
        assert_eq!(first.len(), 5);
        assert_eq!(first, outcomes().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_numbering_continues_after_seed_history() {
        let sim = Simulator::from_config(&Config::default());
        assert_eq!(sim.list_history().len(), 2);
        assert_eq!(sim.list_history()[0].test_id, "run-0001");

        let run_id = sim.start_run(request("proj-smoke", &["tc-sm-001"]));
        assert_eq!(run_id.as_str(), "run-0003");
        let next = sim.start_run(request("proj-smoke", &[]));
        assert_eq!(next.as_str(), "run-0004");

        // Queued rows land ahead of the older seeded rows
        assert_eq!(sim.list_history()[0].test_id, "run-0003:tc-sm-001");
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_closes_after_completion_without_unsubscribe() {
        let sim = simulator();
        let run_id = sim.start_run(request("proj-smoke", &["tc-sm-001"]));
        let (sub, mut rx) = sim.subscribe_channel(&run_id);
        drop(sub);

        let mut count = 0;
        while let Some(_event) = rx.recv().await {
            count += 1;
        }
        assert_eq!(count, 4);
        assert_eq!(sim.subscriber_count(&run_id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_closes_after_cancel() {
        let sim = simulator();
        let run_id = sim.start_run(request("proj-smoke", &["tc-sm-001", "tc-sm-002"]));
        let (_sub, mut rx) = sim.subscribe_channel(&run_id);
        tokio::task::yield_now().await;
        sim.cancel_run(&run_id);

        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event.kind());
        }
        assert_eq!(last, Some(EventKind::RunCancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribing_to_finished_run_is_inert() {
        let sim = simulator();
        let run_id = sim.start_run(request("proj-smoke", &[]));
        let (_sub, mut rx) = sim.subscribe_channel(&run_id);
        collect(&mut rx).await;
        assert_eq!(sim.run_state(&run_id), Some(RunState::Completed));

        let (late, mut late_rx) = sim.subscribe_channel(&run_id);
        assert!(!late.is_active());
        assert!(late_rx.recv().await.is_none());
        assert_eq!(sim.subscriber_count(&run_id), 0);
    }

    #[test]
    fn test_start_run_outside_runtime_is_cancelled() {
        let sim = simulator();
        let run_id = sim.start_run(request("proj-smoke", &["tc-sm-001"]));
        assert_eq!(run_id.as_str(), "run-0001");
        assert_eq!(sim.run_state(&run_id), Some(RunState::Cancelled));
        assert!(sim.list_history().is_empty());
        assert!(sim.cancel_run(&run_id));
    }

    #[test]
    fn test_huge_min_delay_saturates() {
        let config = SimulatorConfig {
            min_delay_ms: u64::MAX,
            ..SimulatorConfig::default()
        };
        let sim = Simulator::new(Catalog::builtin(), config);
        assert_eq!(sim.next_delay(), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_run_number_parsing() {
        assert_eq!(run_number("run-0002"), Some(2));
        assert_eq!(run_number("run-0017:tc-a"), Some(17));
        assert_eq!(run_number("adhoc"), None);
    }
}
