//! Scenario runner implementation
//!
//! Executes scenario steps directly against a [`Dashboard`] backed by a
//! fresh [`Simulator`], so every scenario starts from the same seeded state.

use std::path::Path;
use std::time::Duration;

use colored::Colorize;

use crate::catalog::HistoryRow;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::dashboard::Dashboard;
use crate::simulator::{RunId, Simulator};

use super::config::{RowAssertion, StatusCount, TestScenario, TestStep};

/// Default wait_idle timeout
const DEFAULT_WAIT_MS: u64 = 30_000;

/// Result of a scenario run
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub error: Option<String>,
}

/// Mutable state carried between steps
#[derive(Default)]
struct StepContext {
    last_run: Option<RunId>,
}

/// Load and parse a scenario file
pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))?;
    serde_yaml::from_str(&content).map_err(|e| Error::ScenarioParse(e.to_string()))
}

/// Run a scenario from a YAML file
pub async fn run_scenario(path: &Path, verbose: bool) -> Result<TestResult> {
    let scenario = load_scenario(path)?;
    execute_scenario(&scenario, verbose).await
}

/// Run an already parsed scenario
pub async fn execute_scenario(scenario: &TestScenario, verbose: bool) -> Result<TestResult> {
    let config = scenario_config(scenario)?;
    let dashboard = Dashboard::load(Simulator::from_config(&config), &config.dashboard);
    let steps_total = scenario.steps.len();

    println!(
        "\n{} {}",
        "Running Scenario:".blue().bold(),
        scenario.name.white().bold()
    );
    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }
    if verbose {
        println!(
            "  seed {} | delay {}+{} ms | history limit {}",
            config.simulator.seed,
            config.simulator.min_delay_ms,
            config.simulator.delay_span_ms,
            config.dashboard.history_limit
        );
    }

    println!("\n{}", "Steps:".cyan());

    let mut ctx = StepContext::default();
    for (i, step) in scenario.steps.iter().enumerate() {
        let step_num = i + 1;

        match execute_step(&dashboard, &mut ctx, step).await {
            Ok(detail) => {
                println!("  {} Step {}: {}", "✓".green(), step_num, detail.dimmed());
                if verbose {
                    print_state(&dashboard);
                }
            }
            Err(e) => {
                println!("  {} Step {}: {}", "✗".red(), step_num, e);

                // Cleanup: stop any run still going
                dashboard.stop_run();

                return Ok(TestResult {
                    name: scenario.name.clone(),
                    passed: false,
                    steps_run: step_num,
                    steps_total,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    dashboard.stop_run();

    println!(
        "\n{} {}\n",
        "✓".green().bold(),
        "Scenario Passed".green().bold()
    );

    Ok(TestResult {
        name: scenario.name.clone(),
        passed: true,
        steps_run: steps_total,
        steps_total,
        error: None,
    })
}

fn scenario_config(scenario: &TestScenario) -> Result<Config> {
    let mut config = Config::default();
    let overrides = &scenario.simulator;
    if let Some(seed) = overrides.seed {
        config.simulator.seed = seed;
    }
    if let Some(ms) = overrides.min_delay_ms {
        config.simulator.min_delay_ms = ms;
    }
    if let Some(ms) = overrides.delay_span_ms {
        config.simulator.delay_span_ms = ms;
    }
    if let Some(threshold) = overrides.pass_threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::ScenarioParse(format!(
                "pass_threshold must be within [0, 1], got {threshold}"
            )));
        }
        config.simulator.pass_threshold = threshold;
    }
    if let Some(limit) = scenario.history_limit {
        config.dashboard.history_limit = limit.max(1);
    }
    config.catalog.seed_history = scenario.seed_history;
    Ok(config)
}

/// Execute a single step, returning a short description on success
async fn execute_step(
    dashboard: &Dashboard,
    ctx: &mut StepContext,
    step: &TestStep,
) -> Result<String> {
    match step {
        TestStep::SelectProject {
            project,
            expect_changed,
        } => {
            let changed = dashboard.select_project(project);
            if let Some(expected) = expect_changed {
                if *expected != changed {
                    return Err(Error::assertion(format!(
                        "select_project '{project}' expected changed={expected}, got changed={changed}"
                    )));
                }
            }
            Ok(format!("select project {project}"))
        }

        TestStep::Toggle { test_case } => {
            if !dashboard.toggle_test_case(test_case) {
                return Err(Error::assertion(format!(
                    "test case '{test_case}' is not in the current project"
                )));
            }
            Ok(format!("toggle {test_case}"))
        }

        TestStep::SelectAll => {
            dashboard.set_select_all(true);
            Ok("select all".to_string())
        }

        TestStep::ClearSelection => {
            dashboard.set_select_all(false);
            Ok("clear selection".to_string())
        }

        TestStep::Move {
            test_case,
            direction,
        } => {
            let moved = dashboard.move_selected(test_case, *direction);
            Ok(format!(
                "move {test_case} {direction:?}{}",
                if moved { "" } else { " (no-op)" }
            ))
        }

        TestStep::Start { expect_started } => {
            let expected = expect_started.unwrap_or(true);
            let run_id = dashboard.begin_run();
            if run_id.is_some() != expected {
                return Err(Error::assertion(format!(
                    "start expected started={expected}, got started={}",
                    run_id.is_some()
                )));
            }
            match run_id {
                Some(run_id) => {
                    let detail = format!("start {run_id}");
                    ctx.last_run = Some(run_id);
                    Ok(detail)
                }
                None => Ok("start (refused as expected)".to_string()),
            }
        }

        TestStep::Stop => {
            let stopped = dashboard.stop_run();
            Ok(if stopped { "stop" } else { "stop (no active run)" }.to_string())
        }

        TestStep::WaitIdle { timeout_ms } => {
            let ms = timeout_ms.unwrap_or(DEFAULT_WAIT_MS);
            tokio::time::timeout(Duration::from_millis(ms), dashboard.wait_idle())
                .await
                .map_err(|_| Error::Timeout(ms))?;
            Ok("wait idle".to_string())
        }

        TestStep::Sleep { ms } => {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            Ok(format!("sleep {ms} ms"))
        }

        TestStep::ExpectSelection { equals } => {
            let view = dashboard.snapshot();
            let actual = view.selected_test_case_ids.ids();
            if actual != equals.as_slice() {
                return Err(Error::assertion(format!(
                    "expected selection {equals:?}, got {actual:?}"
                )));
            }
            Ok(format!("selection is {equals:?}"))
        }

        TestStep::ExpectRunning { value } => {
            let running = dashboard.is_running();
            if running != *value {
                return Err(Error::assertion(format!(
                    "expected running={value}, got running={running}"
                )));
            }
            Ok(format!("running is {value}"))
        }

        TestStep::ExpectSummary { pass, fail } => {
            let summary = dashboard.summary();
            if pass.is_some_and(|p| p != summary.pass) || fail.is_some_and(|f| f != summary.fail) {
                return Err(Error::assertion(format!(
                    "expected summary pass={} fail={}, got pass={} fail={}",
                    pass.map_or("*".to_string(), |p| p.to_string()),
                    fail.map_or("*".to_string(), |f| f.to_string()),
                    summary.pass,
                    summary.fail
                )));
            }
            Ok(format!("summary pass={} fail={}", summary.pass, summary.fail))
        }

        TestStep::ExpectHistory {
            len,
            max_len,
            counts,
            rows,
        } => {
            let view = dashboard.snapshot();
            let history = view.history.rows();

            if let Some(expected) = len {
                if history.len() != *expected {
                    return Err(Error::assertion(format!(
                        "expected {expected} history rows, got {}",
                        history.len()
                    )));
                }
            }
            if let Some(max) = max_len {
                if history.len() > *max {
                    return Err(Error::assertion(format!(
                        "expected at most {max} history rows, got {}",
                        history.len()
                    )));
                }
            }
            for count in counts {
                check_count(history, count)?;
            }
            for row in rows {
                check_row(history, ctx.last_run.as_ref(), row)?;
            }
            Ok(format!("history ({} rows)", history.len()))
        }
    }
}

fn check_count(history: &[HistoryRow], expected: &StatusCount) -> Result<()> {
    let actual = history
        .iter()
        .filter(|r| r.status == expected.status)
        .filter(|r| {
            expected
                .project
                .as_ref()
                .map_or(true, |p| &r.project_id == p)
        })
        .count();
    if actual != expected.count {
        return Err(Error::assertion(format!(
            "expected {} {} rows{}, got {}",
            expected.count,
            expected.status,
            expected
                .project
                .as_ref()
                .map(|p| format!(" for {p}"))
                .unwrap_or_default(),
            actual
        )));
    }
    Ok(())
}

fn check_row(
    history: &[HistoryRow],
    last_run: Option<&RunId>,
    expected: &RowAssertion,
) -> Result<()> {
    let run_id = last_run.ok_or_else(|| {
        Error::assertion("row assertions need a started run".to_string())
    })?;
    let test_id = HistoryRow::composite_id(run_id.as_str(), &expected.test_case);
    let row = history
        .iter()
        .find(|r| r.test_id == test_id)
        .ok_or_else(|| Error::assertion(format!("no history row for {test_id}")))?;
    if row.status != expected.status {
        return Err(Error::assertion(format!(
            "expected {test_id} to be {}, got {}",
            expected.status, row.status
        )));
    }
    Ok(())
}

fn print_state(dashboard: &Dashboard) {
    let view = dashboard.snapshot();
    println!(
        "      project={} selection={:?} running={} pass={} fail={} rows={}",
        view.selected_project_id.as_deref().unwrap_or("-"),
        view.selected_test_case_ids.ids(),
        view.is_running,
        view.summary.pass,
        view.summary.fail,
        view.history.len()
    );
}
