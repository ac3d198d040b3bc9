//! CLI command handling
//!
//! Dispatches CLI commands to an in-process simulator and dashboard and
//! formats output.

use std::time::Duration;

use colored::Colorize;

use crate::catalog::{HistoryRow, TestStatus};
use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::dashboard::{Dashboard, Summary};
use crate::simulator::{RunEvent, RunId, Simulator};
use crate::testing;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config, verbose: bool) -> Result<()> {
    match command {
        Commands::Projects { json } => {
            let simulator = Simulator::from_config(config);
            let projects = simulator.list_projects();

            if json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else if projects.is_empty() {
                println!("No projects configured");
            } else {
                println!("Projects:");
                for project in &projects {
                    let count = simulator.list_test_cases(&project.id).len();
                    println!(
                        "  {:<14} {} {}",
                        project.id.cyan(),
                        project.name,
                        format!("({count} test cases)").dimmed()
                    );
                }
            }

            Ok(())
        }

        Commands::Cases { project, json } => {
            let simulator = Simulator::from_config(config);
            let project = simulator
                .catalog()
                .project(&project)
                .cloned()
                .ok_or(Error::ProjectNotFound(project))?;
            let test_cases = simulator.list_test_cases(&project.id);

            if json {
                println!("{}", serde_json::to_string_pretty(&test_cases)?);
            } else {
                println!("{} ({}):", project.name, project.id);
                for tc in &test_cases {
                    println!("  {:<12} {}", tc.id.cyan(), tc.name);
                }
            }

            Ok(())
        }

        Commands::History { project, json } => {
            let simulator = Simulator::from_config(config);
            let rows: Vec<HistoryRow> = simulator
                .list_history()
                .into_iter()
                .filter(|r| project.as_ref().map_or(true, |p| &r.project_id == p))
                .take(config.dashboard.history_limit)
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("No history");
            } else {
                println!("History:");
                for row in &rows {
                    print_history_row(row);
                }
            }

            Ok(())
        }

        Commands::Run {
            project,
            cases,
            all,
            cancel_after,
            seed,
            json,
        } => {
            let mut config = config.clone();
            if let Some(seed) = seed {
                config.simulator.seed = seed;
            }
            run(&config, &project, cases, all, cancel_after, json).await
        }

        Commands::Scenario { path } => {
            let result = testing::run_scenario(&path, verbose).await?;
            if result.passed {
                Ok(())
            } else {
                Err(Error::ScenarioAssertion(format!(
                    "'{}' failed at step {}/{}",
                    result.name, result.steps_run, result.steps_total
                )))
            }
        }
    }
}

/// Drive one run through the dashboard, printing live events
async fn run(
    config: &Config,
    project_id: &str,
    cases: Vec<String>,
    all: bool,
    cancel_after: Option<u64>,
    json: bool,
) -> Result<()> {
    let simulator = Simulator::from_config(config);
    let catalog = simulator.catalog();
    if catalog.project(project_id).is_none() {
        return Err(Error::ProjectNotFound(project_id.to_string()));
    }

    let mut selection: Vec<String> = Vec::new();
    if all {
        selection.extend(catalog.test_cases(project_id).iter().map(|tc| tc.id.clone()));
    } else {
        for case in cases {
            if catalog.test_case(project_id, &case).is_none() {
                return Err(Error::test_case_not_found(project_id, &case));
            }
            if !selection.contains(&case) {
                selection.push(case);
            }
        }
    }
    if selection.is_empty() {
        return Err(Error::NothingSelected);
    }

    let dashboard = Dashboard::load(simulator.clone(), &config.dashboard);
    dashboard.select_project(project_id);
    for case in &selection {
        dashboard.toggle_test_case(case);
    }

    let run_id = dashboard
        .begin_run()
        .ok_or_else(|| Error::RunNotStarted(format!("project '{project_id}'")))?;
    let (subscription, mut rx) = simulator.subscribe_channel(&run_id);

    if !json {
        println!(
            "{} {} ({} test cases)",
            "Started".blue().bold(),
            run_id.as_str().white().bold(),
            selection.len()
        );
    }

    let cancel_timer = tokio::time::sleep(Duration::from_millis(cancel_after.unwrap_or(0)));
    tokio::pin!(cancel_timer);
    let mut cancel_pending = cancel_after.is_some();

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                if json {
                    println!("{}", serde_json::to_string(&event)?);
                } else {
                    print_event(&event);
                }
                if event.is_terminal() {
                    break;
                }
            }
            () = &mut cancel_timer, if cancel_pending => {
                cancel_pending = false;
                tracing::debug!(run_id = %run_id, "Cancel timer elapsed");
                dashboard.stop_run();
            }
        }
    }

    subscription.unsubscribe();
    dashboard.wait_idle().await;

    let view = dashboard.snapshot();
    let rows: Vec<&HistoryRow> = view
        .history
        .rows()
        .iter()
        .filter(|r| belongs_to(r, &run_id))
        .collect();

    if json {
        let report = serde_json::json!({
            "runId": run_id,
            "history": rows,
            "summary": view.summary,
        });
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("\n{}", "Results:".cyan());
        for row in &rows {
            print_history_row(row);
        }
        print_summary(&view.summary);
    }

    Ok(())
}

fn belongs_to(row: &HistoryRow, run_id: &RunId) -> bool {
    row.test_id
        .split_once(':')
        .is_some_and(|(run, _)| run == run_id.as_str())
}

fn colored_status(status: TestStatus) -> colored::ColoredString {
    let text = format!("{:<7}", status.to_string());
    match status {
        TestStatus::Queued => text.dimmed(),
        TestStatus::Running => text.yellow(),
        TestStatus::Pass => text.green(),
        TestStatus::Fail => text.red(),
    }
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::TestQueued(e) | RunEvent::TestRunning(e) => {
            println!(
                "  {} {} {}",
                colored_status(e.status),
                e.test_case_id,
                e.test_case_name.dimmed()
            );
        }
        RunEvent::TestCompleted(e) => {
            let duration = e
                .duration_ms
                .map(|ms| format!("{ms} ms"))
                .unwrap_or_default();
            println!(
                "  {} {} {} {}",
                colored_status(e.status),
                e.test_case_id,
                e.test_case_name.dimmed(),
                duration.dimmed()
            );
        }
        RunEvent::RunCompleted(o) => {
            println!("{} {}", "✓".green(), format!("{} completed", o.run_id).green());
        }
        RunEvent::RunCancelled(o) => {
            println!("{} {}", "✗".yellow(), format!("{} cancelled", o.run_id).yellow());
        }
    }
}

fn print_history_row(row: &HistoryRow) {
    let when = chrono::DateTime::from_timestamp_millis(row.timestamp)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "?".to_string());
    let duration = row
        .duration_ms
        .map(|ms| format!("{ms} ms"))
        .unwrap_or_else(|| "-".to_string());
    let subject = row.test_case_name.as_deref().unwrap_or(&row.project_name);

    println!(
        "  {} {:<22} {:<24} {:>8}  {}",
        colored_status(row.status),
        row.test_id,
        subject,
        duration,
        when.dimmed()
    );
}

fn print_summary(summary: &Summary) {
    let rate = summary
        .pass_rate()
        .map(|r| format!(" ({:.0}% pass)", r * 100.0))
        .unwrap_or_default();
    println!(
        "\nSummary: {} passed, {} failed{}",
        summary.pass.to_string().green(),
        summary.fail.to_string().red(),
        rate
    );
}
