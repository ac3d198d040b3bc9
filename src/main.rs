//! runboard - a mock test-run dashboard driven from the command line
//!
//! Starts runs of selected test cases against an in-process simulator,
//! follows their lifecycle events live and reports history and pass/fail
//! summaries.

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use runboard::common::config::Config;
use runboard::common::logging;
use runboard::{cli, commands};

#[derive(Parser)]
#[command(name = "runboard", about = "Mock test-run dashboard")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/runboard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output: debug logging and per-step scenario state
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let Cli {
        config,
        verbose,
        command,
    } = Cli::parse();

    logging::init_cli(verbose);

    let result = match config {
        Some(path) => Config::load_from(&path),
        None => Config::load(),
    };
    let result = match result {
        Ok(config) => cli::dispatch(command, &config, verbose).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
