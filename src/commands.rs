//! CLI command definitions
//!
//! Defines the clap commands for the runboard CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// List projects
    #[command(alias = "ls")]
    Projects {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the test cases of a project
    Cases {
        /// Project ID
        project: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the run history, most recent first
    History {
        /// Only show rows of this project
        #[arg(long, short)]
        project: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run test cases of a project and follow the run live
    Run {
        /// Project ID
        #[arg(long, short)]
        project: String,

        /// Test case to run, in execution order.
        /// Can be specified multiple times: --case tc-cm-003 --case tc-cm-001
        #[arg(long = "case", short = 'c')]
        cases: Vec<String>,

        /// Run every test case of the project
        #[arg(long, conflicts_with = "cases")]
        all: bool,

        /// Press stop after this many milliseconds
        #[arg(long)]
        cancel_after: Option<u64>,

        /// Override the simulator seed
        #[arg(long)]
        seed: Option<u32>,

        /// Print events and the final history as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Run a dashboard scenario from a YAML file
    Scenario {
        /// Path to the YAML scenario file
        path: PathBuf,
    },
}
