//! CLI command definitions
//!
//! Defines the clap commands for the harness CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the built-in ketch suite against a live cluster
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Write a JSON report of every step to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Execute a test scenario defined in a YAML file
    Scenario {
        /// Path to the YAML test scenario file
        path: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        /// Write a JSON report of every step to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Re-run a command until its output matches
    ///
    /// Example: ketch-harness poll --contains running --attempts 20 --delay 5 -- ketch app info sample-app
    Poll {
        /// Substring that ends the poll
        #[arg(long, required_unless_present = "pattern", conflicts_with = "pattern")]
        contains: Option<String>,

        /// Regular expression that ends the poll
        #[arg(long)]
        pattern: Option<String>,

        /// Maximum number of invocations
        #[arg(long)]
        attempts: u32,

        /// Seconds to wait between invocations
        #[arg(long)]
        delay: u64,

        /// Text piped to the command's stdin
        #[arg(long)]
        stdin: Option<String>,

        /// Program and arguments to run
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Print the built-in suite as a YAML scenario
    PrintSuite,
}

/// Where the CLI under test and its cluster are
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Path to the ketch executable (overrides KETCH_EXECUTABLE_PATH)
    #[arg(long)]
    pub cli: Option<PathBuf>,

    /// Ingress endpoint (overrides KETCH_INGRESS_ENDPOINT and discovery)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Configuration file (default: platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
