//! ketch-harness - black-box convergence tests for the ketch CLI
//!
//! Drives the ketch binary as a subprocess against a live cluster and polls
//! its output until asynchronously reconciled state shows up.

use clap::Parser;
use ketch_harness::commands::Commands;
use ketch_harness::{cli, common::logging};

#[derive(Parser)]
#[command(name = "ketch-harness", about = "Convergence test harness for the ketch CLI")]
#[command(version, long_about = None)]
struct Cli {
    /// Show commands, their output, and debug logs
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_cli(cli.verbose);

    match cli::dispatch(cli.command, cli.verbose).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
