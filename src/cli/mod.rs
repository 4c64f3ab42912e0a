//! CLI command handling
//!
//! Resolves the fixture once, hands it to the scenario runner, and turns the
//! outcome into a pass/fail for the process exit code.

use std::path::Path;
use std::time::Duration;

use colored::Colorize;

use crate::commands::{Commands, TargetArgs};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::exec::{CommandSpec, ProcessExecutor};
use crate::testing::{
    ketch_suite, load_scenario, poll_until, run_scenario, Fixture, MatchOutcome, Matcher,
    RetryPolicy, TestResult, TestScenario,
};

/// Dispatch a CLI command; `Ok(false)` means the tests ran and failed
pub async fn dispatch(command: Commands, verbose: bool) -> Result<bool> {
    match command {
        Commands::Run { target, report } => {
            run_with_fixture(&ketch_suite(), &target, report.as_deref(), verbose).await
        }

        Commands::Scenario {
            path,
            target,
            report,
        } => {
            let scenario = load_scenario(&path)?;
            run_with_fixture(&scenario, &target, report.as_deref(), verbose).await
        }

        Commands::Poll {
            contains,
            pattern,
            attempts,
            delay,
            stdin,
            command,
        } => {
            let matcher = match (contains, pattern) {
                (Some(s), None) => Matcher::Contains(s),
                (None, Some(p)) => Matcher::pattern(&p)?,
                _ => {
                    return Err(Error::Config(
                        "pass exactly one of --contains or --pattern".to_string(),
                    ))
                }
            };
            let policy = RetryPolicy::new(attempts, Duration::from_secs(delay), matcher)?;

            let Some((program, args)) = command.split_first() else {
                return Err(Error::Config("no command given".to_string()));
            };
            let mut spec = CommandSpec::new(program).args(args.iter().cloned());
            if let Some(payload) = stdin {
                spec = spec.stdin(payload);
            }

            match poll_until(&ProcessExecutor, &spec, &policy).await? {
                MatchOutcome::Matched { attempt, output } => {
                    if verbose {
                        print!("{output}");
                    }
                    println!(
                        "{} matched {} on attempt {}",
                        "✓".green(),
                        policy.matcher().describe(),
                        attempt
                    );
                    Ok(true)
                }
                MatchOutcome::Exhausted { attempts, output } => {
                    let err = Error::ConvergenceTimeout {
                        command: spec.to_string(),
                        attempts,
                        output,
                    };
                    println!("{} {}", "✗".red(), err);
                    Ok(false)
                }
            }
        }

        Commands::PrintSuite => {
            print!("{}", serde_yaml::to_string(&ketch_suite())?);
            Ok(true)
        }
    }
}

async fn run_with_fixture(
    scenario: &TestScenario,
    target: &TargetArgs,
    report: Option<&Path>,
    verbose: bool,
) -> Result<bool> {
    let config = Config::load(target.config.as_deref())?;
    let executor = ProcessExecutor;
    let mut fixture = Fixture::resolve(
        &config,
        target.cli.clone(),
        target.endpoint.clone(),
        &executor,
    )
    .await?;

    let result = run_scenario(scenario, &mut fixture, &executor, verbose).await?;

    if let Some(path) = report {
        write_report(&result, path)?;
    }
    Ok(result.passed)
}

fn write_report(result: &TestResult, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), "Wrote report");
    Ok(())
}
