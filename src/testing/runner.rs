//! Test runner implementation
//!
//! Executes scenario steps strictly in order, one process at a time. The
//! first failing critical step skips every later critical step; best-effort
//! (teardown) steps always run so a failed scenario doesn't leave frameworks
//! and apps behind on the cluster.

use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};

use colored::Colorize;
use serde::Serialize;

use crate::common::{Error, Result};
use crate::exec::Executor;

use super::config::{StepAction, StepMode, TestScenario, TestStep};
use super::fixture::Fixture;
use super::poll::{poll_until, RetryPolicy};

/// Result of a test run
#[derive(Debug, Serialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub steps: Vec<StepReport>,
}

impl TestResult {
    /// Reports for steps that failed, in execution order
    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::Failed)
    }

    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|step| step.name == name)
    }
}

/// Outcome of one step
#[derive(Debug, Serialize)]
pub struct StepReport {
    pub name: String,
    pub mode: StepMode,
    pub status: StepStatus,
    /// Process invocations performed by the step
    pub attempts: u32,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Load and validate a scenario from a YAML file
pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;

    let scenario: TestScenario = serde_yaml::from_str(&content)
        .map_err(|e| Error::Scenario(format!("failed to parse '{}': {}", path.display(), e)))?;
    scenario.validate()?;
    Ok(scenario)
}

/// Run every step of `scenario` against `fixture`
///
/// Step failures are recorded in the returned [`TestResult`]; `Err` is
/// reserved for a scenario that is invalid before any step runs.
pub async fn run_scenario(
    scenario: &TestScenario,
    fixture: &mut Fixture,
    executor: &dyn Executor,
    verbose: bool,
) -> Result<TestResult> {
    scenario.validate()?;
    fixture.extend(&scenario.vars)?;

    let steps_total = scenario.steps.len();

    println!(
        "\n{} {}",
        "Running Test:".blue().bold(),
        scenario.name.white().bold()
    );
    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }
    if verbose {
        println!("  CLI: {}", fixture.cli().display().to_string().dimmed());
        println!("  Endpoint: {}", fixture.endpoint().dimmed());
    }

    println!("\n{}", "Steps:".cyan());

    let mut aborted_by: Option<&str> = None;
    let mut ran: HashSet<&str> = HashSet::new();
    let mut reports = Vec::with_capacity(steps_total);

    for (i, step) in scenario.steps.iter().enumerate() {
        let step_num = i + 1;

        if let Some(reason) = skip_reason(step, aborted_by, &ran) {
            println!(
                "  {} Step {}: {} ({})",
                "-".yellow(),
                step_num,
                step.name.dimmed(),
                reason.dimmed()
            );
            reports.push(StepReport {
                name: step.name.clone(),
                mode: step.mode,
                status: StepStatus::Skipped,
                attempts: 0,
                duration: Duration::ZERO,
                error: Some(reason),
            });
            continue;
        }

        ran.insert(step.name.as_str());
        let start = Instant::now();
        let outcome = execute_step(fixture, executor, step, verbose).await;
        let duration = start.elapsed();

        let report = match outcome {
            Ok(attempts) => {
                let retried = if attempts > 1 {
                    format!(" after {attempts} attempts")
                } else {
                    String::new()
                };
                println!(
                    "  {} Step {}: {}{}",
                    "✓".green(),
                    step_num,
                    step.name.dimmed(),
                    retried.dimmed()
                );
                StepReport {
                    name: step.name.clone(),
                    mode: step.mode,
                    status: StepStatus::Passed,
                    attempts,
                    duration,
                    error: None,
                }
            }
            Err(e) => {
                println!("  {} Step {}: {}: {}", "✗".red(), step_num, step.name, e);
                if e.is_fatal() {
                    tracing::error!(step = %step.name, error = %e, "CLI could not be launched");
                }
                match step.mode {
                    StepMode::Critical => {
                        if aborted_by.is_none() {
                            aborted_by = Some(step.name.as_str());
                        }
                    }
                    StepMode::BestEffort if !e.is_fatal() => {
                        tracing::warn!(step = %step.name, error = %e, "Teardown step failed");
                    }
                    StepMode::BestEffort => {}
                }
                StepReport {
                    name: step.name.clone(),
                    mode: step.mode,
                    status: StepStatus::Failed,
                    attempts: attempts_of(step, &e),
                    duration,
                    error: Some(e.to_string()),
                }
            }
        };
        reports.push(report);
    }

    let steps_run = reports
        .iter()
        .filter(|r| r.status != StepStatus::Skipped)
        .count();
    let passed = reports.iter().all(|r| r.status == StepStatus::Passed);

    if passed {
        println!("\n{} {}\n", "✓".green().bold(), "Test Passed".green().bold());
    } else {
        let failed: Vec<&str> = reports
            .iter()
            .filter(|r| r.status == StepStatus::Failed)
            .map(|r| r.name.as_str())
            .collect();
        println!(
            "\n{} {} ({})\n",
            "✗".red().bold(),
            "Test Failed".red().bold(),
            failed.join(", ")
        );
    }

    Ok(TestResult {
        name: scenario.name.clone(),
        passed,
        steps_run,
        steps_total,
        steps: reports,
    })
}

/// Why a step should not run, if it shouldn't
fn skip_reason(step: &TestStep, aborted_by: Option<&str>, ran: &HashSet<&str>) -> Option<String> {
    match step.mode {
        StepMode::Critical => aborted_by.map(|failed| format!("skipped: '{failed}' failed")),
        StepMode::BestEffort => step
            .cleans_up
            .as_deref()
            .filter(|target| !ran.contains(target))
            .map(|target| format!("skipped: '{target}' never ran")),
    }
}

fn attempts_of(step: &TestStep, error: &Error) -> u32 {
    match (error, &step.action) {
        (Error::ConvergenceTimeout { attempts, .. }, _) => *attempts,
        (_, StepAction::WriteFile { .. }) => 0,
        _ => 1,
    }
}

/// Execute a single step, returning the number of invocations it took
async fn execute_step(
    fixture: &mut Fixture,
    executor: &dyn Executor,
    step: &TestStep,
    verbose: bool,
) -> Result<u32> {
    match &step.action {
        StepAction::Run {
            args,
            stdin,
            expect,
        } => {
            let spec = fixture.command(args, stdin.as_deref())?;
            let expectation = expect.resolve(fixture)?;
            if verbose {
                println!("    $ {}", spec.to_string().dimmed());
            }
            let result = executor.execute(&spec).await?;
            if verbose {
                print_output(&result.text());
            }
            expectation.check(&result)?;
            Ok(1)
        }
        StepAction::Poll {
            args,
            stdin,
            until,
            attempts,
            delay_secs,
        } => {
            let spec = fixture.command(args, stdin.as_deref())?;
            let matcher = until.resolve(fixture)?;
            let policy = RetryPolicy::new(*attempts, Duration::from_secs(*delay_secs), matcher)?;
            if verbose {
                println!(
                    "    $ {} (until {}, {} x {}s)",
                    spec.to_string().dimmed(),
                    policy.matcher().describe(),
                    attempts,
                    delay_secs
                );
            }
            let outcome = poll_until(executor, &spec, &policy).await?;
            if verbose {
                print_output(outcome.output());
            }
            outcome.into_result(&spec)
        }
        StepAction::WriteFile {
            var,
            suffix,
            contents,
        } => {
            let contents = fixture.interpolate(contents)?;
            let path = fixture.write_file(var, suffix, &contents)?;
            if verbose {
                println!("    wrote {}", path.display().to_string().dimmed());
            }
            Ok(0)
        }
    }
}

fn print_output(output: &str) {
    for line in output.lines() {
        println!("    | {}", line.dimmed());
    }
}
