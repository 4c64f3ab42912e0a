//! E2E Test Runner
//!
//! Scenarios are ordered lists of steps that run the ketch CLI, check its
//! output, and poll for state the cluster reaches asynchronously. The
//! built-in suite and YAML scenario files share the same step types.

mod assertion;
mod config;
mod fixture;
mod poll;
mod runner;
mod suite;

pub use assertion::{evaluate, Criterion, Expectation, Verdict};
pub use config::*;
pub use fixture::Fixture;
pub use poll::{poll_until, MatchOutcome, Matcher, RetryPolicy};
pub use runner::{load_scenario, run_scenario, StepReport, StepStatus, TestResult};
pub use suite::ketch_suite;
