//! Convergence polling
//!
//! The platform reconciles asynchronously, so a command that reports the
//! desired state now may not have reported it a second ago. [`poll_until`]
//! re-runs a command at a fixed interval until its output matches or the
//! attempt budget runs out.

use std::time::Duration;

use regex::Regex;

use crate::common::{Error, Result};
use crate::exec::{CommandSpec, Executor};

/// Predicate over combined stdout+stderr
///
/// A match anywhere in the output counts; the stream it came from is not
/// considered.
#[derive(Debug, Clone)]
pub enum Matcher {
    Contains(String),
    Pattern(Regex),
}

impl Matcher {
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| Error::pattern(pattern, e))
    }

    pub fn matches(&self, output: &str) -> bool {
        match self {
            Self::Contains(s) => output.contains(s.as_str()),
            Self::Pattern(re) => re.is_match(output),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Contains(s) => format!("{s:?}"),
            Self::Pattern(re) => format!("/{}/", re.as_str()),
        }
    }
}

/// How long to keep polling, and for what
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    matcher: Matcher,
}

impl RetryPolicy {
    /// Build a policy; `max_attempts` must be at least 1
    pub fn new(max_attempts: u32, delay: Duration, matcher: Matcher) -> Result<Self> {
        if max_attempts == 0 {
            return Err(Error::Config(format!(
                "retry policy for {} needs at least one attempt",
                matcher.describe()
            )));
        }
        Ok(Self {
            max_attempts,
            delay,
            matcher,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }
}

/// Result of a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Matched on `attempt` (1-based); `output` holds every attempt so far
    Matched { attempt: u32, output: String },
    /// Every attempt missed; `output` holds all of them in order
    Exhausted { attempts: u32, output: String },
}

impl MatchOutcome {
    /// Number of invocations the poll performed
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Matched { attempt, .. } => *attempt,
            Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn output(&self) -> &str {
        match self {
            Self::Matched { output, .. } | Self::Exhausted { output, .. } => output,
        }
    }

    /// Turn exhaustion into a convergence timeout error
    pub fn into_result(self, spec: &CommandSpec) -> Result<u32> {
        match self {
            Self::Matched { attempt, .. } => Ok(attempt),
            Self::Exhausted { attempts, output } => Err(Error::ConvergenceTimeout {
                command: spec.to_string(),
                attempts,
                output,
            }),
        }
    }
}

/// Run `spec` until its output satisfies `policy`'s matcher
///
/// Stops on the first match. Sleeps `policy.delay()` between attempts, never
/// after the last one. A launch failure aborts immediately and is not
/// retried; a non-zero exit is just another attempt.
pub async fn poll_until(
    executor: &dyn Executor,
    spec: &CommandSpec,
    policy: &RetryPolicy,
) -> Result<MatchOutcome> {
    let mut transcript = String::new();

    for attempt in 1..=policy.max_attempts {
        let result = executor.execute(spec).await?;
        let output = result.text();
        transcript.push_str(&output);
        transcript.push('\n');

        if policy.matcher.matches(&output) {
            tracing::debug!(command = %spec, attempt, "Matched {}", policy.matcher.describe());
            return Ok(MatchOutcome::Matched {
                attempt,
                output: transcript,
            });
        }

        if attempt < policy.max_attempts {
            tracing::info!(
                command = %spec,
                attempt,
                max_attempts = policy.max_attempts,
                "Retrying command in {:?}",
                policy.delay
            );
            tokio::time::sleep(policy.delay).await;
        }
    }

    Ok(MatchOutcome::Exhausted {
        attempts: policy.max_attempts,
        output: transcript,
    })
}
