//! Test scenario configuration types
//!
//! Defines the data structures for (de)serializing YAML test scenarios.
//! Strings may reference fixture variables as `${name}`; they are resolved
//! against the [`Fixture`] when the step runs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::assertion::{Criterion, Expectation};
use super::fixture::{self, Fixture};
use super::poll::Matcher;
use crate::common::{Error, Result};

/// A complete test scenario loaded from a YAML file
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TestScenario {
    /// Name of the test scenario
    pub name: String,
    /// Optional description of what the test verifies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Extra fixture variables available to every step
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
    /// The sequence of test steps to execute, in order
    pub steps: Vec<TestStep>,
}

impl TestScenario {
    /// Check variable bindings, step names and `cleans_up` references
    pub fn validate(&self) -> Result<()> {
        for name in self.vars.keys() {
            fixture::check_binding(name)?;
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if let StepAction::WriteFile { var, suffix, .. } = &step.action {
                fixture::check_file_binding(var, suffix).map_err(|e| match e {
                    Error::Scenario(msg) => Error::Scenario(format!("step '{}': {msg}", step.name)),
                    other => other,
                })?;
            }
            if let Some(target) = &step.cleans_up {
                if !seen.contains(target.as_str()) {
                    return Err(Error::Scenario(format!(
                        "step '{}' cleans up '{}', which is not an earlier step",
                        step.name, target
                    )));
                }
                if step.mode != StepMode::BestEffort {
                    return Err(Error::Scenario(format!(
                        "step '{}' declares cleans_up but is not best_effort",
                        step.name
                    )));
                }
            }
            if !seen.insert(step.name.as_str()) {
                return Err(Error::Scenario(format!("duplicate step name '{}'", step.name)));
            }
        }
        Ok(())
    }
}

/// How a step's failure affects the rest of the scenario
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    /// Failure skips every later critical step
    #[default]
    Critical,
    /// Always runs; failure is reported but nothing is skipped
    BestEffort,
}

impl StepMode {
    fn is_critical(&self) -> bool {
        *self == Self::Critical
    }
}

/// A single named step
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TestStep {
    pub name: String,
    #[serde(default, skip_serializing_if = "StepMode::is_critical")]
    pub mode: StepMode,
    /// Creation step this teardown step undoes; skipped if that step never ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleans_up: Option<String>,
    #[serde(flatten)]
    pub action: StepAction,
}

impl TestStep {
    /// Mark as teardown for `target`
    pub fn teardown_of(mut self, target: &str) -> Self {
        self.mode = StepMode::BestEffort;
        self.cleans_up = Some(target.to_string());
        self
    }
}

/// What a step does
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    /// Run the CLI once and check the result immediately
    Run {
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stdin: Option<String>,
        #[serde(default)]
        expect: ExpectSpec,
    },
    /// Re-run the CLI until its output matches
    Poll {
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stdin: Option<String>,
        until: UntilSpec,
        attempts: u32,
        delay_secs: u64,
    },
    /// Write a fixture file and bind its path to `var`
    WriteFile {
        var: String,
        #[serde(default = "default_suffix")]
        suffix: String,
        contents: String,
    },
}

fn default_suffix() -> String {
    ".yaml".to_string()
}

/// Expectations for a run step
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ExpectSpec {
    /// Whether the command must exit zero (`true`) or non-zero (`false`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Output checks, all of which must hold
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<OutputCheck>,
}

impl ExpectSpec {
    /// Expect a zero exit
    pub fn ok() -> Self {
        Self {
            success: Some(true),
            output: Vec::new(),
        }
    }

    pub fn equals(self, s: &str) -> Self {
        self.check(OutputCheck {
            equals: Some(s.to_string()),
            ..Default::default()
        })
    }

    pub fn contains(self, s: &str) -> Self {
        self.check(OutputCheck {
            contains: Some(s.to_string()),
            ..Default::default()
        })
    }

    pub fn not_contains(self, s: &str) -> Self {
        self.check(OutputCheck {
            not_contains: Some(s.to_string()),
            ..Default::default()
        })
    }

    pub fn matches(self, pattern: &str) -> Self {
        self.check(OutputCheck {
            matches: Some(pattern.to_string()),
            ..Default::default()
        })
    }

    fn check(mut self, check: OutputCheck) -> Self {
        self.output.push(check);
        self
    }

    /// Interpolate fixture variables and compile patterns
    pub fn resolve(&self, fixture: &Fixture) -> Result<Expectation> {
        let mut criteria = Vec::new();
        for check in &self.output {
            criteria.extend(check.resolve(fixture)?);
        }
        Ok(Expectation {
            success: self.success,
            criteria,
        })
    }
}

/// One output check; every field that is set must hold
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct OutputCheck {
    /// Exact output, trailing newline included
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<String>,
    /// Substring that must appear
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    /// Substring that must not appear
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_contains: Option<String>,
    /// Regular expression that must match; variables are regex-escaped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<String>,
}

impl OutputCheck {
    fn resolve(&self, fixture: &Fixture) -> Result<Vec<Criterion>> {
        let mut criteria = Vec::new();
        if let Some(s) = &self.equals {
            criteria.push(Criterion::Exact(fixture.interpolate(s)?));
        }
        if let Some(s) = &self.contains {
            criteria.push(Criterion::Contains(fixture.interpolate(s)?));
        }
        if let Some(s) = &self.not_contains {
            criteria.push(Criterion::NotContains(fixture.interpolate(s)?));
        }
        if let Some(p) = &self.matches {
            criteria.push(Criterion::pattern(&fixture.interpolate_pattern(p)?)?);
        }
        if criteria.is_empty() {
            return Err(Error::Scenario("empty output check".to_string()));
        }
        Ok(criteria)
    }
}

/// Match predicate for a poll step; exactly one field must be set
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct UntilSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<String>,
}

impl UntilSpec {
    pub fn contains(s: &str) -> Self {
        Self {
            contains: Some(s.to_string()),
            matches: None,
        }
    }

    pub fn matches(pattern: &str) -> Self {
        Self {
            contains: None,
            matches: Some(pattern.to_string()),
        }
    }

    pub fn resolve(&self, fixture: &Fixture) -> Result<Matcher> {
        match (&self.contains, &self.matches) {
            (Some(s), None) => Ok(Matcher::Contains(fixture.interpolate(s)?)),
            (None, Some(p)) => Matcher::pattern(&fixture.interpolate_pattern(p)?),
            _ => Err(Error::Scenario(
                "poll 'until' needs exactly one of 'contains' or 'matches'".to_string(),
            )),
        }
    }
}
