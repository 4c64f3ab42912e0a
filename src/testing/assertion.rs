//! Output assertions
//!
//! All verification goes through [`evaluate`]: the CLI under test is a black
//! box, so the captured output is the only evidence, and every failure
//! diagnostic carries it verbatim.

use regex::Regex;

use crate::common::{Error, Result};
use crate::exec::CommandResult;

/// A single check against captured output
#[derive(Debug, Clone)]
pub enum Criterion {
    /// Output equals this string exactly, trailing newlines included
    Exact(String),
    /// Output contains this substring
    Contains(String),
    /// Output does not contain this substring
    NotContains(String),
    /// Output matches this regular expression somewhere
    Pattern(Regex),
}

impl Criterion {
    /// Compile a pattern criterion
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| Error::pattern(pattern, e))
    }

    /// Short description used in progress lines
    pub fn describe(&self) -> String {
        match self {
            Self::Exact(s) => format!("equals {s:?}"),
            Self::Contains(s) => format!("contains {s:?}"),
            Self::NotContains(s) => format!("does not contain {s:?}"),
            Self::Pattern(re) => format!("matches /{}/", re.as_str()),
        }
    }

    fn holds(&self, output: &str) -> bool {
        match self {
            Self::Exact(s) => output == s,
            Self::Contains(s) => output.contains(s.as_str()),
            Self::NotContains(s) => !output.contains(s.as_str()),
            Self::Pattern(re) => re.is_match(output),
        }
    }
}

/// Outcome of evaluating one criterion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// Diagnostic including the full captured output
    Fail(String),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Evaluate `criterion` against the combined output of `result`
pub fn evaluate(result: &CommandResult, criterion: &Criterion) -> Verdict {
    let output = result.text();
    if criterion.holds(&output) {
        Verdict::Pass
    } else {
        Verdict::Fail(format!(
            "expected output that {}\n{}",
            criterion.describe(),
            transcript(result)
        ))
    }
}

/// What a single-shot step requires of its result
#[derive(Debug, Clone, Default)]
pub struct Expectation {
    /// `Some(true)`: must exit zero. `Some(false)`: must exit non-zero.
    /// `None`: exit status is not checked.
    pub success: Option<bool>,
    /// All must hold
    pub criteria: Vec<Criterion>,
}

impl Expectation {
    /// Require a zero exit and nothing else
    pub fn success() -> Self {
        Self {
            success: Some(true),
            criteria: Vec::new(),
        }
    }

    pub fn with(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    /// Check the exit status, then each criterion in order
    pub fn check(&self, result: &CommandResult) -> Result<()> {
        match self.success {
            Some(true) if !result.success() => {
                return Err(Error::AssertionMismatch(format!(
                    "command failed unexpectedly\n{}",
                    transcript(result)
                )));
            }
            Some(false) if result.success() => {
                return Err(Error::AssertionMismatch(format!(
                    "command succeeded but a failure was expected\n{}",
                    transcript(result)
                )));
            }
            _ => {}
        }

        for criterion in &self.criteria {
            if let Verdict::Fail(diagnostic) = evaluate(result, criterion) {
                return Err(Error::AssertionMismatch(diagnostic));
            }
        }
        Ok(())
    }
}

fn transcript(result: &CommandResult) -> String {
    format!(
        "--- output ({}) ---\n{}\n--- end output ---",
        result.status_label(),
        result.text()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(output: &str, code: i32) -> CommandResult {
        CommandResult::new(output, Some(code), Duration::ZERO)
    }

    #[test]
    fn test_exact_is_sensitive_to_trailing_newline() {
        let stopped = result("Successfully stopped!\n", 0);
        assert!(evaluate(&stopped, &Criterion::Exact("Successfully stopped!\n".into())).passed());
        assert!(!evaluate(&stopped, &Criterion::Exact("Successfully stopped!".into())).passed());
        assert!(!evaluate(
            &result("Successfully stopped!\n\n", 0),
            &Criterion::Exact("Successfully stopped!\n".into())
        )
        .passed());
    }

    #[test]
    fn test_exact_empty_output() {
        assert!(evaluate(&result("", 0), &Criterion::Exact(String::new())).passed());
        assert!(!evaluate(&result("warning\n", 0), &Criterion::Exact(String::new())).passed());
    }

    #[test]
    fn test_pattern_matches_table_rows() {
        let list = result(
            "NAME           STATUS     NAMESPACE              INGRESS TYPE    INGRESS CLASS NAME    CLUSTER ISSUER    APPS\n\
             myframework    Created    ketch-myframework      traefik         traefik                                 \n",
            0,
        );
        let header = Criterion::pattern(
            "NAME[ \t]+STATUS[ \t]+NAMESPACE[ \t]+INGRESS TYPE[ \t]+INGRESS CLASS NAME[ \t]+CLUSTER ISSUER[ \t]+APPS",
        )
        .unwrap();
        let row = Criterion::pattern(
            "myframework[ \t]+[Created \t]+ketch-myframework[ \t]+traefik[ \t]+traefik",
        )
        .unwrap();
        assert!(evaluate(&list, &header).passed());
        assert!(evaluate(&list, &row).passed());
    }

    #[test]
    fn test_not_contains() {
        let out = result("FOO=\n", 0);
        assert!(evaluate(&out, &Criterion::NotContains("BAR".into())).passed());
        assert!(!evaluate(&out, &Criterion::NotContains("FOO".into())).passed());
    }

    #[test]
    fn test_failure_diagnostic_contains_full_output() {
        let out = result("line one\nline two\nError: framework busy\n", 1);
        match evaluate(&out, &Criterion::Contains("Successfully added!".into())) {
            Verdict::Fail(diagnostic) => {
                assert!(diagnostic.contains("line one\nline two\nError: framework busy\n"));
                assert!(diagnostic.contains("exit code 1"));
                assert!(diagnostic.contains("Successfully added!"));
            }
            Verdict::Pass => panic!("expected failure"),
        }
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = Criterion::pattern("NAME[").unwrap_err();
        assert!(matches!(err, Error::Pattern { .. }));
    }

    #[test]
    fn test_expectation_exit_status() {
        let not_found = result("app \"sample-app\" not found\n", 1);

        let must_succeed = Expectation::success();
        let err = must_succeed.check(&not_found).unwrap_err();
        assert!(err.to_string().contains("failed unexpectedly"));
        assert!(err.to_string().contains("not found"));

        let must_fail = Expectation {
            success: Some(false),
            criteria: vec![Criterion::Contains("not found".into())],
        };
        assert!(must_fail.check(&not_found).is_ok());

        let unchecked = Expectation::default().with(Criterion::Contains("not found".into()));
        assert!(unchecked.check(&not_found).is_ok());
    }

    #[test]
    fn test_expectation_stops_at_first_failing_criterion() {
        let out = result("Successfully added!\n", 0);
        let expectation = Expectation::success()
            .with(Criterion::Contains("Successfully added!".into()))
            .with(Criterion::Exact("nope".into()))
            .with(Criterion::Contains("also missing".into()));
        let err = expectation.check(&out).unwrap_err().to_string();
        assert!(err.contains("equals \"nope\""));
        assert!(!err.contains("also missing"));
    }
}
