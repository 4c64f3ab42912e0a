//! Command execution
//!
//! Every interaction with the CLI under test goes through an [`Executor`]:
//! one process, launched and awaited, with stdout and stderr captured as a
//! single output buffer. A non-zero exit is an ordinary [`CommandResult`];
//! only a failure to launch is an error.

mod process;
#[cfg(test)]
pub(crate) mod scripted;

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::common::Result;

pub use process::ProcessExecutor;

/// A single process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Written to the child's stdin, which is then closed
    pub stdin: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Attach a stdin payload. Empty payloads are ignored, leaving stdin null.
    pub fn stdin(mut self, payload: impl Into<String>) -> Self {
        let payload = payload.into();
        self.stdin = (!payload.is_empty()).then_some(payload);
        self
    }

    /// Program name as shown in logs and errors
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured outcome of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// stdout followed by stderr
    pub output: Vec<u8>,
    /// Exit code; `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl CommandResult {
    pub fn new(output: impl Into<Vec<u8>>, exit_code: Option<i32>, duration: Duration) -> Self {
        Self {
            output: output.into(),
            exit_code,
            duration,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Output decoded as UTF-8, lossily
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }

    /// Human-readable exit status
    pub fn status_label(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs commands for the poll engine and the scenario runner
#[async_trait]
pub trait Executor: Send + Sync {
    /// Launch `spec`, feed its stdin, and wait for it to exit
    ///
    /// Fails only when the process cannot be started.
    async fn execute(&self, spec: &CommandSpec) -> Result<CommandResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_args() {
        let spec = CommandSpec::new("/bin/ketch").args(["app", "info", "sample-app"]);
        assert_eq!(spec.to_string(), "/bin/ketch app info sample-app");
    }

    #[test]
    fn test_empty_stdin_is_dropped() {
        assert_eq!(CommandSpec::new("ketch").stdin("").stdin, None);
        assert_eq!(
            CommandSpec::new("ketch").stdin("ketch-myframework").stdin.as_deref(),
            Some("ketch-myframework")
        );
    }

    #[test]
    fn test_result_success_and_text() {
        let ok = CommandResult::new("Successfully stopped!\n", Some(0), Duration::ZERO);
        assert!(ok.success());
        assert_eq!(ok.text(), "Successfully stopped!\n");

        let failed = CommandResult::new("app not found", Some(1), Duration::ZERO);
        assert!(!failed.success());
        assert_eq!(failed.status_label(), "exit code 1");

        let killed = CommandResult::new("", None, Duration::ZERO);
        assert!(!killed.success());
        assert_eq!(killed.status_label(), "terminated by signal");
    }
}
