//! Executor backed by real child processes

use std::io;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;

use super::{CommandResult, CommandSpec, Executor};
use crate::common::{Error, Result};

/// Launches each [`CommandSpec`] as a child process
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, spec: &CommandSpec) -> Result<CommandResult> {
        tracing::debug!(command = %spec, stdin = spec.stdin.is_some(), "Launching");

        let start = Instant::now();
        let mut child = TokioCommand::new(&spec.program)
            .args(&spec.args)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::launch(&spec.program_name(), e))?;

        // Feed stdin alongside output collection so a chatty child can't
        // block on a full stdout pipe while we are still writing.
        let writer = match (child.stdin.take(), spec.stdin.clone()) {
            (Some(mut pipe), Some(payload)) => Some(tokio::spawn(async move {
                let written = pipe.write_all(payload.as_bytes()).await;
                drop(pipe);
                written
            })),
            _ => None,
        };

        let output = child.wait_with_output().await?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                // The child exited without reading everything
                Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(e.into()),
                Err(e) => return Err(io::Error::other(e).into()),
            }
        }

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        let result = CommandResult::new(combined, output.status.code(), start.elapsed());
        tracing::debug!(
            command = %spec,
            status = %result.status_label(),
            elapsed_ms = result.duration.as_millis() as u64,
            "Finished"
        );
        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout_and_stderr() {
        let spec = CommandSpec::new("sh").args(["-c", "printf out; printf err >&2; exit 3"]);
        let result = ProcessExecutor.execute(&spec).await.unwrap();
        assert_eq!(result.text(), "outerr");
        assert_eq!(result.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_writes_stdin_payload() {
        let spec = CommandSpec::new("cat").stdin("ketch-myframework");
        let result = ProcessExecutor.execute(&spec).await.unwrap();
        assert!(result.success());
        assert_eq!(result.text(), "ketch-myframework");
    }

    #[tokio::test]
    async fn test_ignores_unread_stdin() {
        let spec = CommandSpec::new("true").stdin("y".repeat(1 << 20));
        let result = ProcessExecutor.execute(&spec).await.unwrap();
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_failure() {
        let spec = CommandSpec::new("/definitely/not/a/ketch/binary");
        let err = ProcessExecutor.execute(&spec).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("/definitely/not/a/ketch/binary"));
    }
}
