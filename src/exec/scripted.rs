//! Scripted executor for unit tests
//!
//! Responses are keyed by the space-joined argument list. Each key holds a
//! queue; the last queued response repeats once the others are used up.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{CommandResult, CommandSpec, Executor};
use crate::common::{Error, Result};

#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    responses: Mutex<HashMap<String, VecDeque<CommandResult>>>,
    calls: Mutex<Vec<CommandSpec>>,
    unlaunchable: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the given argument line
    pub(crate) fn respond(&self, args: &str, output: &str, exit_code: i32) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .entry(args.to_string())
            .or_default()
            .push_back(CommandResult::new(output, Some(exit_code), Duration::from_millis(1)));
        self
    }

    /// Make every invocation whose argument line starts with `prefix` fail to launch
    pub(crate) fn unlaunchable(&self, prefix: &str) -> &Self {
        self.unlaunchable.lock().unwrap().push(prefix.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of invocations with exactly this argument line
    pub(crate) fn count(&self, args: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|spec| spec.args.join(" ") == args)
            .count()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn execute(&self, spec: &CommandSpec) -> Result<CommandResult> {
        self.calls.lock().unwrap().push(spec.clone());
        let key = spec.args.join(" ");

        if self
            .unlaunchable
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
        {
            return Err(Error::launch(
                &spec.program_name(),
                io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            ));
        }

        let mut responses = self.responses.lock().unwrap();
        let result = match responses.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(result.unwrap_or_else(|| {
            CommandResult::new(
                format!("unscripted command: {key}"),
                Some(127),
                Duration::ZERO,
            )
        }))
    }
}
