//! ketch-harness - integration tests for the ketch orchestration CLI
//!
//! The CLI and the cluster behind it are treated as a black box: every check
//! launches the binary and inspects its combined output. State on the
//! cluster converges asynchronously, so checks that depend on it poll with a
//! bounded, fixed-interval retry policy.

pub mod cli;
pub mod commands;
pub mod common;
pub mod exec;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use exec::{CommandResult, CommandSpec, Executor, ProcessExecutor};
