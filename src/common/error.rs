//! Error types for the harness
//!
//! The three failure kinds a scenario can hit (launch failure, assertion
//! mismatch, convergence timeout) are kept apart so a report can say whether
//! a command never ran, ran and printed the wrong thing, or never converged.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Execution Errors ===
    #[error("Failed to launch '{program}': {source}. Set KETCH_EXECUTABLE_PATH or pass --cli")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    // === Verification Errors ===
    #[error("Assertion failed: {0}")]
    AssertionMismatch(String),

    #[error("Command '{command}' did not converge after {attempts} attempt(s). Output:\n{output}")]
    ConvergenceTimeout {
        command: String,
        attempts: u32,
        output: String,
    },

    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    // === Scenario Errors ===
    #[error("Invalid test scenario: {0}")]
    Scenario(String),

    #[error("Unknown fixture variable '${{{0}}}'")]
    UnknownFixture(String),

    #[error("Endpoint discovery failed: {0}")]
    EndpointDiscovery(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a launch failure for the given program
    pub fn launch(program: &str, source: io::Error) -> Self {
        Self::Launch {
            program: program.to_string(),
            source,
        }
    }

    /// Create an invalid pattern error
    pub fn pattern(pattern: &str, source: regex::Error) -> Self {
        Self::Pattern {
            pattern: pattern.to_string(),
            source,
        }
    }

    /// Whether this error means the command never ran at all
    ///
    /// Launch failures are never retried; the runner logs them at error
    /// level instead of as an ordinary teardown failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Launch { .. })
    }
}
