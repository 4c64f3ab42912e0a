//! Configuration file handling
//!
//! Everything here is optional: a missing config file yields the defaults the
//! built-in ketch suite was written against.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::paths::{config_path, default_cli_path};
use super::Result;

/// Environment variable overriding the ketch executable path
pub const CLI_PATH_ENV: &str = "KETCH_EXECUTABLE_PATH";

/// Environment variable overriding endpoint discovery
pub const ENDPOINT_ENV: &str = "KETCH_INGRESS_ENDPOINT";

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Location of the CLI under test
    #[serde(default)]
    pub cli: CliConfig,

    /// How the ingress endpoint is resolved
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Names of the entities the suite creates
    #[serde(default)]
    pub fixtures: FixtureNames,
}

/// CLI location settings
#[derive(Debug, Deserialize, Default)]
pub struct CliConfig {
    /// Path to the ketch executable
    pub path: Option<PathBuf>,
}

/// Endpoint settings
#[derive(Debug, Deserialize)]
pub struct EndpointConfig {
    /// Fixed endpoint; skips discovery when set
    pub value: Option<String>,

    /// Inventory command whose output is the endpoint
    #[serde(default = "default_discover")]
    pub discover: Vec<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            value: None,
            discover: default_discover(),
        }
    }
}

fn default_discover() -> Vec<String> {
    [
        "kubectl",
        "get",
        "svc",
        "traefik",
        "-o",
        "jsonpath={.status.loadBalancer.ingress[0].ip}",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Names of the entities created and removed by the suite
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct FixtureNames {
    pub framework_cli: String,
    pub framework_yaml: String,
    pub app: String,
    pub app_image: String,
    pub cname: String,
    pub env_key: String,
    pub env_value: String,
}

impl Default for FixtureNames {
    fn default() -> Self {
        Self {
            framework_cli: "myframework".to_string(),
            framework_yaml: "myframework-yaml".to_string(),
            app: "sample-app".to_string(),
            app_image: "gcr.io/shipa-ci/sample-go-app:latest".to_string(),
            cname: "my-cname.com".to_string(),
            env_key: "FOO".to_string(),
            env_value: "BAR".to_string(),
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the platform config file is
    /// read if present and defaults are returned otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Resolve the CLI path: flag, then environment, then config, then
    /// `<cwd>/bin/ketch`
    pub fn cli_path(&self, flag: Option<PathBuf>) -> PathBuf {
        let from_env = std::env::var(CLI_PATH_ENV).ok();
        resolve_cli_path(flag, from_env.as_deref(), self.cli.path.as_deref())
    }

    /// Fixed endpoint, if one is configured (flag, environment, config)
    pub fn fixed_endpoint(&self, flag: Option<String>) -> Option<String> {
        flag.or_else(|| std::env::var(ENDPOINT_ENV).ok().filter(|v| !v.is_empty()))
            .or_else(|| self.endpoint.value.clone())
    }
}

fn resolve_cli_path(flag: Option<PathBuf>, env: Option<&str>, config: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Some(path) = env.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    config
        .map(Path::to_path_buf)
        .unwrap_or_else(default_cli_path)
}
