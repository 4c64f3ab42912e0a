//! Shared test context
//!
//! A [`Fixture`] is built once before the first step and passed by reference
//! to every step afterwards. It owns the resolved CLI path and endpoint, the
//! names of the entities the scenario creates, and a temporary directory for
//! files written by steps (removed when the fixture is dropped).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::common::config::{Config, FixtureNames};
use crate::common::{Error, Result};
use crate::exec::{CommandSpec, Executor};

/// Variables every fixture binds before the first step
pub const BUILTIN_VARS: [&str; 9] = [
    "cli",
    "endpoint",
    "framework_cli",
    "framework_yaml",
    "app",
    "app_image",
    "cname",
    "env_key",
    "env_value",
];

/// Reject a scenario binding that would shadow a built-in variable
pub(crate) fn check_binding(name: &str) -> Result<()> {
    if BUILTIN_VARS.contains(&name) {
        return Err(Error::Scenario(format!(
            "'{name}' is a built-in fixture variable and cannot be rebound"
        )));
    }
    Ok(())
}

/// Reject a file binding that shadows a built-in variable or would land
/// outside the fixture's temp directory
pub(crate) fn check_file_binding(var: &str, suffix: &str) -> Result<()> {
    check_binding(var)?;
    let file_name = format!("{var}{suffix}");
    if var.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.chars().any(|c| c == '/' || std::path::is_separator(c))
    {
        return Err(Error::Scenario(format!(
            "'{file_name}' is not a plain file name"
        )));
    }
    Ok(())
}

/// Process-wide test context
#[derive(Debug)]
pub struct Fixture {
    cli: PathBuf,
    vars: BTreeMap<String, String>,
    files: TempDir,
}

impl Fixture {
    /// Build a fixture from already-resolved values
    pub fn new(cli: impl Into<PathBuf>, endpoint: &str, names: &FixtureNames) -> Result<Self> {
        let cli = cli.into();
        let files = tempfile::Builder::new().prefix("ketch-harness-").tempdir()?;

        let mut vars = BTreeMap::new();
        vars.insert("cli".to_string(), cli.display().to_string());
        vars.insert("endpoint".to_string(), endpoint.to_string());
        vars.insert("framework_cli".to_string(), names.framework_cli.clone());
        vars.insert("framework_yaml".to_string(), names.framework_yaml.clone());
        vars.insert("app".to_string(), names.app.clone());
        vars.insert("app_image".to_string(), names.app_image.clone());
        vars.insert("cname".to_string(), names.cname.clone());
        vars.insert("env_key".to_string(), names.env_key.clone());
        vars.insert("env_value".to_string(), names.env_value.clone());

        Ok(Self { cli, vars, files })
    }

    /// Resolve the CLI path and the endpoint, then build the fixture
    ///
    /// Endpoint discovery runs the configured inventory command through
    /// `executor` unless a fixed endpoint is given by flag, environment or
    /// config file.
    pub async fn resolve(
        config: &Config,
        cli_flag: Option<PathBuf>,
        endpoint_flag: Option<String>,
        executor: &dyn Executor,
    ) -> Result<Self> {
        let cli = locate_program(config.cli_path(cli_flag));
        let endpoint = match config.fixed_endpoint(endpoint_flag) {
            Some(endpoint) => endpoint,
            None => discover_endpoint(&config.endpoint.discover, executor).await?,
        };
        tracing::info!(cli = %cli.display(), endpoint = %endpoint, "Resolved fixture");
        Self::new(cli, &endpoint, &config.fixtures)
    }

    pub fn cli(&self) -> &Path {
        &self.cli
    }

    pub fn endpoint(&self) -> &str {
        self.get("endpoint").unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Add scenario variables; built-in names cannot be rebound
    pub fn extend(&mut self, vars: &BTreeMap<String, String>) -> Result<()> {
        for name in vars.keys() {
            check_binding(name)?;
        }
        self.vars
            .extend(vars.iter().map(|(name, value)| (name.clone(), value.clone())));
        Ok(())
    }

    /// Build a CLI invocation with interpolated arguments and stdin
    pub fn command(&self, args: &[String], stdin: Option<&str>) -> Result<CommandSpec> {
        let args = args
            .iter()
            .map(|arg| self.interpolate(arg))
            .collect::<Result<Vec<_>>>()?;
        let spec = CommandSpec::new(&self.cli).args(args);
        Ok(match stdin {
            Some(payload) => spec.stdin(self.interpolate(payload)?),
            None => spec,
        })
    }

    /// Write `contents` to a file in the fixture's temp directory and bind
    /// its path to `var`
    pub fn write_file(&mut self, var: &str, suffix: &str, contents: &str) -> Result<PathBuf> {
        check_file_binding(var, suffix)?;
        let path = self.files.path().join(format!("{var}{suffix}"));
        std::fs::write(&path, contents)?;
        self.vars.insert(var.to_string(), path.display().to_string());
        Ok(path)
    }

    /// Replace every `${name}` with the variable's value
    pub fn interpolate(&self, template: &str) -> Result<String> {
        self.substitute(template, |value| value.to_string())
    }

    /// Like [`interpolate`](Self::interpolate), but values are regex-escaped
    /// so names such as `gcr.io/...:latest` match literally
    pub fn interpolate_pattern(&self, template: &str) -> Result<String> {
        self.substitute(template, regex::escape)
    }

    fn substitute(&self, template: &str, render: impl Fn(&str) -> String) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                return Err(Error::Scenario(format!(
                    "unterminated variable reference in '{template}'"
                )));
            };
            let name = &after[..end];
            let value = self
                .get(name)
                .ok_or_else(|| Error::UnknownFixture(name.to_string()))?;
            out.push_str(&render(value));
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Resolve a bare program name through `PATH`; paths are kept as given
fn locate_program(path: PathBuf) -> PathBuf {
    if path.components().count() == 1 {
        which::which(&path).unwrap_or(path)
    } else {
        path
    }
}

async fn discover_endpoint(command: &[String], executor: &dyn Executor) -> Result<String> {
    let Some((program, args)) = command.split_first() else {
        return Err(Error::Config(
            "endpoint.discover is empty and no endpoint was given".to_string(),
        ));
    };
    let spec = CommandSpec::new(program).args(args.iter().cloned());
    let result = executor.execute(&spec).await?;
    if !result.success() {
        return Err(Error::EndpointDiscovery(format!(
            "'{spec}' exited with {}: {}",
            result.status_label(),
            result.text().trim()
        )));
    }

    let endpoint = result
        .text()
        .trim()
        .trim_matches(|c: char| c == '\'' || c == '"')
        .to_string();
    if endpoint.is_empty() {
        return Err(Error::EndpointDiscovery(format!("'{spec}' printed nothing")));
    }
    Ok(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::scripted::ScriptedExecutor;

    fn fixture() -> Fixture {
        Fixture::new("/usr/local/bin/ketch", "10.110.30.233", &FixtureNames::default()).unwrap()
    }

    #[test]
    fn test_interpolate_known_variables() {
        let fx = fixture();
        assert_eq!(
            fx.interpolate("ketch-${framework_cli}").unwrap(),
            "ketch-myframework"
        );
        assert_eq!(fx.interpolate("${env_key}=${env_value}").unwrap(), "FOO=BAR");
        assert_eq!(fx.interpolate("no variables").unwrap(), "no variables");
    }

    #[test]
    fn test_interpolate_unknown_variable_fails() {
        let err = fixture().interpolate("${nope}").unwrap_err();
        assert!(matches!(err, Error::UnknownFixture(name) if name == "nope"));
    }

    #[test]
    fn test_interpolate_unterminated_fails() {
        assert!(matches!(
            fixture().interpolate("${app"),
            Err(Error::Scenario(_))
        ));
    }

    #[test]
    fn test_interpolate_pattern_escapes_values() {
        let fx = fixture();
        let pattern = fx.interpolate_pattern("1[ \t]+${app_image}[ \t]+web").unwrap();
        let re = regex::Regex::new(&pattern).unwrap();
        assert!(re.is_match("1   gcr.io/shipa-ci/sample-go-app:latest   web"));
        assert!(!re.is_match("1   gcrXio/shipa-ci/sample-go-app:latest   web"));
        // Pattern syntax outside variables is left alone
        assert_eq!(fx.interpolate_pattern("[0-9]{2}").unwrap(), "[0-9]{2}");
    }

    #[test]
    fn test_command_builds_spec() {
        let fx = fixture();
        let spec = fx
            .command(
                &["framework".into(), "remove".into(), "${framework_cli}".into()],
                Some("ketch-${framework_cli}"),
            )
            .unwrap();
        assert_eq!(spec.program, PathBuf::from("/usr/local/bin/ketch"));
        assert_eq!(spec.args, vec!["framework", "remove", "myframework"]);
        assert_eq!(spec.stdin.as_deref(), Some("ketch-myframework"));
    }

    #[test]
    fn test_write_file_binds_path() {
        let mut fx = fixture();
        let path = fx
            .write_file("framework_file", ".yaml", "name: myframework-yaml\n")
            .unwrap();
        assert!(path.exists());
        assert_eq!(fx.get("framework_file"), Some(path.display().to_string().as_str()));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "name: myframework-yaml\n"
        );
    }

    #[test]
    fn test_files_removed_with_fixture() {
        let mut fx = fixture();
        let path = fx.write_file("f", ".yaml", "x").unwrap();
        drop(fx);
        assert!(!path.exists());
    }

    #[test]
    fn test_new_binds_every_builtin() {
        let fx = fixture();
        for name in BUILTIN_VARS {
            assert!(fx.get(name).is_some(), "{name} is not bound");
        }
    }

    #[test]
    fn test_extend_adds_scenario_vars() {
        let mut fx = fixture();
        let mut vars = BTreeMap::new();
        vars.insert("region".to_string(), "eu".to_string());
        fx.extend(&vars).unwrap();
        assert_eq!(fx.get("region"), Some("eu"));
    }

    #[test]
    fn test_extend_rejects_builtin_names() {
        let mut fx = fixture();
        let mut vars = BTreeMap::new();
        vars.insert("app".to_string(), "my-app".to_string());
        vars.insert("region".to_string(), "eu".to_string());
        let err = fx.extend(&vars).unwrap_err();
        assert!(matches!(err, Error::Scenario(_)));
        assert!(err.to_string().contains("'app'"));
        assert_eq!(fx.get("app"), Some("sample-app"));
        assert_eq!(fx.get("region"), None);
    }

    #[test]
    fn test_write_file_cannot_rebind_endpoint() {
        let mut fx = fixture();
        let err = fx.write_file("endpoint", ".yaml", "x").unwrap_err();
        assert!(matches!(err, Error::Scenario(_)));
        assert_eq!(fx.endpoint(), "10.110.30.233");
    }

    #[test]
    fn test_write_file_stays_in_temp_dir() {
        let mut fx = fixture();
        for (var, suffix) in [("../escape", ".yaml"), ("nested/file", ""), ("x", "/../y"), ("", "")] {
            assert!(
                matches!(fx.write_file(var, suffix, "x"), Err(Error::Scenario(_))),
                "{var}{suffix} was accepted"
            );
        }
        assert!(fx.get("../escape").is_none());
    }

    #[tokio::test]
    async fn test_discover_endpoint_trims_quotes() {
        let exec = ScriptedExecutor::new();
        exec.respond("get svc traefik", "'10.110.30.233'\n", 0);
        let command: Vec<String> = ["kubectl", "get", "svc", "traefik"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            discover_endpoint(&command, &exec).await.unwrap(),
            "10.110.30.233"
        );
    }

    #[tokio::test]
    async fn test_discover_endpoint_failure() {
        let exec = ScriptedExecutor::new();
        exec.respond("get svc traefik", "Error from server (NotFound)", 1);
        let command: Vec<String> = ["kubectl", "get", "svc", "traefik"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let err = discover_endpoint(&command, &exec).await.unwrap_err();
        assert!(matches!(err, Error::EndpointDiscovery(_)));
        assert!(err.to_string().contains("NotFound"));
    }

    #[tokio::test]
    async fn test_resolve_prefers_fixed_endpoint() {
        let exec = ScriptedExecutor::new();
        let config = Config::default();
        let fx = Fixture::resolve(
            &config,
            Some(PathBuf::from("/opt/ketch")),
            Some("192.0.2.10".to_string()),
            &exec,
        )
        .await
        .unwrap();
        assert_eq!(fx.cli(), Path::new("/opt/ketch"));
        assert_eq!(fx.endpoint(), "192.0.2.10");
        assert!(exec.calls().is_empty());
    }
}
