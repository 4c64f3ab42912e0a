//! Configuration paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/ketch-harness/`
//! - macOS: `~/Library/Application Support/ketch-harness/`
//! - Windows: `%APPDATA%\ketch-harness\`

use std::path::PathBuf;

const APP_NAME: &str = "ketch-harness";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Default location of the ketch binary: `<cwd>/bin/ketch`
pub fn default_cli_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("bin")
        .join("ketch")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_toml() {
        if let Some(path) = config_path() {
            assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("config.toml"));
        }
    }

    #[test]
    fn test_default_cli_path_ends_with_bin_ketch() {
        let path = default_cli_path();
        assert!(path.ends_with("bin/ketch"));
    }
}
