//! Configuration and log file locations

use std::path::PathBuf;

/// Name used for platform directories
const APP_NAME: &str = "smoke-harness";

/// Environment variable overriding the configuration file location
pub const CONFIG_ENV: &str = "SMOKE_HARNESS_CONFIG";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/smoke-harness/`
/// - macOS: `~/Library/Application Support/smoke-harness/`
/// - Windows: `%APPDATA%\smoke-harness\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Configuration file named explicitly through `$SMOKE_HARNESS_CONFIG`
pub fn config_env_path() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// Platform default configuration file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.data_dir().join("logs"))
}
