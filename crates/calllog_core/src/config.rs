//! Process configuration resolved from the environment.
//!
//! # Responsibility
//! - Resolve database path and logging options once at startup.
//! - Keep environment access behind a lookup function so tests stay hermetic.
//!
//! Business settings (edit window, report directory, ...) are stored in the
//! `settings` table instead; see [`crate::repo::settings_repo`].

use crate::logging::default_log_level;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "CALLLOG_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "CALLLOG_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CALLLOG_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "fd-calls.db";

/// Startup configuration shared by the FFI and CLI front-ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute log directory. `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Reads `CALLLOG_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`; blank values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();
        Self {
            db_path: read(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            log_level: read(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ENV_DB_PATH, ENV_LOG_DIR, ENV_LOG_LEVEL};
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn missing_and_blank_values_use_defaults() {
        let env = HashMap::from([(ENV_DB_PATH, "   ")]);
        let config = AppConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.db_path, PathBuf::from("fd-calls.db"));
    }

    #[test]
    fn explicit_values_are_trimmed() {
        let env = HashMap::from([
            (ENV_DB_PATH, " /data/calls.db "),
            (ENV_LOG_LEVEL, "warn"),
            (ENV_LOG_DIR, "/var/log/calllog"),
        ]);
        let config = AppConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.db_path, PathBuf::from("/data/calls.db"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/calllog")));
    }
}
