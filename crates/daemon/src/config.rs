// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration Loader: merges `<repo>/.engine/config/orchestrator.toml`
//! (or `$ORCH_CONFIG`) over hardcoded defaults. Every field has a default,
//! so a bare `orchd` with no config file present still starts.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid timezone '{0}'")]
    InvalidTimezone(String),
}

/// Raw, partially-specified TOML shape. Every field is optional; absent
/// fields fall back to [`Config`]'s hardcoded defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    socket_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
    log_path: Option<PathBuf>,
    lock_path: Option<PathBuf>,
    timezone: Option<String>,
    chief_window: Option<String>,
    tmux_session: Option<String>,
    agent_command: Option<String>,
    calendar_command: Option<String>,
    calendar_args: Option<Vec<String>>,
    context_warn_threshold: Option<u8>,
    context_emergency_threshold: Option<u8>,
    autonomous_offset: Option<u8>,
    poll_interval_secs: Option<u64>,
    watcher_debounce_ms: Option<u64>,
    mission_concurrency: Option<usize>,
    tmux_timeout_secs: Option<u64>,
}

/// Fully-resolved daemon configuration: the TOML file (if any) merged
/// over built-in defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub repo_root: PathBuf,
    pub socket_path: PathBuf,
    pub db_path: PathBuf,
    pub log_path: PathBuf,
    pub lock_path: PathBuf,
    pub timezone: chrono_tz::Tz,
    pub chief_window: String,
    pub tmux_session: String,
    pub agent_command: String,
    pub calendar_command: Option<String>,
    pub calendar_args: Vec<String>,
    pub context_warn_threshold: u8,
    pub context_emergency_threshold: u8,
    pub autonomous_offset: u8,
    pub poll_interval: Duration,
    pub watcher_debounce: Duration,
    pub mission_concurrency: usize,
    pub tmux_timeout: Duration,
}

impl Config {
    /// Loads configuration for `repo_root`, reading
    /// `<repo_root>/.engine/config/orchestrator.toml` unless
    /// `$ORCH_CONFIG` names a different path. A missing file is not an
    /// error — defaults apply. A present-but-malformed file is fatal.
    pub fn load(repo_root: &Path) -> Result<Self, ConfigError> {
        let default_path = repo_root.join(".engine/config/orchestrator.toml");
        let path = crate::env::config_path_override().unwrap_or(default_path);

        let file = match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str::<ConfigFile>(&contents)
                .map_err(|source| ConfigError::Parse { path: path.clone(), source })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ConfigFile::default(),
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let state_dir = repo_root.join(".engine/state");
        let data_dir = repo_root.join(".engine/data/db");

        let timezone_name = file.timezone.unwrap_or_else(|| "America/Los_Angeles".to_string());
        let timezone: chrono_tz::Tz = timezone_name
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(timezone_name))?;

        let poll_interval_secs = file.poll_interval_secs.unwrap_or(30);
        let watcher_debounce_ms = file.watcher_debounce_ms.unwrap_or(500);
        let tmux_timeout_secs = file.tmux_timeout_secs.unwrap_or(5);

        Ok(Config {
            repo_root: repo_root.to_path_buf(),
            socket_path: file.socket_path.unwrap_or_else(|| state_dir.join("orchd.sock")),
            db_path: file.db_path.unwrap_or_else(|| data_dir.join("system.db")),
            log_path: file.log_path.unwrap_or_else(|| state_dir.join("orchd.log")),
            lock_path: file.lock_path.unwrap_or_else(|| state_dir.join("orchd.pid")),
            timezone,
            chief_window: file.chief_window.unwrap_or_else(|| "life:chief".to_string()),
            tmux_session: file.tmux_session.unwrap_or_else(|| "life".to_string()),
            agent_command: file.agent_command.unwrap_or_else(|| "claude".to_string()),
            calendar_command: file.calendar_command,
            calendar_args: file.calendar_args.unwrap_or_default(),
            context_warn_threshold: file.context_warn_threshold.unwrap_or(90),
            context_emergency_threshold: file.context_emergency_threshold.unwrap_or(100),
            autonomous_offset: file.autonomous_offset.unwrap_or(10),
            poll_interval: Duration::from_secs(poll_interval_secs),
            watcher_debounce: Duration::from_millis(watcher_debounce_ms),
            mission_concurrency: file.mission_concurrency.unwrap_or(4),
            tmux_timeout: Duration::from_secs(tmux_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.context_warn_threshold, 90);
        assert_eq!(config.mission_concurrency, 4);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.socket_path, dir.path().join(".engine/state/orchd.sock"));
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".engine/config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("orchestrator.toml"),
            "context_warn_threshold = 85\nmission_concurrency = 2\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.context_warn_threshold, 85);
        assert_eq!(config.mission_concurrency, 2);
        // untouched fields keep their defaults
        assert_eq!(config.context_emergency_threshold, 100);
        assert_eq!(config.tmux_timeout, Duration::from_secs(5));
    }

    #[test]
    fn malformed_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".engine/config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("orchestrator.toml"), "not valid toml =====").unwrap();

        assert!(matches!(Config::load(dir.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".engine/config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("orchestrator.toml"), "timezone = \"Mars/Olympus_Mons\"\n").unwrap();

        assert!(matches!(Config::load(dir.path()), Err(ConfigError::InvalidTimezone(_))));
    }
}
