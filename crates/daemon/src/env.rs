// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable resolution. Every override the daemon
//! honors is read through one of these functions rather than scattered
//! `std::env::var` calls, so the full set of knobs is visible in one place.

use std::path::PathBuf;

/// `$ORCH_CONFIG` overrides the default `<repo>/.engine/config/orchestrator.toml`
/// path (see [`crate::config::Config::load`]).
pub fn config_path_override() -> Option<PathBuf> {
    std::env::var_os("ORCH_CONFIG").map(PathBuf::from)
}

/// When set to `1`, the daemon mirrors its log output to stderr in
/// addition to the rotating log file. Off by default so a daemon started
/// under a supervisor that already captures stderr doesn't double-log.
pub fn log_to_stderr() -> bool {
    std::env::var("ORCH_LOG_STDERR").as_deref() == Ok("1")
}

/// The repository root the daemon operates against. Defaults to the
/// current working directory; `orchd` is expected to be launched with
/// the repo as its cwd, same as the CLI resolves it via `-C`/cwd.
pub fn repo_root_override() -> Option<PathBuf> {
    std::env::var_os("ORCH_REPO_ROOT").map(PathBuf::from)
}
