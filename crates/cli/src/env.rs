// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository-root discovery and environment-contract helpers.
//!
//! Mirrors the daemon's own `env` module: every override the CLI honors
//! is read through one of these functions rather than scattered
//! `std::env::var` calls.

use std::path::{Path, PathBuf};

/// Walks up from the current directory looking for `.engine/`, the
/// marker the daemon's `Config::load` also anchors on. Falls back to the
/// current directory if none is found, same as a bare `orchd` would.
pub fn repo_root() -> PathBuf {
    let start = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    repo_root_from(start)
}

fn repo_root_from(start: PathBuf) -> PathBuf {
    let mut current = start.clone();
    loop {
        if current.join(".engine").is_dir() {
            return current;
        }
        if !current.pop() {
            return start;
        }
    }
}

/// The session id assigned by the agent runtime's environment contract
/// (spec.md §6), when this process is invoked from inside an agent.
pub fn claude_session_id() -> Option<String> {
    std::env::var("CLAUDE_SESSION_ID").ok().filter(|s| !s.is_empty())
}

/// The tmux pane this process is running inside, if any — used to resolve
/// "who am I" when `$CLAUDE_SESSION_ID` isn't set (e.g. a human typing
/// `orch status` by hand in an agent's pane).
pub fn tmux_pane() -> Option<String> {
    std::env::var("TMUX_PANE").ok().filter(|s| !s.is_empty())
}

/// The mission execution id injected into a headless mission's prompt
/// template, used by `orch mission-complete` to close its own execution
/// without the caller having to pass it explicitly.
pub fn mission_execution_id() -> Option<String> {
    std::env::var("MISSION_EXECUTION_ID").ok().filter(|s| !s.is_empty())
}

/// Overrides the `orchd` binary location the CLI spawns for `orch daemon
/// start`. Primarily useful for tests and dev builds where the sibling
/// binary isn't on `$PATH`.
pub fn daemon_binary_override() -> Option<PathBuf> {
    std::env::var_os("ORCH_DAEMON_BIN").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_repo_root_from_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".engine")).unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(repo_root_from(nested), dir.path());
    }

    #[test]
    fn falls_back_to_start_when_no_marker_found() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("x/y");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(repo_root_from(nested.clone()), nested);
    }

    fn clear(name: &str) {
        std::env::remove_var(name);
    }

    #[test]
    fn empty_env_vars_are_treated_as_absent() {
        clear("CLAUDE_SESSION_ID");
        std::env::set_var("CLAUDE_SESSION_ID", "");
        assert_eq!(claude_session_id(), None);
        clear("CLAUDE_SESSION_ID");
    }
}
