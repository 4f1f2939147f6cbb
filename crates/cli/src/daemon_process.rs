// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawns, signals, and probes the `orchd` background process. Grounded
//! on the teacher's `daemon_process.rs`: shell out to `kill` rather than
//! pull in a signals crate, and resolve the sibling binary through
//! `CARGO_MANIFEST_DIR` in debug builds before falling back to `$PATH`.

use crate::client::ClientError;
use orch_daemon::config::Config;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Locates the `orchd` binary: an explicit `$ORCH_DAEMON_BIN` override,
/// then a sibling of the currently running `orch` binary (the common
/// case for an installed build), then `$PATH`.
pub fn find_orchd_binary() -> Result<PathBuf, ClientError> {
    if let Some(path) = crate::env::daemon_binary_override() {
        return Ok(path);
    }
    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let sibling = dir.join("orchd");
            if sibling.is_file() {
                return Ok(sibling);
            }
        }
    }
    Ok(PathBuf::from("orchd"))
}

/// Spawns `orchd` detached from this process's controlling terminal,
/// redirecting stdout/stderr to the configured log file (the daemon
/// reopens its own log via `tracing-appender`, but early startup errors
/// before logging is set up would otherwise vanish).
pub fn start_background(config: &Config) -> Result<(), ClientError> {
    let binary = find_orchd_binary()?;
    if let Some(parent) = config.log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
        .map_err(ClientError::Io)?;
    let log_file_err = log_file.try_clone().map_err(ClientError::Io)?;

    Command::new(binary)
        .current_dir(&config.repo_root)
        .env("ORCH_REPO_ROOT", &config.repo_root)
        .stdin(Stdio::null())
        .stdout(log_file)
        .stderr(log_file_err)
        .spawn()
        .map_err(|e| ClientError::StartFailed(e.to_string()))?;
    Ok(())
}

/// Reads the PID orchd wrote to its lock file at startup.
pub fn read_pid(config: &Config) -> Option<u32> {
    std::fs::read_to_string(&config.lock_path).ok()?.trim().parse().ok()
}

/// True if a process with this PID exists (signal 0, no-op delivery).
pub fn process_exists(pid: u32) -> bool {
    Command::new("kill").arg("-0").arg(pid.to_string()).status().map(|s| s.success()).unwrap_or(false)
}

/// Sends SIGTERM, then (if `force`) escalates to SIGKILL after a short
/// grace period, polling for the process to actually disappear.
pub fn stop(config: &Config, force: bool) -> Result<bool, ClientError> {
    let Some(pid) = read_pid(config) else {
        return Ok(false);
    };
    if !process_exists(pid) {
        let _ = std::fs::remove_file(&config.lock_path);
        return Ok(false);
    }

    let _ = Command::new("kill").arg("-15").arg(pid.to_string()).status();

    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if !process_exists(pid) {
            return Ok(true);
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    if force {
        let _ = Command::new("kill").arg("-9").arg(pid.to_string()).status();
        std::thread::sleep(Duration::from_millis(100));
    }
    Ok(!process_exists(pid))
}
