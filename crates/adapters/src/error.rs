// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the adapters crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("pane not found: {0}")]
    PaneNotFound(String),
    #[error("tmux command failed: {0}")]
    CommandFailed(String),
    #[error("tmux command timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("watcher setup failed: {0}")]
    Setup(#[from] notify::Error),
    #[error("root path does not exist: {}", .0.display())]
    RootMissing(std::path::PathBuf),
}

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("calendar command failed: {0}")]
    CommandFailed(String),
    #[error("could not parse calendar output: {0}")]
    InvalidOutput(String),
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn agent process: {0}")]
    Spawn(String),
    #[error("agent process timed out after {0:?}")]
    Timeout(std::time::Duration),
}
