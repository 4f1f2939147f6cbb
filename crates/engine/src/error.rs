// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the engine's pipelines, loops, and lifecycle
//! primitives.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Storage(#[from] orch_storage::StorageError),
}

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error(transparent)]
    Storage(#[from] orch_storage::StorageError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Tmux(#[from] orch_adapters::TmuxError),
    #[error("no handoff found with id {0}")]
    NotFound(String),
    #[error("a handoff is already pending or executing for session {0}")]
    AlreadyPending(String),
    #[error("spawning the replacement session failed: {0}")]
    SpawnFailed(String),
    #[error("io error rendering handoff template: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Storage(#[from] orch_storage::StorageError),
    #[error(transparent)]
    Tmux(#[from] orch_adapters::TmuxError),
}

#[derive(Debug, Error)]
pub enum MissionError {
    #[error(transparent)]
    Storage(#[from] orch_storage::StorageError),
    #[error(transparent)]
    Launch(#[from] orch_adapters::LaunchError),
    #[error("mission '{0}' not found")]
    NotFound(String),
    #[error("mission '{0}' targets the chief role")]
    TargetsChief(String),
    #[error(transparent)]
    Core(#[from] orch_core::CoreError),
}

#[derive(Debug, Error)]
pub enum ReplyInjectorError {
    #[error(transparent)]
    Storage(#[from] orch_storage::StorageError),
    #[error("io error reading reply file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Handoff(#[from] HandoffError),
    #[error(transparent)]
    Tmux(#[from] orch_adapters::TmuxError),
    #[error("io error scaffolding handoff template: {0}")]
    Io(#[from] std::io::Error),
    #[error("no session found with id {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Handoff(#[from] HandoffError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Mission(#[from] MissionError),
    #[error(transparent)]
    ReplyInjector(#[from] ReplyInjectorError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Storage(#[from] orch_storage::StorageError),
}
