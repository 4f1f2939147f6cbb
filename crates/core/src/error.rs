// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for domain-level invariant violations.
//!
//! Adapter and storage errors live in their own crates; this covers only
//! violations of the data model itself (e.g. a mission targeting `chief`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    #[error("invalid session state: {0}")]
    InvalidSessionState(String),

    #[error("invalid handoff status: {0}")]
    InvalidHandoffStatus(String),

    #[error("invalid schedule time {0:?}, expected HH:MM")]
    InvalidScheduleTime(String),

    #[error("missions cannot target the chief role")]
    MissionTargetsChief,

    #[error("mission prompt must be exactly one of file or inline, got {0}")]
    InvalidMissionPrompt(&'static str),
}
