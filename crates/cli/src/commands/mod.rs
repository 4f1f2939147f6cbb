// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subcommand implementations, one module per spec.md surface area.

pub mod daemon;
pub mod duty;
pub mod handoff;
pub mod lifecycle;
pub mod mission;
pub mod session;
pub mod trigger;

use crate::client::ClientError;
use orch_daemon::protocol::Request;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("could not determine session id: not passed explicitly, $CLAUDE_SESSION_ID is unset, and no session is registered on this tmux pane")]
    NoSessionId,
    #[error("could not determine mission execution id: not passed explicitly and $MISSION_EXECUTION_ID is unset")]
    NoExecutionId,
}

/// Resolves the session id a lifecycle command should act on: an
/// explicit `--session` flag wins, then `$CLAUDE_SESSION_ID` (the
/// environment contract every agent is launched with, spec.md §6), and
/// finally a `who_am_i` lookup against the current tmux pane for a human
/// typing the command by hand.
pub async fn resolve_session_id(client: &crate::client::DaemonClient, explicit: Option<String>) -> Result<String, CommandError> {
    if let Some(id) = explicit {
        return Ok(id);
    }
    if let Some(id) = crate::env::claude_session_id() {
        return Ok(id);
    }
    let pane = crate::env::tmux_pane().ok_or(CommandError::NoSessionId)?;
    let request = Request::WhoAmI { pane };
    let id: String = client.send_value(&request).await?;
    Ok(id)
}
