// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orch status|done|reset|mission-complete|whoami` — the lifecycle-tool
//! hooks a session's own agent process calls over its lifetime, per
//! spec.md §4.C/§4.F.

use super::{resolve_session_id, CommandError};
use crate::client::DaemonClient;
use crate::output::{print_json, OutputFormat};
use orch_daemon::protocol::Request;

pub async fn status(client: &DaemonClient, session_id: Option<String>, text: String, format: OutputFormat) -> Result<(), CommandError> {
    let session_id = resolve_session_id(client, session_id).await?;
    client.send_ok(&Request::Status { session_id, text }).await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({"ok": true})),
        OutputFormat::Text => println!("status updated"),
    }
    Ok(())
}

pub async fn done(client: &DaemonClient, session_id: Option<String>, summary: String, format: OutputFormat) -> Result<(), CommandError> {
    let session_id = resolve_session_id(client, session_id).await?;
    client.send_ok(&Request::Done { session_id, summary }).await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({"ok": true})),
        OutputFormat::Text => println!("session marked done; handoff queued"),
    }
    Ok(())
}

pub async fn reset(
    client: &DaemonClient,
    session_id: Option<String>,
    summary: String,
    work_file: Option<String>,
    format: OutputFormat,
) -> Result<(), CommandError> {
    let session_id = resolve_session_id(client, session_id).await?;
    let handoff_id: String = client
        .send_value(&Request::Reset { session_id, summary, work_file })
        .await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({"handoff_id": handoff_id})),
        OutputFormat::Text => println!("reset requested, handoff {handoff_id} queued"),
    }
    Ok(())
}

pub async fn mission_complete(
    client: &DaemonClient,
    execution_id: Option<String>,
    status: String,
    summary: Option<String>,
    error: Option<String>,
    format: OutputFormat,
) -> Result<(), CommandError> {
    let execution_id = execution_id
        .or_else(crate::env::mission_execution_id)
        .ok_or(CommandError::NoExecutionId)?;
    client
        .send_ok(&Request::MissionComplete { execution_id, status, summary, error })
        .await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({"ok": true})),
        OutputFormat::Text => println!("mission execution closed"),
    }
    Ok(())
}

pub async fn whoami(client: &DaemonClient, format: OutputFormat) -> Result<(), CommandError> {
    let pane = crate::env::tmux_pane().ok_or(CommandError::NoSessionId)?;
    let id: String = client.send_value(&Request::WhoAmI { pane }).await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({"session_id": id})),
        OutputFormat::Text => println!("{id}"),
    }
    Ok(())
}
