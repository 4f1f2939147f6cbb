// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orch session list|show`.

use super::CommandError;
use crate::client::DaemonClient;
use crate::output::{format_time_ago, print_json, truncate, OutputFormat};
use orch_core::Session;
use orch_daemon::protocol::Request;

pub async fn list(client: &DaemonClient, all: bool, format: OutputFormat) -> Result<(), CommandError> {
    let sessions: Vec<Session> = client.send_value(&Request::SessionList { all }).await?;
    match format {
        OutputFormat::Json => print_json(&sessions),
        OutputFormat::Text => print_table(&sessions),
    }
    Ok(())
}

pub async fn show(client: &DaemonClient, session_id: String, format: OutputFormat) -> Result<(), CommandError> {
    let session: Session = client.send_value(&Request::SessionGet { session_id }).await?;
    match format {
        OutputFormat::Json => print_json(&session),
        OutputFormat::Text => print_detail(&session),
    }
    Ok(())
}

fn print_table(sessions: &[Session]) {
    if sessions.is_empty() {
        println!("no sessions");
        return;
    }
    let now = chrono::Utc::now();
    println!("{:<10} {:<10} {:<8} {:<12} {:<6} {:<8} STATUS", "ID", "ROLE", "MODE", "STATE", "CTX%", "SEEN");
    for s in sessions {
        println!(
            "{:<10} {:<10} {:<8} {:<12} {:<6} {:<8} {}",
            truncate(s.id.as_str(), 10),
            truncate(&s.role.0, 10),
            s.mode,
            s.current_state,
            s.context_warning_level,
            format_time_ago(s.last_seen_at, now),
            s.status_text.as_deref().unwrap_or("-"),
        );
    }
}

fn print_detail(session: &Session) {
    println!("id:              {}", session.id.as_str());
    println!("role:            {}", session.role.0);
    println!("mode:            {}", session.mode);
    println!("state:           {}", session.current_state);
    println!("conversation_id: {}", session.conversation_id.0);
    println!("pane:            {}", session.pane.as_deref().unwrap_or("-"));
    println!("cwd:             {}", session.cwd.display());
    println!("context_warn:    {}%", session.context_warning_level);
    println!("status:          {}", session.status_text.as_deref().unwrap_or("-"));
    println!("started_at:      {}", session.started_at);
    println!("last_seen_at:    {}", session.last_seen_at);
    if let Some(ended) = session.ended_at {
        println!("ended_at:        {ended}");
        println!("end_reason:      {}", session.end_reason.as_deref().unwrap_or("-"));
    }
}
