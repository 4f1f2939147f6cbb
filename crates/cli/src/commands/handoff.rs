// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orch handoff list`.

use super::CommandError;
use crate::client::DaemonClient;
use crate::output::{print_json, truncate, OutputFormat};
use orch_core::Handoff;
use orch_daemon::protocol::Request;

pub async fn list(client: &DaemonClient, limit: u32, format: OutputFormat) -> Result<(), CommandError> {
    let handoffs: Vec<Handoff> = client.send_value(&Request::HandoffList { limit }).await?;
    match format {
        OutputFormat::Json => print_json(&handoffs),
        OutputFormat::Text => print_table(&handoffs),
    }
    Ok(())
}

fn print_table(handoffs: &[Handoff]) {
    if handoffs.is_empty() {
        println!("no handoffs");
        return;
    }
    println!("{:<10} {:<10} {:<14} {:<12} {:<10} REQUESTED", "ID", "OLD", "REASON", "STATUS", "NEW");
    for h in handoffs {
        println!(
            "{:<10} {:<10} {:<14} {:<12} {:<10} {}",
            truncate(h.id.as_str(), 10),
            truncate(h.old_session_id.as_str(), 10),
            h.reason,
            h.status,
            h.new_session_id.as_ref().map(|id| truncate(id.as_str(), 10)).unwrap_or_else(|| "-".to_string()),
            h.requested_at,
        );
    }
}
