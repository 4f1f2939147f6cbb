// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orch trigger list`.

use super::CommandError;
use crate::client::DaemonClient;
use crate::output::{print_json, truncate, OutputFormat};
use orch_core::Trigger;
use orch_daemon::protocol::Request;

pub async fn list(client: &DaemonClient, format: OutputFormat) -> Result<(), CommandError> {
    let triggers: Vec<Trigger> = client.send_value(&Request::TriggerList).await?;
    match format {
        OutputFormat::Json => print_json(&triggers),
        OutputFormat::Text => print_table(&triggers),
    }
    Ok(())
}

fn print_table(triggers: &[Trigger]) {
    if triggers.is_empty() {
        println!("no triggers");
        return;
    }
    println!("{:<16} {:<16} {:<10} {:<9} LAST FIRED", "SLUG", "MISSION", "KIND", "ENABLED");
    for t in triggers {
        println!(
            "{:<16} {:<16} {:<10} {:<9} {}",
            t.slug,
            truncate(t.mission_id.as_str(), 16),
            format!("{:?}", t.kind).to_lowercase(),
            t.enabled,
            t.last_fired_at.map(|ts| ts.to_string()).unwrap_or_else(|| "never".to_string()),
        );
    }
}
