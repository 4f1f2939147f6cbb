// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orch mission list`.

use super::CommandError;
use crate::client::DaemonClient;
use crate::output::{print_json, OutputFormat};
use orch_core::Mission;
use orch_daemon::protocol::Request;

pub async fn list(client: &DaemonClient, format: OutputFormat) -> Result<(), CommandError> {
    let missions: Vec<Mission> = client.send_value(&Request::MissionList).await?;
    match format {
        OutputFormat::Json => print_json(&missions),
        OutputFormat::Text => print_table(&missions),
    }
    Ok(())
}

fn print_table(missions: &[Mission]) {
    if missions.is_empty() {
        println!("no missions");
        return;
    }
    println!("{:<16} {:<28} {:<10} {:<9} {:<9} ENABLED", "SLUG", "NAME", "ROLE", "SOURCE", "TIMEOUT");
    for m in missions {
        println!(
            "{:<16} {:<28} {:<10} {:<9} {:<9} {}",
            m.slug,
            m.name,
            m.target_role.0,
            format!("{:?}", m.source).to_lowercase(),
            format!("{}m", m.timeout_minutes),
            m.enabled,
        );
    }
}
