// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orch duty list`.

use super::CommandError;
use crate::client::DaemonClient;
use crate::output::{print_json, OutputFormat};
use orch_core::Duty;
use orch_daemon::protocol::Request;

pub async fn list(client: &DaemonClient, format: OutputFormat) -> Result<(), CommandError> {
    let duties: Vec<Duty> = client.send_value(&Request::DutyList).await?;
    match format {
        OutputFormat::Json => print_json(&duties),
        OutputFormat::Text => print_table(&duties),
    }
    Ok(())
}

fn print_table(duties: &[Duty]) {
    if duties.is_empty() {
        println!("no duties");
        return;
    }
    println!("{:<16} {:<28} {:<8} {:<9} {:<10} LAST RUN", "SLUG", "NAME", "TIME", "ENABLED", "STATUS");
    for d in duties {
        println!(
            "{:<16} {:<28} {:<8} {:<9} {:<10} {}",
            d.slug,
            d.name,
            format!("{:02}:{:02}", d.schedule_time.hour, d.schedule_time.minute),
            d.enabled,
            d.last_status.as_deref().unwrap_or("-"),
            d.last_run.map(|t| t.to_string()).unwrap_or_else(|| "never".to_string()),
        );
    }
}
