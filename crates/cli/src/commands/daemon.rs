// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orch daemon start|stop|restart|status` — process management for `orchd`,
//! distinct from the lifecycle commands which talk to an already-running
//! daemon over the socket.

use crate::client::{ClientError, DaemonClient};
use crate::daemon_process;
use crate::output::{print_json, OutputFormat};
use orch_daemon::config::Config;
use orch_daemon::protocol::Request;

pub async fn start(config: &Config, foreground: bool, format: OutputFormat) -> Result<(), ClientError> {
    if foreground {
        let binary = daemon_process::find_orchd_binary()?;
        let status = std::process::Command::new(binary)
            .current_dir(&config.repo_root)
            .env("ORCH_REPO_ROOT", &config.repo_root)
            .status()
            .map_err(|e| ClientError::StartFailed(e.to_string()))?;
        if !status.success() {
            return Err(ClientError::StartFailed(format!("orchd exited with {status}")));
        }
        return Ok(());
    }

    if DaemonClient::connect(config).is_ok() {
        report(format, "already_running", "orchd is already running");
        return Ok(());
    }

    let client = DaemonClient::connect_or_start(config).await?;
    let _ = client.send(&Request::Ping).await;
    report(format, "started", "orchd started");
    Ok(())
}

pub async fn stop(config: &Config, kill: bool, format: OutputFormat) -> Result<(), ClientError> {
    let stopped = daemon_process::stop(config, kill)?;
    if stopped {
        report(format, "stopped", "orchd stopped");
    } else {
        report(format, "not_running", "orchd is not running");
    }
    Ok(())
}

pub async fn restart(config: &Config, kill: bool, format: OutputFormat) -> Result<(), ClientError> {
    let was_running = daemon_process::stop(config, kill)?;
    if was_running {
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    }
    let client = DaemonClient::connect_or_start(config).await?;
    let _ = client.send(&Request::Ping).await;
    report(format, "restarted", "orchd restarted");
    Ok(())
}

pub async fn status(config: &Config, format: OutputFormat) -> Result<(), ClientError> {
    let client = match DaemonClient::connect(config) {
        Ok(c) => c,
        Err(_) => {
            report(format, "not_running", "orchd is not running");
            return Ok(());
        }
    };
    match client.send(&Request::Ping).await {
        Ok(_) => {
            let pid = daemon_process::read_pid(config);
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "status": "running",
                    "pid": pid,
                    "socket": config.socket_path,
                })),
                OutputFormat::Text => {
                    println!("orchd is running");
                    if let Some(pid) = pid {
                        println!("  pid:    {pid}");
                    }
                    println!("  socket: {}", config.socket_path.display());
                }
            }
        }
        Err(_) => report(format, "not_running", "orchd is not running"),
    }
    Ok(())
}

fn report(format: OutputFormat, status: &str, text: &str) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({"status": status})),
        OutputFormat::Text => println!("{text}"),
    }
}
