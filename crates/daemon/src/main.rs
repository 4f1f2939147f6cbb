// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! orchd — the orchestrator daemon.
//!
//! Launched by the `orch` CLI with the managed repository as its working
//! directory; not meant to be run directly by a human. Listens on a Unix
//! socket for session registration and lifecycle-primitive requests, and
//! drives the scheduling/monitoring poll loops described in spec.md §5.

use orch_daemon::config::Config;
use std::io::Write;
use std::path::Path;

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
const MAX_ROTATED_LOGS: u32 = 3;
const STARTUP_MARKER_PREFIX: &str = "--- orchd: starting (pid: ";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("orchd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: orchd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let repo_root = orch_daemon::env::repo_root_override().unwrap_or(std::env::current_dir()?);
    let config = Config::load(&repo_root)?;

    rotate_log_if_needed(&config.log_path);
    write_startup_marker(&config.log_path)?;
    let _log_guard = setup_logging(&config.log_path)?;

    tracing::info!(repo_root = %repo_root.display(), "starting orchd");

    let daemon = match orch_daemon::startup(config.clone()) {
        Ok(d) => d,
        Err(orch_daemon::DaemonError::AlreadyRunning(lock_path)) => {
            eprintln!("orchd is already running");
            let pid = std::fs::read_to_string(&lock_path).unwrap_or_default();
            if !pid.trim().is_empty() {
                eprintln!("  pid: {}", pid.trim());
            }
            std::process::exit(1);
        }
        Err(e) => {
            write_startup_error(&config.log_path, &e);
            tracing::error!(error = %e, "failed to start orchd");
            return Err(e.into());
        }
    };

    println!("READY");
    orch_daemon::run(daemon).await?;
    tracing::info!("orchd stopped");
    Ok(())
}

fn print_help() {
    println!("orchd {}", env!("CARGO_PKG_VERSION"));
    println!("Orchestrator daemon — background process managing agent sessions.");
    println!();
    println!("USAGE:");
    println!("    orchd");
    println!();
    println!("Normally started by the `orch` CLI (`orch daemon start`), not invoked");
    println!("directly. Listens on the Unix socket named in the repo's");
    println!(".engine/config/orchestrator.toml.");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -V, --version    Print version information");
}

fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }
    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn write_startup_marker(log_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

fn write_startup_error(log_path: &Path, error: &orch_daemon::DaemonError) {
    let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(log_path) else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start orchd: {error}");
}

fn setup_logging(log_path: &Path) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let parent = log_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let file_name = log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("orchd.log"));
    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking));
    if orch_daemon::env::log_to_stderr() {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    } else {
        registry.init();
    }

    Ok(guard)
}
