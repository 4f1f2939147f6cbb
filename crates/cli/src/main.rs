// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orch` — the CLI surface for the orchestrator: the lifecycle-tool hooks
//! an agent's own process calls (`status`, `done`, `reset`,
//! `mission-complete`, `whoami`), read-only admin queries over the running
//! fleet (`session`, `handoff`, `duty`, `mission`, `trigger`), and daemon
//! process management (`daemon start|stop|status|restart`).

mod client;
mod commands;
mod daemon_process;
mod env;
mod output;

use clap::{Parser, Subcommand};
use output::OutputFormat;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "orch", version, about = "Agent orchestration runtime CLI")]
struct Cli {
    /// Repository root to operate against. Defaults to walking up from the
    /// current directory looking for `.engine/`.
    #[arg(short = 'C', long, global = true)]
    repo_root: Option<std::path::PathBuf>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report a human-readable status line for the current session.
    Status {
        /// Session id; defaults to `$CLAUDE_SESSION_ID`.
        #[arg(long)]
        session: Option<String>,
        text: String,
    },
    /// Mark the current session complete and queue a clean handoff.
    Done {
        #[arg(long)]
        session: Option<String>,
        summary: String,
    },
    /// Request an immediate handoff (e.g. context running low).
    Reset {
        #[arg(long)]
        session: Option<String>,
        summary: String,
        /// Optional work-in-progress file path to carry into the next session.
        #[arg(long)]
        work_file: Option<String>,
    },
    /// Close out a headless mission execution.
    MissionComplete {
        /// Execution id; defaults to `$MISSION_EXECUTION_ID`.
        #[arg(long)]
        execution: Option<String>,
        #[arg(long, default_value = "complete")]
        status: String,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        error: Option<String>,
    },
    /// Print the session id registered on the current tmux pane.
    Whoami,
    /// Session registry queries.
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
    /// Handoff queries.
    Handoff {
        #[command(subcommand)]
        command: HandoffCommand,
    },
    /// Duty queries.
    Duty {
        #[command(subcommand)]
        command: DutyCommand,
    },
    /// Mission queries.
    Mission {
        #[command(subcommand)]
        command: MissionCommand,
    },
    /// Trigger queries.
    Trigger {
        #[command(subcommand)]
        command: TriggerCommand,
    },
    /// Daemon process management.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    /// List live sessions (or all with `--all`).
    List {
        #[arg(long)]
        all: bool,
    },
    /// Show a single session's full detail.
    Show { session_id: String },
}

#[derive(Subcommand)]
enum HandoffCommand {
    List {
        #[arg(long, default_value = "50")]
        limit: u32,
    },
}

#[derive(Subcommand)]
enum DutyCommand {
    List,
}

#[derive(Subcommand)]
enum MissionCommand {
    List,
}

#[derive(Subcommand)]
enum TriggerCommand {
    List,
}

#[derive(Subcommand)]
enum DaemonCommand {
    /// Start orchd in the background (or foreground with `--foreground`).
    Start {
        #[arg(long)]
        foreground: bool,
    },
    /// Stop orchd. `--kill` escalates to SIGKILL if it doesn't exit cleanly.
    Stop {
        #[arg(long)]
        kill: bool,
    },
    /// Print whether orchd is running.
    Status,
    /// Stop then start orchd.
    Restart {
        #[arg(long)]
        kill: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let repo_root = cli.repo_root.unwrap_or_else(env::repo_root);
    let format = cli.format;

    let config = match orch_daemon::config::Config::load(&repo_root) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(cli.command, &config, format).await;
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: &orch_daemon::config::Config, format: OutputFormat) -> anyhow::Result<()> {
    // Daemon management never needs a live connection — it's what creates
    // or tears down the thing everything else connects to, so it's the
    // one branch that doesn't call `DaemonClient::connect_or_start` below.
    match command {
        Commands::Daemon { command } => {
            match command {
                DaemonCommand::Start { foreground } => commands::daemon::start(config, foreground, format).await?,
                DaemonCommand::Stop { kill } => commands::daemon::stop(config, kill, format).await?,
                DaemonCommand::Status => commands::daemon::status(config, format).await?,
                DaemonCommand::Restart { kill } => commands::daemon::restart(config, kill, format).await?,
            }
            Ok(())
        }
        other => {
            let client = client::DaemonClient::connect_or_start(config).await?;
            match other {
                Commands::Status { session, text } => commands::lifecycle::status(&client, session, text, format).await?,
                Commands::Done { session, summary } => commands::lifecycle::done(&client, session, summary, format).await?,
                Commands::Reset { session, summary, work_file } => {
                    commands::lifecycle::reset(&client, session, summary, work_file, format).await?
                }
                Commands::MissionComplete { execution, status, summary, error } => {
                    commands::lifecycle::mission_complete(&client, execution, status, summary, error, format).await?
                }
                Commands::Whoami => commands::lifecycle::whoami(&client, format).await?,
                Commands::Session { command } => match command {
                    SessionCommand::List { all } => commands::session::list(&client, all, format).await?,
                    SessionCommand::Show { session_id } => commands::session::show(&client, session_id, format).await?,
                },
                Commands::Handoff { command } => match command {
                    HandoffCommand::List { limit } => commands::handoff::list(&client, limit, format).await?,
                },
                Commands::Duty { command } => match command {
                    DutyCommand::List => commands::duty::list(&client, format).await?,
                },
                Commands::Mission { command } => match command {
                    MissionCommand::List => commands::mission::list(&client, format).await?,
                },
                Commands::Trigger { command } => match command {
                    TriggerCommand::List => commands::trigger::list(&client, format).await?,
                },
                Commands::Daemon { .. } => unreachable!("handled above"),
            }
            Ok(())
        }
    }
}
