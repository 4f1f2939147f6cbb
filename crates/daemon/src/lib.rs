// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! orchd: the orchestrator daemon. Owns the sqlite store, the Unix
//! socket IPC surface, and every poll loop described in spec.md §5 —
//! Context Monitor, Duty Scheduler, Trigger Service, Mission Scheduler —
//! plus the Filesystem Watcher's debounce-driven dispatch into the
//! Reply Auto-Injector.
//!
//! Grounded on `original_source/.engine/src/daemon.py` and on the
//! teacher's `daemon::lifecycle`/`main` split: `lifecycle.rs` wires the
//! process (PID lock, directories, construction), `main.rs` owns
//! argument handling and logging setup, and the event loop itself lives
//! in [`run`].

pub mod config;
pub mod env;
pub mod listener;
pub mod protocol;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use config::{Config, ConfigError};
use fs2::FileExt;
use orch_adapters::{
    CalendarError, CalendarEvent, CalendarSource, FilesystemWatcher, FileWatchEvent,
    NoopCalendarSource, ProcessAgentLauncher, ProcessCalendarSource, TmuxCliDriver, WatcherConfig,
    WatcherError,
};
use orch_core::{EventBus, SystemClock};
use orch_engine::{
    ContextMonitor, DutyScheduler, HandoffPipeline, LifecyclePrimitives, MissionExecutor,
    MissionScheduler, ReplyInjector, SessionRegistry, SpawnConfig, TriggerService,
};
use orch_storage::{migrations, Store, StorageError};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("loading config: {0}")]
    Config(#[from] ConfigError),
    #[error("daemon already running (lock held at {0})")]
    AlreadyRunning(PathBuf),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),
}

/// Dispatches to whichever calendar source the config names, without
/// forcing every engine generic parameter to be boxed just to make this
/// one optional integration pluggable.
enum ConfiguredCalendar {
    Noop(NoopCalendarSource),
    Process(ProcessCalendarSource),
}

#[async_trait]
impl CalendarSource for ConfiguredCalendar {
    async fn upcoming(&self, now: DateTime<Utc>, window: Duration) -> Result<Vec<CalendarEvent>, CalendarError> {
        match self {
            ConfiguredCalendar::Noop(c) => c.upcoming(now, window).await,
            ConfiguredCalendar::Process(c) => c.upcoming(now, window).await,
        }
    }
}

type Tmux = TmuxCliDriver;
type Launcher = ProcessAgentLauncher;

/// Everything the event loop in [`run`] needs. Built once at startup and
/// then shared (by value, since every field is internally `Arc`/`Clone`)
/// across every poll loop and the IPC listener.
#[derive(Clone)]
pub struct Daemon {
    pub config: Config,
    pub store: Store,
    pub bus: EventBus,
    pub registry: SessionRegistry,
    pub lifecycle: Arc<LifecyclePrimitives<Tmux, Launcher>>,
    pub context_monitor: Arc<ContextMonitor<Tmux, Launcher>>,
    pub duty_scheduler: Arc<DutyScheduler<Tmux>>,
    pub trigger_service: Arc<TriggerService<Tmux, ConfiguredCalendar>>,
    pub mission_executor: MissionExecutor<Launcher>,
    pub mission_scheduler: Arc<MissionScheduler<Launcher>>,
    pub reply_injector: Arc<ReplyInjector<Tmux>>,
    pub clock: Arc<dyn orch_core::Clock>,
    /// Held for the lifetime of the process; dropping it releases the
    /// advisory lock on `config.lock_path`.
    _lock_file: Arc<File>,
}

/// Acquires the PID lock, runs migrations, and wires every engine
/// component with production adapters. Does not start the listener or
/// any poll loop — call [`run`] for that.
pub fn startup(config: Config) -> Result<Daemon, DaemonError> {
    if let Some(parent) = config.lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| DaemonError::AlreadyRunning(config.lock_path.clone()))?;
    {
        use std::io::Write;
        let mut f = &lock_file;
        f.set_len(0)?;
        writeln!(f, "{}", std::process::id())?;
    }

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Store::open(&config.db_path)?;
    migrations::run(&store)?;

    let bus = EventBus::new();
    let clock: Arc<dyn orch_core::Clock> = Arc::new(SystemClock);
    let tmux = TmuxCliDriver::new();
    let launcher = ProcessAgentLauncher::new(config.agent_command.clone(), Vec::new());
    let registry = SessionRegistry::new(store.clone(), bus.clone());

    let handoffs = HandoffPipeline::new(
        store.clone(),
        registry.clone(),
        bus.clone(),
        tmux.clone(),
        launcher.clone(),
        clock.clone(),
        SpawnConfig {
            agent_command: config.agent_command.clone(),
            tmux_session: config.tmux_session.clone(),
            ..Default::default()
        },
    );
    let lifecycle = Arc::new(LifecyclePrimitives::new(registry.clone(), handoffs.clone(), tmux.clone(), clock.clone()));
    let context_monitor = Arc::new(ContextMonitor::new(registry.clone(), handoffs, tmux.clone()));
    let duty_scheduler = Arc::new(DutyScheduler::new(
        store.clone(),
        bus.clone(),
        tmux.clone(),
        clock.clone(),
        config.timezone,
        config.chief_window.clone(),
    ));

    let calendar = match &config.calendar_command {
        Some(cmd) => ConfiguredCalendar::Process(ProcessCalendarSource::new(cmd.clone(), config.calendar_args.clone())),
        None => ConfiguredCalendar::Noop(NoopCalendarSource),
    };
    let trigger_service = Arc::new(TriggerService::new(
        store.clone(),
        bus.clone(),
        tmux.clone(),
        calendar,
        clock.clone(),
        config.timezone,
        config.chief_window.clone(),
    ));

    let mission_executor = MissionExecutor::new(store.clone(), bus.clone(), launcher, clock.clone(), config.repo_root.clone());
    let mission_scheduler = Arc::new(MissionScheduler::new(store.clone(), mission_executor.clone(), clock.clone(), config.timezone));
    let reply_injector = Arc::new(ReplyInjector::new(store.clone(), registry.clone(), bus.clone(), tmux, clock.clone()));

    Ok(Daemon {
        config,
        store,
        bus,
        registry,
        lifecycle,
        context_monitor,
        duty_scheduler,
        trigger_service,
        mission_executor,
        mission_scheduler,
        reply_injector,
        clock,
        _lock_file: Arc::new(lock_file),
    })
}

/// Runs every poll loop and the IPC listener until SIGTERM, SIGINT, or
/// an `orch daemon stop` request arrives via the socket.
pub async fn run(daemon: Daemon) -> Result<(), DaemonError> {
    let shutdown = Arc::new(Notify::new());

    let handlers = listener::Handlers {
        registry: daemon.registry.clone(),
        lifecycle: daemon.lifecycle.clone(),
        missions: daemon.mission_executor.clone(),
        store: daemon.store.clone(),
        clock: daemon.clock.clone(),
        shutdown: shutdown.clone(),
    };
    let socket_path = daemon.config.socket_path.clone();
    let listener_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = listener::serve(&socket_path, handlers, listener_shutdown).await {
            error!(error = %e, "IPC listener exited");
        }
    });

    let watcher = FilesystemWatcher::start(&daemon.config.repo_root, WatcherConfig { debounce: daemon.config.watcher_debounce }, daemon.bus.clone())?;
    let mut watch_events = watcher.events;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let mut context_tick = tokio::time::interval(daemon.config.poll_interval);
    let mut duty_tick = tokio::time::interval(daemon.config.poll_interval);
    let mut trigger_tick = tokio::time::interval(daemon.config.poll_interval);
    let mut mission_tick = tokio::time::interval(daemon.config.poll_interval);

    info!(socket = %daemon.config.socket_path.display(), "orchd ready");

    loop {
        tokio::select! {
            _ = context_tick.tick() => {
                if let Err(e) = daemon.context_monitor.tick().await {
                    warn!(error = %e, "context monitor tick failed");
                }
            }
            _ = duty_tick.tick() => {
                if let Err(e) = daemon.duty_scheduler.tick().await {
                    warn!(error = %e, "duty scheduler tick failed");
                }
            }
            _ = trigger_tick.tick() => {
                if let Err(e) = daemon.trigger_service.tick().await {
                    warn!(error = %e, "trigger service tick failed");
                }
            }
            _ = mission_tick.tick() => {
                if let Err(e) = daemon.mission_scheduler.tick().await {
                    warn!(error = %e, "mission scheduler tick failed");
                }
            }
            event = watch_events.recv() => {
                match event {
                    Some(FileWatchEvent::Reply { conversation_id, path }) => {
                        if let Err(e) = daemon.reply_injector.handle_change(&conversation_id, &path).await {
                            warn!(error = %e, conversation_id = %conversation_id, "reply injection failed");
                        }
                    }
                    Some(FileWatchEvent::IndexTrigger { path }) => {
                        info!(path = %path.display(), "system index source changed, refresh deferred to next duty/trigger read");
                    }
                    Some(FileWatchEvent::Generic { .. }) => {}
                    None => {
                        warn!("filesystem watcher channel closed");
                    }
                }
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
            _ = shutdown.notified() => {
                info!("shutdown requested over IPC");
                break;
            }
        }
    }

    shutdown.notify_one();
    if daemon.config.socket_path.exists() {
        let _ = std::fs::remove_file(&daemon.config.socket_path);
    }
    if daemon.config.lock_path.exists() {
        let _ = std::fs::remove_file(&daemon.config.lock_path);
    }
    Ok(())
}
