// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Side-effecting adapters: everything that talks to tmux, the
//! filesystem, or an external calendar lives here. Pure parsing stays
//! in [`pane_status`]; everything else wraps an I/O boundary behind a
//! trait so the engine crate can swap in a test double.

pub mod agent_launcher;
pub mod calendar;
pub mod error;
pub mod pane_status;
pub mod tmux;
pub mod watcher;

pub use agent_launcher::{HeadlessAgentHandle, HeadlessAgentLauncher, HeadlessAgentRequest, ProcessAgentLauncher};
pub use calendar::{CalendarEvent, CalendarSource, NoopCalendarSource, ProcessCalendarSource};
pub use error::{CalendarError, LaunchError, TmuxError, WatcherError};
pub use pane_status::{parse_status, ClaudeStatus};
pub use tmux::{TmuxCliDriver, TmuxDriver, TMUX_TIMEOUT};
pub use watcher::{FileWatchEvent, FilesystemWatcher, WatcherConfig};

#[cfg(any(test, feature = "test-support"))]
pub use agent_launcher::FakeHeadlessAgentLauncher;
#[cfg(any(test, feature = "test-support"))]
pub use tmux::{FakeTmuxDriver, TmuxCall};
