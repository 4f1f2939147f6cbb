// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Tmux Driver: every agent-visible message funnels through here.
//!
//! Three injection primitives, in increasing order of reliability:
//! [`TmuxDriver::send_keys`] (raw pass-through, for control sequences),
//! [`TmuxDriver::send_text`] (short commands), and
//! [`TmuxDriver::inject_message`] (anything multi-line or long, via a
//! named paste buffer so concurrent injections to different panes never
//! clobber each other's text).

use crate::error::TmuxError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

/// Bound on every tmux subprocess call (spec.md §5).
pub const TMUX_TIMEOUT: Duration = Duration::from_secs(5);

/// `inject_message` retries this many times with linear back-off before
/// giving up and returning `false`.
const INJECT_RETRIES: u32 = 3;
const INJECT_RETRY_BASE_DELAY: Duration = Duration::from_millis(300);

async fn run(mut cmd: Command, description: &str) -> Result<std::process::Output, TmuxError> {
    match tokio::time::timeout(TMUX_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(TmuxError::CommandFailed(format!("{description}: {e}"))),
        Err(_) => Err(TmuxError::Timeout(TMUX_TIMEOUT)),
    }
}

fn tmux(args: &[&str]) -> Command {
    let mut cmd = Command::new("tmux");
    cmd.args(args);
    cmd
}

/// Reliable interaction with the terminal multiplexer.
#[async_trait]
pub trait TmuxDriver: Clone + Send + Sync + 'static {
    /// Raw pass-through key send. No timing guarantees — use for control
    /// sequences (Escape, Ctrl-M), not for arbitrary text.
    async fn send_keys(&self, target: &str, keys: &[&str]) -> Result<(), TmuxError>;

    /// Short commands. Waits `delay` after the text before the submit key,
    /// so the agent's input buffer has settled before Enter lands.
    async fn send_text(
        &self,
        target: &str,
        text: &str,
        submit: bool,
        delay: Duration,
    ) -> Result<(), TmuxError>;

    /// The reliable primitive for multi-line or long (~100+ character)
    /// messages. Loads `message` into a uniquely-named paste buffer,
    /// pastes it with delete-on-paste, then (after `delay`) sends submit.
    /// Retries the whole sequence with linear back-off on transient
    /// failure; a final failure is logged and returns `false` rather than
    /// propagating, per the injection error policy.
    async fn inject_message(
        &self,
        target: &str,
        message: &str,
        submit: bool,
        delay: Duration,
        source: Option<&str>,
    ) -> bool;

    /// Interrupt whatever tool call is in flight.
    async fn send_escape_to_pane(&self, target: &str) -> Result<(), TmuxError>;

    /// Status-line overlay notification that never touches the input
    /// buffer — for non-urgent completions.
    async fn display_message(&self, target: &str, message: &str) -> Result<(), TmuxError>;

    async fn window_exists(&self, target: &str) -> Result<bool, TmuxError>;

    async fn capture_pane(&self, target: &str, lines: u32) -> Result<String, TmuxError>;

    async fn capture_pane_title(&self, target: &str) -> Result<Option<String>, TmuxError>;

    async fn kill_window(&self, target: &str) -> Result<(), TmuxError>;

    async fn kill_pane(&self, target: &str) -> Result<(), TmuxError>;

    async fn new_window(
        &self,
        session: &str,
        window_name: &str,
        cwd: &Path,
        cmd: Option<&str>,
    ) -> Result<(), TmuxError>;

    async fn list_windows(&self, session: &str) -> Result<Vec<String>, TmuxError>;
}

/// Production driver: shells out to the real `tmux` binary.
#[derive(Clone, Default)]
pub struct TmuxCliDriver;

impl TmuxCliDriver {
    pub fn new() -> Self {
        Self
    }

    async fn load_and_paste(&self, target: &str, message: &str, delay: Duration) -> Result<(), TmuxError> {
        let buffer_name = format!("inject-{}", orch_core::new_short_id());
        let tmp = std::env::temp_dir().join(format!("{buffer_name}.txt"));
        tokio::fs::write(&tmp, message)
            .await
            .map_err(|e| TmuxError::CommandFailed(format!("write temp file: {e}")))?;

        let load = tmux(&["load-buffer", "-b", &buffer_name, &tmp.to_string_lossy()]);
        let output = run(load, "load-buffer").await?;
        let _ = tokio::fs::remove_file(&tmp).await;
        if !output.status.success() {
            return Err(TmuxError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let paste = tmux(&["paste-buffer", "-b", &buffer_name, "-d", "-t", target]);
        let output = run(paste, "paste-buffer").await?;
        let _ = run(tmux(&["delete-buffer", "-b", &buffer_name]), "delete-buffer").await;
        if !output.status.success() {
            return Err(TmuxError::PaneNotFound(target.to_string()));
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[async_trait]
impl TmuxDriver for TmuxCliDriver {
    async fn send_keys(&self, target: &str, keys: &[&str]) -> Result<(), TmuxError> {
        let mut args = vec!["send-keys", "-t", target];
        args.extend_from_slice(keys);
        let output = run(tmux(&args), "send-keys").await?;
        if !output.status.success() {
            return Err(TmuxError::PaneNotFound(target.to_string()));
        }
        Ok(())
    }

    async fn send_text(
        &self,
        target: &str,
        text: &str,
        submit: bool,
        delay: Duration,
    ) -> Result<(), TmuxError> {
        let output = run(tmux(&["send-keys", "-t", target, "-l", "--", text]), "send-keys -l").await?;
        if !output.status.success() {
            return Err(TmuxError::PaneNotFound(target.to_string()));
        }
        if submit {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.send_keys(target, &["Enter"]).await?;
        }
        Ok(())
    }

    async fn inject_message(
        &self,
        target: &str,
        message: &str,
        submit: bool,
        delay: Duration,
        source: Option<&str>,
    ) -> bool {
        let body = match source {
            Some(tag) => format!("[{tag} {}] {message}", chrono::Local::now().format("%H:%M")),
            None => message.to_string(),
        };

        for attempt in 0..INJECT_RETRIES {
            match self.load_and_paste(target, &body, delay).await {
                Ok(()) => {
                    if submit {
                        if let Err(e) = self.send_keys(target, &["Enter"]).await {
                            tracing::warn!(target, attempt, error = %e, "inject_message: submit failed");
                            continue;
                        }
                    }
                    return true;
                }
                Err(e) => {
                    tracing::warn!(target, attempt, error = %e, "inject_message attempt failed");
                    tokio::time::sleep(INJECT_RETRY_BASE_DELAY * (attempt + 1)).await;
                }
            }
        }
        tracing::error!(target, "inject_message exhausted retries, giving up");
        false
    }

    async fn send_escape_to_pane(&self, target: &str) -> Result<(), TmuxError> {
        self.send_keys(target, &["Escape"]).await
    }

    async fn display_message(&self, target: &str, message: &str) -> Result<(), TmuxError> {
        let output = run(tmux(&["display-message", "-t", target, message]), "display-message").await?;
        if !output.status.success() {
            return Err(TmuxError::PaneNotFound(target.to_string()));
        }
        Ok(())
    }

    async fn window_exists(&self, target: &str) -> Result<bool, TmuxError> {
        let output = run(tmux(&["list-windows", "-t", target]), "list-windows").await?;
        Ok(output.status.success())
    }

    async fn capture_pane(&self, target: &str, lines: u32) -> Result<String, TmuxError> {
        let span = format!("-{lines}");
        let output = run(
            tmux(&["capture-pane", "-t", target, "-p", "-S", &span]),
            "capture-pane",
        )
        .await?;
        if !output.status.success() {
            return Err(TmuxError::PaneNotFound(target.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn capture_pane_title(&self, target: &str) -> Result<Option<String>, TmuxError> {
        let output = run(
            tmux(&["display-message", "-t", target, "-p", "#{pane_title}"]),
            "display-message pane_title",
        )
        .await?;
        if !output.status.success() {
            return Err(TmuxError::PaneNotFound(target.to_string()));
        }
        let title = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(if title.is_empty() { None } else { Some(title) })
    }

    async fn kill_window(&self, target: &str) -> Result<(), TmuxError> {
        let _ = run(tmux(&["kill-window", "-t", target]), "kill-window").await;
        Ok(())
    }

    async fn kill_pane(&self, target: &str) -> Result<(), TmuxError> {
        let _ = run(tmux(&["kill-pane", "-t", target]), "kill-pane").await;
        Ok(())
    }

    async fn new_window(
        &self,
        session: &str,
        window_name: &str,
        cwd: &Path,
        cmd: Option<&str>,
    ) -> Result<(), TmuxError> {
        let target = format!("{session}:");
        let mut args = vec![
            "new-window".to_string(),
            "-t".to_string(),
            target,
            "-n".to_string(),
            window_name.to_string(),
            "-c".to_string(),
            cwd.display().to_string(),
        ];
        if let Some(cmd) = cmd {
            args.push(cmd.to_string());
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = run(tmux(&arg_refs), "new-window").await?;
        if !output.status.success() {
            return Err(TmuxError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(())
    }

    async fn list_windows(&self, session: &str) -> Result<Vec<String>, TmuxError> {
        let output = run(
            tmux(&["list-windows", "-t", session, "-F", "#{window_name}"]),
            "list-windows",
        )
        .await?;
        if !output.status.success() {
            return Err(TmuxError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    pub enum TmuxCall {
        SendKeys { target: String, keys: Vec<String> },
        SendText { target: String, text: String, submit: bool },
        InjectMessage { target: String, message: String, submit: bool, source: Option<String> },
        SendEscape { target: String },
        DisplayMessage { target: String, message: String },
        KillWindow { target: String },
        KillPane { target: String },
        NewWindow { session: String, window_name: String },
    }

    struct FakeState {
        calls: Vec<TmuxCall>,
        panes: HashMap<String, FakePane>,
        windows: HashMap<String, Vec<String>>,
        inject_should_fail: bool,
    }

    #[derive(Clone, Default)]
    struct FakePane {
        content: String,
        title: Option<String>,
        exists: bool,
    }

    /// In-memory [`TmuxDriver`] for engine/daemon tests: records every call
    /// and lets the test pre-seed pane content and titles.
    #[derive(Clone)]
    pub struct FakeTmuxDriver {
        inner: Arc<Mutex<FakeState>>,
    }

    impl Default for FakeTmuxDriver {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeState {
                    calls: Vec::new(),
                    panes: HashMap::new(),
                    windows: HashMap::new(),
                    inject_should_fail: false,
                })),
            }
        }
    }

    impl FakeTmuxDriver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<TmuxCall> {
            self.inner.lock().calls.clone()
        }

        pub fn seed_pane(&self, target: &str, content: &str, title: Option<&str>) {
            let mut inner = self.inner.lock();
            inner.panes.insert(
                target.to_string(),
                FakePane {
                    content: content.to_string(),
                    title: title.map(str::to_string),
                    exists: true,
                },
            );
        }

        pub fn set_inject_should_fail(&self, fail: bool) {
            self.inner.lock().inject_should_fail = fail;
        }
    }

    #[async_trait]
    impl TmuxDriver for FakeTmuxDriver {
        async fn send_keys(&self, target: &str, keys: &[&str]) -> Result<(), TmuxError> {
            self.inner.lock().calls.push(TmuxCall::SendKeys {
                target: target.to_string(),
                keys: keys.iter().map(|s| s.to_string()).collect(),
            });
            Ok(())
        }

        async fn send_text(
            &self,
            target: &str,
            text: &str,
            submit: bool,
            _delay: Duration,
        ) -> Result<(), TmuxError> {
            self.inner.lock().calls.push(TmuxCall::SendText {
                target: target.to_string(),
                text: text.to_string(),
                submit,
            });
            Ok(())
        }

        async fn inject_message(
            &self,
            target: &str,
            message: &str,
            submit: bool,
            _delay: Duration,
            source: Option<&str>,
        ) -> bool {
            let fail = {
                let mut inner = self.inner.lock();
                inner.calls.push(TmuxCall::InjectMessage {
                    target: target.to_string(),
                    message: message.to_string(),
                    submit,
                    source: source.map(str::to_string),
                });
                inner.inject_should_fail
            };
            !fail
        }

        async fn send_escape_to_pane(&self, target: &str) -> Result<(), TmuxError> {
            self.inner.lock().calls.push(TmuxCall::SendEscape { target: target.to_string() });
            Ok(())
        }

        async fn display_message(&self, target: &str, message: &str) -> Result<(), TmuxError> {
            self.inner.lock().calls.push(TmuxCall::DisplayMessage {
                target: target.to_string(),
                message: message.to_string(),
            });
            Ok(())
        }

        async fn window_exists(&self, target: &str) -> Result<bool, TmuxError> {
            Ok(self.inner.lock().panes.get(target).map(|p| p.exists).unwrap_or(false))
        }

        async fn capture_pane(&self, target: &str, _lines: u32) -> Result<String, TmuxError> {
            self.inner
                .lock()
                .panes
                .get(target)
                .map(|p| p.content.clone())
                .ok_or_else(|| TmuxError::PaneNotFound(target.to_string()))
        }

        async fn capture_pane_title(&self, target: &str) -> Result<Option<String>, TmuxError> {
            self.inner
                .lock()
                .panes
                .get(target)
                .map(|p| p.title.clone())
                .ok_or_else(|| TmuxError::PaneNotFound(target.to_string()))
        }

        async fn kill_window(&self, target: &str) -> Result<(), TmuxError> {
            self.inner.lock().calls.push(TmuxCall::KillWindow { target: target.to_string() });
            self.inner.lock().panes.remove(target);
            Ok(())
        }

        async fn kill_pane(&self, target: &str) -> Result<(), TmuxError> {
            self.inner.lock().calls.push(TmuxCall::KillPane { target: target.to_string() });
            self.inner.lock().panes.remove(target);
            Ok(())
        }

        async fn new_window(
            &self,
            session: &str,
            window_name: &str,
            _cwd: &Path,
            _cmd: Option<&str>,
        ) -> Result<(), TmuxError> {
            let mut inner = self.inner.lock();
            inner.calls.push(TmuxCall::NewWindow {
                session: session.to_string(),
                window_name: window_name.to_string(),
            });
            inner
                .windows
                .entry(session.to_string())
                .or_default()
                .push(window_name.to_string());
            let target = format!("{session}:{window_name}");
            inner.panes.insert(
                target,
                FakePane {
                    content: String::new(),
                    title: None,
                    exists: true,
                },
            );
            Ok(())
        }

        async fn list_windows(&self, session: &str) -> Result<Vec<String>, TmuxError> {
            Ok(self.inner.lock().windows.get(session).cloned().unwrap_or_default())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTmuxDriver, TmuxCall};
