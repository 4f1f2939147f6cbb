// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Headless agent process launcher, for the Mission Executor.
//!
//! Unlike a pane-based spawn (a new tmux window running the agent CLI
//! interactively), a mission agent has no pane: it is a plain subprocess
//! that receives its prompt and environment contract, and is expected to
//! call back into the daemon's IPC surface with `mission_complete` when
//! it's done. This trait only owns the spawn and exit-status half of
//! that contract; the completion call-back is engine-level state, not
//! an adapter concern.

use crate::error::LaunchError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::ExitStatus;
use tokio::process::{Child, Command};

#[derive(Debug, Clone)]
pub struct HeadlessAgentRequest {
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub prompt: String,
}

/// A running headless agent process.
pub struct HeadlessAgentHandle {
    child: Child,
}

impl HeadlessAgentHandle {
    pub async fn wait(mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }
}

/// Spawns the configured agent binary as a detached, headless process.
#[async_trait]
pub trait HeadlessAgentLauncher: Send + Sync + 'static {
    async fn spawn(&self, req: HeadlessAgentRequest) -> Result<HeadlessAgentHandle, LaunchError>;
}

/// Production launcher: shells out to a configured command, passing the
/// prompt as its final positional argument.
#[derive(Debug, Clone)]
pub struct ProcessAgentLauncher {
    command: String,
    args: Vec<String>,
}

impl ProcessAgentLauncher {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl HeadlessAgentLauncher for ProcessAgentLauncher {
    async fn spawn(&self, req: HeadlessAgentRequest) -> Result<HeadlessAgentHandle, LaunchError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .arg(&req.prompt)
            .current_dir(&req.cwd)
            .kill_on_drop(true);
        for (key, value) in &req.env {
            cmd.env(key, value);
        }

        let child = cmd
            .spawn()
            .map_err(|e| LaunchError::Spawn(format!("{}: {e}", self.command)))?;
        Ok(HeadlessAgentHandle { child })
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records spawn requests without launching a real process; tests call
    /// [`FakeHeadlessAgentLauncher::requests`] to inspect them.
    #[derive(Clone, Default)]
    pub struct FakeHeadlessAgentLauncher {
        requests: Arc<Mutex<Vec<HeadlessAgentRequest>>>,
    }

    impl FakeHeadlessAgentLauncher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn requests(&self) -> Vec<HeadlessAgentRequest> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl HeadlessAgentLauncher for FakeHeadlessAgentLauncher {
        async fn spawn(&self, req: HeadlessAgentRequest) -> Result<HeadlessAgentHandle, LaunchError> {
            self.requests.lock().push(req);
            // `true` exits 0 immediately -- good enough to stand in for a
            // mission that completes via its own mission_complete call
            // before the process exits.
            let child = Command::new("true")
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| LaunchError::Spawn(e.to_string()))?;
            Ok(HeadlessAgentHandle { child })
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeHeadlessAgentLauncher;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn process_launcher_spawns_and_exits() {
        let launcher = ProcessAgentLauncher::new("sh", vec!["-c".to_string(), "exit 0".to_string()]);
        let handle = launcher
            .spawn(HeadlessAgentRequest {
                cwd: std::env::temp_dir(),
                env: vec![],
                prompt: "ignored".to_string(),
            })
            .await
            .unwrap();
        let status = handle.wait().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn fake_launcher_records_requests() {
        let launcher = FakeHeadlessAgentLauncher::new();
        launcher
            .spawn(HeadlessAgentRequest {
                cwd: std::env::temp_dir(),
                env: vec![("MISSION_EXECUTION_ID".into(), "exec-1".into())],
                prompt: "do the thing".to_string(),
            })
            .await
            .unwrap();
        let requests = launcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "do the thing");
    }
}
