// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Mission Executor: runs system-initiated, headless background
//! agents. A mission never gets a pane; it is a plain subprocess that is
//! expected to call back `mission_complete(execution_id, status, summary)`
//! before it exits.
//!
//! Grounded on `original_source/.engine/src/services/missions_executor.py`.
//! The original keeps a pool-less `asyncio.create_task` per mission with
//! nothing bounding concurrency (spec.md §9 open question); this executor
//! caps simultaneous missions with a semaphore.

use crate::error::MissionError;
use orch_adapters::{HeadlessAgentLauncher, HeadlessAgentRequest};
use orch_core::{Clock, EventBus, Mission, MissionExecutionId, MissionExecutionStatus, PromptSource, SystemEvent};
use orch_storage::{MissionRepo, Store};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Caps the number of missions running at once (spec.md §9 open question).
const MAX_CONCURRENT_MISSIONS: usize = 4;

pub struct MissionExecutor<L> {
    store: Store,
    bus: EventBus,
    launcher: L,
    clock: Arc<dyn Clock>,
    cwd: std::path::PathBuf,
    semaphore: Arc<Semaphore>,
}

impl<L> Clone for MissionExecutor<L>
where
    L: Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bus: self.bus.clone(),
            launcher: self.launcher.clone(),
            clock: Arc::clone(&self.clock),
            cwd: self.cwd.clone(),
            semaphore: Arc::clone(&self.semaphore),
        }
    }
}

impl<L> MissionExecutor<L>
where
    L: HeadlessAgentLauncher + Clone,
{
    pub fn new(store: Store, bus: EventBus, launcher: L, clock: Arc<dyn Clock>, cwd: std::path::PathBuf) -> Self {
        Self {
            store,
            bus,
            launcher,
            clock,
            cwd,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_MISSIONS)),
        }
    }

    /// Queues an execution row, then detaches the headless agent as a
    /// background task bounded by the concurrency semaphore. Returns as
    /// soon as the row exists; the caller (a Duty, Trigger, or CLI
    /// invocation) never blocks on the mission finishing.
    pub fn execute(&self, slug: &str, variables: HashMap<String, String>) -> Result<MissionExecutionId, MissionError> {
        let repo = MissionRepo::new(&self.store);
        let mission = repo.get_by_slug(slug)?.ok_or_else(|| MissionError::NotFound(slug.to_string()))?;
        mission.validate()?;

        let now = self.clock.now();
        let execution = repo.create_execution(&mission.id, now)?;

        self.bus.publish(SystemEvent::MissionQueued {
            execution_id: execution.id.clone(),
            mission_id: mission.id.clone(),
        });

        let executor = self.clone();
        let execution_id = execution.id.clone();
        let mission_id = mission.id.clone();
        tokio::spawn(async move {
            let _permit = executor.semaphore.acquire().await;
            if let Err(e) = executor.run(&mission, &execution_id, variables).await {
                tracing::error!(execution_id = %execution_id, mission = %mission_id, error = %e, "mission failed");
            }
        });

        Ok(execution.id)
    }

    async fn run(&self, mission: &Mission, execution_id: &MissionExecutionId, variables: HashMap<String, String>) -> Result<(), MissionError> {
        let repo = MissionRepo::new(&self.store);
        let template = self.load_prompt(&mission.prompt)?;
        let prompt = render_prompt(&template, &variables, execution_id);

        let req = HeadlessAgentRequest {
            cwd: self.cwd.clone(),
            env: vec![
                ("CLAUDE_SESSION_ROLE".to_string(), mission.target_role.as_str().to_string()),
                ("CLAUDE_SESSION_MODE".to_string(), orch_core::Mode::Mission.as_str().to_string()),
                ("MISSION_EXECUTION_ID".to_string(), execution_id.as_str().to_string()),
            ],
            prompt,
        };

        let handle = match self.launcher.spawn(req).await {
            Ok(h) => h,
            Err(e) => {
                repo.complete_execution(execution_id, MissionExecutionStatus::Failed, None, Some(&e.to_string()), self.clock.now())?;
                self.publish_completed(execution_id, false);
                return Ok(());
            }
        };

        let status = handle.wait().await;
        // The mission is expected to self-report via `mission_complete`
        // before its process exits. If it exits first, that self-report
        // never landed; the run did not finish cleanly.
        if let Some(execution) = repo.get_execution(execution_id)? {
            if !execution.status.is_terminal() {
                let (exec_status, error) = match status {
                    Ok(s) if s.success() => (
                        MissionExecutionStatus::Failed,
                        Some("agent exited without calling mission_complete".to_string()),
                    ),
                    Ok(s) => (MissionExecutionStatus::Failed, Some(format!("agent exited with {s}"))),
                    Err(e) => (MissionExecutionStatus::Failed, Some(e.to_string())),
                };
                repo.complete_execution(execution_id, exec_status, None, error.as_deref(), self.clock.now())?;
                self.publish_completed(execution_id, false);
            }
        }
        Ok(())
    }

    fn publish_completed(&self, execution_id: &MissionExecutionId, succeeded: bool) {
        self.bus.publish(SystemEvent::MissionCompleted {
            execution_id: execution_id.clone(),
            succeeded,
        });
    }

    fn load_prompt(&self, prompt: &PromptSource) -> Result<String, MissionError> {
        match prompt {
            PromptSource::Inline(s) => Ok(s.clone()),
            PromptSource::File(path) => {
                let full = if path.is_absolute() { path.clone() } else { self.cwd.join(path) };
                std::fs::read_to_string(&full)
                    .map_err(|e| MissionError::Launch(orch_adapters::LaunchError::Spawn(format!("reading {}: {e}", full.display()))))
            }
        }
    }

    /// The `mission_complete(execution_id, status, summary)` tool agents
    /// call to close their own execution. A mission that never calls this
    /// gets marked failed when its process exits (see [`Self::run`]).
    pub fn complete(
        &self,
        execution_id: &MissionExecutionId,
        status: MissionExecutionStatus,
        summary: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), MissionError> {
        MissionRepo::new(&self.store).complete_execution(execution_id, status, summary, error, self.clock.now())?;
        self.publish_completed(execution_id, status == MissionExecutionStatus::Complete);
        Ok(())
    }

    pub fn running_count(&self) -> Result<u32, MissionError> {
        Ok(MissionRepo::new(&self.store).count_running()?)
    }
}

fn render_prompt(template: &str, variables: &HashMap<String, String>, execution_id: &MissionExecutionId) -> String {
    let mut out = template.replace("{{execution_id}}", execution_id.as_str());
    for (key, value) in variables {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}
