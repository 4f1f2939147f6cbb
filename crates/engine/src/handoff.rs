// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Handoff Pipeline: preserves conversational texture across an
//! agent's context death and does the process-level surgery (kill the
//! old pane, spawn a replacement that looks like the same session
//! continuing) without the dying agent participating.
//!
//! Grounded on `original_source/.engine/src/cli/handoff.py` (stage 2,
//! the executor) and `original_source/.engine/src/modules/handoff/
//! summarizer.py` (stage 1, the summarizer's environment and prompt).

use crate::error::HandoffError;
use crate::registry::SessionRegistry;
use orch_adapters::{HeadlessAgentLauncher, HeadlessAgentRequest, TmuxDriver};
use orch_core::{
    new_short_id, Clock, Handoff, HandoffContent, HandoffId, HandoffReason, HandoffStatus,
    Mode, Role, Session, SessionId, SystemEvent,
};
use orch_storage::{HandoffRepo, NewHandoff, Store};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Placeholders the summarizer agent is expected to replace in place.
/// If stage 1 never touches these, stage 2 still proceeds with the
/// scaffolding (spec §7 failure semantics).
pub const PLACEHOLDER_SUMMARY: &str = "<!-- SUMMARY -->";
pub const PLACEHOLDER_NEXT_ACTION: &str = "<!-- NEXT-ACTION -->";
pub const PLACEHOLDER_FILES_TOUCHED: &str = "<!-- FILES-TOUCHED -->";
pub const PLACEHOLDER_RESUME_MODE: &str = "<!-- RESUME-MODE -->";

const SUMMARIZER_PROMPT_TEMPLATE: &str = "\
Role: {role}
Mode: summarizer

TODAY:
{today}

MEMORY:
{memory}

Transcript:
{transcript}

You are a successor agent's note-to-self, not a chat participant. Edit \
the handoff template at {template_path} in place: replace each HTML \
comment placeholder with narrative content. Do not call any tool other \
than editing that one file. The next agent needs work continuation, not \
a recap of this conversation.
";

/// Writes the scaffolded handoff template (labeled sections, unfilled
/// placeholders) that the summarizer agent edits in place.
pub fn scaffold_template(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = format!(
        "# Handoff\n\n\
         ## Summary\n{PLACEHOLDER_SUMMARY}\n\n\
         ## Next action\n{PLACEHOLDER_NEXT_ACTION}\n\n\
         ## Files touched\n{PLACEHOLDER_FILES_TOUCHED}\n\n\
         ## Resume mode\n{PLACEHOLDER_RESUME_MODE}\n"
    );
    std::fs::write(path, body)
}

fn build_summarizer_prompt(role: &Role, today: &str, memory: &str, transcript: &str, template_path: &Path) -> String {
    SUMMARIZER_PROMPT_TEMPLATE
        .replace("{role}", role.as_str())
        .replace("{today}", today)
        .replace("{memory}", memory)
        .replace("{transcript}", transcript)
        .replace("{template_path}", &template_path.display().to_string())
}

fn read_or_empty(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

/// What a caller (the Context Monitor, or the `reset` lifecycle
/// primitive) supplies to start a handoff.
#[derive(Debug, Clone)]
pub struct RequestHandoff {
    pub old_session_id: SessionId,
    pub reason: HandoffReason,
    pub content: HandoffContent,
}

/// Every field of the environment contract (spec.md §6) the replacement
/// pane is launched with, beyond what inherits automatically.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Shell command used to start the agent CLI inside the new pane,
    /// e.g. `"claude"`.
    pub agent_command: String,
    pub tmux_session: String,
    pub summarizer_timeout: Duration,
    /// How long the executor waits after marking `executing` for the
    /// dying agent's last response to finalize (spec §4.G step 2).
    pub settle_delay: Duration,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            agent_command: "claude".to_string(),
            tmux_session: "life".to_string(),
            summarizer_timeout: Duration::from_secs(120),
            settle_delay: Duration::from_secs(3),
        }
    }
}

pub struct HandoffPipeline<T, L> {
    store: Store,
    registry: SessionRegistry,
    bus: orch_core::EventBus,
    tmux: T,
    summarizer: L,
    clock: Arc<dyn Clock>,
    config: SpawnConfig,
}

impl<T, L> Clone for HandoffPipeline<T, L>
where
    T: Clone,
    L: Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            registry: self.registry.clone(),
            bus: self.bus.clone(),
            tmux: self.tmux.clone(),
            summarizer: self.summarizer.clone(),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<T, L> HandoffPipeline<T, L>
where
    T: TmuxDriver + Clone,
    L: HeadlessAgentLauncher + Clone,
{
    pub fn new(
        store: Store,
        registry: SessionRegistry,
        bus: orch_core::EventBus,
        tmux: T,
        summarizer: L,
        clock: Arc<dyn Clock>,
        config: SpawnConfig,
    ) -> Self {
        Self {
            store,
            registry,
            bus,
            tmux,
            summarizer,
            clock,
            config,
        }
    }

    /// Creates the pending handoff row and detaches the two-stage
    /// executor as a background task. Returns as soon as the row exists;
    /// the caller (graceful `reset`, or the emergency Context Monitor
    /// path) never blocks on the surgery itself.
    pub fn request(&self, req: RequestHandoff) -> Result<Handoff, HandoffError> {
        let now = self.clock.now();
        let old = self
            .registry
            .get(&req.old_session_id)?
            .ok_or_else(|| HandoffError::NotFound(req.old_session_id.to_string()))?;

        let handoff = HandoffRepo::new(&self.store).create(
            &NewHandoff {
                id: HandoffId::new(new_short_id()),
                old_session_id: old.id.clone(),
                role: old.role.clone(),
                mode: old.mode,
                tmux_pane: old.pane.clone(),
                conversation_id: old.conversation_id.clone(),
                parent_session_id: old.parent_session_id.clone(),
                mission_execution_id: old.mission_execution_id.clone(),
                reason: req.reason,
                content: req.content,
            },
            now,
        )?;

        self.bus.publish(SystemEvent::HandoffRequested {
            handoff_id: handoff.id.clone(),
            old_session_id: old.id.clone(),
            reason: req.reason,
        });

        let pipeline = self.clone();
        let handoff_id = handoff.id.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.execute(&handoff_id).await {
                tracing::error!(handoff_id = %handoff_id, error = %e, "handoff executor failed");
            }
        });

        Ok(handoff)
    }

    /// Returns the already-pending-or-executing handoff for `session_id`,
    /// if any. Used to guard against double-triggering an emergency
    /// handoff on repeated Context Monitor ticks.
    pub fn pending_or_executing_for(&self, session_id: &SessionId) -> Result<Option<Handoff>, HandoffError> {
        Ok(HandoffRepo::new(&self.store).pending_or_executing_for(session_id)?)
    }

    async fn execute(&self, handoff_id: &HandoffId) -> Result<(), HandoffError> {
        let repo = HandoffRepo::new(&self.store);
        let handoff = repo.get(handoff_id)?.ok_or_else(|| HandoffError::NotFound(handoff_id.to_string()))?;

        repo.mark_executing(handoff_id, self.clock.now())?;

        self.run_summarizer_stage(&handoff).await;

        tokio::time::sleep(self.config.settle_delay).await;

        match self.run_executor_stage(&handoff).await {
            Ok(new_session_id) => {
                repo.mark_complete(handoff_id, &new_session_id, self.clock.now())?;
                self.bus.publish(SystemEvent::HandoffCompleted {
                    handoff_id: handoff_id.clone(),
                    new_session_id,
                });
                Ok(())
            }
            Err(e) => {
                repo.mark_failed(handoff_id, &e.to_string(), self.clock.now())?;
                self.bus.publish(SystemEvent::HandoffFailed {
                    handoff_id: handoff_id.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Stage 1: best-effort. A timeout or spawn failure leaves the
    /// template scaffolded rather than failing the whole handoff.
    async fn run_summarizer_stage(&self, handoff: &Handoff) {
        let HandoffContent::File(template_path) = &handoff.content else {
            return;
        };

        let old = match self.registry.get(&handoff.old_session_id) {
            Ok(Some(s)) => s,
            _ => return,
        };

        let transcript = old
            .transcript_path
            .as_deref()
            .map(read_or_empty)
            .unwrap_or_default();
        let today = read_or_empty(&old.cwd.join("Desktop/working/TODAY.md"));
        let memory = read_or_empty(&old.cwd.join("Desktop/working/MEMORY.md"));
        let prompt = build_summarizer_prompt(&handoff.role, &today, &memory, &transcript, template_path);

        let req = HeadlessAgentRequest {
            cwd: old.cwd.clone(),
            env: vec![
                ("CLAUDE_SESSION_ID".to_string(), new_short_id()),
                ("CLAUDE_SESSION_ROLE".to_string(), handoff.role.as_str().to_string()),
                ("CLAUDE_SESSION_MODE".to_string(), Mode::Summarizer.as_str().to_string()),
                ("CLAUDE_CONVERSATION_ID".to_string(), handoff.conversation_id.as_str().to_string()),
                (
                    "CLAUDE_PARENT_SESSION_ID".to_string(),
                    handoff.old_session_id.as_str().to_string(),
                ),
            ],
            prompt,
        };

        let spawn = self.summarizer.spawn(req);
        match tokio::time::timeout(self.config.summarizer_timeout, spawn).await {
            Ok(Ok(handle)) => match tokio::time::timeout(self.config.summarizer_timeout, handle.wait()).await {
                Ok(_) => {}
                Err(_) => tracing::warn!(handoff_id = %handoff.id, "summarizer timed out; proceeding with scaffolded template"),
            },
            Ok(Err(e)) => tracing::warn!(handoff_id = %handoff.id, error = %e, "summarizer failed to spawn"),
            Err(_) => tracing::warn!(handoff_id = %handoff.id, "summarizer spawn timed out"),
        }
    }

    /// Stage 2: end the old session, kill its pane, spawn the
    /// replacement, register it. Returns the new session id.
    async fn run_executor_stage(&self, handoff: &Handoff) -> Result<SessionId, HandoffError> {
        let now = self.clock.now();
        self.registry.end(&handoff.old_session_id, "handoff", now)?;

        if let Some(pane) = &handoff.tmux_pane {
            let _ = self.tmux.kill_pane(pane).await;
        }

        let window_name = if handoff.role.is_chief() {
            "chief".to_string()
        } else {
            new_short_id()
        };

        let old = self.registry.get(&handoff.old_session_id)?;
        let cwd = old.as_ref().map(|s| s.cwd.clone()).unwrap_or_else(|| PathBuf::from("."));
        let new_session_id = SessionId::new(new_short_id());

        let cmd = self.build_spawn_command(handoff, &new_session_id);
        self.tmux
            .new_window(&self.config.tmux_session, &window_name, &cwd, Some(&cmd))
            .await
            .map_err(|e| HandoffError::SpawnFailed(e.to_string()))?;

        let pane_target = format!("{}:{}", self.config.tmux_session, window_name);
        let new_session = self.registry.register(
            crate::registry::RegisterRequest {
                id: new_session_id.clone(),
                role: handoff.role.clone(),
                mode: handoff.mode,
                pane: Some(pane_target),
                transcript_path: None,
                conversation_id: Some(handoff.conversation_id.clone()),
                parent_session_id: Some(handoff.old_session_id.clone()),
                mission_execution_id: handoff.mission_execution_id.clone(),
                cwd,
                description: None,
                spec_path: None,
            },
            now,
        )?;

        Ok(new_session.id)
    }

    fn build_spawn_command(&self, handoff: &Handoff, new_session_id: &SessionId) -> String {
        let mut env_pairs = vec![
            ("CLAUDE_SESSION_ID".to_string(), new_session_id.as_str().to_string()),
            ("CLAUDE_SESSION_ROLE".to_string(), handoff.role.as_str().to_string()),
            ("CLAUDE_SESSION_MODE".to_string(), handoff.mode.as_str().to_string()),
            ("CLAUDE_CONVERSATION_ID".to_string(), handoff.conversation_id.as_str().to_string()),
            (
                "CLAUDE_PARENT_SESSION_ID".to_string(),
                handoff.old_session_id.as_str().to_string(),
            ),
        ];
        if let Some(mid) = &handoff.mission_execution_id {
            env_pairs.push(("MISSION_EXECUTION_ID".to_string(), mid.as_str().to_string()));
        }
        match &handoff.content {
            HandoffContent::File(path) => env_pairs.push(("SPEC_PATH".to_string(), path.display().to_string())),
            HandoffContent::Inline(_) => {}
        }

        let env_prefix = env_pairs
            .iter()
            .map(|(k, v)| format!("{k}={}", shell_escape(v)))
            .collect::<Vec<_>>()
            .join(" ");
        format!("env {env_prefix} {}", self.config.agent_command)
    }
}

fn shell_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_adapters::FakeHeadlessAgentLauncher;
    use orch_adapters::FakeTmuxDriver;
    use orch_core::{ConversationId, FakeClock, Mode, Role};
    use orch_storage::Store;

    fn pipeline() -> (HandoffPipeline<FakeTmuxDriver, FakeHeadlessAgentLauncher>, SessionRegistry, orch_core::EventBus) {
        let store = Store::open_in_memory().unwrap();
        let bus = orch_core::EventBus::new();
        let registry = SessionRegistry::new(store.clone(), bus.clone());
        let clock = Arc::new(FakeClock::new(Utc::now()));
        let pipeline = HandoffPipeline::new(
            store,
            registry.clone(),
            bus.clone(),
            FakeTmuxDriver::new(),
            FakeHeadlessAgentLauncher::new(),
            clock,
            SpawnConfig {
                settle_delay: Duration::from_millis(0),
                summarizer_timeout: Duration::from_millis(200),
                ..Default::default()
            },
        );
        (pipeline, registry, bus)
    }

    fn register_chief(registry: &SessionRegistry) -> Session {
        registry
            .register(
                crate::registry::RegisterRequest {
                    id: SessionId::new("abc12345"),
                    role: Role::new("chief"),
                    mode: Mode::Interactive,
                    pane: Some("%7".to_string()),
                    transcript_path: None,
                    conversation_id: Some(ConversationId::chief()),
                    parent_session_id: None,
                    mission_execution_id: None,
                    cwd: PathBuf::from("/home/user/repo"),
                    description: None,
                    spec_path: None,
                },
                Utc::now(),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn graceful_reset_produces_a_complete_handoff_with_continuity() {
        let (pipeline, registry, _bus) = pipeline();
        register_chief(&registry);

        let handoff = pipeline
            .request(RequestHandoff {
                old_session_id: SessionId::new("abc12345"),
                reason: HandoffReason::ContextLow,
                content: HandoffContent::Inline("finished morning brief".to_string()),
            })
            .unwrap();
        assert_eq!(handoff.status, HandoffStatus::Pending);

        // the executor runs detached; give it a tick to finish.
        for _ in 0..50 {
            tokio::task::yield_now().await;
            let current = HandoffRepo::new(&pipeline.store).get(&handoff.id).unwrap().unwrap();
            if current.status != HandoffStatus::Pending && current.status != HandoffStatus::Executing {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let finished = HandoffRepo::new(&pipeline.store).get(&handoff.id).unwrap().unwrap();
        assert_eq!(finished.status, HandoffStatus::Complete);

        let old = registry.get(&SessionId::new("abc12345")).unwrap().unwrap();
        assert_eq!(old.end_reason.as_deref(), Some("handoff"));

        let new_session_id = finished.new_session_id.unwrap();
        let new_session = registry.get(&new_session_id).unwrap().unwrap();
        assert!(new_session.conversation_id.is_chief());
        assert_eq!(new_session.parent_session_id, Some(SessionId::new("abc12345")));
    }

    #[tokio::test]
    async fn double_trigger_on_same_session_is_rejected() {
        let (pipeline, registry, _bus) = pipeline();
        register_chief(&registry);

        pipeline
            .request(RequestHandoff {
                old_session_id: SessionId::new("abc12345"),
                reason: HandoffReason::EmergencyContextFull,
                content: HandoffContent::Inline("context full".to_string()),
            })
            .unwrap();

        let second = pipeline.request(RequestHandoff {
            old_session_id: SessionId::new("abc12345"),
            reason: HandoffReason::EmergencyContextFull,
            content: HandoffContent::Inline("context full".to_string()),
        });
        assert!(second.is_err());
    }

    #[test]
    fn scaffold_template_contains_every_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff.md");
        scaffold_template(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(PLACEHOLDER_SUMMARY));
        assert!(content.contains(PLACEHOLDER_NEXT_ACTION));
        assert!(content.contains(PLACEHOLDER_FILES_TOUCHED));
        assert!(content.contains(PLACEHOLDER_RESUME_MODE));
    }
}
