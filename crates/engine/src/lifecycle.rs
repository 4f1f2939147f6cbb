// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The lifecycle primitives: the tool surface agents themselves call —
//! `status`, `done`, `reset`. Thin glue into the Session Registry, the
//! Handoff Pipeline, and the Tmux Driver; no policy of its own beyond
//! scaffolding the handoff template a graceful `reset` hands to the
//! summarizer.
//!
//! Grounded on `original_source/.claude/hooks/session_lifecycle/stop.py`
//! and `start.py`.

use crate::error::LifecycleError;
use crate::handoff::{scaffold_template, HandoffPipeline, RequestHandoff, PLACEHOLDER_NEXT_ACTION, PLACEHOLDER_SUMMARY};
use crate::registry::SessionRegistry;
use orch_adapters::{HeadlessAgentLauncher, TmuxDriver};
use orch_core::{Clock, Handoff, HandoffContent, HandoffReason, Mode, SessionId};
use std::path::PathBuf;

pub struct LifecyclePrimitives<T, L> {
    registry: SessionRegistry,
    handoffs: HandoffPipeline<T, L>,
    tmux: T,
    clock: std::sync::Arc<dyn Clock>,
}

impl<T, L> LifecyclePrimitives<T, L>
where
    T: TmuxDriver + Clone,
    L: HeadlessAgentLauncher + Clone,
{
    pub fn new(registry: SessionRegistry, handoffs: HandoffPipeline<T, L>, tmux: T, clock: std::sync::Arc<dyn Clock>) -> Self {
        Self {
            registry,
            handoffs,
            tmux,
            clock,
        }
    }

    /// Display-only: sets `status_text`, refreshes `last_seen_at`, marks
    /// the session active.
    pub fn status(&self, session_id: &SessionId, text: &str) -> Result<(), LifecycleError> {
        self.registry.set_status_text(session_id, text, self.clock.now())?;
        Ok(())
    }

    /// Clean close for a specialist: ends the session, notifies the
    /// subscribing Chief with a non-destructive overlay if this is a
    /// background specialist's first completion, then kills its own pane.
    pub async fn done(&self, session_id: &SessionId, summary: &str) -> Result<(), LifecycleError> {
        let session = self
            .registry
            .get(session_id)?
            .ok_or_else(|| LifecycleError::NotFound(session_id.to_string()))?;

        self.registry.end(session_id, "done", self.clock.now())?;

        if session.mode == Mode::Background && !session.has_pinged {
            if let Some(chief_id) = &session.subscribed_by {
                if let Some(chief) = self.registry.get(chief_id)? {
                    if let Some(chief_pane) = &chief.pane {
                        let overlay = format!("{} ({}) finished: {}", session.role, short_id(&session.id), summary);
                        let _ = self.tmux.display_message(chief_pane, &overlay).await;
                    }
                }
            }
            self.registry.mark_pinged(session_id, self.clock.now())?;
        }

        if let Some(pane) = &session.pane {
            let _ = self.tmux.kill_pane(pane).await;
        }

        Ok(())
    }

    /// Graceful handoff request: scaffolds a handoff template pre-filled
    /// with the agent's own summary (and, if given, a pointer to the
    /// in-progress work file) and hands it to the Handoff Pipeline. The
    /// caller is told to wind down immediately; it keeps running until
    /// the detached executor kills its pane.
    pub async fn reset(
        &self,
        session_id: &SessionId,
        summary: &str,
        work_file: Option<&PathBuf>,
        reason: Option<HandoffReason>,
    ) -> Result<Handoff, LifecycleError> {
        let session = self
            .registry
            .get(session_id)?
            .ok_or_else(|| LifecycleError::NotFound(session_id.to_string()))?;

        let template_path = session.cwd.join("Desktop/working").join(short_id(&session.id)).join("handoff.md");
        scaffold_template(&template_path)?;

        let next_action = match work_file {
            Some(path) => format!("Continue the work in {}.", path.display()),
            None => "Continue from the summary above.".to_string(),
        };
        let mut body = std::fs::read_to_string(&template_path)?;
        body = body.replace(PLACEHOLDER_SUMMARY, summary);
        body = body.replace(PLACEHOLDER_NEXT_ACTION, &next_action);
        std::fs::write(&template_path, body)?;

        let handoff = self.handoffs.request(RequestHandoff {
            old_session_id: session_id.clone(),
            reason: reason.unwrap_or(HandoffReason::ContextLow),
            content: HandoffContent::File(template_path),
        })?;
        Ok(handoff)
    }
}

fn short_id(id: &SessionId) -> String {
    id.as_str().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::SpawnConfig;
    use orch_adapters::{FakeHeadlessAgentLauncher, FakeTmuxDriver, TmuxCall};
    use orch_core::{ConversationId, EventBus, FakeClock, HandoffStatus, Role};
    use orch_storage::{HandoffRepo, Store};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (LifecyclePrimitives<FakeTmuxDriver, FakeHeadlessAgentLauncher>, SessionRegistry, FakeTmuxDriver, Store) {
        let store = Store::open_in_memory().unwrap();
        let bus = EventBus::new();
        let registry = SessionRegistry::new(store.clone(), bus.clone());
        let tmux = FakeTmuxDriver::new();
        let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
        let pipeline = HandoffPipeline::new(
            store.clone(),
            registry.clone(),
            bus,
            tmux.clone(),
            FakeHeadlessAgentLauncher::new(),
            clock.clone(),
            SpawnConfig {
                settle_delay: Duration::from_millis(0),
                summarizer_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );
        let lifecycle = LifecyclePrimitives::new(registry.clone(), pipeline, tmux.clone(), clock);
        (lifecycle, registry, tmux, store)
    }

    fn register(registry: &SessionRegistry, store: &Store, id: &str, mode: Mode, pane: Option<&str>, subscribed_by: Option<&str>) {
        registry
            .register(
                crate::registry::RegisterRequest {
                    id: SessionId::new(id),
                    role: Role::new("builder"),
                    mode,
                    pane: pane.map(str::to_string),
                    transcript_path: None,
                    conversation_id: Some(ConversationId::new(format!("conv-{id}"))),
                    parent_session_id: None,
                    mission_execution_id: None,
                    cwd: std::env::temp_dir(),
                    description: None,
                    spec_path: None,
                },
                chrono::Utc::now(),
            )
            .unwrap();
        if let Some(chief) = subscribed_by {
            orch_storage::SessionRepo::new(store)
                .set_subscribed_by(&SessionId::new(id), &SessionId::new(chief), chrono::Utc::now())
                .unwrap();
        }
    }

    #[tokio::test]
    async fn status_updates_text_without_ending_session() {
        let (lifecycle, registry, _tmux, _store) = setup();
        register(&registry, &_store, "abc12345", Mode::Interactive, Some("%1"), None);
        lifecycle.status(&SessionId::new("abc12345"), "triaging email").unwrap();
        let session = registry.get(&SessionId::new("abc12345")).unwrap().unwrap();
        assert_eq!(session.status_text.as_deref(), Some("triaging email"));
        assert!(session.is_live());
    }

    #[tokio::test]
    async fn done_ends_session_and_kills_pane() {
        let (lifecycle, registry, tmux, _store) = setup();
        register(&registry, &_store, "spec0001", Mode::Interactive, Some("%3"), None);

        lifecycle.done(&SessionId::new("spec0001"), "task complete").await.unwrap();

        let session = registry.get(&SessionId::new("spec0001")).unwrap().unwrap();
        assert!(!session.is_live());
        assert_eq!(session.end_reason.as_deref(), Some("done"));
        assert!(tmux.calls().iter().any(|c| matches!(c, TmuxCall::KillPane { target } if target == "%3")));
    }

    #[tokio::test]
    async fn reset_scaffolds_template_and_produces_pending_handoff() {
        let (lifecycle, registry, _tmux, store) = setup();
        register(&registry, &store, "abc12345", Mode::Interactive, Some("%7"), None);

        let work_file = PathBuf::from("Desktop/working/email-triage.md");
        let handoff = lifecycle
            .reset(&SessionId::new("abc12345"), "finished morning brief", Some(&work_file), None)
            .await
            .unwrap();

        assert_eq!(handoff.status, HandoffStatus::Pending);
        let HandoffContent::File(path) = &handoff.content else {
            panic!("expected file content");
        };
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.contains("finished morning brief"));
        assert!(body.contains("email-triage.md"));

        for _ in 0..50 {
            tokio::task::yield_now().await;
            let current = HandoffRepo::new(&store).get(&handoff.id).unwrap().unwrap();
            if current.status != HandoffStatus::Pending && current.status != HandoffStatus::Executing {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let finished = HandoffRepo::new(&store).get(&handoff.id).unwrap().unwrap();
        assert_eq!(finished.status, HandoffStatus::Complete);
    }
}
