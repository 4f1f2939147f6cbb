// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Session Registry: the sole mutator of the `sessions` table.
//!
//! Every write here publishes the matching `SystemEvent` in the same
//! call, so a subscriber that only watches the bus never needs to poll
//! storage to learn a session's fate.

use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use orch_core::{ConversationId, Mode, Role, Session, SessionId, SystemEvent};
use orch_core::{EventBus, MissionExecutionId};
use orch_storage::{RegisterSession, SessionRepo, Store};
use std::path::PathBuf;

/// Everything a caller supplies to register a session; `id` is generated
/// by the caller (normally from `CLAUDE_SESSION_ID`) since it is the
/// stable key the lifecycle hook round-trips on every call for the
/// session's lifetime.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub id: SessionId,
    pub role: Role,
    pub mode: Mode,
    pub pane: Option<String>,
    pub transcript_path: Option<PathBuf>,
    pub conversation_id: Option<ConversationId>,
    pub parent_session_id: Option<SessionId>,
    pub mission_execution_id: Option<MissionExecutionId>,
    pub cwd: PathBuf,
    pub description: Option<String>,
    pub spec_path: Option<PathBuf>,
}

#[derive(Clone)]
pub struct SessionRegistry {
    store: Store,
    bus: EventBus,
}

impl SessionRegistry {
    pub fn new(store: Store, bus: EventBus) -> Self {
        Self { store, bus }
    }

    /// Ends any prior live claimant of `pane`, then registers. Chief
    /// conversations default to the reserved `"chief"` id unless the
    /// caller supplies one explicitly.
    pub fn register(&self, req: RegisterRequest, now: DateTime<Utc>) -> Result<Session, RegistryError> {
        let repo = SessionRepo::new(&self.store);

        if let Some(pane) = &req.pane {
            repo.reconcile_pane(pane, now)?;
        }

        let conversation_id = req.conversation_id.unwrap_or_else(|| {
            if req.role.is_chief() {
                ConversationId::chief()
            } else {
                ConversationId::new(req.id.as_str())
            }
        });

        let session = repo.register(
            &RegisterSession {
                id: req.id,
                role: req.role,
                mode: req.mode,
                pane: req.pane,
                transcript_path: req.transcript_path,
                conversation_id,
                parent_session_id: req.parent_session_id,
                mission_execution_id: req.mission_execution_id,
                cwd: req.cwd,
                description: req.description,
                spec_path: req.spec_path,
            },
            now,
        )?;

        self.bus.publish(SystemEvent::SessionStarted {
            session_id: session.id.clone(),
            conversation_id: session.conversation_id.clone(),
        });
        Ok(session)
    }

    pub fn mark_idle(&self, id: &SessionId, now: DateTime<Utc>) -> Result<(), RegistryError> {
        SessionRepo::new(&self.store).mark_idle(id, now)?;
        Ok(())
    }

    pub fn mark_active(&self, id: &SessionId, now: DateTime<Utc>) -> Result<(), RegistryError> {
        SessionRepo::new(&self.store).mark_active(id, now)?;
        Ok(())
    }

    pub fn end(&self, id: &SessionId, reason: &str, now: DateTime<Utc>) -> Result<(), RegistryError> {
        SessionRepo::new(&self.store).end(id, reason, now)?;
        self.bus.publish(SystemEvent::SessionEnded {
            session_id: id.clone(),
            reason: Some(reason.to_string()),
        });
        Ok(())
    }

    pub fn set_status_text(&self, id: &SessionId, text: &str, now: DateTime<Utc>) -> Result<(), RegistryError> {
        let repo = SessionRepo::new(&self.store);
        repo.set_status_text(id, text, now)?;
        repo.mark_active(id, now)?;
        Ok(())
    }

    pub fn set_context_warning_level(&self, id: &SessionId, level: u8, now: DateTime<Utc>) -> Result<(), RegistryError> {
        SessionRepo::new(&self.store).set_context_warning_level(id, level, now)?;
        self.bus.publish(SystemEvent::ContextWarning {
            session_id: id.clone(),
            level,
        });
        Ok(())
    }

    pub fn get(&self, id: &SessionId) -> Result<Option<Session>, RegistryError> {
        Ok(SessionRepo::new(&self.store).get(id)?)
    }

    pub fn get_by_pane(&self, pane: &str) -> Result<Option<Session>, RegistryError> {
        Ok(SessionRepo::new(&self.store).get_by_pane(pane)?)
    }

    pub fn get_live_chief(&self) -> Result<Option<Session>, RegistryError> {
        Ok(SessionRepo::new(&self.store).get_live_chief()?)
    }

    pub fn get_live_by_conversation_id(&self, conversation_id: &str) -> Result<Option<Session>, RegistryError> {
        Ok(SessionRepo::new(&self.store).get_live_by_conversation_id(conversation_id)?)
    }

    pub fn list_live(&self) -> Result<Vec<Session>, RegistryError> {
        Ok(SessionRepo::new(&self.store).list_live()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(id: &str, pane: &str) -> RegisterRequest {
        RegisterRequest {
            id: SessionId::new(id),
            role: Role::new("chief"),
            mode: Mode::Interactive,
            pane: Some(pane.to_string()),
            transcript_path: None,
            conversation_id: None,
            parent_session_id: None,
            mission_execution_id: None,
            cwd: PathBuf::from("/home/user/repo"),
            description: None,
            spec_path: None,
        }
    }

    #[test]
    fn registering_chief_defaults_to_chief_conversation_id() {
        let store = Store::open_in_memory().unwrap();
        let bus = EventBus::new();
        let registry = SessionRegistry::new(store, bus);
        let session = registry.register(req("abc12345", "%1"), Utc::now()).unwrap();
        assert!(session.conversation_id.is_chief());
    }

    #[test]
    fn pane_reuse_ends_prior_claimant() {
        let store = Store::open_in_memory().unwrap();
        let bus = EventBus::new();
        let registry = SessionRegistry::new(store, bus);
        let now = Utc::now();
        registry.register(req("mno11111", "%2"), now).unwrap();
        registry
            .register(req("pqr22222", "%2"), now + chrono::Duration::seconds(1))
            .unwrap();

        let old = registry.get(&SessionId::new("mno11111")).unwrap().unwrap();
        assert_eq!(old.end_reason.as_deref(), Some("pane_reused"));
        let live = registry.get_by_pane("%2").unwrap().unwrap();
        assert_eq!(live.id, SessionId::new("pqr22222"));
    }

    #[test]
    fn session_started_event_is_published_on_register() {
        let store = Store::open_in_memory().unwrap();
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        let registry = SessionRegistry::new(store, bus);
        registry.register(req("abc12345", "%1"), Utc::now()).unwrap();
        let event = sub.rx.try_recv().unwrap();
        assert!(matches!(event, SystemEvent::SessionStarted { .. }));
    }
}
