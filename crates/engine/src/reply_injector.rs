// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Reply Auto-Injector: watches a specialist's `reply.txt` and
//! pushes new entries into the subscribing Chief's pane, in strictly
//! ascending order, at most once per position.
//!
//! Grounded on the `reply.txt` signal handling in
//! `original_source/.engine/src/workers/watcher.py`.

use crate::error::ReplyInjectorError;
use crate::registry::SessionRegistry;
use orch_adapters::TmuxDriver;
use orch_core::{Clock, ReplyInjection, SystemEvent};
use orch_storage::ReplyInjectionRepo;
use std::path::Path;
use std::time::Duration;

const NOTIFICATION_SOURCE: &str = "CLAUDE OS SYS: NOTIFICATION";
const INJECT_DELAY: Duration = Duration::from_millis(200);

pub struct ReplyInjector<T> {
    store: orch_storage::Store,
    registry: SessionRegistry,
    bus: orch_core::EventBus,
    tmux: T,
    clock: std::sync::Arc<dyn Clock>,
}

impl<T> ReplyInjector<T>
where
    T: TmuxDriver,
{
    pub fn new(store: orch_storage::Store, registry: SessionRegistry, bus: orch_core::EventBus, tmux: T, clock: std::sync::Arc<dyn Clock>) -> Self {
        Self {
            store,
            registry,
            bus,
            tmux,
            clock,
        }
    }

    /// Handles one `conversations/<conversation_id>/reply.txt` change.
    /// Returns the number of entries injected this call.
    pub async fn handle_change(&self, conversation_id: &str, reply_path: &Path) -> Result<u32, ReplyInjectorError> {
        let Some(specialist) = self.registry.get_live_by_conversation_id(conversation_id)? else {
            return Ok(0);
        };
        let Some(chief_id) = &specialist.subscribed_by else {
            return Ok(0);
        };
        let Some(chief) = self.registry.get(chief_id)? else {
            return Ok(0);
        };
        let Some(chief_pane) = &chief.pane else {
            return Ok(0);
        };

        let contents = tokio::fs::read_to_string(reply_path).await?;
        let entries = split_entries(&contents);

        let repo = ReplyInjectionRepo::new(&self.store);
        let already = repo.max_position(&specialist.id)?.unwrap_or(0);

        let mut injected_count = 0;
        for (position, entry) in entries.iter().enumerate() {
            let position = (position + 1) as u64;
            if position <= already {
                continue;
            }

            let line = format!(
                "[{NOTIFICATION_SOURCE}]: Reply from {} ({}): {}",
                specialist.role,
                short_id(&specialist.id),
                entry
            );
            let ok = self.tmux.inject_message(chief_pane, &line, true, INJECT_DELAY, None).await;
            if !ok {
                // don't record; the next signal on this file will retry
                // from this same position.
                break;
            }

            repo.record(&ReplyInjection {
                specialist_session_id: specialist.id.clone(),
                chief_session_id: chief.id.clone(),
                message_position: position,
                injected_at: self.clock.now(),
            })?;
            self.bus.publish(SystemEvent::ReplyInjected {
                specialist_session_id: specialist.id.clone(),
                chief_session_id: chief.id.clone(),
            });
            injected_count += 1;
        }

        Ok(injected_count)
    }
}

fn short_id(id: &orch_core::SessionId) -> String {
    id.as_str().chars().take(8).collect()
}

/// Splits on blank-line separators, trimming surrounding whitespace and
/// discarding empty leading/trailing entries.
fn split_entries(contents: &str) -> Vec<String> {
    contents
        .split("\n\n")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_adapters::FakeTmuxDriver;
    use orch_core::{ConversationId, FakeClock, Mode, Role, SessionId};
    use orch_storage::Store;
    use std::sync::Arc;

    fn setup() -> (ReplyInjector<FakeTmuxDriver>, SessionRegistry, FakeTmuxDriver, Store) {
        let store = Store::open_in_memory().unwrap();
        let bus = orch_core::EventBus::new();
        let registry = SessionRegistry::new(store.clone(), bus.clone());
        let tmux = FakeTmuxDriver::new();
        let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
        let injector = ReplyInjector::new(store.clone(), registry.clone(), bus, tmux.clone(), clock);
        (injector, registry, tmux, store)
    }

    fn register_chief(registry: &SessionRegistry, id: &str, pane: &str) {
        registry
            .register(
                crate::registry::RegisterRequest {
                    id: SessionId::new(id),
                    role: Role::new("chief"),
                    mode: Mode::Interactive,
                    pane: Some(pane.to_string()),
                    transcript_path: None,
                    conversation_id: Some(ConversationId::chief()),
                    parent_session_id: None,
                    mission_execution_id: None,
                    cwd: std::path::PathBuf::from("/home/user/repo"),
                    description: None,
                    spec_path: None,
                },
                chrono::Utc::now(),
            )
            .unwrap();
    }

    #[tokio::test]
    async fn three_new_entries_inject_in_order() {
        let (injector, registry, tmux, store) = setup();
        register_chief(&registry, "jkl98765", "%0");
        registry
            .register(
                crate::registry::RegisterRequest {
                    id: SessionId::new("ghi54321"),
                    role: Role::new("builder"),
                    mode: Mode::Background,
                    pane: None,
                    transcript_path: None,
                    conversation_id: Some(ConversationId::new("conv-x")),
                    parent_session_id: None,
                    mission_execution_id: None,
                    cwd: std::path::PathBuf::from("/home/user/repo"),
                    description: None,
                    spec_path: None,
                },
                chrono::Utc::now(),
            )
            .unwrap();
        orch_storage::SessionRepo::new(&store)
            .set_subscribed_by(&SessionId::new("ghi54321"), &SessionId::new("jkl98765"), chrono::Utc::now())
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reply.txt");
        std::fs::write(&path, "first entry\n\nsecond entry\n\nthird entry").unwrap();

        let injected = injector.handle_change("conv-x", &path).await.unwrap();
        assert_eq!(injected, 3);

        let calls = tmux.calls();
        assert_eq!(calls.len(), 3);

        let repo = ReplyInjectionRepo::new(&store);
        assert_eq!(repo.max_position(&SessionId::new("ghi54321")).unwrap(), Some(3));

        // re-touching with identical content injects nothing new.
        let injected_again = injector.handle_change("conv-x", &path).await.unwrap();
        assert_eq!(injected_again, 0);
        assert_eq!(tmux.calls().len(), 3);
    }

    #[tokio::test]
    async fn no_specialist_for_conversation_is_a_no_op() {
        let (injector, _registry, tmux, _store) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reply.txt");
        std::fs::write(&path, "hello").unwrap();

        let injected = injector.handle_change("conv-unknown", &path).await.unwrap();
        assert_eq!(injected, 0);
        assert!(tmux.calls().is_empty());
    }
}
