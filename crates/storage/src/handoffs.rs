// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for the `handoffs` table. The Handoff Pipeline (`orch-engine`)
//! is the sole mutator; this module only maps rows.

use crate::db::Store;
use crate::error::{Result, StorageError};
use chrono::{DateTime, Utc};
use orch_core::{
    ConversationId, Handoff, HandoffContent, HandoffId, HandoffReason, HandoffStatus,
    MissionExecutionId, Mode, Role, SessionId,
};
use rusqlite::{params, Row};
use std::path::PathBuf;
use std::str::FromStr;

fn row_to_handoff(row: &Row<'_>) -> rusqlite::Result<Handoff> {
    let requested_at: String = row.get("requested_at")?;
    let executed_at: Option<String> = row.get("executed_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    let reason: String = row.get("reason")?;
    let status: String = row.get("status")?;
    let mode: String = row.get("mode")?;
    let content_kind: String = row.get("content_kind")?;
    let content_value: String = row.get("content_value")?;

    Ok(Handoff {
        id: HandoffId::new(row.get::<_, String>("id")?),
        old_session_id: SessionId::new(row.get::<_, String>("old_session_id")?),
        role: Role::new(row.get::<_, String>("role")?),
        mode: Mode::from_str(&mode).unwrap_or(Mode::Interactive),
        tmux_pane: row.get("tmux_pane")?,
        conversation_id: ConversationId::new(row.get::<_, String>("conversation_id")?),
        parent_session_id: row
            .get::<_, Option<String>>("parent_session_id")?
            .map(SessionId::new),
        mission_execution_id: row
            .get::<_, Option<String>>("mission_execution_id")?
            .map(MissionExecutionId::new),
        reason: parse_reason(&reason),
        content: if content_kind == "file" {
            HandoffContent::File(PathBuf::from(content_value))
        } else {
            HandoffContent::Inline(content_value)
        },
        status: HandoffStatus::from_str(&status).unwrap_or(HandoffStatus::Pending),
        requested_at: parse_dt(&requested_at),
        executed_at: executed_at.as_deref().map(parse_dt),
        completed_at: completed_at.as_deref().map(parse_dt),
        new_session_id: row
            .get::<_, Option<String>>("new_session_id")?
            .map(SessionId::new),
        error: row.get("error")?,
    })
}

fn parse_reason(s: &str) -> HandoffReason {
    match s {
        "context_low" => HandoffReason::ContextLow,
        "emergency_context_full" => HandoffReason::EmergencyContextFull,
        _ => HandoffReason::PaneReused,
    }
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn fmt_dt(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub struct NewHandoff {
    pub id: HandoffId,
    pub old_session_id: SessionId,
    pub role: Role,
    pub mode: Mode,
    pub tmux_pane: Option<String>,
    pub conversation_id: ConversationId,
    pub parent_session_id: Option<SessionId>,
    pub mission_execution_id: Option<MissionExecutionId>,
    pub reason: HandoffReason,
    pub content: HandoffContent,
}

pub struct HandoffRepo<'a> {
    store: &'a Store,
}

impl<'a> HandoffRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Insert a new `pending` handoff row. Fails if one is already
    /// pending/executing for this old session (spec.md §3 invariant: at
    /// most one handoff in {pending, executing} per old session).
    pub fn create(&self, new: &NewHandoff, now: DateTime<Utc>) -> Result<Handoff> {
        if self.pending_or_executing_for(&new.old_session_id)?.is_some() {
            return Err(StorageError::InvalidRow(format!(
                "a handoff is already pending or executing for session {}",
                new.old_session_id
            )));
        }
        let (content_kind, content_value) = match &new.content {
            HandoffContent::File(p) => ("file", p.display().to_string()),
            HandoffContent::Inline(s) => ("inline", s.clone()),
        };
        self.store.execute(
            "INSERT INTO handoffs (
                id, old_session_id, role, mode, tmux_pane, conversation_id, parent_session_id,
                mission_execution_id, reason, content_kind, content_value, status,
                requested_at, executed_at, completed_at, new_session_id, error
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 'pending', ?12, NULL, NULL, NULL, NULL)",
            params![
                new.id.as_str(),
                new.old_session_id.as_str(),
                new.role.as_str(),
                new.mode.as_str(),
                new.tmux_pane,
                new.conversation_id.as_str(),
                new.parent_session_id.as_ref().map(|s| s.as_str()),
                new.mission_execution_id.as_ref().map(|s| s.as_str()),
                new.reason.as_str(),
                content_kind,
                content_value,
                fmt_dt(&now),
            ],
        )?;
        self.get(&new.id)?.ok_or(StorageError::NotFound)
    }

    pub fn pending_or_executing_for(&self, old_session_id: &SessionId) -> Result<Option<Handoff>> {
        self.store.fetch_one(
            "SELECT * FROM handoffs WHERE old_session_id = ?1 AND status IN ('pending', 'executing')
             ORDER BY requested_at DESC LIMIT 1",
            params![old_session_id.as_str()],
            row_to_handoff,
        )
    }

    pub fn mark_executing(&self, id: &HandoffId, now: DateTime<Utc>) -> Result<()> {
        self.store.execute(
            "UPDATE handoffs SET status = 'executing', executed_at = ?2 WHERE id = ?1 AND status = 'pending'",
            params![id.as_str(), fmt_dt(&now)],
        )?;
        Ok(())
    }

    pub fn mark_complete(&self, id: &HandoffId, new_session_id: &SessionId, now: DateTime<Utc>) -> Result<()> {
        self.store.execute(
            "UPDATE handoffs SET status = 'complete', completed_at = ?2, new_session_id = ?3
             WHERE id = ?1 AND status = 'executing'",
            params![id.as_str(), fmt_dt(&now), new_session_id.as_str()],
        )?;
        Ok(())
    }

    pub fn mark_failed(&self, id: &HandoffId, error: &str, now: DateTime<Utc>) -> Result<()> {
        self.store.execute(
            "UPDATE handoffs SET status = 'failed', completed_at = ?2, error = ?3
             WHERE id = ?1 AND status = 'executing'",
            params![id.as_str(), fmt_dt(&now), error],
        )?;
        Ok(())
    }

    pub fn get(&self, id: &HandoffId) -> Result<Option<Handoff>> {
        self.store
            .fetch_one("SELECT * FROM handoffs WHERE id = ?1", params![id.as_str()], row_to_handoff)
    }

    pub fn list(&self, limit: u32) -> Result<Vec<Handoff>> {
        self.store
            .fetch_all("SELECT * FROM handoffs ORDER BY requested_at DESC LIMIT ?1", params![limit], row_to_handoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_handoff(old: &str) -> NewHandoff {
        NewHandoff {
            id: HandoffId::new(orch_core::new_short_id()),
            old_session_id: SessionId::new(old),
            role: Role::new("chief"),
            mode: Mode::Interactive,
            tmux_pane: Some("%7".into()),
            conversation_id: ConversationId::chief(),
            parent_session_id: None,
            mission_execution_id: None,
            reason: HandoffReason::ContextLow,
            content: HandoffContent::File(PathBuf::from("Desktop/working/email-triage.md")),
        }
    }

    #[test]
    fn at_most_one_pending_handoff_per_session() {
        let store = Store::open_in_memory().unwrap();
        let repo = HandoffRepo::new(&store);
        let now = Utc::now();
        repo.create(&new_handoff("abc12345"), now).unwrap();
        assert!(repo.create(&new_handoff("abc12345"), now).is_err());
    }

    #[test]
    fn status_transitions_follow_monotone_path() {
        let store = Store::open_in_memory().unwrap();
        let repo = HandoffRepo::new(&store);
        let now = Utc::now();
        let h = repo.create(&new_handoff("abc12345"), now).unwrap();
        assert_eq!(h.status, HandoffStatus::Pending);

        repo.mark_executing(&h.id, now).unwrap();
        let h = repo.get(&h.id).unwrap().unwrap();
        assert_eq!(h.status, HandoffStatus::Executing);

        repo.mark_complete(&h.id, &SessionId::new("new99999"), now).unwrap();
        let h = repo.get(&h.id).unwrap().unwrap();
        assert_eq!(h.status, HandoffStatus::Complete);
        assert_eq!(h.new_session_id, Some(SessionId::new("new99999")));
    }

    #[test]
    fn a_new_handoff_can_be_created_after_the_old_one_completes() {
        let store = Store::open_in_memory().unwrap();
        let repo = HandoffRepo::new(&store);
        let now = Utc::now();
        let h = repo.create(&new_handoff("abc12345"), now).unwrap();
        repo.mark_executing(&h.id, now).unwrap();
        repo.mark_complete(&h.id, &SessionId::new("new99999"), now).unwrap();

        assert!(repo.create(&new_handoff("abc12345"), now).is_ok());
    }
}
