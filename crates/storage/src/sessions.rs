// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for the `sessions` table. This module is intentionally dumb:
//! it maps rows to [`Session`] structs and back, and enforces no lifecycle
//! policy of its own -- that's the Session Registry's job (`orch-engine`),
//! which is documented as the sole mutator of this table.

use crate::db::Store;
use crate::error::{Result, StorageError};
use chrono::{DateTime, Utc};
use orch_core::{ConversationId, Mode, Role, Session, SessionId, SessionState};
use rusqlite::{params, Row};
use std::path::PathBuf;
use std::str::FromStr;

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let started_at: String = row.get("started_at")?;
    let last_seen_at: String = row.get("last_seen_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let mode: String = row.get("mode")?;
    let state: String = row.get("current_state")?;
    let cwd: String = row.get("cwd")?;

    Ok(Session {
        id: SessionId::new(row.get::<_, String>("id")?),
        transcript_uuid: row.get("transcript_uuid")?,
        pane: row.get("pane")?,
        conversation_id: ConversationId::new(row.get::<_, String>("conversation_id")?),
        parent_session_id: row
            .get::<_, Option<String>>("parent_session_id")?
            .map(SessionId::new),
        mission_execution_id: row
            .get::<_, Option<String>>("mission_execution_id")?
            .map(orch_core::MissionExecutionId::new),
        role: Role::new(row.get::<_, String>("role")?),
        mode: Mode::from_str(&mode).unwrap_or(Mode::Interactive),
        current_state: SessionState::from_str(&state).unwrap_or(SessionState::Idle),
        context_warning_level: row.get::<_, i64>("context_warning_level")? as u8,
        subscribed_by: row
            .get::<_, Option<String>>("subscribed_by")?
            .map(SessionId::new),
        has_pinged: row.get::<_, i64>("has_pinged")? != 0,
        transcript_path: row
            .get::<_, Option<String>>("transcript_path")?
            .map(PathBuf::from),
        cwd: PathBuf::from(cwd),
        description: row.get("description")?,
        spec_path: row
            .get::<_, Option<String>>("spec_path")?
            .map(PathBuf::from),
        status_text: row.get("status_text")?,
        started_at: parse_dt(&started_at),
        last_seen_at: parse_dt(&last_seen_at),
        ended_at: ended_at.as_deref().map(parse_dt),
        end_reason: row.get("end_reason")?,
        created_at: parse_dt(&created_at),
        updated_at: parse_dt(&updated_at),
        total_cost_usd: row.get("total_cost_usd")?,
        total_tokens: row
            .get::<_, Option<i64>>("total_tokens")?
            .map(|v| v as u64),
    })
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn fmt_dt(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Everything the registry needs to upsert a session row. Kept separate
/// from [`Session`] because registration supplies only a subset of fields
/// and `register` must preserve the rest on a revive.
#[derive(Debug, Clone)]
pub struct RegisterSession {
    pub id: SessionId,
    pub role: Role,
    pub mode: Mode,
    pub pane: Option<String>,
    pub transcript_path: Option<PathBuf>,
    pub conversation_id: ConversationId,
    pub parent_session_id: Option<SessionId>,
    pub mission_execution_id: Option<orch_core::MissionExecutionId>,
    pub cwd: PathBuf,
    pub description: Option<String>,
    pub spec_path: Option<PathBuf>,
}

pub struct SessionRepo<'a> {
    store: &'a Store,
}

impl<'a> SessionRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Upsert. On conflict (existing row with this id), the row is revived:
    /// `ended_at`/`end_reason` cleared, `current_state` reset to `idle`,
    /// and provenance refreshed, while keeping any taxonomy fields not
    /// freshly supplied.
    pub fn register(&self, req: &RegisterSession, now: DateTime<Utc>) -> Result<Session> {
        self.store.transaction(|tx| {
            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM sessions WHERE id = ?1",
                    params![req.id.as_str()],
                    |row| row.get(0),
                )
                .ok();

            if existing.is_some() {
                tx.execute(
                    "UPDATE sessions SET
                        pane = ?2, transcript_path = ?3, conversation_id = ?4,
                        parent_session_id = ?5, mission_execution_id = ?6,
                        role = ?7, mode = ?8, cwd = ?9, description = ?10, spec_path = ?11,
                        current_state = 'idle', ended_at = NULL, end_reason = NULL,
                        last_seen_at = ?12, updated_at = ?12
                     WHERE id = ?1",
                    params![
                        req.id.as_str(),
                        req.pane,
                        req.transcript_path.as_ref().map(|p| p.display().to_string()),
                        req.conversation_id.as_str(),
                        req.parent_session_id.as_ref().map(|s| s.as_str()),
                        req.mission_execution_id.as_ref().map(|s| s.as_str()),
                        req.role.as_str(),
                        req.mode.as_str(),
                        req.cwd.display().to_string(),
                        req.description,
                        req.spec_path.as_ref().map(|p| p.display().to_string()),
                        fmt_dt(&now),
                    ],
                )?;
            } else {
                tx.execute(
                    "INSERT INTO sessions (
                        id, transcript_uuid, pane, conversation_id, parent_session_id,
                        mission_execution_id, role, mode, current_state, context_warning_level,
                        subscribed_by, has_pinged, transcript_path, cwd, description, spec_path,
                        status_text, started_at, last_seen_at, ended_at, end_reason,
                        created_at, updated_at, total_cost_usd, total_tokens
                    ) VALUES (
                        ?1, NULL, ?2, ?3, ?4, ?5, ?6, ?7, 'idle', 0,
                        NULL, 0, ?8, ?9, ?10, ?11,
                        NULL, ?12, ?12, NULL, NULL,
                        ?12, ?12, NULL, NULL
                    )",
                    params![
                        req.id.as_str(),
                        req.pane,
                        req.conversation_id.as_str(),
                        req.parent_session_id.as_ref().map(|s| s.as_str()),
                        req.mission_execution_id.as_ref().map(|s| s.as_str()),
                        req.role.as_str(),
                        req.mode.as_str(),
                        req.transcript_path.as_ref().map(|p| p.display().to_string()),
                        req.cwd.display().to_string(),
                        req.description,
                        req.spec_path.as_ref().map(|p| p.display().to_string()),
                        fmt_dt(&now),
                    ],
                )?;
            }

            tx.query_row(
                "SELECT * FROM sessions WHERE id = ?1",
                params![req.id.as_str()],
                row_to_session,
            )
            .map_err(StorageError::from)
        })
    }

    /// End any prior live session claiming `pane` with `end_reason =
    /// pane_reused`. Must run before `register` assigns the pane to a new
    /// session id.
    pub fn reconcile_pane(&self, pane: &str, now: DateTime<Utc>) -> Result<()> {
        self.store.execute(
            "UPDATE sessions SET current_state = 'ended', ended_at = ?2, end_reason = 'pane_reused', updated_at = ?2
             WHERE pane = ?1 AND ended_at IS NULL",
            params![pane, fmt_dt(&now)],
        )?;
        Ok(())
    }

    pub fn mark_idle(&self, id: &SessionId, now: DateTime<Utc>) -> Result<()> {
        self.store.execute(
            "UPDATE sessions SET current_state = 'idle', last_seen_at = ?2, updated_at = ?2 WHERE id = ?1",
            params![id.as_str(), fmt_dt(&now)],
        )?;
        Ok(())
    }

    pub fn mark_active(&self, id: &SessionId, now: DateTime<Utc>) -> Result<()> {
        self.store.execute(
            "UPDATE sessions SET current_state = 'active', last_seen_at = ?2, updated_at = ?2 WHERE id = ?1",
            params![id.as_str(), fmt_dt(&now)],
        )?;
        Ok(())
    }

    pub fn set_status_text(&self, id: &SessionId, text: &str, now: DateTime<Utc>) -> Result<()> {
        self.store.execute(
            "UPDATE sessions SET status_text = ?2, last_seen_at = ?3, updated_at = ?3 WHERE id = ?1",
            params![id.as_str(), text, fmt_dt(&now)],
        )?;
        Ok(())
    }

    pub fn set_context_warning_level(&self, id: &SessionId, level: u8, now: DateTime<Utc>) -> Result<()> {
        self.store.execute(
            "UPDATE sessions SET context_warning_level = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.as_str(), level as i64, fmt_dt(&now)],
        )?;
        Ok(())
    }

    pub fn set_subscribed_by(&self, specialist: &SessionId, chief: &SessionId, now: DateTime<Utc>) -> Result<()> {
        self.store.execute(
            "UPDATE sessions SET subscribed_by = ?2, updated_at = ?3 WHERE id = ?1",
            params![specialist.as_str(), chief.as_str(), fmt_dt(&now)],
        )?;
        Ok(())
    }

    pub fn mark_pinged(&self, id: &SessionId, now: DateTime<Utc>) -> Result<()> {
        self.store.execute(
            "UPDATE sessions SET has_pinged = 1, updated_at = ?2 WHERE id = ?1",
            params![id.as_str(), fmt_dt(&now)],
        )?;
        Ok(())
    }

    pub fn set_usage(&self, id: &SessionId, cost_usd: Option<f64>, tokens: Option<u64>, now: DateTime<Utc>) -> Result<()> {
        self.store.execute(
            "UPDATE sessions SET total_cost_usd = ?2, total_tokens = ?3, updated_at = ?4 WHERE id = ?1",
            params![id.as_str(), cost_usd, tokens.map(|t| t as i64), fmt_dt(&now)],
        )?;
        Ok(())
    }

    pub fn end(&self, id: &SessionId, reason: &str, now: DateTime<Utc>) -> Result<()> {
        self.store.execute(
            "UPDATE sessions SET current_state = 'ended', ended_at = ?2, end_reason = ?3, updated_at = ?2
             WHERE id = ?1 AND ended_at IS NULL",
            params![id.as_str(), fmt_dt(&now), reason],
        )?;
        Ok(())
    }

    pub fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        self.store
            .fetch_one("SELECT * FROM sessions WHERE id = ?1", params![id.as_str()], row_to_session)
    }

    pub fn get_by_pane(&self, pane: &str) -> Result<Option<Session>> {
        self.store.fetch_one(
            "SELECT * FROM sessions WHERE pane = ?1 AND ended_at IS NULL ORDER BY started_at DESC LIMIT 1",
            params![pane],
            row_to_session,
        )
    }

    pub fn get_live_by_conversation_id(&self, conversation_id: &str) -> Result<Option<Session>> {
        self.store.fetch_one(
            "SELECT * FROM sessions WHERE conversation_id = ?1 AND ended_at IS NULL ORDER BY started_at DESC LIMIT 1",
            params![conversation_id],
            row_to_session,
        )
    }

    pub fn get_live_chief(&self) -> Result<Option<Session>> {
        self.store.fetch_one(
            "SELECT * FROM sessions WHERE conversation_id = 'chief' AND ended_at IS NULL LIMIT 1",
            [],
            row_to_session,
        )
    }

    pub fn list_live(&self) -> Result<Vec<Session>> {
        self.store
            .fetch_all("SELECT * FROM sessions WHERE ended_at IS NULL ORDER BY started_at", [], row_to_session)
    }

    pub fn list_all(&self, limit: u32) -> Result<Vec<Session>> {
        self.store.fetch_all(
            "SELECT * FROM sessions ORDER BY started_at DESC LIMIT ?1",
            params![limit],
            row_to_session,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(id: &str, pane: &str, conv: &str) -> RegisterSession {
        RegisterSession {
            id: SessionId::new(id),
            role: Role::new("chief"),
            mode: Mode::Interactive,
            pane: Some(pane.to_string()),
            transcript_path: None,
            conversation_id: ConversationId::new(conv),
            parent_session_id: None,
            mission_execution_id: None,
            cwd: PathBuf::from("/home/user/repo"),
            description: None,
            spec_path: None,
        }
    }

    #[test]
    fn register_then_reregister_does_not_duplicate() {
        let store = Store::open_in_memory().unwrap();
        let repo = SessionRepo::new(&store);
        let now = Utc::now();
        repo.register(&req("abc12345", "%1", "chief"), now).unwrap();
        repo.register(&req("abc12345", "%1", "chief"), now + chrono::Duration::seconds(5))
            .unwrap();
        assert_eq!(repo.list_all(10).unwrap().len(), 1);
    }

    #[test]
    fn register_revives_ended_session() {
        let store = Store::open_in_memory().unwrap();
        let repo = SessionRepo::new(&store);
        let now = Utc::now();
        repo.register(&req("abc12345", "%1", "chief"), now).unwrap();
        repo.end(&SessionId::new("abc12345"), "handoff", now).unwrap();
        let revived = repo
            .register(&req("abc12345", "%1", "chief"), now + chrono::Duration::seconds(5))
            .unwrap();
        assert!(revived.is_live());
        assert!(revived.end_reason.is_none());
    }

    #[test]
    fn reconcile_pane_ends_prior_claimant() {
        let store = Store::open_in_memory().unwrap();
        let repo = SessionRepo::new(&store);
        let now = Utc::now();
        repo.register(&req("mno11111", "%2", "conv-x"), now).unwrap();
        repo.reconcile_pane("%2", now + chrono::Duration::seconds(1)).unwrap();
        repo.register(&req("pqr22222", "%2", "conv-y"), now + chrono::Duration::seconds(1))
            .unwrap();

        let old = repo.get(&SessionId::new("mno11111")).unwrap().unwrap();
        assert_eq!(old.end_reason.as_deref(), Some("pane_reused"));
        let live = repo.get_by_pane("%2").unwrap().unwrap();
        assert_eq!(live.id, SessionId::new("pqr22222"));
    }

    #[test]
    fn get_live_by_conversation_id_finds_the_live_row() {
        let store = Store::open_in_memory().unwrap();
        let repo = SessionRepo::new(&store);
        let now = Utc::now();
        repo.register(&req("spec0001", "%5", "conv-x"), now).unwrap();
        let found = repo.get_live_by_conversation_id("conv-x").unwrap().unwrap();
        assert_eq!(found.id, SessionId::new("spec0001"));
        assert!(repo.get_live_by_conversation_id("conv-none").unwrap().is_none());
    }

    #[test]
    fn at_most_one_live_session_per_pane() {
        let store = Store::open_in_memory().unwrap();
        let repo = SessionRepo::new(&store);
        let now = Utc::now();
        repo.register(&req("s1", "%3", "conv-a"), now).unwrap();
        repo.reconcile_pane("%3", now).unwrap();
        repo.register(&req("s2", "%3", "conv-b"), now).unwrap();

        let live = repo.list_live().unwrap();
        let claiming_pane3 = live.iter().filter(|s| s.pane.as_deref() == Some("%3")).count();
        assert_eq!(claiming_pane3, 1);
    }
}
