// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for `reply_injections`: the ledger the Reply Auto-Injector
//! consults to guarantee it never delivers a specialist's output out of
//! order and never delivers the same line twice.

use crate::db::Store;
use crate::error::Result;
use chrono::{DateTime, Utc};
use orch_core::{ReplyInjection, SessionId};
use rusqlite::{params, Row};

fn row_to_injection(row: &Row<'_>) -> rusqlite::Result<ReplyInjection> {
    let injected_at: String = row.get("injected_at")?;
    Ok(ReplyInjection {
        specialist_session_id: SessionId::new(row.get::<_, String>("specialist_session_id")?),
        chief_session_id: SessionId::new(row.get::<_, String>("chief_session_id")?),
        message_position: row.get::<_, i64>("message_position")? as u64,
        injected_at: parse_dt(&injected_at),
    })
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub struct ReplyInjectionRepo<'a> {
    store: &'a Store,
}

impl<'a> ReplyInjectionRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Highest `message_position` already injected for this specialist, or
    /// `None` if nothing has been injected yet. The Reply Auto-Injector only
    /// delivers a candidate whose position exceeds this.
    pub fn max_position(&self, specialist_session_id: &SessionId) -> Result<Option<u64>> {
        let max: Option<i64> = self.store.fetch_one(
            "SELECT MAX(message_position) FROM reply_injections WHERE specialist_session_id = ?1",
            params![specialist_session_id.as_str()],
            |row| row.get(0),
        )?.flatten();
        Ok(max.map(|v| v as u64))
    }

    /// Idempotent: re-inserting the same `(specialist, position)` pair is a
    /// silent no-op rather than an error, since the injector may retry
    /// after a crash before it has recorded success.
    pub fn record(&self, injection: &ReplyInjection) -> Result<()> {
        self.store.execute(
            "INSERT INTO reply_injections (specialist_session_id, chief_session_id, message_position, injected_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(specialist_session_id, message_position) DO NOTHING",
            params![
                injection.specialist_session_id.as_str(),
                injection.chief_session_id.as_str(),
                injection.message_position as i64,
                injection.injected_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_for_specialist(&self, specialist_session_id: &SessionId) -> Result<Vec<ReplyInjection>> {
        self.store.fetch_all(
            "SELECT * FROM reply_injections WHERE specialist_session_id = ?1 ORDER BY message_position",
            params![specialist_session_id.as_str()],
            row_to_injection,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn injection(specialist: &SessionId, chief: &SessionId, pos: u64) -> ReplyInjection {
        ReplyInjection {
            specialist_session_id: specialist.clone(),
            chief_session_id: chief.clone(),
            message_position: pos,
            injected_at: Utc::now(),
        }
    }

    #[test]
    fn max_position_tracks_highest_recorded() {
        let store = Store::open_in_memory().unwrap();
        let repo = ReplyInjectionRepo::new(&store);
        let specialist = SessionId::new("spec0001");
        let chief = SessionId::new("chief001");

        assert_eq!(repo.max_position(&specialist).unwrap(), None);
        repo.record(&injection(&specialist, &chief, 5)).unwrap();
        repo.record(&injection(&specialist, &chief, 7)).unwrap();
        assert_eq!(repo.max_position(&specialist).unwrap(), Some(7));
    }

    #[test]
    fn recording_the_same_position_twice_is_a_no_op() {
        let store = Store::open_in_memory().unwrap();
        let repo = ReplyInjectionRepo::new(&store);
        let specialist = SessionId::new("spec0001");
        let chief = SessionId::new("chief001");

        repo.record(&injection(&specialist, &chief, 5)).unwrap();
        repo.record(&injection(&specialist, &chief, 5)).unwrap();
        assert_eq!(repo.list_for_specialist(&specialist).unwrap().len(), 1);
    }
}
