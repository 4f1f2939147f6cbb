// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for `missions` / `mission_executions`.

use crate::db::Store;
use crate::error::{Result, StorageError};
use chrono::{DateTime, Utc};
use orch_core::{
    Mission, MissionExecution, MissionExecutionId, MissionExecutionStatus, MissionId,
    MissionSchedule, MissionSource, PromptSource, Role, ScheduleTime, SessionId,
};
use rusqlite::{params, Row};
use std::path::PathBuf;

fn row_to_mission(row: &Row<'_>) -> rusqlite::Result<Mission> {
    let source: String = row.get("source")?;
    let prompt_kind: String = row.get("prompt_kind")?;
    let prompt_value: String = row.get("prompt_value")?;
    let schedule_kind: String = row.get("schedule_kind")?;
    let schedule_value: Option<String> = row.get("schedule_value")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Mission {
        id: MissionId::new(row.get::<_, String>("id")?),
        slug: row.get("slug")?,
        name: row.get("name")?,
        source: parse_source(&source),
        target_role: Role::new(row.get::<_, String>("target_role")?),
        prompt: if prompt_kind == "file" {
            PromptSource::File(PathBuf::from(prompt_value))
        } else {
            PromptSource::Inline(prompt_value)
        },
        schedule: match schedule_kind.as_str() {
            "time" => MissionSchedule::Time(
                schedule_value
                    .and_then(|v| v.parse::<ScheduleTime>().ok())
                    .unwrap_or(ScheduleTime { hour: 0, minute: 0 }),
            ),
            "cron" => MissionSchedule::Cron(schedule_value.unwrap_or_default()),
            _ => MissionSchedule::None,
        },
        timeout_minutes: row.get::<_, i64>("timeout_minutes")? as u32,
        enabled: row.get::<_, i64>("enabled")? != 0,
        created_at: parse_dt(&created_at),
        updated_at: parse_dt(&updated_at),
    })
}

fn parse_source(s: &str) -> MissionSource {
    match s {
        "core_protected" => MissionSource::CoreProtected,
        "custom_app" => MissionSource::CustomApp,
        "user" => MissionSource::User,
        _ => MissionSource::CoreDefault,
    }
}

fn row_to_execution(row: &Row<'_>) -> rusqlite::Result<MissionExecution> {
    let queued_at: String = row.get("queued_at")?;
    let started_at: Option<String> = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let status: String = row.get("status")?;
    Ok(MissionExecution {
        id: MissionExecutionId::new(row.get::<_, String>("id")?),
        mission_id: MissionId::new(row.get::<_, String>("mission_id")?),
        session_id: row.get::<_, Option<String>>("session_id")?.map(SessionId::new),
        status: parse_exec_status(&status),
        queued_at: parse_dt(&queued_at),
        started_at: started_at.as_deref().map(parse_dt),
        ended_at: ended_at.as_deref().map(parse_dt),
        output_summary: row.get("output_summary")?,
        error_message: row.get("error_message")?,
        duration_seconds: row.get("duration_seconds")?,
    })
}

fn parse_exec_status(s: &str) -> MissionExecutionStatus {
    match s {
        "running" => MissionExecutionStatus::Running,
        "complete" => MissionExecutionStatus::Complete,
        "failed" => MissionExecutionStatus::Failed,
        "timed_out" => MissionExecutionStatus::TimedOut,
        _ => MissionExecutionStatus::Queued,
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

pub struct MissionRepo<'a> {
    store: &'a Store,
}

impl<'a> MissionRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn upsert(&self, mission: &Mission) -> Result<()> {
        mission.validate()?;
        let (prompt_kind, prompt_value) = match &mission.prompt {
            PromptSource::File(p) => ("file", p.display().to_string()),
            PromptSource::Inline(s) => ("inline", s.clone()),
        };
        let (schedule_kind, schedule_value): (&str, Option<String>) = match &mission.schedule {
            MissionSchedule::Time(t) => ("time", Some(t.to_string())),
            MissionSchedule::Cron(c) => ("cron", Some(c.clone())),
            MissionSchedule::None => ("none", None),
        };
        let source_str = match mission.source {
            MissionSource::CoreProtected => "core_protected",
            MissionSource::CoreDefault => "core_default",
            MissionSource::CustomApp => "custom_app",
            MissionSource::User => "user",
        };

        self.store.execute(
            "INSERT INTO missions (
                id, slug, name, source, target_role, prompt_kind, prompt_value,
                schedule_kind, schedule_value, timeout_minutes, enabled, next_run, last_run,
                last_status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL, NULL, NULL, ?12, ?12)
             ON CONFLICT(slug) DO UPDATE SET
                name = ?3, target_role = ?5, prompt_kind = ?6, prompt_value = ?7,
                schedule_kind = ?8, schedule_value = ?9, timeout_minutes = ?10,
                enabled = CASE WHEN (SELECT source FROM missions WHERE slug = ?2) = 'core_protected' THEN 1 ELSE ?11 END,
                updated_at = ?12",
            params![
                mission.id.as_str(),
                mission.slug,
                mission.name,
                source_str,
                mission.target_role.as_str(),
                prompt_kind,
                prompt_value,
                schedule_kind,
                schedule_value,
                mission.timeout_minutes,
                mission.enabled as i64,
                fmt_dt(&mission.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Deletes a mission, refusing when it is `core_protected`.
    pub fn delete(&self, slug: &str) -> Result<()> {
        let mission = self.get_by_slug(slug)?.ok_or(StorageError::NotFound)?;
        if mission.source.is_protected() {
            return Err(StorageError::InvalidRow(format!(
                "mission '{slug}' is core_protected and cannot be deleted"
            )));
        }
        self.store.execute("DELETE FROM missions WHERE slug = ?1", params![slug])?;
        Ok(())
    }

    pub fn get(&self, id: &MissionId) -> Result<Option<Mission>> {
        self.store
            .fetch_one("SELECT * FROM missions WHERE id = ?1", params![id.as_str()], row_to_mission)
    }

    pub fn get_by_slug(&self, slug: &str) -> Result<Option<Mission>> {
        self.store
            .fetch_one("SELECT * FROM missions WHERE slug = ?1", params![slug], row_to_mission)
    }

    pub fn list_enabled(&self) -> Result<Vec<Mission>> {
        self.store
            .fetch_all("SELECT * FROM missions WHERE enabled = 1 ORDER BY slug", [], row_to_mission)
    }

    pub fn list_all(&self) -> Result<Vec<Mission>> {
        self.store.fetch_all("SELECT * FROM missions ORDER BY slug", [], row_to_mission)
    }

    pub fn record_run(&self, slug: &str, status: &str, now: DateTime<Utc>) -> Result<()> {
        self.store.execute(
            "UPDATE missions SET last_run = ?2, last_status = ?3, updated_at = ?2 WHERE slug = ?1",
            params![slug, fmt_dt(&now), status],
        )?;
        Ok(())
    }

    /// `last_run` isn't part of the [`Mission`] domain type (it's
    /// execution history, not definition), so the self-healing mission
    /// scheduler reads it back directly rather than through
    /// [`Self::get_by_slug`].
    pub fn last_run(&self, slug: &str) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<Option<String>> =
            self.store
                .fetch_one("SELECT last_run FROM missions WHERE slug = ?1", params![slug], |row| row.get(0))?;
        Ok(raw.flatten().as_deref().map(parse_dt))
    }

    pub fn create_execution(&self, mission_id: &MissionId, now: DateTime<Utc>) -> Result<MissionExecution> {
        let id = MissionExecutionId::new(orch_core::new_short_id());
        self.store.execute(
            "INSERT INTO mission_executions (id, mission_id, session_id, status, queued_at, started_at, ended_at, output_summary, error_message, duration_seconds)
             VALUES (?1, ?2, NULL, 'running', ?3, ?3, NULL, NULL, NULL, NULL)",
            params![id.as_str(), mission_id.as_str(), fmt_dt(&now)],
        )?;
        self.get_execution(&id)?.ok_or(StorageError::NotFound)
    }

    pub fn attach_session(&self, execution_id: &MissionExecutionId, session_id: &SessionId) -> Result<()> {
        self.store.execute(
            "UPDATE mission_executions SET session_id = ?2 WHERE id = ?1",
            params![execution_id.as_str(), session_id.as_str()],
        )?;
        Ok(())
    }

    pub fn complete_execution(
        &self,
        execution_id: &MissionExecutionId,
        status: MissionExecutionStatus,
        output_summary: Option<&str>,
        error_message: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.store.transaction(|tx| {
            let queued_at: String = tx.query_row(
                "SELECT queued_at FROM mission_executions WHERE id = ?1",
                params![execution_id.as_str()],
                |row| row.get(0),
            )?;
            let duration = parse_dt(&queued_at)
                .signed_duration_since(now)
                .num_milliseconds()
                .unsigned_abs() as f64
                / 1000.0;

            tx.execute(
                "UPDATE mission_executions SET status = ?2, ended_at = ?3, output_summary = ?4, error_message = ?5, duration_seconds = ?6
                 WHERE id = ?1",
                params![
                    execution_id.as_str(),
                    status.as_str(),
                    fmt_dt(&now),
                    output_summary,
                    error_message,
                    duration,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_execution(&self, id: &MissionExecutionId) -> Result<Option<MissionExecution>> {
        self.store
            .fetch_one("SELECT * FROM mission_executions WHERE id = ?1", params![id.as_str()], row_to_execution)
    }

    pub fn list_executions(&self, mission_id: &MissionId, limit: u32) -> Result<Vec<MissionExecution>> {
        self.store.fetch_all(
            "SELECT * FROM mission_executions WHERE mission_id = ?1 ORDER BY queued_at DESC LIMIT ?2",
            params![mission_id.as_str(), limit],
            row_to_execution,
        )
    }

    pub fn count_running(&self) -> Result<u32> {
        Ok(self
            .store
            .fetch_one(
                "SELECT COUNT(*) FROM mission_executions WHERE status = 'running'",
                [],
                |row| row.get::<_, i64>(0),
            )?
            .unwrap_or(0) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mission(slug: &str, source: MissionSource) -> Mission {
        Mission {
            id: MissionId::new(orch_core::new_short_id()),
            slug: slug.into(),
            name: "Nightly Audit".into(),
            source,
            target_role: Role::new("auditor"),
            prompt: PromptSource::File(PathBuf::from("missions/nightly-audit.md")),
            schedule: MissionSchedule::None,
            timeout_minutes: 30,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn core_protected_missions_cannot_be_deleted() {
        let store = Store::open_in_memory().unwrap();
        let repo = MissionRepo::new(&store);
        repo.upsert(&mission("core-audit", MissionSource::CoreProtected)).unwrap();
        assert!(repo.delete("core-audit").is_err());
    }

    #[test]
    fn user_missions_can_be_deleted() {
        let store = Store::open_in_memory().unwrap();
        let repo = MissionRepo::new(&store);
        repo.upsert(&mission("my-audit", MissionSource::User)).unwrap();
        assert!(repo.delete("my-audit").is_ok());
        assert!(repo.get_by_slug("my-audit").unwrap().is_none());
    }

    #[test]
    fn execution_lifecycle_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let repo = MissionRepo::new(&store);
        let m = mission("nightly-audit", MissionSource::CoreDefault);
        repo.upsert(&m).unwrap();
        let now = Utc::now();
        let exec = repo.create_execution(&m.id, now).unwrap();
        assert_eq!(exec.status, MissionExecutionStatus::Running);

        repo.complete_execution(&exec.id, MissionExecutionStatus::Complete, Some("done"), None, now)
            .unwrap();
        let exec = repo.get_execution(&exec.id).unwrap().unwrap();
        assert_eq!(exec.status, MissionExecutionStatus::Complete);
    }
}
