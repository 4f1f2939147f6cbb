// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for `chief_duties` / `chief_duty_executions`.

use crate::db::Store;
use crate::error::Result;
use chrono::{DateTime, Utc};
use orch_core::{Duty, DutyExecution, ExecutionStatus, ScheduleTime, SessionId};
use rusqlite::{params, Row};
use std::path::PathBuf;

fn row_to_duty(row: &Row<'_>) -> rusqlite::Result<Duty> {
    let last_run: Option<String> = row.get("last_run")?;
    Ok(Duty {
        slug: row.get("slug")?,
        name: row.get("name")?,
        schedule_time: ScheduleTime::new(row.get::<_, i64>("schedule_hour")? as u32, row.get::<_, i64>("schedule_minute")? as u32)
            .unwrap_or(ScheduleTime { hour: 0, minute: 0 }),
        prompt_file: PathBuf::from(row.get::<_, String>("prompt_file")?),
        timeout_minutes: row.get::<_, i64>("timeout_minutes")? as u32,
        enabled: row.get::<_, i64>("enabled")? != 0,
        last_run: last_run.as_deref().map(parse_dt),
        last_status: row.get("last_status")?,
    })
}

fn row_to_execution(row: &Row<'_>) -> rusqlite::Result<DutyExecution> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let status: String = row.get("status")?;
    Ok(DutyExecution {
        id: row.get("id")?,
        duty_slug: row.get("duty_slug")?,
        started_at: parse_dt(&started_at),
        ended_at: ended_at.as_deref().map(parse_dt),
        status: parse_status(&status),
        session_id: row.get::<_, Option<String>>("session_id")?.map(SessionId::new),
        error_message: row.get("error_message")?,
        duration_seconds: row.get("duration_seconds")?,
    })
}

fn parse_status(s: &str) -> ExecutionStatus {
    match s {
        "triggered" => ExecutionStatus::Triggered,
        "failed" => ExecutionStatus::Failed,
        _ => ExecutionStatus::Running,
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

pub struct DutyRepo<'a> {
    store: &'a Store,
}

impl<'a> DutyRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn upsert(&self, duty: &Duty) -> Result<()> {
        self.store.execute(
            "INSERT INTO chief_duties (slug, name, schedule_hour, schedule_minute, prompt_file, timeout_minutes, enabled, last_run, last_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(slug) DO UPDATE SET
                name = ?2, schedule_hour = ?3, schedule_minute = ?4, prompt_file = ?5,
                timeout_minutes = ?6, enabled = ?7",
            params![
                duty.slug,
                duty.name,
                duty.schedule_time.hour,
                duty.schedule_time.minute,
                duty.prompt_file.display().to_string(),
                duty.timeout_minutes,
                duty.enabled as i64,
                duty.last_run.as_ref().map(fmt_dt),
                duty.last_status,
            ],
        )?;
        Ok(())
    }

    pub fn list_enabled(&self) -> Result<Vec<Duty>> {
        self.store
            .fetch_all("SELECT * FROM chief_duties WHERE enabled = 1 ORDER BY slug", [], row_to_duty)
    }

    pub fn get(&self, slug: &str) -> Result<Option<Duty>> {
        self.store
            .fetch_one("SELECT * FROM chief_duties WHERE slug = ?1", params![slug], row_to_duty)
    }

    pub fn list_all(&self) -> Result<Vec<Duty>> {
        self.store.fetch_all("SELECT * FROM chief_duties ORDER BY slug", [], row_to_duty)
    }

    /// Record a duty firing: bumps `last_run`/`last_status` and inserts an
    /// execution row. Called once the Tmux injection has succeeded.
    pub fn record_run(&self, slug: &str, status: ExecutionStatus, now: DateTime<Utc>, error: Option<&str>) -> Result<()> {
        self.store.transaction(|tx| {
            tx.execute(
                "UPDATE chief_duties SET last_run = ?2, last_status = ?3 WHERE slug = ?1",
                params![slug, fmt_dt(&now), status.as_str()],
            )?;
            tx.execute(
                "INSERT INTO chief_duty_executions (id, duty_slug, started_at, ended_at, status, session_id, error_message, duration_seconds)
                 VALUES (?1, ?2, ?3, ?3, ?4, NULL, ?5, 0.0)",
                params![orch_core::new_short_id(), slug, fmt_dt(&now), status.as_str(), error],
            )?;
            Ok(())
        })
    }

    pub fn list_executions(&self, slug: &str, limit: u32) -> Result<Vec<DutyExecution>> {
        self.store.fetch_all(
            "SELECT * FROM chief_duty_executions WHERE duty_slug = ?1 ORDER BY started_at DESC LIMIT ?2",
            params![slug, limit],
            row_to_execution,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duty(slug: &str) -> Duty {
        Duty {
            slug: slug.into(),
            name: "Morning Reset".into(),
            schedule_time: ScheduleTime::new(6, 0).unwrap(),
            prompt_file: PathBuf::from("duties/morning-reset.md"),
            timeout_minutes: 10,
            enabled: true,
            last_run: None,
            last_status: None,
        }
    }

    #[test]
    fn upsert_then_record_run_advances_last_run() {
        let store = Store::open_in_memory().unwrap();
        let repo = DutyRepo::new(&store);
        repo.upsert(&duty("morning-reset")).unwrap();
        let now = Utc::now();
        repo.record_run("morning-reset", ExecutionStatus::Triggered, now, None).unwrap();

        let d = repo.get("morning-reset").unwrap().unwrap();
        assert_eq!(d.last_status.as_deref(), Some("triggered"));
        assert!(d.last_run.is_some());
        assert_eq!(repo.list_executions("morning-reset", 10).unwrap().len(), 1);
    }
}
