// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotent schema migrations, run once at startup.
//!
//! Every table is `CREATE TABLE IF NOT EXISTS`; the `installed_apps` table
//! doubles as the migration marker (see spec.md §6), even though this
//! crate installs no applications of its own -- it records schema version
//! and is checked at startup the same way the original does.

use crate::db::Store;
use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn run(store: &Store) -> Result<()> {
    store.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS installed_apps (
            name TEXT PRIMARY KEY,
            version INTEGER NOT NULL,
            installed_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            transcript_uuid TEXT,
            pane TEXT,
            conversation_id TEXT NOT NULL,
            parent_session_id TEXT,
            mission_execution_id TEXT,
            role TEXT NOT NULL,
            mode TEXT NOT NULL,
            current_state TEXT NOT NULL,
            context_warning_level INTEGER NOT NULL DEFAULT 0,
            subscribed_by TEXT,
            has_pinged INTEGER NOT NULL DEFAULT 0,
            transcript_path TEXT,
            cwd TEXT NOT NULL,
            description TEXT,
            spec_path TEXT,
            status_text TEXT,
            started_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            ended_at TEXT,
            end_reason TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            total_cost_usd REAL,
            total_tokens INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_pane ON sessions(pane);
        CREATE INDEX IF NOT EXISTS idx_sessions_conversation ON sessions(conversation_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_live ON sessions(ended_at);

        CREATE TABLE IF NOT EXISTS handoffs (
            id TEXT PRIMARY KEY,
            old_session_id TEXT NOT NULL,
            role TEXT NOT NULL,
            mode TEXT NOT NULL,
            tmux_pane TEXT,
            conversation_id TEXT NOT NULL,
            parent_session_id TEXT,
            mission_execution_id TEXT,
            reason TEXT NOT NULL,
            content_kind TEXT NOT NULL,
            content_value TEXT NOT NULL,
            status TEXT NOT NULL,
            requested_at TEXT NOT NULL,
            executed_at TEXT,
            completed_at TEXT,
            new_session_id TEXT,
            error TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_handoffs_old_session ON handoffs(old_session_id);
        CREATE INDEX IF NOT EXISTS idx_handoffs_status ON handoffs(status);

        CREATE TABLE IF NOT EXISTS chief_duties (
            slug TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            schedule_hour INTEGER NOT NULL,
            schedule_minute INTEGER NOT NULL,
            prompt_file TEXT NOT NULL,
            timeout_minutes INTEGER NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            last_run TEXT,
            last_status TEXT
        );

        CREATE TABLE IF NOT EXISTS chief_duty_executions (
            id TEXT PRIMARY KEY,
            duty_slug TEXT NOT NULL,
            started_at TEXT NOT NULL,
            ended_at TEXT,
            status TEXT NOT NULL,
            session_id TEXT,
            error_message TEXT,
            duration_seconds REAL
        );

        CREATE INDEX IF NOT EXISTS idx_duty_executions_slug ON chief_duty_executions(duty_slug);

        CREATE TABLE IF NOT EXISTS missions (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            source TEXT NOT NULL,
            target_role TEXT NOT NULL,
            prompt_kind TEXT NOT NULL,
            prompt_value TEXT NOT NULL,
            schedule_kind TEXT NOT NULL,
            schedule_value TEXT,
            timeout_minutes INTEGER NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            next_run TEXT,
            last_run TEXT,
            last_status TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS mission_executions (
            id TEXT PRIMARY KEY,
            mission_id TEXT NOT NULL,
            session_id TEXT,
            status TEXT NOT NULL,
            queued_at TEXT NOT NULL,
            started_at TEXT,
            ended_at TEXT,
            output_summary TEXT,
            error_message TEXT,
            duration_seconds REAL
        );

        CREATE INDEX IF NOT EXISTS idx_mission_executions_mission ON mission_executions(mission_id);

        CREATE TABLE IF NOT EXISTS triggers (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            mission_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            time_hour INTEGER,
            time_minute INTEGER,
            minutes_ahead INTEGER,
            enabled INTEGER NOT NULL DEFAULT 1,
            last_fired_at TEXT,
            last_fired_event_id TEXT
        );

        CREATE TABLE IF NOT EXISTS reply_injections (
            specialist_session_id TEXT NOT NULL,
            chief_session_id TEXT NOT NULL,
            message_position INTEGER NOT NULL,
            injected_at TEXT NOT NULL,
            PRIMARY KEY (specialist_session_id, message_position)
        );
        "#,
    )?;

    store.execute(
        "INSERT INTO installed_apps (name, version, installed_at) VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(name) DO UPDATE SET version = ?2",
        rusqlite::params!["orch-core-schema", SCHEMA_VERSION],
    )?;

    Ok(())
}
