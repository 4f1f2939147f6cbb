// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mission definitions and executions. A mission is a headless, non-chief
//! task: either dispatched once from a trigger/duty/CLI invocation, or run
//! on its own schedule. Missions never target the `chief` role or
//! conversation — see [`Mission::validate`].

use crate::duty::ScheduleTime;
use crate::error::CoreError;
use crate::session::{Role, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Identifier for a mission definition (the template, not a run of it).
    pub struct MissionId;
}

crate::define_id! {
    /// Identifier for one execution (run) of a mission.
    pub struct MissionExecutionId;
}

/// Where a mission definition came from, which governs whether it may be
/// edited or deleted through the ordinary surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionSource {
    /// Ships with the runtime; read-only.
    CoreProtected,
    /// Ships with the runtime; user may override.
    CoreDefault,
    /// Provided by an installed app/plugin.
    CustomApp,
    /// Authored directly by the user.
    User,
}

impl MissionSource {
    pub fn is_protected(self) -> bool {
        matches!(self, MissionSource::CoreProtected)
    }
}

/// A mission's prompt is exactly one of a file reference or inline text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PromptSource {
    File(PathBuf),
    Inline(String),
}

/// Whether a mission runs only on demand or on its own recurring schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MissionSchedule {
    Time(ScheduleTime),
    Cron(String),
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub slug: String,
    pub name: String,
    pub source: MissionSource,
    pub target_role: Role,
    pub prompt: PromptSource,
    pub schedule: MissionSchedule,
    pub timeout_minutes: u32,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mission {
    /// Missions may never target the chief role: the chief is the
    /// permanent, conversational seat, not a disposable headless runner.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.target_role.is_chief() {
            return Err(CoreError::MissionTargetsChief);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionExecutionStatus {
    Queued,
    Running,
    Complete,
    Failed,
    TimedOut,
}

impl MissionExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MissionExecutionStatus::Complete
                | MissionExecutionStatus::Failed
                | MissionExecutionStatus::TimedOut
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MissionExecutionStatus::Queued => "queued",
            MissionExecutionStatus::Running => "running",
            MissionExecutionStatus::Complete => "complete",
            MissionExecutionStatus::Failed => "failed",
            MissionExecutionStatus::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for MissionExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionExecution {
    pub id: MissionExecutionId,
    pub mission_id: MissionId,
    pub session_id: Option<SessionId>,
    pub status: MissionExecutionStatus,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub output_summary: Option<String>,
    pub error_message: Option<String>,
    pub duration_seconds: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mission(role: &str) -> Mission {
        Mission {
            id: MissionId::new(crate::id::new_short_id()),
            slug: "nightly-audit".into(),
            name: "Nightly Audit".into(),
            source: MissionSource::CoreDefault,
            target_role: Role::new(role),
            prompt: PromptSource::File(PathBuf::from("missions/nightly-audit.md")),
            schedule: MissionSchedule::None,
            timeout_minutes: 30,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn mission_cannot_target_chief() {
        let m = mission("chief");
        assert!(matches!(m.validate(), Err(CoreError::MissionTargetsChief)));
    }

    #[test]
    fn mission_targeting_other_role_is_valid() {
        let m = mission("auditor");
        assert!(m.validate().is_ok());
    }

    #[test]
    fn terminal_statuses_are_exhaustive() {
        assert!(!MissionExecutionStatus::Queued.is_terminal());
        assert!(!MissionExecutionStatus::Running.is_terminal());
        assert!(MissionExecutionStatus::Complete.is_terminal());
        assert!(MissionExecutionStatus::Failed.is_terminal());
        assert!(MissionExecutionStatus::TimedOut.is_terminal());
    }
}
