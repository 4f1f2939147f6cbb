// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A pending or executed session-replacement. See the Handoff Pipeline for
//! the two-stage flow that produces and consumes these rows.

use crate::error::CoreError;
use crate::mission::MissionExecutionId;
use crate::session::{ConversationId, Mode, Role, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a handoff row.
    pub struct HandoffId;
}

/// Why a handoff was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffReason {
    ContextLow,
    EmergencyContextFull,
    PaneReused,
}

impl HandoffReason {
    pub fn as_str(self) -> &'static str {
        match self {
            HandoffReason::ContextLow => "context_low",
            HandoffReason::EmergencyContextFull => "emergency_context_full",
            HandoffReason::PaneReused => "pane_reused",
        }
    }
}

impl std::fmt::Display for HandoffReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Monotone status path: `pending -> executing -> (complete | failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    Pending,
    Executing,
    Complete,
    Failed,
}

impl HandoffStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HandoffStatus::Pending => "pending",
            HandoffStatus::Executing => "executing",
            HandoffStatus::Complete => "complete",
            HandoffStatus::Failed => "failed",
        }
    }

    /// Whether `self -> next` is a legal, forward-only transition.
    pub fn can_transition_to(self, next: HandoffStatus) -> bool {
        matches!(
            (self, next),
            (HandoffStatus::Pending, HandoffStatus::Executing)
                | (HandoffStatus::Executing, HandoffStatus::Complete)
                | (HandoffStatus::Executing, HandoffStatus::Failed)
        )
    }
}

impl std::fmt::Display for HandoffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HandoffStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(HandoffStatus::Pending),
            "executing" => Ok(HandoffStatus::Executing),
            "complete" => Ok(HandoffStatus::Complete),
            "failed" => Ok(HandoffStatus::Failed),
            other => Err(CoreError::InvalidHandoffStatus(other.to_string())),
        }
    }
}

/// Either a path to the filled-in handoff template, or inline content for
/// the replacement agent's opening message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HandoffContent {
    File(PathBuf),
    Inline(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handoff {
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
    pub status: HandoffStatus,
    pub requested_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub new_session_id: Option<SessionId>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_are_monotone() {
        assert!(HandoffStatus::Pending.can_transition_to(HandoffStatus::Executing));
        assert!(HandoffStatus::Executing.can_transition_to(HandoffStatus::Complete));
        assert!(HandoffStatus::Executing.can_transition_to(HandoffStatus::Failed));

        assert!(!HandoffStatus::Pending.can_transition_to(HandoffStatus::Complete));
        assert!(!HandoffStatus::Complete.can_transition_to(HandoffStatus::Executing));
        assert!(!HandoffStatus::Executing.can_transition_to(HandoffStatus::Pending));
    }
}
