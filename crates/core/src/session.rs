// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identity, taxonomy, and lifecycle state.
//!
//! A `Session` is a live or historical agent instance. Its `SessionId` is
//! locally unique and distinct from the external transcript uuid assigned
//! by the agent runtime, and distinct from `ConversationId`, which is the
//! identity the user perceives and which survives a reset.

use crate::mission::MissionExecutionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Locally unique identifier for a session row, e.g. `"a1b2c3d4"`.
    pub struct SessionId;
}

/// Stable identity across resets. `"chief"` is reserved and eternal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub const CHIEF: &'static str = "chief";

    pub fn chief() -> Self {
        Self(Self::CHIEF.to_string())
    }

    pub fn is_chief(&self) -> bool {
        self.0 == Self::CHIEF
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A role name (e.g. `"chief"`, `"builder"`, `"deep-work"`). Open-ended:
/// roles are defined by filesystem configuration (`.claude/roles/<role>/`),
/// not a closed Rust enum, so new roles don't require a code change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role(pub String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn is_chief(&self) -> bool {
        self.0 == "chief"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a session was spawned, which determines context-warning thresholds
/// (autonomous-flavored modes warn ten points earlier; see the Context
/// Monitor) and whether a pane exists at all (missions are headless).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Interactive,
    Background,
    Mission,
    Summarizer,
    Autonomous,
}

impl Mode {
    /// Autonomous-flavored modes have no human operator watching the pane,
    /// so the Context Monitor warns ten points earlier for them.
    pub fn is_autonomous_flavored(self) -> bool {
        matches!(self, Mode::Background | Mode::Mission | Mode::Autonomous)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Interactive => "interactive",
            Mode::Background => "background",
            Mode::Mission => "mission",
            Mode::Summarizer => "summarizer",
            Mode::Autonomous => "autonomous",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interactive" => Ok(Mode::Interactive),
            "background" => Ok(Mode::Background),
            "mission" => Ok(Mode::Mission),
            "summarizer" => Ok(Mode::Summarizer),
            "autonomous" => Ok(Mode::Autonomous),
            other => Err(crate::error::CoreError::InvalidMode(other.to_string())),
        }
    }
}

/// Coarse runtime state of a session row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Active,
    Ended,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Active => "active",
            SessionState::Ended => "ended",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SessionState {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SessionState::Idle),
            "active" => Ok(SessionState::Active),
            "ended" => Ok(SessionState::Ended),
            other => Err(crate::error::CoreError::InvalidSessionState(
                other.to_string(),
            )),
        }
    }
}

/// A live or historical agent instance. See the data model for field
/// semantics and invariants (exactly one row per id; `ended_at IS NULL`
/// implies live; a pane maps to at most one live session; the chief
/// conversation id has at most one live session).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub transcript_uuid: Option<String>,
    pub pane: Option<String>,

    pub conversation_id: ConversationId,
    pub parent_session_id: Option<SessionId>,
    pub mission_execution_id: Option<MissionExecutionId>,

    pub role: Role,
    pub mode: Mode,

    pub current_state: SessionState,
    pub context_warning_level: u8,
    pub subscribed_by: Option<SessionId>,
    pub has_pinged: bool,

    pub transcript_path: Option<PathBuf>,
    pub cwd: PathBuf,
    pub description: Option<String>,
    pub spec_path: Option<PathBuf>,
    pub status_text: Option<String>,

    pub started_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Last-known cost/token snapshot from the Pane Status Reader.
    /// Informational only; never used for lifecycle decisions.
    pub total_cost_usd: Option<f64>,
    pub total_tokens: Option<u64>,
}

impl Session {
    pub fn is_live(&self) -> bool {
        self.ended_at.is_none() && self.current_state != SessionState::Ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chief_conversation_id_is_reserved() {
        assert!(ConversationId::chief().is_chief());
        assert!(!ConversationId::new("conv-x").is_chief());
    }

    #[test]
    fn autonomous_modes_warn_earlier() {
        assert!(Mode::Background.is_autonomous_flavored());
        assert!(Mode::Mission.is_autonomous_flavored());
        assert!(Mode::Autonomous.is_autonomous_flavored());
        assert!(!Mode::Interactive.is_autonomous_flavored());
        assert!(!Mode::Summarizer.is_autonomous_flavored());
    }

    #[test]
    fn mode_round_trips_through_str() {
        for m in [
            Mode::Interactive,
            Mode::Background,
            Mode::Mission,
            Mode::Summarizer,
            Mode::Autonomous,
        ] {
            let parsed: Mode = m.as_str().parse().unwrap();
            assert_eq!(parsed, m);
        }
    }
}
