// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System events. Serializes as `{"type": "domain:action", ...fields}`;
//! an unrecognized `type` tag deserializes to [`SystemEvent::Custom`] so
//! older CLI clients tolerate daemon upgrades that add new variants.

use crate::handoff::{HandoffId, HandoffReason};
use crate::mission::{MissionExecutionId, MissionId};
use crate::session::{ConversationId, SessionId};
use crate::trigger::TriggerId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The three change kinds the Filesystem Watcher normalizes every native
/// notify event into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeKind {
    Created,
    Modified,
    Deleted,
}

impl FileChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FileChangeKind::Created => "created",
            FileChangeKind::Modified => "modified",
            FileChangeKind::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemEvent {
    #[serde(rename = "session:started")]
    SessionStarted {
        session_id: SessionId,
        conversation_id: ConversationId,
    },
    #[serde(rename = "file:changed")]
    FileChanged {
        kind: FileChangeKind,
        path: PathBuf,
    },
    #[serde(rename = "session:ended")]
    SessionEnded {
        session_id: SessionId,
        reason: Option<String>,
    },
    #[serde(rename = "handoff:requested")]
    HandoffRequested {
        handoff_id: HandoffId,
        old_session_id: SessionId,
        reason: HandoffReason,
    },
    #[serde(rename = "handoff:completed")]
    HandoffCompleted {
        handoff_id: HandoffId,
        new_session_id: SessionId,
    },
    #[serde(rename = "handoff:failed")]
    HandoffFailed {
        handoff_id: HandoffId,
        error: String,
    },
    #[serde(rename = "context:warning")]
    ContextWarning {
        session_id: SessionId,
        level: u8,
    },
    #[serde(rename = "duty:fired")]
    DutyFired { duty_slug: String },
    #[serde(rename = "trigger:fired")]
    TriggerFired {
        trigger_id: TriggerId,
        mission_id: MissionId,
    },
    #[serde(rename = "mission:queued")]
    MissionQueued {
        execution_id: MissionExecutionId,
        mission_id: MissionId,
    },
    #[serde(rename = "mission:completed")]
    MissionCompleted {
        execution_id: MissionExecutionId,
        succeeded: bool,
    },
    #[serde(rename = "reply:injected")]
    ReplyInjected {
        specialist_session_id: SessionId,
        chief_session_id: SessionId,
    },
    #[serde(rename = "system:shutdown")]
    Shutdown,
    #[serde(other)]
    Custom,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_has_stable_wire_format() {
        let json = serde_json::to_string(&SystemEvent::Shutdown).unwrap();
        assert_eq!(json, r#"{"type":"system:shutdown"}"#);
    }

    #[test]
    fn unknown_type_tag_becomes_custom() {
        let json = r#"{"type":"future:event","foo":"bar"}"#;
        let parsed: SystemEvent = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, SystemEvent::Custom);
    }

    #[test]
    fn session_started_roundtrips() {
        let event = SystemEvent::SessionStarted {
            session_id: SessionId::new("s1"),
            conversation_id: ConversationId::new("conv-1"),
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: SystemEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }
}
