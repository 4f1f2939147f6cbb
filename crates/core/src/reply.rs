// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Record of a specialist's reply injected back into the chief's pane.
//! `message_position` is the chief transcript's message index at the time
//! of injection, used to guarantee monotonic (never-reordered) delivery
//! even when several specialists finish out of order.

use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyInjection {
    pub specialist_session_id: SessionId,
    pub chief_session_id: SessionId,
    pub message_position: u64,
    pub injected_at: DateTime<Utc>,
}

impl ReplyInjection {
    /// Whether `self` was injected after `other`, by transcript position
    /// rather than wall-clock time (positions are the source of truth;
    /// injection timestamps can tie or skew under load).
    pub fn is_after(&self, other: &ReplyInjection) -> bool {
        self.message_position > other.message_position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn injection(pos: u64) -> ReplyInjection {
        ReplyInjection {
            specialist_session_id: SessionId::new(crate::id::new_short_id()),
            chief_session_id: SessionId::new(crate::id::new_short_id()),
            message_position: pos,
            injected_at: Utc::now(),
        }
    }

    #[test]
    fn ordering_follows_message_position_not_wall_clock() {
        let first = injection(5);
        let second = injection(7);
        assert!(second.is_after(&first));
        assert!(!first.is_after(&second));
    }
}
