// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Triggers fire missions from either a wall-clock schedule or an upcoming
//! calendar event, independent of the Duty Scheduler's chief-interruption
//! flow.

use crate::duty::ScheduleTime;
use crate::mission::MissionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier for a trigger row.
    pub struct TriggerId;
}

/// A scheduled trigger fires daily at a fixed local time; a calendar
/// trigger fires a fixed number of minutes before a matching calendar
/// event starts, and dedupes on `(event_id, last_fire_timestamp)` so a
/// rescheduled event can fire again while a re-poll of the same event
/// cannot double-fire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TriggerKind {
    Scheduled { time_spec: ScheduleTime },
    Calendar { minutes_ahead: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub slug: String,
    pub mission_id: MissionId,
    pub kind: TriggerKind,
    pub enabled: bool,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub last_fired_event_id: Option<String>,
}

impl Trigger {
    /// Dedup key for a calendar firing: an event may legitimately fire more
    /// than once across reschedules, but never twice for the same instant.
    pub fn calendar_fire_key(event_id: &str, event_start: DateTime<Utc>) -> (String, DateTime<Utc>) {
        (event_id.to_string(), event_start)
    }

    pub fn already_fired_for(&self, event_id: &str) -> bool {
        self.last_fired_event_id.as_deref() == Some(event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_dedup_key_distinguishes_reschedules() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::hours(1);
        let key_a = Trigger::calendar_fire_key("evt-1", t0);
        let key_b = Trigger::calendar_fire_key("evt-1", t1);
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn already_fired_checks_event_id_only() {
        let trigger = Trigger {
            id: TriggerId::new(crate::id::new_short_id()),
            slug: "standup-heads-up".into(),
            mission_id: MissionId::new(crate::id::new_short_id()),
            kind: TriggerKind::Calendar { minutes_ahead: 10 },
            enabled: true,
            last_fired_at: Some(Utc::now()),
            last_fired_event_id: Some("evt-1".into()),
        };
        assert!(trigger.already_fired_for("evt-1"));
        assert!(!trigger.already_fired_for("evt-2"));
    }
}
