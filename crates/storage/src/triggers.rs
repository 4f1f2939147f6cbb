// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for the `triggers` table.

use crate::db::Store;
use crate::error::Result;
use chrono::{DateTime, Utc};
use orch_core::{MissionId, ScheduleTime, Trigger, TriggerId, TriggerKind};
use rusqlite::{params, Row};

fn row_to_trigger(row: &Row<'_>) -> rusqlite::Result<Trigger> {
    let kind: String = row.get("kind")?;
    let last_fired_at: Option<String> = row.get("last_fired_at")?;

    let kind = match kind.as_str() {
        "calendar" => TriggerKind::Calendar {
            minutes_ahead: row.get::<_, Option<i64>>("minutes_ahead")?.unwrap_or(0) as u32,
        },
        _ => TriggerKind::Scheduled {
            time_spec: ScheduleTime::new(
                row.get::<_, Option<i64>>("time_hour")?.unwrap_or(0) as u32,
                row.get::<_, Option<i64>>("time_minute")?.unwrap_or(0) as u32,
            )
            .unwrap_or(ScheduleTime { hour: 0, minute: 0 }),
        },
    };

    Ok(Trigger {
        id: TriggerId::new(row.get::<_, String>("id")?),
        slug: row.get("slug")?,
        mission_id: MissionId::new(row.get::<_, String>("mission_id")?),
        kind,
        enabled: row.get::<_, i64>("enabled")? != 0,
        last_fired_at: last_fired_at.as_deref().map(parse_dt),
        last_fired_event_id: row.get("last_fired_event_id")?,
    })
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn fmt_dt(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub struct TriggerRepo<'a> {
    store: &'a Store,
}

impl<'a> TriggerRepo<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn upsert(&self, trigger: &Trigger) -> Result<()> {
        let (kind, time_hour, time_minute, minutes_ahead) = match &trigger.kind {
            TriggerKind::Scheduled { time_spec } => {
                ("scheduled", Some(time_spec.hour), Some(time_spec.minute), None)
            }
            TriggerKind::Calendar { minutes_ahead } => ("calendar", None, None, Some(*minutes_ahead)),
        };

        self.store.execute(
            "INSERT INTO triggers (
                id, slug, mission_id, kind, time_hour, time_minute, minutes_ahead,
                enabled, last_fired_at, last_fired_event_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, NULL)
             ON CONFLICT(slug) DO UPDATE SET
                mission_id = ?3, kind = ?4, time_hour = ?5, time_minute = ?6,
                minutes_ahead = ?7, enabled = ?8",
            params![
                trigger.id.as_str(),
                trigger.slug,
                trigger.mission_id.as_str(),
                kind,
                time_hour,
                time_minute,
                minutes_ahead,
                trigger.enabled as i64,
            ],
        )?;
        Ok(())
    }

    pub fn list_enabled(&self) -> Result<Vec<Trigger>> {
        self.store
            .fetch_all("SELECT * FROM triggers WHERE enabled = 1 ORDER BY slug", [], row_to_trigger)
    }

    pub fn get(&self, slug: &str) -> Result<Option<Trigger>> {
        self.store
            .fetch_one("SELECT * FROM triggers WHERE slug = ?1", params![slug], row_to_trigger)
    }

    pub fn list_all(&self) -> Result<Vec<Trigger>> {
        self.store.fetch_all("SELECT * FROM triggers ORDER BY slug", [], row_to_trigger)
    }

    /// Records a firing, advancing the dedup key. `event_id` is `None` for
    /// scheduled triggers, which dedupe on calendar day implicitly via
    /// `last_fired_at` alone.
    pub fn record_fire(&self, slug: &str, event_id: Option<&str>, now: DateTime<Utc>) -> Result<()> {
        self.store.execute(
            "UPDATE triggers SET last_fired_at = ?2, last_fired_event_id = ?3 WHERE slug = ?1",
            params![slug, fmt_dt(&now), event_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduled_trigger(slug: &str) -> Trigger {
        Trigger {
            id: TriggerId::new(orch_core::new_short_id()),
            slug: slug.into(),
            mission_id: MissionId::new(orch_core::new_short_id()),
            kind: TriggerKind::Scheduled {
                time_spec: ScheduleTime::new(8, 30).unwrap(),
            },
            enabled: true,
            last_fired_at: None,
            last_fired_event_id: None,
        }
    }

    fn calendar_trigger(slug: &str) -> Trigger {
        Trigger {
            id: TriggerId::new(orch_core::new_short_id()),
            slug: slug.into(),
            mission_id: MissionId::new(orch_core::new_short_id()),
            kind: TriggerKind::Calendar { minutes_ahead: 10 },
            enabled: true,
            last_fired_at: None,
            last_fired_event_id: None,
        }
    }

    #[test]
    fn scheduled_trigger_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let repo = TriggerRepo::new(&store);
        repo.upsert(&scheduled_trigger("morning-heads-up")).unwrap();
        let t = repo.get("morning-heads-up").unwrap().unwrap();
        assert!(matches!(t.kind, TriggerKind::Scheduled { time_spec } if time_spec.hour == 8 && time_spec.minute == 30));
    }

    #[test]
    fn calendar_trigger_dedupes_on_event_id() {
        let store = Store::open_in_memory().unwrap();
        let repo = TriggerRepo::new(&store);
        repo.upsert(&calendar_trigger("standup-heads-up")).unwrap();
        let now = Utc::now();
        repo.record_fire("standup-heads-up", Some("evt-1"), now).unwrap();

        let t = repo.get("standup-heads-up").unwrap().unwrap();
        assert!(t.already_fired_for("evt-1"));
        assert!(!t.already_fired_for("evt-2"));
    }
}
