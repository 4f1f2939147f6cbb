// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Trigger Service: fires lighter, non-full-skill prompts into the
//! Chief pane on a wall-clock schedule or ahead of a calendar event.

use crate::error::SchedulerError;
use chrono::Utc;
use chrono_tz::Tz;
use orch_adapters::{CalendarSource, TmuxDriver};
use orch_core::{should_run_duty, Clock, Duty, ScheduleTime, SystemEvent, Trigger, TriggerKind};
use orch_storage::{Store, TriggerRepo};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
const TRIGGER_SOURCE_TAG: &str = "TRIGGER";
/// Window half-width (spec §4.J: `[now + minutes_ahead - 1, now + minutes_ahead + 1]`).
const CALENDAR_WINDOW_SLOP: chrono::Duration = chrono::Duration::minutes(1);
const DEDUP_RESET_INTERVAL: Duration = Duration::from_secs(3600);

/// Scheduled triggers reuse the duty self-healing evaluator by wrapping
/// themselves in the same shape `should_run_duty` expects.
fn as_pseudo_duty(trigger: &Trigger, time_spec: ScheduleTime) -> Duty {
    Duty {
        slug: trigger.slug.clone(),
        name: trigger.slug.clone(),
        schedule_time: time_spec,
        prompt_file: std::path::PathBuf::new(),
        timeout_minutes: 0,
        enabled: trigger.enabled,
        last_run: trigger.last_fired_at,
        last_status: None,
    }
}

pub struct TriggerService<T, C> {
    store: Store,
    bus: orch_core::EventBus,
    tmux: T,
    calendar: C,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    chief_window: String,
    /// Per-process calendar dedup set, cleared hourly (spec §4.J). Keyed on
    /// `(slug, event_id, starts_at)` rather than `(slug, event_id)` alone so
    /// a rescheduled occurrence of the same event can still fire.
    fired_calendar_events: Arc<Mutex<HashSet<(String, String, i64)>>>,
    last_dedup_reset: Arc<Mutex<std::time::Instant>>,
}

impl<T, C> TriggerService<T, C>
where
    T: TmuxDriver,
    C: CalendarSource,
{
    pub fn new(
        store: Store,
        bus: orch_core::EventBus,
        tmux: T,
        calendar: C,
        clock: Arc<dyn Clock>,
        timezone: Tz,
        chief_window: String,
    ) -> Self {
        Self {
            store,
            bus,
            tmux,
            calendar,
            clock,
            timezone,
            chief_window,
            fired_calendar_events: Arc::new(Mutex::new(HashSet::new())),
            last_dedup_reset: Arc::new(Mutex::new(std::time::Instant::now())),
        }
    }

    pub async fn tick(&self) -> Result<Vec<String>, SchedulerError> {
        self.maybe_reset_dedup_set();

        let repo = TriggerRepo::new(&self.store);
        let mut fired = Vec::new();
        for trigger in repo.list_enabled()? {
            let did_fire = match &trigger.kind {
                TriggerKind::Scheduled { time_spec } => self.tick_scheduled(&repo, &trigger, *time_spec).await?,
                TriggerKind::Calendar { minutes_ahead } => self.tick_calendar(&repo, &trigger, *minutes_ahead).await?,
            };
            if did_fire {
                fired.push(trigger.slug.clone());
            }
        }
        Ok(fired)
    }

    async fn tick_scheduled(&self, repo: &TriggerRepo<'_>, trigger: &Trigger, time_spec: ScheduleTime) -> Result<bool, SchedulerError> {
        let now_local = self.clock.now().with_timezone(&self.timezone);
        let pseudo = as_pseudo_duty(trigger, time_spec);
        if !should_run_duty(&pseudo, &now_local) {
            return Ok(false);
        }
        if !self.tmux.window_exists(&self.chief_window).await? {
            return Ok(false);
        }

        let prompt = format!("[TRIGGER] /{}", trigger.slug);
        let injected = self
            .tmux
            .inject_message(&self.chief_window, &prompt, true, Duration::from_millis(200), Some(TRIGGER_SOURCE_TAG))
            .await;
        if injected {
            repo.record_fire(&trigger.slug, None, Utc::now())?;
            self.bus.publish(SystemEvent::TriggerFired {
                trigger_id: trigger.id.clone(),
                mission_id: trigger.mission_id.clone(),
            });
        }
        Ok(injected)
    }

    async fn tick_calendar(&self, repo: &TriggerRepo<'_>, trigger: &Trigger, minutes_ahead: u32) -> Result<bool, SchedulerError> {
        let now = self.clock.now();
        let window_center = now + chrono::Duration::minutes(minutes_ahead as i64);
        let window = (window_center - CALENDAR_WINDOW_SLOP, window_center + CALENDAR_WINDOW_SLOP);
        let query_window = Duration::from_secs((window.1 - now).num_seconds().max(0) as u64);

        let events = self
            .calendar
            .upcoming(now, query_window)
            .await
            .map_err(|e| SchedulerError::Storage(orch_storage::StorageError::InvalidRow(e.to_string())))?;

        for event in events {
            if event.starts_at < window.0 || event.starts_at > window.1 {
                continue;
            }
            let key = (trigger.slug.clone(), event.event_id.clone(), event.starts_at.timestamp());
            if !self.fired_calendar_events.lock().insert(key) {
                continue;
            }

            if !self.tmux.window_exists(&self.chief_window).await? {
                continue;
            }
            let prompt = format!("[TRIGGER] Upcoming: {} at {}", event.title, event.starts_at.format("%H:%M"));
            let injected = self
                .tmux
                .inject_message(&self.chief_window, &prompt, true, Duration::from_millis(200), Some(TRIGGER_SOURCE_TAG))
                .await;
            if injected {
                repo.record_fire(&trigger.slug, Some(&event.event_id), now)?;
                self.bus.publish(SystemEvent::TriggerFired {
                    trigger_id: trigger.id.clone(),
                    mission_id: trigger.mission_id.clone(),
                });
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn maybe_reset_dedup_set(&self) {
        let mut last_reset = self.last_dedup_reset.lock();
        if last_reset.elapsed() >= DEDUP_RESET_INTERVAL {
            self.fired_calendar_events.lock().clear();
            *last_reset = std::time::Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_adapters::{CalendarEvent, FakeTmuxDriver, NoopCalendarSource};
    use orch_core::{new_short_id, FakeClock, MissionId, TriggerId};

    fn scheduled_trigger() -> Trigger {
        Trigger {
            id: TriggerId::new(new_short_id()),
            slug: "morning-heads-up".to_string(),
            mission_id: MissionId::new(new_short_id()),
            kind: TriggerKind::Scheduled {
                time_spec: ScheduleTime::new(8, 0).unwrap(),
            },
            enabled: true,
            last_fired_at: None,
            last_fired_event_id: None,
        }
    }

    #[tokio::test]
    async fn scheduled_trigger_fires_once_time_reached() {
        let store = Store::open_in_memory().unwrap();
        TriggerRepo::new(&store).upsert(&scheduled_trigger()).unwrap();

        let now = Utc::now().date_naive().and_hms_opt(8, 5, 0).unwrap();
        let clock = Arc::new(FakeClock::new(chrono::TimeZone::from_utc_datetime(&Utc, &now)));
        let tmux = FakeTmuxDriver::new();
        tmux.seed_pane("life:chief", "", None);
        let bus = orch_core::EventBus::new();

        let service = TriggerService::new(
            store,
            bus,
            tmux,
            NoopCalendarSource,
            clock,
            chrono_tz::UTC,
            "life:chief".to_string(),
        );
        let fired = service.tick().await.unwrap();
        assert_eq!(fired, vec!["morning-heads-up".to_string()]);

        let second = service.tick().await.unwrap();
        assert!(second.is_empty());
    }

    struct FixedCalendar(Vec<CalendarEvent>);

    #[async_trait::async_trait]
    impl CalendarSource for FixedCalendar {
        async fn upcoming(
            &self,
            _now: chrono::DateTime<Utc>,
            _window: Duration,
        ) -> Result<Vec<CalendarEvent>, orch_adapters::CalendarError> {
            Ok(self.0.clone())
        }
    }

    fn calendar_trigger() -> Trigger {
        Trigger {
            id: TriggerId::new(new_short_id()),
            slug: "standup-heads-up".to_string(),
            mission_id: MissionId::new(new_short_id()),
            kind: TriggerKind::Calendar { minutes_ahead: 10 },
            enabled: true,
            last_fired_at: None,
            last_fired_event_id: None,
        }
    }

    #[tokio::test]
    async fn calendar_trigger_fires_once_per_event_id() {
        let store = Store::open_in_memory().unwrap();
        TriggerRepo::new(&store).upsert(&calendar_trigger()).unwrap();

        let now = Utc::now();
        let event = CalendarEvent {
            event_id: "evt-1".to_string(),
            starts_at: now + chrono::Duration::minutes(10),
            ends_at: Some(now + chrono::Duration::minutes(40)),
            title: "Standup".to_string(),
        };
        let clock = Arc::new(FakeClock::new(now));
        let tmux = FakeTmuxDriver::new();
        tmux.seed_pane("life:chief", "", None);
        let bus = orch_core::EventBus::new();

        let service = TriggerService::new(
            store,
            bus,
            tmux,
            FixedCalendar(vec![event]),
            clock,
            chrono_tz::UTC,
            "life:chief".to_string(),
        );
        let fired = service.tick().await.unwrap();
        assert_eq!(fired, vec!["standup-heads-up".to_string()]);

        let second = service.tick().await.unwrap();
        assert!(second.is_empty());
    }
}
