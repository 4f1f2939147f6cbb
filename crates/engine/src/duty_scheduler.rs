// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Duty Scheduler: a self-healing poll loop that interrupts the
//! Chief at fixed times of day. Grounded on
//! `original_source/.engine/src/workers/duty_scheduler.py`.

use crate::error::SchedulerError;
use chrono::Utc;
use chrono_tz::Tz;
use orch_adapters::TmuxDriver;
use orch_core::{should_run_duty, Clock, ExecutionStatus, SystemEvent};
use orch_storage::{DutyRepo, Store};
use std::sync::Arc;
use std::time::Duration;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
const DUTY_SOURCE_TAG: &str = "DUTY";

pub struct DutyScheduler<T> {
    store: Store,
    bus: orch_core::EventBus,
    tmux: T,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    chief_window: String,
}

impl<T> DutyScheduler<T>
where
    T: TmuxDriver,
{
    pub fn new(store: Store, bus: orch_core::EventBus, tmux: T, clock: Arc<dyn Clock>, timezone: Tz, chief_window: String) -> Self {
        Self {
            store,
            bus,
            tmux,
            clock,
            timezone,
            chief_window,
        }
    }

    /// Evaluates every enabled duty and fires at most one per tick (spec
    /// §4.I). Returns the slug fired, if any.
    pub async fn tick(&self) -> Result<Option<String>, SchedulerError> {
        let repo = DutyRepo::new(&self.store);
        let now_local = self.clock.now().with_timezone(&self.timezone);

        for duty in repo.list_enabled()? {
            if !should_run_duty(&duty, &now_local) {
                continue;
            }

            if !self.tmux.window_exists(&self.chief_window).await? {
                tracing::debug!(duty = %duty.slug, "chief window absent, skipping tick");
                continue;
            }

            let prompt = format!("[DUTY] /{}", duty.slug);
            let injected = self
                .tmux
                .inject_message(&self.chief_window, &prompt, true, Duration::from_millis(200), Some(DUTY_SOURCE_TAG))
                .await;

            let now = Utc::now();
            if injected {
                repo.record_run(&duty.slug, ExecutionStatus::Triggered, now, None)?;
                self.bus.publish(SystemEvent::DutyFired { duty_slug: duty.slug.clone() });
            } else {
                repo.record_run(&duty.slug, ExecutionStatus::Failed, now, Some("injection failed"))?;
            }

            return Ok(Some(duty.slug));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use orch_adapters::FakeTmuxDriver;
    use orch_core::{Duty, FakeClock, ScheduleTime};
    use std::path::PathBuf;

    fn make_duty(slug: &str, hour: u32, minute: u32) -> Duty {
        Duty {
            slug: slug.to_string(),
            name: "Morning Reset".to_string(),
            schedule_time: ScheduleTime::new(hour, minute).unwrap(),
            prompt_file: PathBuf::from("duties/morning-reset.md"),
            timeout_minutes: 10,
            enabled: true,
            last_run: None,
            last_status: None,
        }
    }

    #[tokio::test]
    async fn missed_duty_fires_on_first_tick_after_boot() {
        let store = Store::open_in_memory().unwrap();
        DutyRepo::new(&store).upsert(&make_duty("morning-reset", 6, 0)).unwrap();

        let boot = Utc::now().date_naive().and_hms_opt(7, 12, 0).unwrap();
        let clock = Arc::new(FakeClock::new(chrono::Utc.from_utc_datetime(&boot)));
        let bus = orch_core::EventBus::new();
        let tmux = FakeTmuxDriver::new();
        tmux.seed_pane("life:chief", "", None);

        let scheduler = DutyScheduler::new(store.clone(), bus, tmux.clone(), clock, chrono_tz::UTC, "life:chief".to_string());
        let fired = scheduler.tick().await.unwrap();
        assert_eq!(fired.as_deref(), Some("morning-reset"));

        let duty = DutyRepo::new(&store).get("morning-reset").unwrap().unwrap();
        assert_eq!(duty.last_status.as_deref(), Some("triggered"));

        let second = scheduler.tick().await.unwrap();
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn absent_chief_window_skips_tick_without_marking_run() {
        let store = Store::open_in_memory().unwrap();
        DutyRepo::new(&store).upsert(&make_duty("morning-reset", 6, 0)).unwrap();

        let boot = Utc::now().date_naive().and_hms_opt(7, 0, 0).unwrap();
        let clock = Arc::new(FakeClock::new(chrono::Utc.from_utc_datetime(&boot)));
        let bus = orch_core::EventBus::new();
        let tmux = FakeTmuxDriver::new();

        let scheduler = DutyScheduler::new(store.clone(), bus, tmux, clock, chrono_tz::UTC, "life:chief".to_string());
        let fired = scheduler.tick().await.unwrap();
        assert_eq!(fired, None);

        let duty = DutyRepo::new(&store).get("morning-reset").unwrap().unwrap();
        assert!(duty.last_run.is_none());
    }
}
