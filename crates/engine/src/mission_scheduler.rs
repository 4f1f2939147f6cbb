// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Mission Scheduler: evaluates time-scheduled missions (as opposed
//! to the triggered ones `orch_core::Trigger` dispatches) and hands them
//! to the [`MissionExecutor`].
//!
//! Reuses the same self-healing evaluator as the Duty Scheduler by
//! wrapping a `MissionSchedule::Time` mission in a pseudo-[`Duty`], the
//! same trick `TriggerService` uses for scheduled triggers.
//!
//! Cron-scheduled missions are recorded but not evaluated here: the
//! workspace carries no cron-expression crate, and fabricating one would
//! be worse than leaving the gap explicit (see DESIGN.md). A cron
//! mission still runs fine via an explicit trigger or CLI invocation.

use crate::error::MissionError;
use crate::mission_executor::MissionExecutor;
use chrono_tz::Tz;
use orch_adapters::HeadlessAgentLauncher;
use orch_core::{should_run_duty, Clock, Duty, Mission, MissionSchedule};
use orch_storage::{MissionRepo, Store};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

fn as_pseudo_duty(mission: &Mission, time_spec: orch_core::ScheduleTime) -> Duty {
    Duty {
        slug: mission.slug.clone(),
        name: mission.name.clone(),
        schedule_time: time_spec,
        prompt_file: std::path::PathBuf::new(),
        timeout_minutes: mission.timeout_minutes,
        enabled: mission.enabled,
        last_run: None,
        last_status: None,
    }
}

pub struct MissionScheduler<L> {
    store: Store,
    executor: MissionExecutor<L>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl<L> MissionScheduler<L>
where
    L: HeadlessAgentLauncher + Clone,
{
    pub fn new(store: Store, executor: MissionExecutor<L>, clock: Arc<dyn Clock>, timezone: Tz) -> Self {
        Self { store, executor, clock, timezone }
    }

    /// Evaluates every enabled, time-scheduled mission and executes every
    /// one that is due this tick (unlike the Duty Scheduler, missions
    /// don't contend for a single Chief pane, so there is no
    /// fire-at-most-one-per-tick limit).
    pub async fn tick(&self) -> Result<Vec<String>, MissionError> {
        let repo = MissionRepo::new(&self.store);
        let now_local = self.clock.now().with_timezone(&self.timezone);
        let mut fired = Vec::new();

        for mission in repo.list_enabled()? {
            let MissionSchedule::Time(time_spec) = mission.schedule else {
                continue;
            };
            let mut pseudo = as_pseudo_duty(&mission, time_spec);
            pseudo.last_run = repo.last_run(&mission.slug)?;

            if !should_run_duty(&pseudo, &now_local) {
                continue;
            }

            self.executor.execute(&mission.slug, HashMap::new())?;
            repo.record_run(&mission.slug, "triggered", self.clock.now())?;
            fired.push(mission.slug.clone());
        }

        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use orch_adapters::FakeHeadlessAgentLauncher;
    use orch_core::{EventBus, FakeClock, MissionId, MissionSource, PromptSource, Role, ScheduleTime};

    fn scheduled_mission(slug: &str, hour: u32, minute: u32) -> Mission {
        Mission {
            id: MissionId::new(orch_core::new_short_id()),
            slug: slug.to_string(),
            name: "Nightly Audit".to_string(),
            source: MissionSource::CoreDefault,
            target_role: Role::new("auditor"),
            prompt: PromptSource::Inline("run".to_string()),
            schedule: MissionSchedule::Time(ScheduleTime::new(hour, minute).unwrap()),
            timeout_minutes: 10,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn due_time_scheduled_mission_fires_and_records_run() {
        let store = Store::open_in_memory().unwrap();
        MissionRepo::new(&store).upsert(&scheduled_mission("nightly-audit", 6, 0)).unwrap();

        let boot = Utc::now().date_naive().and_hms_opt(7, 0, 0).unwrap();
        let clock = Arc::new(FakeClock::new(Utc.from_utc_datetime(&boot)));
        let bus = EventBus::new();
        let launcher = FakeHeadlessAgentLauncher::new();
        let executor = MissionExecutor::new(store.clone(), bus, launcher, clock.clone(), std::path::PathBuf::from("/tmp"));
        let scheduler = MissionScheduler::new(store.clone(), executor, clock, chrono_tz::UTC);

        let fired = scheduler.tick().await.unwrap();
        assert_eq!(fired, vec!["nightly-audit".to_string()]);

        let mission = MissionRepo::new(&store).get_by_slug("nightly-audit").unwrap().unwrap();
        assert!(mission.updated_at >= mission.created_at);
    }

    #[tokio::test]
    async fn cron_scheduled_mission_is_never_evaluated_here() {
        let store = Store::open_in_memory().unwrap();
        let mut mission = scheduled_mission("weekly-digest", 6, 0);
        mission.schedule = MissionSchedule::Cron("0 6 * * 1".to_string());
        MissionRepo::new(&store).upsert(&mission).unwrap();

        let clock = Arc::new(FakeClock::new(Utc::now()));
        let bus = EventBus::new();
        let launcher = FakeHeadlessAgentLauncher::new();
        let executor = MissionExecutor::new(store.clone(), bus, launcher, clock.clone(), std::path::PathBuf::from("/tmp"));
        let scheduler = MissionScheduler::new(store, executor, clock, chrono_tz::UTC);

        assert!(scheduler.tick().await.unwrap().is_empty());
    }
}
