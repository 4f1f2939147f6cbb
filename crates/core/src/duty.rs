// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recurring interruptions of the Chief, and the self-healing evaluator
//! that decides whether one is due.
//!
//! Self-healing means there is deliberately no `next_run` column: a system
//! that was off at 06:00 and boots at 07:00 runs the 06:00 duty
//! immediately; a corrupted `last_run` runs the duty; a successful run
//! naturally postpones to tomorrow.

use crate::error::CoreError;
use crate::session::SessionId;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// A local time of day, `HH:MM`, that a duty or scheduled trigger fires at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTime {
    pub hour: u32,
    pub minute: u32,
}

impl ScheduleTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }
}

impl FromStr for ScheduleTime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidScheduleTime(s.to_string()))?;
        let hour: u32 = h
            .parse()
            .map_err(|_| CoreError::InvalidScheduleTime(s.to_string()))?;
        let minute: u32 = m
            .parse()
            .map_err(|_| CoreError::InvalidScheduleTime(s.to_string()))?;
        ScheduleTime::new(hour, minute).ok_or_else(|| CoreError::InvalidScheduleTime(s.to_string()))
    }
}

impl std::fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Duty {
    pub slug: String,
    pub name: String,
    pub schedule_time: ScheduleTime,
    pub prompt_file: PathBuf,
    pub timeout_minutes: u32,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub last_status: Option<String>,
}

/// Self-healing fire-eligibility check.
///
/// `now` must already be localized to the timezone duties are evaluated
/// in (Pacific, per the spec); this function is timezone-generic so the
/// caller picks the zone and core stays decoupled from a tz database.
pub fn should_run_duty<Tz>(duty: &Duty, now: &DateTime<Tz>) -> bool
where
    Tz: TimeZone + Clone,
{
    let Some(today_naive) = now
        .date_naive()
        .and_hms_opt(duty.schedule_time.hour, duty.schedule_time.minute, 0)
    else {
        return true;
    };
    let today_scheduled = match now.timezone().from_local_datetime(&today_naive) {
        chrono::LocalResult::Single(dt) => dt,
        chrono::LocalResult::Ambiguous(dt, _) => dt,
        // Nonexistent local time (DST spring-forward gap): degrade safely
        // by treating the duty as due, matching the "corrupted last_run
        // runs" philosophy rather than silently skipping a day.
        chrono::LocalResult::None => return true,
    };

    if *now < today_scheduled {
        return false;
    }

    match &duty.last_run {
        None => true,
        Some(last_run) => last_run.with_timezone(&now.timezone()) < today_scheduled,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Triggered,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Triggered => "triggered",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DutyExecution {
    pub id: String,
    pub duty_slug: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub session_id: Option<SessionId>,
    pub error_message: Option<String>,
    pub duration_seconds: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn duty(schedule: &str, last_run: Option<DateTime<Utc>>) -> Duty {
        Duty {
            slug: "morning-reset".into(),
            name: "Morning Reset".into(),
            schedule_time: schedule.parse().unwrap(),
            prompt_file: PathBuf::from("duties/morning-reset.md"),
            timeout_minutes: 10,
            enabled: true,
            last_run,
            last_status: None,
        }
    }

    #[test]
    fn never_ran_fires_once_time_reached() {
        let d = duty("06:00", None);
        let before = Utc::now().date_naive().and_hms_opt(5, 0, 0).unwrap();
        let before = Utc.from_utc_datetime(&before);
        assert!(!should_run_duty(&d, &before));

        let after = Utc::now().date_naive().and_hms_opt(6, 1, 0).unwrap();
        let after = Utc.from_utc_datetime(&after);
        assert!(should_run_duty(&d, &after));
    }

    #[test]
    fn missed_overnight_fires_on_boot() {
        let yesterday_before_schedule = Utc::now().date_naive().pred_opt().unwrap().and_hms_opt(5, 59, 0).unwrap();
        let last_run = Utc.from_utc_datetime(&yesterday_before_schedule);
        let d = duty("06:00", Some(last_run));

        let boot_time = Utc::now().date_naive().and_hms_opt(7, 12, 0).unwrap();
        let boot_time = Utc.from_utc_datetime(&boot_time);
        assert!(should_run_duty(&d, &boot_time));
    }

    #[test]
    fn already_ran_today_does_not_refire() {
        let today_run = Utc::now().date_naive().and_hms_opt(6, 0, 5).unwrap();
        let last_run = Utc.from_utc_datetime(&today_run);
        let d = duty("06:00", Some(last_run));

        let one_minute_later = Utc::now().date_naive().and_hms_opt(6, 1, 0).unwrap();
        let one_minute_later = Utc.from_utc_datetime(&one_minute_later);
        assert!(!should_run_duty(&d, &one_minute_later));
    }

    #[test]
    fn duration_between_runs_straddles_distinct_days() {
        let d1 = Utc::now().date_naive().pred_opt().unwrap().and_hms_opt(6, 0, 0).unwrap();
        let d2 = Utc::now().date_naive().and_hms_opt(6, 0, 0).unwrap();
        assert_ne!(d1.date(), d2.date());
        let _ = Duration::days(1);
    }
}
