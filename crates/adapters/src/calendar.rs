// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Calendar adapter for the `calendar` Trigger kind.
//!
//! The calendar application itself is out of scope (spec.md Non-goals):
//! this is a narrow, read-only query boundary so the Trigger Service can
//! ask "what's due in the next window?" without caring whether that
//! answer comes from a real calendar integration or nothing at all.

use crate::error::CalendarError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;

/// One upcoming or in-progress calendar occurrence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalendarEvent {
    pub event_id: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: String,
}

/// Read-only query boundary for upcoming calendar occurrences.
#[async_trait]
pub trait CalendarSource: Send + Sync + 'static {
    /// Occurrences starting within `window` of `now`.
    async fn upcoming(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;
}

/// Always returns an empty schedule. Used when no calendar command is
/// configured so the daemon still starts and scheduled triggers still
/// run — only the calendar kind is a no-op.
#[derive(Debug, Clone, Default)]
pub struct NoopCalendarSource;

#[async_trait]
impl CalendarSource for NoopCalendarSource {
    async fn upcoming(
        &self,
        _now: DateTime<Utc>,
        _window: Duration,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        Ok(Vec::new())
    }
}

/// Shells out to a configured command, passing `--since` / `--window-secs`
/// and expecting one JSON `CalendarEvent` per line on stdout.
#[derive(Debug, Clone)]
pub struct ProcessCalendarSource {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessCalendarSource {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CalendarSource for ProcessCalendarSource {
    async fn upcoming(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .arg("--since")
            .arg(now.to_rfc3339())
            .arg("--window-secs")
            .arg(window.as_secs().to_string());

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(CalendarError::CommandFailed(e.to_string())),
            Err(_) => {
                return Err(CalendarError::CommandFailed(format!(
                    "calendar command timed out after {:?}",
                    self.timeout
                )))
            }
        };

        if !output.status.success() {
            return Err(CalendarError::CommandFailed(format!(
                "exit status {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut events = Vec::new();
        for line in stdout.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let event: CalendarEvent = serde_json::from_str(line)
                .map_err(|e| CalendarError::InvalidOutput(format!("{e}: {line}")))?;
            events.push(event);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_source_returns_empty() {
        let source = NoopCalendarSource;
        let events = source
            .upcoming(Utc::now(), Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn process_source_rejects_nonzero_exit() {
        let source = ProcessCalendarSource::new("false", vec![]);
        let result = source.upcoming(Utc::now(), Duration::from_secs(60)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn process_source_parses_jsonl_stdout() {
        let source = ProcessCalendarSource::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"echo '{"event_id":"e1","starts_at":"2026-01-01T00:00:00Z","title":"standup"}'"#
                    .to_string(),
            ],
        );
        let events = source
            .upcoming(Utc::now(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, "e1");
        assert_eq!(events[0].title, "standup");
    }
}
