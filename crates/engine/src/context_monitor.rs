// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Context Monitor: polls every live session's pane for context
//! exhaustion and reacts before the agent silently degrades.
//!
//! Single-threshold design: one 90% warning, one 100% emergency handoff.
//! Autonomous-flavored sessions (no human watching the pane) get both
//! thresholds ten points earlier.

use crate::error::{HandoffError, RegistryError};
use crate::handoff::{HandoffPipeline, RequestHandoff};
use crate::registry::SessionRegistry;
use orch_adapters::{parse_status, HeadlessAgentLauncher, TmuxDriver};
use orch_core::{HandoffContent, HandoffReason, Mode, Session};
use std::time::Duration;
use thiserror::Error;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
const WARN_THRESHOLD: u8 = 90;
const EMERGENCY_THRESHOLD: u8 = 100;
const AUTONOMOUS_OFFSET: u8 = 10;
const ESCAPE_SETTLE_DELAY: Duration = Duration::from_millis(200);
const WARNING_SOURCE_TAG: &str = "CONTEXT";

#[derive(Debug, Error)]
pub enum ContextMonitorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Handoff(#[from] HandoffError),
    #[error(transparent)]
    Tmux(#[from] orch_adapters::TmuxError),
}

pub struct ContextMonitor<T, L> {
    registry: SessionRegistry,
    handoffs: HandoffPipeline<T, L>,
    tmux: T,
}

impl<T, L> ContextMonitor<T, L>
where
    T: TmuxDriver + Clone,
    L: HeadlessAgentLauncher + Clone,
{
    pub fn new(registry: SessionRegistry, handoffs: HandoffPipeline<T, L>, tmux: T) -> Self {
        Self { registry, handoffs, tmux }
    }

    /// One poll across every live session. Returns the ids of sessions
    /// for which an emergency handoff was triggered this tick.
    pub async fn tick(&self) -> Result<Vec<String>, ContextMonitorError> {
        let mut emergencies = Vec::new();
        for session in self.registry.list_live()? {
            if let Some(id) = self.check_session(&session).await? {
                emergencies.push(id);
            }
        }
        Ok(emergencies)
    }

    async fn check_session(&self, session: &Session) -> Result<Option<String>, ContextMonitorError> {
        let Some(pane) = &session.pane else {
            return Ok(None);
        };

        let content = match self.tmux.capture_pane(pane, 200).await {
            Ok(c) => c,
            Err(_) => return Ok(None),
        };
        let title = self.tmux.capture_pane_title(pane).await.ok().flatten();
        let status = parse_status(&content, title.as_deref());

        let offset = if session.mode.is_autonomous_flavored() { AUTONOMOUS_OFFSET } else { 0 };
        let warn_threshold = WARN_THRESHOLD.saturating_sub(offset);
        let emergency_threshold = EMERGENCY_THRESHOLD.saturating_sub(offset);

        let is_emergency = status.context_full
            || status.context_percent_used.is_some_and(|p| p >= emergency_threshold);

        if is_emergency {
            if self.handoffs.pending_or_executing_for(&session.id)?.is_some() {
                return Ok(None);
            }
            self.handoffs.request(RequestHandoff {
                old_session_id: session.id.clone(),
                reason: HandoffReason::EmergencyContextFull,
                content: HandoffContent::Inline(format!("emergency handoff: context exhausted for role {}", session.role)),
            })?;
            return Ok(Some(session.id.to_string()));
        }

        if let Some(percent) = status.context_percent_used {
            if percent >= warn_threshold && session.context_warning_level < warn_threshold {
                let _ = self.tmux.send_escape_to_pane(pane).await;
                tokio::time::sleep(ESCAPE_SETTLE_DELAY).await;
                let warning = format!(
                    "Context is at {percent}%. Consider running /reset soon to hand off to a fresh session."
                );
                self.tmux.inject_message(pane, &warning, true, Duration::from_millis(200), Some(WARNING_SOURCE_TAG)).await;
                self.registry.set_context_warning_level(&session.id, warn_threshold, chrono::Utc::now())?;
            }
        }

        Ok(None)
    }
}
