// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting shared by every `orch` subcommand: `--json` vs.
//! plain text, and the small set of human-readable helpers (relative
//! timestamps, truncation) the text renderers lean on.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Prints `value` as pretty-printed JSON. Used by every command when
/// `--format json` is passed, so scripts get one schema per payload
/// shape rather than scraping the text table.
pub fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("error: failed to serialize output: {e}"),
    }
}

/// Renders a past timestamp as `"3m ago"` / `"2h ago"` / `"5d ago"`.
pub fn format_time_ago(when: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(when);
    if delta.num_seconds() < 0 {
        return "in the future".to_string();
    }
    if delta.num_seconds() < 60 {
        return format!("{}s ago", delta.num_seconds());
    }
    if delta.num_minutes() < 60 {
        return format!("{}m ago", delta.num_minutes());
    }
    if delta.num_hours() < 24 {
        return format!("{}h ago", delta.num_hours());
    }
    format!("{}d ago", delta.num_days())
}

/// Truncates `s` to `max` characters, appending an ellipsis marker when
/// truncation actually happened, for fixed-width table columns.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('\u{2026}');
    out
}
