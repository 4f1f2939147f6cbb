// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Pane Status Reader: a pure function over captured pane buffers.
//!
//! No I/O lives here. Everything is parsed out of a handful of anchored
//! regular expressions against known agent-UI strings; a custom
//! status-line percent display is explicitly ignored for
//! `context_percent_used` — only the agent's own native warning is
//! trusted for that field.

use regex::Regex;
use std::sync::OnceLock;

/// Authoritative, UI-derived snapshot of one agent pane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaudeStatus {
    pub context_warning: bool,
    pub context_remaining: Option<u8>,
    pub context_percent_used: Option<u8>,
    pub context_full: bool,
    pub is_thinking: bool,
    pub active_task: Option<String>,
    pub last_task: Option<String>,
    pub elapsed_time: Option<String>,
    pub token_count: Option<String>,
    pub model: Option<String>,
    pub cost_usd: Option<f64>,
}

fn context_low_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Context low \((\d+)% remaining\)").expect("valid regex"))
}

fn task_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?P<task>.+?)\s*\((?:esc|ctrl\+c) to interrupt\s*·\s*(?P<elapsed>\d+m\s*\d*s?)\s*·\s*↓\s*(?P<tokens>[\d.]+k?\s*tokens?)\)",
        )
        .expect("valid regex")
    })
}

fn statusline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([^\]]+)\]\s+ctx:\d+%\s+\$(\d+\.?\d*)").expect("valid regex")
    })
}

/// Titles that are shell-prompt noise, not a real task name.
const SHELL_TITLES: &[&str] = &["bash", "zsh", "sh", "tmux"];

/// Parse agent runtime state out of a captured pane buffer and (optionally)
/// its title. Returns a partially-populated struct on parse failure — the
/// caller must not infer "healthy" from the absence of a signal, only from
/// the absence of a warning.
pub fn parse_status(pane_content: &str, pane_title: Option<&str>) -> ClaudeStatus {
    let mut status = ClaudeStatus::default();

    if let Some(caps) = context_low_re().captures(pane_content) {
        if let Ok(remaining) = caps[1].parse::<u8>() {
            status.context_remaining = Some(remaining);
            status.context_percent_used = Some(100u8.saturating_sub(remaining));
            status.context_warning = true;
            status.context_full = remaining == 0;
        }
    }

    if let Some(caps) = task_line_re().captures(pane_content) {
        status.active_task = Some(caps["task"].trim().to_string());
        status.elapsed_time = Some(caps["elapsed"].trim().to_string());
        status.token_count = Some(caps["tokens"].trim().to_string());
    }

    status.is_thinking = pane_content.contains("· thinking)") || pane_content.contains("· thinking");

    if let Some(caps) = statusline_re().captures(pane_content) {
        status.model = Some(caps[1].to_string());
        status.cost_usd = caps[2].parse::<f64>().ok();
    }

    status.last_task = pane_title.and_then(clean_title);

    status
}

/// Strip a single leading non-alphanumeric icon character and discard
/// shell-prompt noise titles.
fn clean_title(title: &str) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut chars = trimmed.chars();
    let first = chars.next()?;
    let cleaned = if first.is_alphanumeric() {
        trimmed.to_string()
    } else {
        chars.as_str().trim_start().to_string()
    };

    if cleaned.is_empty() || SHELL_TITLES.contains(&cleaned.as_str()) {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_low_sets_warning_and_percent_used() {
        let status = parse_status("some output\nContext low (8% remaining)\n", None);
        assert!(status.context_warning);
        assert_eq!(status.context_remaining, Some(8));
        assert_eq!(status.context_percent_used, Some(92));
        assert!(!status.context_full);
    }

    #[test]
    fn zero_remaining_is_context_full() {
        let status = parse_status("Context low (0% remaining)", None);
        assert!(status.context_full);
    }

    #[test]
    fn task_line_matches_esc_to_interrupt_variant() {
        let line = "✶ Pondering… (esc to interrupt · 2m 14s · ↓ 3.2k tokens)";
        let status = parse_status(line, None);
        assert_eq!(status.active_task.as_deref(), Some("✶ Pondering…"));
        assert_eq!(status.elapsed_time.as_deref(), Some("2m 14s"));
        assert_eq!(status.token_count.as_deref(), Some("3.2k tokens"));
    }

    #[test]
    fn task_line_matches_ctrl_c_to_interrupt_variant() {
        let line = "Building… (ctrl+c to interrupt · 45s · ↓ 512 tokens)";
        let status = parse_status(line, None);
        assert_eq!(status.active_task.as_deref(), Some("Building…"));
    }

    #[test]
    fn thinking_fallback_is_detected() {
        let status = parse_status("✻ Marinating… (· thinking)", None);
        assert!(status.is_thinking);
    }

    #[test]
    fn statusline_never_sets_context_percent_used() {
        let status = parse_status("[sonnet-4.5] ctx:42% $1.37", None);
        assert_eq!(status.model.as_deref(), Some("sonnet-4.5"));
        assert_eq!(status.cost_usd, Some(1.37));
        assert_eq!(status.context_percent_used, None);
    }

    #[test]
    fn title_strips_leading_icon_and_preserves_text() {
        assert_eq!(clean_title("🔧 email-triage").as_deref(), Some("email-triage"));
    }

    #[test]
    fn title_discards_shell_prompt_noise() {
        assert_eq!(clean_title("zsh"), None);
        assert_eq!(clean_title("bash"), None);
    }

    #[test]
    fn parse_failure_yields_no_warning_not_false_healthy() {
        let status = parse_status("nothing interesting here", None);
        assert!(!status.context_warning);
        assert_eq!(status.context_percent_used, None);
    }
}
