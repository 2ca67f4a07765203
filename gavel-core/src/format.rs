//! Formatting helpers shared across views.

use chrono::{DateTime, Utc};

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%b %d").to_string()
    }
}

/// Format an optional mean latency, or an em dash if no responses recorded it.
pub fn format_latency(value: Option<f64>) -> String {
    match value {
        Some(ms) => format!("{:.0} ms", ms),
        None => "—".to_string(),
    }
}

/// Format the weighted agreement percentage, or "pending" before any verdict.
pub fn format_agreement(value: Option<f64>) -> String {
    match value {
        Some(pct) => format!("{:.0}%", pct),
        None => "pending".to_string(),
    }
}

/// Format the max observed context size, or "n/a" when never reported.
pub fn format_context_tokens(value: Option<i64>) -> String {
    match value {
        Some(tokens) => format!("{} tok", tokens),
        None => "n/a".to_string(),
    }
}

/// Return a trimmed preview string suitable for single-line display.
pub fn truncate_preview(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let trimmed: String = text.chars().take(limit.saturating_sub(1)).collect();
    format!("{}…", trimmed.trim_end())
}
