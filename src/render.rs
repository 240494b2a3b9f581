//! Terminal and JSON output of a `MetricSet`.

use crate::metrics::MetricSet;
use chrono::{DateTime, Duration, Utc};
use std::fmt::Write;

const NOT_AVAILABLE: &str = "n/a";
const STAMP_FORMAT: &str = "%b %e %H:%M:%S";

pub fn render_json(metrics: &MetricSet) -> serde_json::Result<String> {
    serde_json::to_string_pretty(metrics)
}

/// Renders the report as aligned `label  value` sections.
pub fn render_text(metrics: &MetricSet) -> String {
    let health = &metrics.community_health;
    let efficiency = &metrics.team_efficiency;

    let mut community = vec![
        ("RFCs from external contributors".to_string(), health.external_rfcs.to_string()),
        ("PRs from external contributors".to_string(), health.external_prs.to_string()),
    ];
    if let Some(issues) = health.external_issues {
        community.push(("Issues from external contributors".to_string(), issues.to_string()));
    }

    let team = vec![
        (
            "Count of RFC + PR reviews by team members".to_string(),
            efficiency.internal_reviews.to_string(),
        ),
        (
            "Median response time to RFC + PR".to_string(),
            format_optional_duration(efficiency.median_response_rfc_pr),
        ),
        (
            "Median response time to issues".to_string(),
            format_optional_duration(efficiency.median_response_issues),
        ),
        (
            "Average response time to RFC + PR + issues".to_string(),
            format_optional_duration(efficiency.average_response),
        ),
        (
            "Percentage of \"good-first-issues\"".to_string(),
            efficiency
                .good_first_issue_percentage
                .map_or_else(|| NOT_AVAILABLE.to_string(), |p| format!("{p:.2}%")),
        ),
    ];

    let footer = vec![
        ("from:".to_string(), format_stamp(metrics.window.from)),
        (
            "to:".to_string(),
            metrics.window.to.map_or_else(|| "now".to_string(), format_stamp),
        ),
    ];

    let mut out = String::new();
    out.push_str("Community Health\n");
    out.push_str(&columns(&community));
    out.push_str("\nTeam Efficiency\n");
    out.push_str(&columns(&team));
    out.push('\n');
    out.push_str(&columns(&footer));
    out
}

fn columns(rows: &[(String, String)]) -> String {
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    rows.iter().fold(String::new(), |mut out, (label, value)| {
        let _ = writeln!(out, "{label:<width$}  {value}");
        out
    })
}

fn format_stamp(at: DateTime<Utc>) -> String {
    at.format(STAMP_FORMAT).to_string()
}

fn format_optional_duration(duration: Option<Duration>) -> String {
    duration.map_or_else(|| NOT_AVAILABLE.to_string(), format_duration)
}

/// Formats as `1d 2h 3m 4s`, dropping leading zero units.
pub fn format_duration(duration: Duration) -> String {
    let sign = if duration < Duration::zero() { "-" } else { "" };
    let total = duration.num_seconds().unsigned_abs();
    let (days, hours, minutes, seconds) = (
        total / 86_400,
        total % 86_400 / 3_600,
        total % 3_600 / 60,
        total % 60,
    );

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if days > 0 || hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if days > 0 || hours > 0 || minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{seconds}s"));

    format!("{sign}{}", parts.join(" "))
}
