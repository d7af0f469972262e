//! Deterministic, side-effect-free rendering of event sequences.
//!
//! Every function here is a pure transformation from a slice of events to a
//! string; file writing and console output stay with the callers.

use pagetap_core::{EventKind, LogEvent, LogLevel, UNSERIALIZABLE};
use serde_json::json;

mod agents;

pub use agents::AgentTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    #[default]
    Json,
    Text,
    Structured,
}

impl RenderFormat {
    /// Unknown names fall back to `Json`.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "text" => RenderFormat::Text,
            "structured" => RenderFormat::Structured,
            _ => RenderFormat::Json,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderFormat::Json => "json",
            RenderFormat::Text => "text",
            RenderFormat::Structured => "structured",
        }
    }
}

pub struct Renderer {
    format: RenderFormat,
}

impl Renderer {
    pub fn new(format: RenderFormat) -> Self {
        Self { format }
    }

    pub fn from_name(name: &str) -> Self {
        Self::new(RenderFormat::from_name(name))
    }

    pub fn format(&self, logs: &[LogEvent]) -> String {
        match self.format {
            RenderFormat::Json => format_json(logs),
            RenderFormat::Text => format_text(logs),
            RenderFormat::Structured => format_structured(logs),
        }
    }

    /// Single-event rendering mirroring the multi-event mode.
    pub fn format_single(&self, log: &LogEvent) -> String {
        match self.format {
            RenderFormat::Json => pretty(&json!(log)),
            RenderFormat::Text => format_text_single(log),
            RenderFormat::Structured => pretty(&json!({
                "level": log.level.as_str(),
                "message": log.message,
                "timestamp": iso_timestamp(log.timestamp),
                "source": log.url.as_deref().unwrap_or("unknown"),
                "has_stack": log.stack.is_some(),
                "type": log.kind.as_str(),
            })),
        }
    }
}

/// Serialize with the fixed sentinel fallback so one bad value never aborts
/// a whole render.
fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| UNSERIALIZABLE.to_string())
}

fn iso_timestamp(ms: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_else(|| ms.to_string())
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn format_json(logs: &[LogEvent]) -> String {
    pretty(&json!({
        "metadata": {
            "total_logs": logs.len(),
            "timestamp": now_iso(),
            "format": "json",
        },
        "logs": logs,
    }))
}

fn format_text(logs: &[LogEvent]) -> String {
    let mut lines = Vec::new();
    lines.push(format!("=== Captured Console Logs ({} entries) ===", logs.len()));
    lines.push(format!("Generated: {}", now_iso()));
    lines.push(String::new());

    for log in logs {
        lines.push(format_text_single(log));
        lines.push("---".to_string());
    }

    lines.join("\n")
}

fn format_text_single(log: &LogEvent) -> String {
    let mut output = format!(
        "[{}] {:<5}: {}",
        iso_timestamp(log.timestamp),
        log.level.as_str().to_uppercase(),
        log.message
    );

    if let Some(url) = &log.url {
        let line = log
            .line_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        let column = log
            .column_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        output.push_str(&format!("\n  Source: {}:{}:{}", url, line, column));
    }

    if let Some(head) = log.stack_head() {
        output.push_str(&format!("\n  Stack: {}", head));
    }

    output
}

fn format_structured(logs: &[LogEvent]) -> String {
    let critical_issues: Vec<_> = logs
        .iter()
        .filter(|l| l.level == LogLevel::Error)
        .map(|l| {
            json!({
                "message": l.message,
                "source": l.url.as_deref().unwrap_or("unknown"),
                "stack": l.stack_head(),
            })
        })
        .collect();

    let warnings: Vec<_> = logs
        .iter()
        .filter(|l| l.level == LogLevel::Warn)
        .map(|l| {
            json!({
                "message": l.message,
                "source": l.url.as_deref().unwrap_or("unknown"),
            })
        })
        .collect();

    let recent_activity: Vec<_> = last_n(logs, 10)
        .iter()
        .map(|l| {
            json!({
                "level": l.level.as_str(),
                "message": truncate(&l.message, 100),
                "timestamp": iso_timestamp(l.timestamp),
            })
        })
        .collect();

    pretty(&json!({
        "summary": {
            "total": logs.len(),
            "errors": count_level(logs, LogLevel::Error),
            "warnings": count_level(logs, LogLevel::Warn),
            "info": logs.iter().filter(|l| matches!(l.level, LogLevel::Log | LogLevel::Info)).count(),
            "network_issues": logs.iter().filter(|l| l.kind == EventKind::Network).count(),
            "timestamp": now_iso(),
        },
        "critical_issues": critical_issues,
        "warnings": warnings,
        "recent_activity": recent_activity,
    }))
}

fn count_level(logs: &[LogEvent], level: LogLevel) -> usize {
    logs.iter().filter(|l| l.level == level).count()
}

fn last_n(logs: &[LogEvent], n: usize) -> &[LogEvent] {
    &logs[logs.len().saturating_sub(n)..]
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Ordered hints derived from the event mix. Each condition contributes its
/// fixed lines independently; no events of interest yields an empty list.
pub fn suggestions(logs: &[LogEvent]) -> Vec<String> {
    let mut out = Vec::new();

    if logs.iter().any(|l| l.level == LogLevel::Error) {
        out.push("Focus on resolving the console errors first".to_string());
        out.push("Check for runtime exceptions and fix syntax issues".to_string());
    }

    if logs.iter().any(|l| l.level == LogLevel::Warn) {
        out.push("Review console warnings for potential performance issues".to_string());
    }

    if logs.iter().any(|l| l.kind == EventKind::Network) {
        out.push("Check network requests and API endpoints".to_string());
    }

    out
}

/// The agent-info document served by the query interface and the CLI.
pub fn agent_info(logs: &[LogEvent], agent: &str) -> serde_json::Value {
    let stack_traces: Vec<_> = logs.iter().filter_map(|l| l.stack.clone()).collect();

    json!({
        "timestamp": now_iso(),
        "agent": agent,
        "console_data": {
            "errors": logs.iter().filter(|l| l.level == LogLevel::Error).collect::<Vec<_>>(),
            "warnings": logs.iter().filter(|l| l.level == LogLevel::Warn).collect::<Vec<_>>(),
            "logs": logs.iter().filter(|l| l.level == LogLevel::Log).collect::<Vec<_>>(),
            "network_errors": logs.iter().filter(|l| l.kind == EventKind::Network).collect::<Vec<_>>(),
            "stack_traces": stack_traces,
        },
        "suggestions": suggestions(logs),
    })
}

/// Render for a named agent target; unrecognized names fall back to the
/// structured rendering.
pub fn render_for_agent(logs: &[LogEvent], agent: &str) -> String {
    match AgentTarget::from_name(agent) {
        Some(target) => agents::render(logs, target),
        None => format_structured(logs),
    }
}
