//! Agent-targeted renderings: a fixed set of targets, each a pure function
//! of the event sequence.

use pagetap_core::{LogEvent, LogLevel};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentTarget {
    Cursor,
    Claude,
    Copilot,
    Windsurfer,
}

impl AgentTarget {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "cursor" => Some(AgentTarget::Cursor),
            "claude" => Some(AgentTarget::Claude),
            "copilot" => Some(AgentTarget::Copilot),
            "windsurfer" => Some(AgentTarget::Windsurfer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentTarget::Cursor => "cursor",
            AgentTarget::Claude => "claude",
            AgentTarget::Copilot => "copilot",
            AgentTarget::Windsurfer => "windsurfer",
        }
    }
}

pub(crate) fn render(logs: &[LogEvent], target: AgentTarget) -> String {
    match target {
        AgentTarget::Cursor => render_cursor(logs),
        AgentTarget::Claude => render_claude(logs),
        AgentTarget::Copilot => render_copilot(logs),
        AgentTarget::Windsurfer => render_windsurfer(logs),
    }
}

fn errors(logs: &[LogEvent]) -> Vec<&LogEvent> {
    logs.iter().filter(|l| l.level == LogLevel::Error).collect()
}

fn warnings(logs: &[LogEvent]) -> Vec<&LogEvent> {
    logs.iter().filter(|l| l.level == LogLevel::Warn).collect()
}

fn render_cursor(logs: &[LogEvent]) -> String {
    super::pretty(&json!({
        "context": "browser_console_logs",
        "errors": errors(logs),
        "warnings": warnings(logs),
        "suggestions": [
            "Focus on console errors first",
            "Check for undefined variables and missing imports",
            "Review network errors for API issues",
        ],
    }))
}

fn render_claude(logs: &[LogEvent]) -> String {
    let error_logs = errors(logs);
    let warning_logs = warnings(logs);

    let critical: Vec<String> = error_logs
        .iter()
        .map(|l| match l.stack_head() {
            Some(head) => format!("- {}\n  Stack: {}", l.message, head),
            None => format!("- {}", l.message),
        })
        .collect();
    let warns: Vec<String> = warning_logs.iter().map(|l| format!("- {}", l.message)).collect();

    format!(
        "## Browser Console Analysis\n\n\
         ### Summary\n\
         - Total logs: {}\n\
         - Errors: {}\n\
         - Warnings: {}\n\n\
         ### Critical Issues\n{}\n\n\
         ### Warnings\n{}\n\n\
         ### Raw Data\n{}",
        logs.len(),
        error_logs.len(),
        warning_logs.len(),
        critical.join("\n"),
        warns.join("\n"),
        super::pretty(&json!(logs)),
    )
}

fn render_copilot(logs: &[LogEvent]) -> String {
    let recent = &logs[logs.len().saturating_sub(5)..];
    super::pretty(&json!({
        "developer_context": {
            "console_errors": errors(logs),
            "console_warnings": warnings(logs),
            "recent_logs": recent,
            "timestamp": super::now_iso(),
        },
    }))
}

fn render_windsurfer(logs: &[LogEvent]) -> String {
    super::pretty(&json!({
        "browser_state": {
            "console_logs": logs,
            "error_count": errors(logs).len(),
            "warning_count": warnings(logs).len(),
            "last_updated": super::now_iso(),
            "needs_attention": logs.iter().any(|l| l.level == LogLevel::Error),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(level: LogLevel, message: &str) -> LogEvent {
        LogEvent::new(level, message)
    }

    #[test]
    fn test_target_names() {
        assert_eq!(AgentTarget::from_name("Claude"), Some(AgentTarget::Claude));
        assert_eq!(AgentTarget::from_name("vim"), None);
    }

    #[test]
    fn test_cursor_shape() {
        let logs = vec![event(LogLevel::Error, "boom")];
        let rendered = render(&logs, AgentTarget::Cursor);
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["context"], "browser_console_logs");
        assert_eq!(parsed["errors"].as_array().unwrap().len(), 1);
        assert_eq!(parsed["suggestions"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_claude_report_mentions_issues() {
        let mut err = event(LogLevel::Error, "x is not defined");
        err.stack = Some("ReferenceError: x is not defined\n    at app.js:1".to_string());
        let logs = vec![err, event(LogLevel::Warn, "slow render")];

        let rendered = render(&logs, AgentTarget::Claude);
        assert!(rendered.contains("## Browser Console Analysis"));
        assert!(rendered.contains("- Errors: 1"));
        assert!(rendered.contains("- x is not defined\n  Stack: ReferenceError"));
        assert!(rendered.contains("- slow render"));
    }

    #[test]
    fn test_windsurfer_needs_attention() {
        let rendered = render(&[event(LogLevel::Log, "fine")], AgentTarget::Windsurfer);
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["browser_state"]["needs_attention"], false);

        let rendered = render(&[event(LogLevel::Error, "bad")], AgentTarget::Windsurfer);
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["browser_state"]["needs_attention"], true);
    }

    #[test]
    fn test_copilot_recent_window() {
        let logs: Vec<LogEvent> = (0..8)
            .map(|i| event(LogLevel::Log, &format!("msg-{}", i)))
            .collect();
        let rendered = render(&logs, AgentTarget::Copilot);
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        let recent = parsed["developer_context"]["recent_logs"].as_array().unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0]["message"], "msg-3");
    }
}
