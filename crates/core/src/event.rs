use serde::{Deserialize, Serialize};

/// Sentinel substituted for argument values that cannot be serialized.
pub const UNSERIALIZABLE: &str = "[Unserializable]";

/// Severity of a captured event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Warn,
    Error,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Log => "log",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "log" => Some(LogLevel::Log),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

/// What produced the event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[default]
    Console,
    Network,
    Exception,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Console => "console",
            EventKind::Network => "network",
            EventKind::Exception => "exception",
        }
    }
}

/// One captured diagnostic occurrence: console output, an unhandled error,
/// or the outcome of a network request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// Producer-generated unique id; assigned on append when empty.
    #[serde(default)]
    pub id: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(rename = "type", default)]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    /// Request duration in milliseconds (network events only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            level,
            message: message.into(),
            args: vec![],
            kind: EventKind::Console,
            source: None,
            url: None,
            line_number: None,
            column_number: None,
            stack: None,
            method: None,
            status: None,
            status_text: None,
            duration: None,
        }
    }

    /// Console event from a list of arguments, with the message rendered
    /// per the joining rules of `render_args`.
    pub fn console(level: LogLevel, args: Vec<serde_json::Value>) -> Self {
        let mut event = Self::new(level, render_args(&args));
        event.args = safe_clone_args(args);
        event
    }

    /// Assign the `<epoch-ms>-<suffix>` id when none is present.
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = generate_id(self.timestamp);
        }
    }

    /// First line of the stack trace, if any.
    pub fn stack_head(&self) -> Option<&str> {
        self.stack.as_deref().and_then(|s| s.lines().next())
    }
}

/// Timestamp plus a short random suffix, matching the producer-side id shape.
pub fn generate_id(timestamp_ms: i64) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", timestamp_ms, &suffix[..9])
}

/// Render an argument list into one human-readable message: objects and
/// arrays JSON-stringified, primitives coerced to text, joined by spaces.
pub fn render_args(args: &[serde_json::Value]) -> String {
    args.iter()
        .map(|arg| match arg {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                serde_json::to_string_pretty(arg).unwrap_or_else(|_| UNSERIALIZABLE.to_string())
            }
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deep-clone argument values, substituting the sentinel for anything that
/// fails to round-trip through JSON.
pub fn safe_clone_args(args: Vec<serde_json::Value>) -> Vec<serde_json::Value> {
    args.into_iter()
        .map(|arg| {
            match serde_json::to_string(&arg)
                .ok()
                .and_then(|s| serde_json::from_str(&s).ok())
            {
                Some(clone) => clone,
                None => serde_json::Value::String(UNSERIALIZABLE.to_string()),
            }
        })
        .collect()
}
