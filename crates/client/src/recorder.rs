use pagetap_core::event::{render_args, safe_clone_args};
use pagetap_core::{EventKind, LogEvent, LogLevel};
use tracing::{debug, error, info, warn};

/// The narrow instrumentation boundary: capture produces events, something
/// else delivers them.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LogEvent);
}

impl<S: EventSink + ?Sized> EventSink for std::sync::Arc<S> {
    fn emit(&self, event: LogEvent) {
        (**self).emit(event)
    }
}

/// Captures console-style output, exceptions, and network outcomes as
/// events. Every entry point passes through to the process's own logging
/// before emitting, so capture never suppresses normal output.
pub struct ConsoleRecorder<S: EventSink> {
    sink: S,
    source: String,
    page_url: Option<String>,
}

impl<S: EventSink> ConsoleRecorder<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            source: "client".to_string(),
            page_url: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = Some(url.into());
        self
    }

    pub fn log(&self, args: Vec<serde_json::Value>) {
        self.record(LogLevel::Log, args);
    }

    pub fn warn(&self, args: Vec<serde_json::Value>) {
        self.record(LogLevel::Warn, args);
    }

    pub fn error(&self, args: Vec<serde_json::Value>) {
        self.record(LogLevel::Error, args);
    }

    pub fn info(&self, args: Vec<serde_json::Value>) {
        self.record(LogLevel::Info, args);
    }

    pub fn debug(&self, args: Vec<serde_json::Value>) {
        self.record(LogLevel::Debug, args);
    }

    fn record(&self, level: LogLevel, args: Vec<serde_json::Value>) {
        let message = render_args(&args);
        self.passthrough(level, &message);

        let mut event = LogEvent::new(level, message);
        event.args = safe_clone_args(args);
        self.finish(event);
    }

    /// An unhandled error or rejection observed by the host.
    pub fn record_exception(
        &self,
        message: impl Into<String>,
        stack: Option<String>,
        line_number: Option<u32>,
        column_number: Option<u32>,
    ) {
        let message = message.into();
        self.passthrough(LogLevel::Error, &message);

        let mut event = LogEvent::new(LogLevel::Error, message);
        event.kind = EventKind::Exception;
        event.stack = stack;
        event.line_number = line_number;
        event.column_number = column_number;
        self.finish(event);
    }

    /// Outcome of one network request. All activity is recorded; failures
    /// (transport error or status >= 400) at error level, the rest at log.
    pub fn record_network(
        &self,
        method: &str,
        url: &str,
        status: Option<u16>,
        status_text: Option<&str>,
        duration_ms: u64,
    ) {
        let failed = status.map(|s| s >= 400).unwrap_or(true);
        let level = if failed { LogLevel::Error } else { LogLevel::Log };
        let message = match status {
            Some(s) if failed => {
                format!("Network Error: {} {} - {}", s, status_text.unwrap_or(""), url)
            }
            Some(s) => format!("Network: {} {} - {}", s, status_text.unwrap_or(""), url),
            None => format!("Network Error: request failed - {}", url),
        };
        self.passthrough(level, &message);

        let mut event = LogEvent::new(level, message);
        event.kind = EventKind::Network;
        event.url = Some(url.to_string());
        event.method = Some(method.to_string());
        event.status = status;
        event.status_text = status_text.map(|s| s.to_string());
        event.duration = Some(duration_ms);
        self.sink.emit(event);
    }

    fn finish(&self, mut event: LogEvent) {
        event.source = Some(self.source.clone());
        if event.url.is_none() {
            event.url = self.page_url.clone();
        }
        self.sink.emit(event);
    }

    /// The original output still happens; capture only observes.
    fn passthrough(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Log | LogLevel::Info => info!(target: "pagetap::capture", "{}", message),
            LogLevel::Warn => warn!(target: "pagetap::capture", "{}", message),
            LogLevel::Error => error!(target: "pagetap::capture", "{}", message),
            LogLevel::Debug => debug!(target: "pagetap::capture", "{}", message),
        }
    }
}
