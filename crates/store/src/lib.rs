use pagetap_core::{Error, EventKind, LogEvent, LogLevel, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Retention bound: the store never holds more than this many events.
pub const MAX_LOGS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub logs: usize,
    pub network_errors: usize,
}

/// Append-only, size-bounded, durable event log.
///
/// The whole sequence is persisted as one JSON document at a fixed path,
/// overwritten on every mutation, and re-read before each full read so
/// writes from other processes are observed. One store instance owns one
/// backing file; mutations are serialized by the internal lock.
pub struct EventStore {
    path: PathBuf,
    logs: Mutex<Vec<LogEvent>>,
}

impl EventStore {
    /// Opens the store at `path`, loading any existing document. A missing
    /// or unparseable file starts the store empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let logs = Self::load(&path);
        Self {
            path,
            logs: Mutex::new(logs),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Vec<LogEvent> {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default()
    }

    fn persist(path: &Path, logs: &[LogEvent]) -> Result<()> {
        let data = serde_json::to_string_pretty(logs)?;
        std::fs::write(path, data)
            .map_err(|e| Error::Storage(format!("failed to persist {}: {}", path.display(), e)))
    }

    /// Appends one event, truncates to the most recent `MAX_LOGS` entries,
    /// and persists the remaining sequence. A persistence failure is
    /// returned to the caller; the in-memory append is kept.
    pub fn add_log(&self, mut event: LogEvent) -> Result<()> {
        event.ensure_id();
        let mut logs = self.logs.lock().unwrap();
        logs.push(event);
        if logs.len() > MAX_LOGS {
            let surplus = logs.len() - MAX_LOGS;
            logs.drain(..surplus);
        }
        Self::persist(&self.path, &logs)
    }

    /// Reloads from the backing file (observing external writers), then
    /// returns the full in-order sequence.
    pub fn current_logs(&self) -> Vec<LogEvent> {
        let mut logs = self.logs.lock().unwrap();
        *logs = Self::load(&self.path);
        logs.clone()
    }

    pub fn logs_by_level(&self, level: LogLevel) -> Vec<LogEvent> {
        let logs = self.logs.lock().unwrap();
        logs.iter().filter(|l| l.level == level).cloned().collect()
    }

    /// Events with `start <= timestamp <= end`, inclusive on both ends.
    pub fn logs_by_time_range(&self, start: i64, end: i64) -> Vec<LogEvent> {
        let logs = self.logs.lock().unwrap();
        logs.iter()
            .filter(|l| l.timestamp >= start && l.timestamp <= end)
            .cloned()
            .collect()
    }

    /// Empties the sequence and persists the empty state.
    pub fn clear_logs(&self) -> Result<()> {
        let mut logs = self.logs.lock().unwrap();
        logs.clear();
        Self::persist(&self.path, &logs)
    }

    pub fn stats(&self) -> StoreStats {
        let logs = self.logs.lock().unwrap();
        StoreStats {
            total: logs.len(),
            errors: logs.iter().filter(|l| l.level == LogLevel::Error).count(),
            warnings: logs.iter().filter(|l| l.level == LogLevel::Warn).count(),
            logs: logs.iter().filter(|l| l.level == LogLevel::Log).count(),
            network_errors: logs.iter().filter(|l| l.kind == EventKind::Network).count(),
        }
    }

    /// Manual injection for testing a pipeline without a live producer.
    pub fn simulate_console_log(&self, message: &str, level: LogLevel) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let event = LogEvent {
            id: format!("sim-{}", timestamp),
            args: vec![serde_json::Value::String(message.to_string())],
            source: Some("simulator".to_string()),
            ..LogEvent::new(level, message)
        };
        self.add_log(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (EventStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = EventStore::open(dir.path().join("logs.json"));
        (store, dir)
    }

    fn event(level: LogLevel, message: &str) -> LogEvent {
        LogEvent::new(level, message)
    }

    #[test]
    fn test_append_order_preserved() {
        let (store, _dir) = test_store();
        for i in 0..50 {
            store.add_log(event(LogLevel::Log, &format!("msg-{}", i))).unwrap();
        }
        let logs = store.current_logs();
        assert_eq!(logs.len(), 50);
        for (i, log) in logs.iter().enumerate() {
            assert_eq!(log.message, format!("msg-{}", i));
        }
    }

    #[test]
    fn test_retention_bound() {
        let (store, _dir) = test_store();
        for i in 0..(MAX_LOGS + 25) {
            store.add_log(event(LogLevel::Log, &format!("msg-{}", i))).unwrap();
        }
        let logs = store.current_logs();
        assert_eq!(logs.len(), MAX_LOGS);
        // The 25 oldest are gone, relative order of the rest intact.
        assert_eq!(logs[0].message, "msg-25");
        assert_eq!(logs[MAX_LOGS - 1].message, format!("msg-{}", MAX_LOGS + 24));
    }

    #[test]
    fn test_clear() {
        let (store, _dir) = test_store();
        for _ in 0..10 {
            store.add_log(event(LogLevel::Error, "boom")).unwrap();
        }
        store.clear_logs().unwrap();
        assert!(store.current_logs().is_empty());
    }

    #[test]
    fn test_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");

        let store = EventStore::open(&path);
        store.add_log(event(LogLevel::Warn, "first")).unwrap();
        store.add_log(event(LogLevel::Error, "second")).unwrap();
        let before = store.current_logs();
        drop(store);

        // Simulated process restart.
        let reopened = EventStore::open(&path);
        let after = reopened.current_logs();
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(after.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.message, b.message);
        }
    }

    #[test]
    fn test_external_writer_observed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs.json");

        let writer = EventStore::open(&path);
        let reader = EventStore::open(&path);
        writer.add_log(event(LogLevel::Log, "from writer")).unwrap();

        let seen = reader.current_logs();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].message, "from writer");
    }

    #[test]
    fn test_filters() {
        let (store, _dir) = test_store();
        let mut early = event(LogLevel::Error, "early");
        early.timestamp = 100;
        let mut late = event(LogLevel::Log, "late");
        late.timestamp = 200;
        store.add_log(early).unwrap();
        store.add_log(late).unwrap();

        let errors = store.logs_by_level(LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "early");

        // Inclusive on both bounds.
        assert_eq!(store.logs_by_time_range(100, 200).len(), 2);
        assert_eq!(store.logs_by_time_range(101, 200).len(), 1);
        assert_eq!(store.logs_by_time_range(100, 199).len(), 1);
    }

    #[test]
    fn test_stats() {
        let (store, _dir) = test_store();
        store.add_log(event(LogLevel::Error, "e")).unwrap();
        store.add_log(event(LogLevel::Warn, "w")).unwrap();
        store.add_log(event(LogLevel::Log, "l")).unwrap();
        let mut net = event(LogLevel::Error, "GET /api 500");
        net.kind = EventKind::Network;
        store.add_log(net).unwrap();

        let stats = store.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.warnings, 1);
        assert_eq!(stats.logs, 1);
        assert_eq!(stats.network_errors, 1);
    }

    #[test]
    fn test_assigns_missing_id() {
        let (store, _dir) = test_store();
        store.add_log(event(LogLevel::Log, "anonymous")).unwrap();
        let logs = store.current_logs();
        assert!(!logs[0].id.is_empty());
    }

    #[test]
    fn test_simulated_log() {
        let (store, _dir) = test_store();
        store.simulate_console_log("hello", LogLevel::Log).unwrap();
        let logs = store.current_logs();
        assert_eq!(logs[0].source.as_deref(), Some("simulator"));
        assert!(logs[0].id.starts_with("sim-"));
    }
}
