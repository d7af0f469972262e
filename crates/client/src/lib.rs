//! Transport client: captures diagnostic events at the origin and delivers
//! them to the ingest endpoint despite an unreliable or absent connection.
//!
//! Interception is isolated behind the [`EventSink`] adapter so the
//! reconnection and queuing logic stays independent of how events are
//! produced (console hooks, runtime logging hooks, test drivers).

pub mod indicator;
pub mod recorder;
pub mod session;
pub mod settings;

pub use indicator::{run_indicator, IndicatorSink, TracingIndicator};
pub use recorder::{ConsoleRecorder, EventSink};
pub use session::{ConnectionState, RelaySession, SessionHandle};
pub use settings::{watch_settings, SettingsWatcher};
