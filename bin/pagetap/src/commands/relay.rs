use pagetap_client::{
    run_indicator, watch_settings, ConsoleRecorder, RelaySession, TracingIndicator,
};
use pagetap_core::{LogLevel, Paths};
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast;
use tracing::info;

/// Relay stdin lines to the capture server as console events. Keeps
/// reconnecting for as long as the producer lives; events generated while
/// offline are queued and flushed on the next connect.
pub async fn run(level: &str, source: &str) -> anyhow::Result<()> {
    let level = LogLevel::from_str(level).unwrap_or(LogLevel::Log);

    let paths = Paths::new();
    paths.ensure_dirs()?;
    let settings_path = paths.client_settings_file();

    let session = RelaySession::open(&settings_path);
    let recorder = ConsoleRecorder::new(session.handle()).with_source(source);
    let state_rx = session.state_watch();

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let (_watcher, settings_changed) = watch_settings(&settings_path)?;

    let session_task = tokio::spawn(session.run_loop(shutdown_tx.subscribe(), settings_changed));
    let indicator_task = tokio::spawn(run_indicator(
        state_rx,
        TracingIndicator,
        shutdown_tx.subscribe(),
    ));

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => record(&recorder, level, line),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("relay input ended");
    let _ = shutdown_tx.send(());
    let _ = session_task.await;
    let _ = indicator_task.await;
    Ok(())
}

fn record<S: pagetap_client::EventSink>(
    recorder: &ConsoleRecorder<S>,
    level: LogLevel,
    line: String,
) {
    let args = vec![serde_json::Value::String(line)];
    match level {
        LogLevel::Log => recorder.log(args),
        LogLevel::Warn => recorder.warn(args),
        LogLevel::Error => recorder.error(args),
        LogLevel::Info => recorder.info(args),
        LogLevel::Debug => recorder.debug(args),
    }
}
