use futures::{SinkExt, StreamExt};
use pagetap_core::{ClientSettings, LogEvent};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info};

use crate::recorder::EventSink;

/// Backoff after the server closed the channel cleanly.
pub const RECONNECT_AFTER_CLOSE: Duration = Duration::from_millis(3000);
/// Backoff after a failed connection attempt or transport error.
pub const RECONNECT_AFTER_ERROR: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

/// Cheap handle producers use to feed events into the session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<LogEvent>,
}

impl EventSink for SessionHandle {
    fn emit(&self, event: LogEvent) {
        // Session gone means the page is unloading; drop silently.
        let _ = self.tx.send(event);
    }
}

enum Disconnect {
    Clean,
    Errored,
    Shutdown,
    Reload,
}

enum Idle {
    Elapsed,
    Shutdown,
    Reload,
}

/// One relay session: owns the connection state machine, the FIFO queue of
/// undelivered events, and the settings it connects with. There is exactly
/// one connection attempt in flight at any time; reconnection is
/// unconditional and indefinite.
pub struct RelaySession {
    settings_path: PathBuf,
    settings: ClientSettings,
    queue: VecDeque<LogEvent>,
    events: mpsc::UnboundedReceiver<LogEvent>,
    handle_tx: mpsc::UnboundedSender<LogEvent>,
    state_tx: watch::Sender<ConnectionState>,
    http: reqwest::Client,
}

impl RelaySession {
    /// Loads settings from `settings_path`; missing settings fall back to
    /// the localhost defaults.
    pub fn open(settings_path: impl Into<PathBuf>) -> Self {
        let settings_path = settings_path.into();
        let settings = ClientSettings::load(&settings_path);
        Self::with_settings(settings, settings_path)
    }

    pub fn with_settings(settings: ClientSettings, settings_path: impl Into<PathBuf>) -> Self {
        let (handle_tx, events) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            settings_path: settings_path.into(),
            settings,
            queue: VecDeque::new(),
            events,
            handle_tx,
            state_tx,
            http: reqwest::Client::new(),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.handle_tx.clone(),
        }
    }

    /// Observe connection-state changes (used by the status indicator).
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send(state);
    }

    /// Runs until shutdown. `settings_changed` signals (from the settings
    /// watcher) tear down the current connection and start a fresh
    /// connecting cycle with reloaded settings.
    pub async fn run_loop(
        mut self,
        mut shutdown: broadcast::Receiver<()>,
        mut settings_changed: mpsc::Receiver<()>,
    ) {
        info!(url = %self.settings.server_url, "relay session starting");

        loop {
            self.set_state(ConnectionState::Connecting);
            let outcome = self.connect_and_run(&mut shutdown, &mut settings_changed).await;
            self.set_state(ConnectionState::Disconnected);

            let backoff = match outcome {
                Disconnect::Shutdown => break,
                Disconnect::Reload => {
                    self.reload_settings();
                    continue;
                }
                Disconnect::Clean => RECONNECT_AFTER_CLOSE,
                Disconnect::Errored => RECONNECT_AFTER_ERROR,
            };

            match self.idle(backoff, &mut shutdown, &mut settings_changed).await {
                Idle::Elapsed => {}
                Idle::Shutdown => break,
                Idle::Reload => self.reload_settings(),
            }
        }

        info!(queued = self.queue.len(), "relay session stopped");
    }

    fn reload_settings(&mut self) {
        self.settings = ClientSettings::load(&self.settings_path);
        info!(url = %self.settings.server_url, "client settings reloaded");
    }

    async fn connect_and_run(
        &mut self,
        shutdown: &mut broadcast::Receiver<()>,
        settings_changed: &mut mpsc::Receiver<()>,
    ) -> Disconnect {
        let url = ws_request_url(&self.settings);
        let connect = connect_async(url);
        tokio::pin!(connect);

        // Events arriving mid-handshake are buffered; the attempt itself is
        // never dropped on their account.
        let ws = loop {
            tokio::select! {
                res = &mut connect => match res {
                    Ok((ws, _)) => break ws,
                    Err(e) => {
                        debug!(error = %e, "connection attempt failed");
                        return Disconnect::Errored;
                    }
                },
                Some(event) = self.events.recv() => self.buffer_offline(event),
                _ = shutdown.recv() => return Disconnect::Shutdown,
                Some(_) = settings_changed.recv() => return Disconnect::Reload,
            }
        };

        self.set_state(ConnectionState::Connected);
        info!("connected to ingest endpoint");

        let (mut write, mut read) = ws.split();

        // Anything buffered during the handshake joins the queue tail, then
        // the whole queue flushes oldest-first, one event per message.
        while let Ok(event) = self.events.try_recv() {
            self.queue.push_back(event);
        }
        while let Some(event) = self.queue.pop_front() {
            match encode(&event) {
                Some(payload) => {
                    if write.send(WsMessage::Text(payload)).await.is_err() {
                        self.queue.push_front(event);
                        return Disconnect::Errored;
                    }
                }
                None => continue,
            }
        }

        loop {
            tokio::select! {
                Some(event) = self.events.recv() => {
                    match encode(&event) {
                        Some(payload) => {
                            if write.send(WsMessage::Text(payload)).await.is_err() {
                                self.queue.push_back(event);
                                return Disconnect::Errored;
                            }
                        }
                        None => continue,
                    }
                }
                msg = read.next() => match msg {
                    Some(Ok(WsMessage::Close(_))) | None => {
                        debug!("server closed the channel");
                        return Disconnect::Clean;
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "transport error");
                        return Disconnect::Errored;
                    }
                    Some(Ok(_)) => {}
                },
                _ = shutdown.recv() => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return Disconnect::Shutdown;
                }
                Some(_) = settings_changed.recv() => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return Disconnect::Reload;
                }
            }
        }
    }

    /// Backoff wait between connection attempts; events keep flowing into
    /// the queue (plus the one-shot fallback) the whole time.
    async fn idle(
        &mut self,
        backoff: Duration,
        shutdown: &mut broadcast::Receiver<()>,
        settings_changed: &mut mpsc::Receiver<()>,
    ) -> Idle {
        let sleep = tokio::time::sleep(backoff);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Idle::Elapsed,
                Some(event) = self.events.recv() => self.buffer_offline(event),
                _ = shutdown.recv() => return Idle::Shutdown,
                Some(_) = settings_changed.recv() => return Idle::Reload,
            }
        }
    }

    /// While not connected: queue for the persistent channel, and fire one
    /// best-effort fallback request. The fallback never retries; the
    /// reconnect loop is the reliability mechanism.
    fn buffer_offline(&mut self, event: LogEvent) {
        self.spawn_fallback(&event);
        self.queue.push_back(event);
    }

    fn spawn_fallback(&self, event: &LogEvent) {
        let url = format!("{}/api/logs", self.settings.http_base());
        let mut request = self.http.post(&url).json(event);
        if let Some(token) = &self.settings.auth_token {
            if !token.is_empty() {
                request = request.bearer_auth(token);
            }
        }
        tokio::spawn(async move {
            let _ = request.send().await;
        });
    }

    #[cfg(test)]
    fn drain_incoming(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.queue.push_back(event);
        }
    }
}

fn encode(event: &LogEvent) -> Option<String> {
    serde_json::to_string(event).ok()
}

/// Connection URL with the optional token parameter appended.
pub fn ws_request_url(settings: &ClientSettings) -> String {
    let base = settings.ws_url();
    match settings.auth_token.as_deref() {
        Some(token) if !token.is_empty() => {
            format!("{}?token={}", base, urlencoding::encode(token))
        }
        _ => base,
    }
}
