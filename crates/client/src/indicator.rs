use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::session::ConnectionState;

/// Where the connection indicator is rendered. The default writes a tracing
/// line; embedders can surface it in their own UI.
pub trait IndicatorSink: Send + Sync {
    fn render(&self, state: ConnectionState);
}

pub struct TracingIndicator;

impl IndicatorSink for TracingIndicator {
    fn render(&self, state: ConnectionState) {
        debug!(target: "pagetap::indicator", state = state.as_str(), "relay connection");
    }
}

/// Renders the current connection state at a fixed 1-second cadence,
/// decoupled from connection-state churn.
pub async fn run_indicator(
    state: watch::Receiver<ConnectionState>,
    sink: impl IndicatorSink,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tick.tick() => sink.render(*state.borrow()),
            _ = shutdown.recv() => break,
        }
    }
}
