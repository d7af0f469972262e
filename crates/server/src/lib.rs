//! Ingest endpoint: accepts events from transport clients over a persistent
//! WebSocket channel and an HTTP fallback, authenticates them, forwards to
//! the event store, and serves the query interface.

pub mod discovery;
pub mod mirror;

use axum::{
    extract::{
        ws::{CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path as AxumPath, Request, State,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use pagetap_core::{LogEvent, Paths, Result, ServerOptions};
use pagetap_store::EventStore;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use mirror::Mirror;

// ---------------------------------------------------------------------------
// Shared state passed to HTTP/WS handlers
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<EventStore>,
    pub auth_token: Option<String>,
    pub host: String,
    pub port: u16,
    /// Live sink for accepted events when watch mode is enabled.
    pub mirror: Option<Arc<Mirror>>,
    /// Fan-out that tells open persistent channels to close on shutdown.
    shutdown: broadcast::Sender<()>,
}

impl ServerState {
    pub fn new(
        store: Arc<EventStore>,
        options: &ServerOptions,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        let mirror = options
            .watch
            .then(|| Arc::new(Mirror::new(&options.format, options.output_file.clone())));
        Self {
            store,
            auth_token: options
                .auth_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
            host: options.host.clone(),
            port: options.port,
            mirror,
            shutdown,
        }
    }

    /// One accepted event: append, then mirror. Mirror failures are
    /// non-fatal; persistence failures are logged and the event stays in
    /// memory per the store contract.
    fn accept_event(&self, event: LogEvent) {
        if let Err(e) = self.store.add_log(event.clone()) {
            error!(error = %e, "failed to persist event");
        }
        if let Some(mirror) = &self.mirror {
            mirror.write(&event);
        }
    }
}

// ---------------------------------------------------------------------------
// Bearer token authentication middleware
// ---------------------------------------------------------------------------

fn secure_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (&x, &y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn url_decode(input: &str) -> Option<String> {
    let mut out = String::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(' ');
                i += 1;
            }
            b'%' => {
                if i + 2 >= bytes.len() {
                    return None;
                }
                let hex = |c: u8| -> Option<u8> {
                    match c {
                        b'0'..=b'9' => Some(c - b'0'),
                        b'a'..=b'f' => Some(c - b'a' + 10),
                        b'A'..=b'F' => Some(c - b'A' + 10),
                        _ => None,
                    }
                };
                let h = hex(bytes[i + 1])?;
                let l = hex(bytes[i + 2])?;
                out.push((h * 16 + l) as char);
                i += 3;
            }
            c => {
                out.push(c as char);
                i += 1;
            }
        }
    }
    Some(out)
}

fn token_from_query(query: Option<&str>) -> Option<String> {
    let q = query?;
    for pair in q.split('&') {
        if let Some((k, v)) = pair.split_once('=') {
            if k == "token" {
                return url_decode(v);
            }
        }
    }
    None
}

fn request_authorized(req: &Request, token: &str) -> bool {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let from_header = match auth_header {
        Some(h) if h.starts_with("Bearer ") => secure_eq(&h[7..], token),
        _ => false,
    };

    from_header
        || token_from_query(req.uri().query())
            .map(|v| secure_eq(&v, token))
            .unwrap_or(false)
}

async fn auth_middleware(State(state): State<ServerState>, req: Request, next: Next) -> Response {
    let token = match &state.auth_token {
        Some(t) => t,
        None => return next.run(req).await,
    };

    if request_authorized(&req, token) {
        next.run(req).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Unauthorized" })),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// HTTP handlers: event log CRUD + agent summary
// ---------------------------------------------------------------------------

async fn handle_logs_list(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.store.current_logs())
}

async fn handle_logs_append(
    State(state): State<ServerState>,
    Json(event): Json<LogEvent>,
) -> impl IntoResponse {
    state.accept_event(event);
    Json(serde_json::json!({ "success": true }))
}

async fn handle_logs_clear(State(state): State<ServerState>) -> Response {
    match state.store.clear_logs() {
        Ok(()) => Json(serde_json::json!({ "success": true, "message": "Logs cleared" }))
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": format!("Failed to clear logs: {}", e) })),
        )
            .into_response(),
    }
}

async fn handle_agent_info(
    State(state): State<ServerState>,
    AxumPath(agent): AxumPath<String>,
) -> impl IntoResponse {
    let logs = state.store.current_logs();
    Json(pagetap_render::agent_info(&logs, &agent))
}

/// Unauthenticated probe used by port-scanning auto-discovery.
async fn handle_discovery_probe(State(state): State<ServerState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "pagetap",
        "version": env!("CARGO_PKG_VERSION"),
        "host": state.host,
        "port": state.port,
    }))
}

// ---------------------------------------------------------------------------
// Persistent channel
// ---------------------------------------------------------------------------

async fn handle_ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<ServerState>,
    req: Request,
) -> impl IntoResponse {
    // Validated inside the upgrade so a bad token gets a post-handshake
    // close (4401) instead of a failed HTTP upgrade.
    let token_valid = match &state.auth_token {
        Some(token) => token_from_query(req.uri().query())
            .map(|v| secure_eq(&v, token))
            .unwrap_or(false),
        None => true,
    };

    ws.on_upgrade(move |socket| async move {
        if !token_valid {
            let mut socket = socket;
            let _ = socket
                .send(WsMessage::Close(Some(CloseFrame {
                    code: 4401,
                    reason: std::borrow::Cow::Borrowed("Unauthorized"),
                })))
                .await;
            return;
        }
        handle_ws_connection(socket, state).await;
    })
}

async fn handle_ws_connection(mut socket: WebSocket, state: ServerState) {
    info!("transport client connected");

    let mut shutdown = state.shutdown.subscribe();

    // Each message on this stream is processed to completion before the
    // next; separate connections interleave freely.
    loop {
        tokio::select! {
            msg = socket.recv() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket receive error");
                        break;
                    }
                    None => break,
                };

                match msg {
                    WsMessage::Text(text) => match serde_json::from_str::<LogEvent>(&text) {
                        Ok(event) => state.accept_event(event),
                        // Malformed payloads are rejected per-message; the
                        // channel stays open.
                        Err(e) => warn!(error = %e, "malformed event payload"),
                    },
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
            _ = shutdown.recv() => {
                let _ = socket.send(WsMessage::Close(None)).await;
                break;
            }
        }
    }

    info!("transport client disconnected");
}

// ---------------------------------------------------------------------------
// Router / serve
// ---------------------------------------------------------------------------

pub fn build_router(state: ServerState, cors_origin: Option<&str>) -> Router {
    let cors = match cors_origin {
        Some(origin) => match origin.parse::<axum::http::HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin(value)
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                warn!(origin, "invalid CORS origin, falling back to permissive");
                CorsLayer::permissive()
            }
        },
        None => CorsLayer::permissive(),
    };

    Router::new()
        .route(
            "/api/logs",
            get(handle_logs_list)
                .post(handle_logs_append)
                .delete(handle_logs_clear),
        )
        .route("/api/agent-info/:agent", get(handle_agent_info))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        // Outside the auth layer: the probe is public, and the persistent
        // channel authenticates post-handshake.
        .route("/api/discovery", get(handle_discovery_probe))
        .route("/ws", get(handle_ws_upgrade))
        .layer(cors)
        .with_state(state)
}

/// Binds, registers the discovery record, and serves until `shutdown`
/// fires; open persistent channels are closed and the record removed on
/// the way out.
pub async fn run(options: ServerOptions, shutdown: broadcast::Sender<()>) -> Result<()> {
    let store = Arc::new(EventStore::open(options.log_file_or_default()));
    let state = ServerState::new(store, &options, shutdown.clone());
    let app = build_router(state, options.cors_origin.as_deref());
    let mut shutdown_rx = shutdown.subscribe();

    let bind_addr = format!("{}:{}", options.host, options.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "ingest endpoint listening");

    let paths = Paths::new();
    let registration = discovery::ServerInfo {
        port: options.port,
        host: options.host.clone(),
        pid: std::process::id(),
        start_time: chrono::Utc::now().timestamp_millis(),
    };
    if let Err(e) = discovery::register_server(&paths, &registration) {
        warn!(error = %e, "failed to write discovery record");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    if let Err(e) = discovery::unregister_server(&paths) {
        warn!(error = %e, "failed to remove discovery record");
    }
    info!("ingest endpoint stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use pagetap_core::{LogLevel, ServerOptions};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_state(options: ServerOptions) -> (ServerState, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(EventStore::open(dir.path().join("logs.json")));
        let (shutdown_tx, _) = broadcast::channel(1);
        (ServerState::new(store, &options, shutdown_tx), dir)
    }

    fn options_with_token(token: Option<&str>) -> ServerOptions {
        ServerOptions {
            auth_token: token.map(|t| t.to_string()),
            ..ServerOptions::default()
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_append_then_list() {
        let (state, _dir) = test_state(options_with_token(None));
        let app = build_router(state.clone(), None);

        let event = LogEvent::new(LogLevel::Error, "x is not defined");
        let response = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/api/logs")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_string(&event).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/logs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let logs = body_json(response).await;
        assert_eq!(logs.as_array().unwrap().len(), 1);
        assert_eq!(logs[0]["message"], "x is not defined");
    }

    #[tokio::test]
    async fn test_malformed_event_rejected() {
        let (state, _dir) = test_state(options_with_token(None));
        let app = build_router(state, None);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/api/logs")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_auth_required_when_token_configured() {
        let (state, _dir) = test_state(options_with_token(Some("abc")));
        let app = build_router(state, None);

        // No token.
        let response = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/logs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Wrong token.
        let response = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/logs")
                    .header("authorization", "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Correct bearer token.
        let response = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/logs")
                    .header("authorization", "Bearer abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Correct query token.
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/logs?token=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_discovery_probe_is_public() {
        let (state, _dir) = test_state(options_with_token(Some("abc")));
        let app = build_router(state, None);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/discovery")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let probe = body_json(response).await;
        assert_eq!(probe["service"], "pagetap");
        assert!(probe["version"].is_string());
    }

    #[tokio::test]
    async fn test_clear_logs() {
        let (state, _dir) = test_state(options_with_token(None));
        state.store.add_log(LogEvent::new(LogLevel::Log, "one")).unwrap();
        let app = build_router(state.clone(), None);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("DELETE")
                    .uri("/api/logs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.store.current_logs().is_empty());
    }

    #[tokio::test]
    async fn test_agent_info_endpoint() {
        let (state, _dir) = test_state(options_with_token(None));
        state
            .store
            .add_log(LogEvent::new(LogLevel::Error, "boom"))
            .unwrap();
        let app = build_router(state, None);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/agent-info/cursor")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let info = body_json(response).await;
        assert_eq!(info["agent"], "cursor");
        assert_eq!(info["console_data"]["errors"].as_array().unwrap().len(), 1);
    }

    async fn serve_ephemeral(app: Router) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_ws_rejects_wrong_token_after_handshake() {
        use futures::StreamExt;
        use tokio_tungstenite::tungstenite::Message;

        let (state, _dir) = test_state(options_with_token(Some("abc")));
        let addr = serve_ephemeral(build_router(state.clone(), None)).await;

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws?token=nope", addr))
            .await
            .unwrap();

        match ws.next().await {
            Some(Ok(Message::Close(Some(frame)))) => {
                assert_eq!(u16::from(frame.code), 4401);
            }
            other => panic!("expected close frame, got {:?}", other),
        }
        assert!(state.store.current_logs().is_empty());
    }

    #[tokio::test]
    async fn test_ws_ingest_with_valid_token() {
        use futures::SinkExt;
        use tokio_tungstenite::tungstenite::Message;

        let (state, _dir) = test_state(options_with_token(Some("abc")));
        let addr = serve_ephemeral(build_router(state.clone(), None)).await;

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws?token=abc", addr))
            .await
            .unwrap();

        let event = LogEvent::new(LogLevel::Error, "x is not defined");
        ws.send(Message::Text(serde_json::to_string(&event).unwrap()))
            .await
            .unwrap();

        // Malformed payloads are rejected per-message without closing.
        ws.send(Message::Text("{not an event".to_string()))
            .await
            .unwrap();

        let event = LogEvent::new(LogLevel::Log, "still open");
        ws.send(Message::Text(serde_json::to_string(&event).unwrap()))
            .await
            .unwrap();

        let mut persisted = Vec::new();
        for _ in 0..100 {
            persisted = state.store.current_logs();
            if persisted.len() >= 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0].message, "x is not defined");
        assert_eq!(persisted[1].message, "still open");
    }

    #[test]
    fn test_secure_eq() {
        assert!(secure_eq("abc", "abc"));
        assert!(!secure_eq("abc", "abd"));
        assert!(!secure_eq("abc", "abcd"));
    }

    #[test]
    fn test_token_from_query() {
        assert_eq!(token_from_query(Some("token=abc")), Some("abc".to_string()));
        assert_eq!(
            token_from_query(Some("x=1&token=a%20b")),
            Some("a b".to_string())
        );
        assert_eq!(token_from_query(Some("x=1")), None);
        assert_eq!(token_from_query(None), None);
    }
}
