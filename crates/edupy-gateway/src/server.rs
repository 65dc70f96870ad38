use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use edupy_config::LogBuffer;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::services::ServeDir;

use crate::controller::ControlHandler;
use crate::gateway::Gateway;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub handler: Arc<dyn ControlHandler>,
    pub logs: Arc<LogBuffer>,
}

const DIAGNOSTIC_LOG_LINES: usize = 200;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsDump {
    pub version: &'static str,
    pub sessions: usize,
    pub queued_messages: usize,
    pub recent_logs: Vec<String>,
}

pub fn diagnostics_dump(state: &AppState, log_lines: usize) -> DiagnosticsDump {
    DiagnosticsDump {
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.gateway.session_count(),
        queued_messages: state.gateway.queued(),
        recent_logs: state.logs.last_lines(log_lines),
    }
}

/// Routes `ws_path` to the viewer socket, `/diagnostics` to a state dump and, when given,
/// serves the viewer's static files at `/`.
pub fn router(state: AppState, ws_path: &str, static_dir: Option<PathBuf>) -> Router {
    let router = Router::new()
        .route(ws_path, get(ws_upgrade))
        .route("/diagnostics", get(diagnostics));
    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };
    router.with_state(state)
}

pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr: Option<SocketAddr> = listener.local_addr().ok();
    tracing::info!(target: "edupy.gateway", addr = ?addr, "listening for viewers");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn diagnostics(State(state): State<AppState>) -> Json<DiagnosticsDump> {
    Json(diagnostics_dump(&state, DIAGNOSTIC_LOG_LINES))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (session, mut outbox) = state.gateway.connect();
    let (mut sender, mut receiver) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(text) = outbox.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Requests from one viewer are handled in arrival order, off the read loop.
    let (control_tx, mut control_rx) = mpsc::unbounded_channel();
    let handler = state.handler.clone();
    let control = tokio::spawn(async move {
        while let Some(request) = control_rx.recv().await {
            handler.handle(request).await;
        }
    });

    let gateway = state.gateway.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if let Some(request) = gateway.handle_inbound(session, text.as_str()) {
                        if control_tx.send(request).is_err() {
                            break;
                        }
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(target: "edupy.gateway", session, error = %err, "viewer socket error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }
    state.gateway.disconnect(session);
    // Let in-flight requests finish; the channel closes once the reader is gone.
    let _ = control.await;
}
