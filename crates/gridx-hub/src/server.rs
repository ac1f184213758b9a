//! HTTP and WebSocket server using axum.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use gridx_core::NodeKind;

use crate::config::HubConfig;
use crate::error::HubResult;
use crate::ingest::IngestService;
use crate::registry::{ConnectionId, ObserverHandle};
use crate::store::StateSnapshot;
use crate::types::StatusResponse;

/// Caps concurrent dashboard connections.
#[derive(Debug)]
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Take a slot, or `None` when the limit is reached.
    ///
    /// The guard owns a reference to the limiter so it can travel into the
    /// upgraded connection's task.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

/// Releases its slot on drop.
#[derive(Debug)]
pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    service: IngestService,
    config: HubConfig,
    limiter: Arc<ConnectionLimiter>,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(service: IngestService, config: HubConfig, shutdown: CancellationToken) -> Self {
        Self {
            service,
            limiter: Arc::new(ConnectionLimiter::new(config.max_dashboards)),
            config,
            shutdown,
        }
    }

    pub fn service(&self) -> &IngestService {
        &self.service
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    hub_routes(state).layer(CorsLayer::permissive())
}

fn hub_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/api/snapshot", get(get_snapshot))
        .route("/metrics", get(get_metrics))
        .route("/ws/hardware/pole", get(pole_ws_handler))
        .route("/ws/hardware/house", get(house_ws_handler))
        .route("/ws/client", get(client_ws_handler))
        .with_state(state)
}

/// Liveness probe.
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.config.status_message.clone(),
    })
}

async fn get_snapshot(State(state): State<AppState>) -> Json<StateSnapshot> {
    Json(state.service.store().snapshot())
}

/// Prometheus text exposition.
async fn get_metrics() -> Response {
    match gridx_telemetry::gather_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn pole_ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| producer_session(socket, NodeKind::Pole, state))
}

async fn house_ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| producer_session(socket, NodeKind::House, state))
}

async fn client_ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let Some(guard) = state.limiter.try_acquire() else {
        warn!(
            current = state.limiter.current_count(),
            max = state.config.max_dashboards,
            "Dashboard connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    ws.on_upgrade(move |socket| async move {
        let _guard = guard;
        dashboard_session(socket, state).await;
    })
}

/// Spawn the task that drains a connection's outbound queue into its socket.
fn spawn_writer(
    mut sink: SplitSink<WebSocket, Message>,
    id: ConnectionId,
    capacity: usize,
) -> (ObserverHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<String>(capacity);
    let task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(text.into())).await {
                debug!(connection = id, error = %e, "Send failed, writer stopping");
                break;
            }
        }
        let _ = sink.close().await;
    });
    (ObserverHandle::new(id, tx), task)
}

/// Text of an inbound frame, if it carries one.
///
/// Binary frames are accepted when they are valid UTF-8.
fn frame_text(msg: &Message) -> Option<&str> {
    match msg {
        Message::Text(text) => Some(text.as_str()),
        Message::Binary(bytes) => std::str::from_utf8(bytes).ok(),
        _ => None,
    }
}

async fn producer_session(socket: WebSocket, kind: NodeKind, state: AppState) {
    let service = &state.service;
    let id = service.registry().next_connection_id();
    let (sink, mut stream) = socket.split();
    let (handle, writer) = spawn_writer(sink, id, state.config.observer_queue_capacity);

    service.producer_connected(kind, handle);

    loop {
        let msg = tokio::select! {
            msg = stream.next() => msg,
            _ = state.shutdown.cancelled() => break,
        };
        match msg {
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(msg)) => {
                if let Some(text) = frame_text(&msg) {
                    if let Err(e) = service.handle_producer_text(kind, text) {
                        warn!(node = %kind, connection = id, error = %e, "Skipping malformed telemetry");
                    }
                }
            }
            Some(Err(e)) => {
                debug!(node = %kind, connection = id, error = %e, "Producer receive error");
                break;
            }
        }
    }

    service.producer_disconnected(kind, id);
    writer.abort();
}

async fn dashboard_session(socket: WebSocket, state: AppState) {
    let service = &state.service;
    let id = service.registry().next_connection_id();
    let (sink, mut stream) = socket.split();
    let (handle, writer) = spawn_writer(sink, id, state.config.observer_queue_capacity);

    service.dashboard_connected(handle);

    loop {
        let msg = tokio::select! {
            msg = stream.next() => msg,
            _ = state.shutdown.cancelled() => break,
        };
        match msg {
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(msg)) => {
                if let Some(text) = frame_text(&msg) {
                    if let Err(e) = service.handle_dashboard_text(text) {
                        warn!(connection = id, error = %e, "Skipping malformed dashboard command");
                    }
                }
            }
            Some(Err(e)) => {
                debug!(connection = id, error = %e, "Dashboard receive error");
                break;
            }
        }
    }

    service.dashboard_disconnected(id);
    writer.abort();
}

/// Serve on an already-bound listener until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, state: AppState) -> HubResult<()> {
    serve_with(listener, state, Router::new()).await
}

/// Like [`serve`], with `extra` routes mounted next to the hub's.
pub async fn serve_with(listener: TcpListener, state: AppState, extra: Router) -> HubResult<()> {
    let shutdown = state.shutdown.clone();
    let app = hub_routes(state).merge(extra).layer(CorsLayer::permissive());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// Bind the configured address and run the hub server.
pub async fn run_server(
    service: IngestService,
    config: HubConfig,
    shutdown: CancellationToken,
) -> HubResult<()> {
    let listener = TcpListener::bind(config.listen_addr()).await?;
    info!(addr = %config.listen_addr(), "Starting hub server");
    serve(listener, AppState::new(service, config, shutdown)).await?;
    info!("Hub server stopped");
    Ok(())
}
