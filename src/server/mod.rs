//! WebSocket relay server
//!
//! ## Routes
//!
//! | Path | Description |
//! |------|-------------|
//! | `/` | Liveness check, always `200 "Hello World"` |
//! | `/chat` | WebSocket echo session |
//! | `/live` | WebSocket frame broadcast, optional `?fps=N` cap |
//! | `/status` | [`RelayStats`] as JSON |
//!
//! Each upgraded connection runs as its own task, tracked by a
//! [`TaskTracker`] so shutdown can wait for every session to finish. Errors
//! inside a session end that session only.

mod metrics;
mod registry;

pub use metrics::{RelayMetrics, RelayStats};
pub use registry::{SessionGuard, SessionInfo, SessionRegistry};

use axum::{
    Json, Router,
    extract::{
        ConnectInfo, Query, State, WebSocketUpgrade,
        ws::WebSocket,
    },
    http::StatusCode,
    response::Response,
    routing::get,
};
use futures::StreamExt;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::session::{BroadcastLoop, ClientSession, run_echo};
use crate::slot::FrameSlot;
use crate::types::{SessionProtocol, UpdateRate};
use crate::{RelayError, Result};

/// Body of the liveness route
pub const ROOT_BODY: &str = "Hello World";

/// Shared state passed to all request handlers.
#[derive(Clone)]
struct AppState {
    slot: FrameSlot,
    registry: Arc<SessionRegistry>,
    metrics: Arc<RelayMetrics>,
    sessions: TaskTracker,
    shutdown: CancellationToken,
    send_timeout: Duration,
}

/// Query parameters accepted by `/live`
#[derive(Debug, Default, Deserialize)]
struct LiveParams {
    fps: Option<u32>,
}

/// A bound, not yet serving relay endpoint
pub struct RelayServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: AppState,
}

impl RelayServer {
    /// Bind the listening endpoint.
    ///
    /// Failure is fatal and reported as [`RelayError::Bind`]. Port 0 picks an
    /// ephemeral port; [`local_addr`](Self::local_addr) reports the real one.
    pub async fn bind(config: &ServerConfig, slot: FrameSlot) -> Result<Self> {
        let addr = config.socket_addr();
        let listener =
            TcpListener::bind(addr).await.map_err(|e| RelayError::bind_failed(addr, e))?;
        let local_addr = listener.local_addr().map_err(|e| RelayError::bind_failed(addr, e))?;

        let metrics = Arc::new(RelayMetrics::new());
        let state = AppState {
            slot,
            registry: Arc::new(SessionRegistry::new(Arc::clone(&metrics))),
            metrics,
            sessions: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            send_timeout: config.send_timeout(),
        };

        info!(%local_addr, "Relay endpoint bound");
        Ok(Self { listener, local_addr, state })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.state.metrics)
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.state.registry)
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// Serve until the shutdown token is cancelled, then drain every session.
    pub async fn run(self) -> Result<()> {
        let Self { listener, local_addr, state } = self;
        let app = router(state.clone());

        info!(%local_addr, "Relay server accepting connections");
        let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(state.shutdown.clone().cancelled_owned())
            .await;

        // Session tokens are children of the shutdown token; this also covers
        // the case where serving ended on an I/O error.
        state.shutdown.cancel();
        let signalled = state.registry.cancel_all();
        state.slot.close();
        state.sessions.close();
        state.sessions.wait().await;

        info!(%local_addr, signalled, "Relay server stopped");
        served.map_err(|e| RelayError::transport_with_source("server failed", Box::new(e)))
    }

    /// Run on a background task
    pub fn spawn(self) -> ShutdownHandle {
        let local_addr = self.local_addr;
        let token = self.state.shutdown.clone();
        let task = tokio::spawn(self.run());
        ShutdownHandle { local_addr, token, task }
    }
}

/// Stops a spawned [`RelayServer`]
pub struct ShutdownHandle {
    local_addr: SocketAddr,
    token: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl ShutdownHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal shutdown without waiting
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Stop accepting, cancel every session, close the slot, and wait until
    /// all sessions ended and the endpoint is released.
    pub async fn shutdown(self) -> Result<()> {
        self.token.cancel();
        self.task
            .await
            .map_err(|e| RelayError::Shutdown { reason: format!("server task failed: {e}") })?
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route(SessionProtocol::Echo.path(), get(chat))
        .route(SessionProtocol::Live.path(), get(live))
        .route("/status", get(status))
        .fallback(not_found)
        .with_state(state)
}

async fn root() -> &'static str {
    ROOT_BODY
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

async fn status(State(state): State<AppState>) -> Json<RelayStats> {
    Json(state.metrics.snapshot(state.slot.current_version()))
}

async fn chat(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    upgrade(ws, peer, state, SessionProtocol::Echo, UpdateRate::Native)
}

async fn live(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(params): Query<LiveParams>,
    State(state): State<AppState>,
) -> Response {
    upgrade(ws, peer, state, SessionProtocol::Live, UpdateRate::from_fps(params.fps))
}

fn upgrade(
    ws: WebSocketUpgrade,
    peer: SocketAddr,
    state: AppState,
    protocol: SessionProtocol,
    rate: UpdateRate,
) -> Response {
    ws.on_failed_upgrade(move |e| warn!(%peer, %protocol, "WebSocket upgrade failed: {}", e))
        .on_upgrade(move |socket| {
            let sessions = state.sessions.clone();
            sessions.track_future(async move {
                let (session, _guard) = state.registry.open(protocol, peer, &state.shutdown);
                serve_session(state, session, rate, socket).await;
            })
        })
}

#[tracing::instrument(
    name = "session",
    skip_all,
    fields(id = session.id, protocol = %session.protocol, peer = %session.peer)
)]
async fn serve_session(state: AppState, session: ClientSession, rate: UpdateRate, socket: WebSocket) {
    debug!(?rate, "Session started");
    let (sink, incoming) = socket.split();

    match session.protocol {
        SessionProtocol::Echo => {
            let outcome = run_echo(&session, sink, incoming, state.send_timeout).await;
            debug!(replies = outcome.replies, "Echo session ended");
        }
        SessionProtocol::Live => {
            let outcome = BroadcastLoop::new(state.slot.subscribe(), state.send_timeout)
                .with_rate(rate)
                .with_metrics(Arc::clone(&state.metrics))
                .run(&session, sink, incoming)
                .await;
            debug!(
                sent = outcome.frames_sent,
                skipped = outcome.frames_skipped,
                last_version = ?outcome.last_version,
                end = ?outcome.end,
                "Live session ended"
            );
        }
    }
}
