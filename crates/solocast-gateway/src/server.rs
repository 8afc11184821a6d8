use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{FromRef, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::router::SignalRouter;
use crate::signal;

pub const LIVENESS_TEXT: &str = "Signaling server is running";

#[derive(Clone)]
pub struct AppState {
    router: SignalRouter,
    config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            router: SignalRouter::new(config.relay_mode),
            config: Arc::new(config),
        }
    }

    pub fn router(&self) -> &SignalRouter {
        &self.router
    }
}

impl FromRef<AppState> for SignalRouter {
    fn from_ref(state: &AppState) -> Self {
        state.router.clone()
    }
}

impl FromRef<AppState> for Arc<GatewayConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

#[derive(Debug, Serialize)]
struct HealthReport {
    connected_clients: usize,
    receivers: usize,
    sender_present: bool,
}

async fn health(State(router): State<SignalRouter>) -> impl IntoResponse {
    let snapshot = router.snapshot().await;
    Json(HealthReport {
        connected_clients: snapshot.connected_clients,
        receivers: snapshot.receivers,
        sender_present: snapshot.sender.is_some(),
    })
}

pub fn app(state: AppState) -> Router {
    let cors = state.config.cors_origin.cors_layer();
    Router::new()
        .route("/", get(|| async { LIVENESS_TEXT }))
        .route("/health", get(health))
        .route("/ws", get(signal::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serves `state` on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("signaling server failed")
}

/// Binds the configured address and serves until Ctrl-C.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind signaling server on {addr}"))?;
    let bound_addr = listener.local_addr()?;
    tracing::info!(
        "signaling server listening on {} (relay mode {:?}, ping every {:?})",
        bound_addr,
        config.relay_mode,
        config.ping_interval()
    );

    serve(listener, AppState::new(config), shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
