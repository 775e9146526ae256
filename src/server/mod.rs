//! HTTP boundary: axum router, serve loop and shutdown handling.
//!
//! Routes:
//! - `GET /` - liveness probe
//! - `GET /health` - readiness probe (grant store ping)
//! - `POST /punch` - validate a key and admit the caller

pub mod error;
pub mod handlers;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::manager::PunchManager;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The authorization-and-admission pipeline.
    pub manager: Arc<PunchManager>,
}

/// Create the axum application with all routes.
pub fn create_app(manager: Arc<PunchManager>) -> Router {
    let state = AppState { manager };

    Router::new()
        .route("/", get(handlers::hello))
        .route("/health", get(handlers::health))
        .route("/punch", post(handlers::punch))
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves.
///
/// Handlers see the peer address through `ConnectInfo<SocketAddr>`.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Listening");
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// Resolve on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
