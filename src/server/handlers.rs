//! HTTP handlers for the punch API.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::error::ApiError;
use super::AppState;
use crate::protocol::models::{HelloBody, PunchRequest};

/// Timeout for the grant store ping.
const PING_TIMEOUT: Duration = Duration::from_secs(1);

/// Health check response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

/// `GET /` - liveness probe, always `{"hello":"world"}`.
pub async fn hello() -> Json<HelloBody> {
    Json(HelloBody::default())
}

/// `GET /health` - readiness probe.
///
/// Returns 200 with `{"status":"pass"}` when the grant store answers a ping
/// within one second, 503 with `{"status":"fail"}` otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    let ping_result = timeout(PING_TIMEOUT, state.manager.ping_store()).await;

    let (status_code, status) = match ping_result {
        Ok(Ok(())) => (StatusCode::OK, "pass"),
        Ok(Err(e)) => {
            warn!(error = %e, "Health check: grant store unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, "fail")
        }
        Err(_) => {
            warn!("Health check: grant store ping timed out");
            (StatusCode::SERVICE_UNAVAILABLE, "fail")
        }
    };

    (status_code, Json(HealthResponse { status })).into_response()
}

/// `POST /punch` - admit the caller's address if the presented key is valid.
///
/// The admitted address is always the transport peer, never anything from the body.
pub async fn punch(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let addr = peer.ip().to_canonical();

    let key = PunchRequest::key_from_body(&body).inspect_err(|_| {
        debug!(%addr, "Punch rejected: key missing");
    })?;

    match state.manager.punch_key(&key, addr).await {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            warn!(%addr, key = %key.fingerprint(), error = %e, "Punch rejected");
            Err(e.into())
        }
    }
}
