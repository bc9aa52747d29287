use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

use crate::services::session_broker::BrokerStatus;
use crate::AppState;

/// Root endpoint - basic status
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "TuneIn Addon",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "runtime": "rust"
    }))
}

/// Session token summary
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionStats {
    state: BrokerStatus,
    attempts_used: u32,
    max_attempts: u32,
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    uptime: u64,
    session: SessionStats,
}

/// GET /health - Advanced health check
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let broker_state = state.broker.status();

    // Without a token nothing but the manifest can be served
    let status = match broker_state {
        BrokerStatus::Ready => "ok",
        BrokerStatus::NoToken | BrokerStatus::Acquiring => "degraded",
        BrokerStatus::PermanentlyFailed => "unhealthy",
    };

    Json(HealthResponse {
        status: status.to_string(),
        uptime,
        session: SessionStats {
            state: broker_state,
            attempts_used: state.broker.attempts_used(),
            max_attempts: state.config.token_max_attempts,
        },
    })
}

/// GET /metrics - Prometheus metrics
pub async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                b"Internal Server Error".to_vec(),
            )
        }
    }
}

/// Readiness probe (for Kubernetes)
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.broker.status() {
        BrokerStatus::Ready => (StatusCode::OK, "ready"),
        BrokerStatus::NoToken | BrokerStatus::Acquiring => {
            (StatusCode::SERVICE_UNAVAILABLE, "not ready - no session token yet")
        }
        BrokerStatus::PermanentlyFailed => (
            StatusCode::SERVICE_UNAVAILABLE,
            "not ready - session token unavailable",
        ),
    }
}

/// Liveness probe (for Kubernetes)
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}
