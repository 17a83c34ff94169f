//! Liveness and readiness probes.

use super::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

/// Liveness: the process is up.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness: the coordinator and the store answer.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let redis_ok = state.ledger.ping().await.is_ok();
    let postgres_ok = state.mirror.ping().await.is_ok();

    let status = if redis_ok && postgres_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ready" } else { "degraded" },
            "redis": redis_ok,
            "postgres": postgres_ok,
        })),
    )
}
