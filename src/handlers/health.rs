// Health probe endpoint handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::handlers::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct HealthQuery {
    #[serde(default)]
    pub detailed: bool,
}

/// Handler for GET /api/v1/health - overall service health;
/// `?detailed=true` adds wallet and performance details
pub async fn health_check(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
) -> impl IntoResponse {
    let (cache_healthy, cache_latency) = state.cache.health_check().await;
    let (db_healthy, db_latency) = state.storage.health_check().await;
    let degraded = state.storage.is_degraded() || state.cache.is_degraded() || !cache_healthy;

    let status = if degraded { "degraded" } else { "ok" };
    let mut body = json!({
        "status": status,
        "uptimeSeconds": state.uptime_seconds(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    if query.detailed {
        let (chain_healthy, chain_details) = state.dispatcher.health_check().await;
        let balance = match state.dispatcher.has_wallet() {
            true => state.dispatcher.wallet_balance().await.ok().map(|b| b.to_string()),
            false => None,
        };
        body["cache"] = json!({
            "backend": state.cache.backend_name(),
            "healthy": cache_healthy,
            "latencyMs": cache_latency,
        });
        body["database"] = json!({
            "degraded": state.storage.is_degraded(),
            "healthy": db_healthy,
            "latencyMs": db_latency,
        });
        body["chain"] = chain_details;
        body["chainHealthy"] = json!(chain_healthy);
        body["walletBalance"] = json!(balance);
    }

    Json(body)
}

/// Handler for GET /api/v1/health/live - process liveness only
pub async fn health_live() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Handler for GET /api/v1/health/ready - readiness to serve dispatches
pub async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.dispatcher.is_ready();
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(json!({
            "status": if ready { "ready" } else { "not_ready" },
            "chainReady": ready,
        })),
    )
}
