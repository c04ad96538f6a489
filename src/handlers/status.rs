// Keepalive and HTML status page handlers

use axum::{extract::State, response::Html, Json};
use serde_json::json;

use crate::handlers::AppState;

/// Handler for GET /api/v1/keepalive - uptime heartbeat
pub async fn keepalive(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "alive",
        "uptimeSeconds": state.uptime_seconds(),
        "network": state.config.network.as_str(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Handler for GET /api/v1/status - minimal HTML dashboard
pub async fn status_page(State(state): State<AppState>) -> Html<String> {
    let (cache_healthy, _) = state.cache.health_check().await;
    let uptime = state.uptime_seconds();
    let page = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>SUI Faucet Status</title></head>
<body>
  <h1>SUI Faucet</h1>
  <ul>
    <li>Network: {network}</li>
    <li>Uptime: {uptime}s</li>
    <li>Cache: {cache}</li>
    <li>Persistence: {db}</li>
    <li>Chain RPC: {chain}</li>
  </ul>
</body>
</html>"#,
        network = state.config.network.as_str(),
        uptime = uptime,
        cache = if cache_healthy { "healthy" } else { "unhealthy" },
        db = if state.storage.is_degraded() { "degraded" } else { "connected" },
        chain = if state.dispatcher.is_ready() { "ready" } else { "not ready" },
    );
    Html(page)
}
