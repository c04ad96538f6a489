// Handlers for the admin surface

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap},
    Extension, Json,
};
use serde_json::json;

use crate::error::{FaucetError, FaucetResult};
use crate::handlers::AppState;
use crate::middleware::{client_ip, extract_credential, RequestContext};
use crate::models::{
    AdminClientData, ApiResponse, BulkSettingsData, BulkSettingsRequest, LoginData, LoginRequest,
    PaginationParams, SettingUpdateError, TestTransactionRequest, TransactionsQuery,
    UpdateSettingRequest, UpdatedSetting,
};
use crate::services::constant_time_eq;
use crate::services::stats;

/// User-agent suffix that, together with the master key, identifies the
/// internal bot collaborator
const BOT_USER_AGENT_SUFFIX: &str = "SuiFX-Bot";

/// Who passed the admin gate
enum AdminIdentity {
    Session { username: String, token: String },
    Bot,
}

impl AdminIdentity {
    fn username(&self) -> &str {
        match self {
            AdminIdentity::Session { username, .. } => username,
            AdminIdentity::Bot => "bot",
        }
    }
}

/// Admin gate: a valid session token, or the legacy master key presented by
/// the internal bot (identified by its user-agent suffix)
async fn require_admin(state: &AppState, headers: &HeaderMap) -> FaucetResult<AdminIdentity> {
    let credential = extract_credential(headers).ok_or(FaucetError::MissingApiKey)?;

    if constant_time_eq(&credential, &state.config.api_key) {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if user_agent.ends_with(BOT_USER_AGENT_SUFFIX) {
            return Ok(AdminIdentity::Bot);
        }
        return Err(FaucetError::InvalidApiKey);
    }

    match state.sessions.validate(&credential).await {
        Some(claims) => Ok(AdminIdentity::Session { username: claims.sub, token: credential }),
        None => Err(FaucetError::InvalidApiKey),
    }
}

/// Append an audit row; failures are logged, never surfaced
async fn audit(
    state: &AppState,
    username: &str,
    action: &str,
    details: Option<String>,
    headers: &HeaderMap,
    peer: &SocketAddr,
) {
    let ip = client_ip(headers, peer);
    if let Err(e) = state.storage.save_admin_activity(username, action, details, &ip).await {
        tracing::error!(username, action, "Failed to record admin activity: {}", e);
    }
}

/// Handler for POST /api/v1/admin/login - verify credentials, issue a JWT
pub async fn admin_login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> FaucetResult<Json<ApiResponse<LoginData>>> {
    let (username, role) = match state
        .storage
        .authenticate_admin(&body.username, &body.password)
        .await?
    {
        Some(user) => (user.username, user.role),
        // Degraded persistence: the bootstrap credentials keep the admin
        // surface reachable
        None if state.storage.is_degraded()
            && constant_time_eq(&body.username, &state.config.admin_username)
            && constant_time_eq(&body.password, &state.config.admin_password) =>
        {
            (body.username.clone(), "super_admin".to_string())
        }
        None => return Err(FaucetError::InvalidApiKey),
    };

    let issued = state
        .sessions
        .issue(&username, &role)
        .await
        .map_err(FaucetError::ServerError)?;

    audit(&state, &username, "login", None, &headers, &peer).await;
    Ok(Json(ApiResponse::ok(LoginData {
        token: issued.token,
        role,
        expires_at: issued.expires_at.to_rfc3339(),
    })))
}

/// Handler for POST /api/v1/admin/logout - revoke the bearer token
pub async fn admin_logout(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> FaucetResult<Json<ApiResponse<serde_json::Value>>> {
    let identity = require_admin(&state, &headers).await?;
    if let AdminIdentity::Session { username, token } = &identity {
        state.sessions.revoke(token).await;
        audit(&state, username, "logout", None, &headers, &peer).await;
    }
    Ok(Json(ApiResponse::ok(json!({ "loggedOut": true }))))
}

/// Handler for GET /api/v1/admin/dashboard - aggregated statistics
pub async fn admin_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> FaucetResult<Json<ApiResponse<stats::DashboardData>>> {
    require_admin(&state, &headers).await?;
    let data = stats::dashboard(
        &state.storage,
        &state.cache,
        &state.dispatcher,
        &state.sessions,
        state.uptime_seconds(),
    )
    .await;
    Ok(Json(ApiResponse::ok(data)))
}

/// Handler for GET /api/v1/admin/transactions - journal listing, optionally
/// filtered to one wallet
pub async fn admin_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TransactionsQuery>,
) -> FaucetResult<Json<ApiResponse<serde_json::Value>>> {
    require_admin(&state, &headers).await?;
    let limit = query.pagination.clamped_limit();

    if let Some(wallet) = &query.wallet {
        let rows = state.storage.list_transactions_by_wallet(wallet, limit).await?;
        let total = rows.len() as u64;
        return Ok(Json(ApiResponse::ok(json!({
            "transactions": rows,
            "total": total,
            "limit": limit,
            "offset": 0,
        }))));
    }

    let (rows, total) = state
        .storage
        .list_transactions(limit, query.pagination.offset)
        .await?;
    Ok(Json(ApiResponse::ok(json!({
        "transactions": rows,
        "total": total,
        "limit": limit,
        "offset": query.pagination.offset,
    }))))
}

/// Handler for GET /api/v1/admin/activities - audit log listing
pub async fn admin_activities(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pagination): Query<PaginationParams>,
) -> FaucetResult<Json<ApiResponse<serde_json::Value>>> {
    require_admin(&state, &headers).await?;
    let rows = state.storage.list_admin_activities(pagination.clamped_limit()).await?;
    Ok(Json(ApiResponse::ok(json!({ "activities": rows }))))
}

/// Handler for GET /api/v1/admin/rate-limits - current settings
pub async fn admin_list_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> FaucetResult<Json<ApiResponse<serde_json::Value>>> {
    require_admin(&state, &headers).await?;
    let rows = state.settings.list().await?;
    Ok(Json(ApiResponse::ok(json!({ "settings": rows }))))
}

/// Handler for PUT /api/v1/admin/rate-limits/bulk - update many settings,
/// partial success allowed
pub async fn admin_bulk_settings(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<BulkSettingsRequest>,
) -> FaucetResult<Json<ApiResponse<BulkSettingsData>>> {
    let identity = require_admin(&state, &headers).await?;

    let mut updated = Vec::new();
    let mut errors = Vec::new();
    for (name, value) in &body.settings {
        match state.settings.update(name, value, identity.username()).await {
            Ok(row) => updated.push(UpdatedSetting {
                setting_name: row.setting_name,
                new_value: value.clone(),
            }),
            Err(message) => errors.push(SettingUpdateError {
                setting_name: name.clone(),
                error: message,
            }),
        }
    }

    audit(
        &state,
        identity.username(),
        "update_rate_limits",
        Some(json!({ "updated": updated.len(), "errors": errors.len() }).to_string()),
        &headers,
        &peer,
    )
    .await;

    Ok(Json(ApiResponse::ok(BulkSettingsData { updated, errors })))
}

/// Handler for PUT /api/v1/admin/rate-limits/{name} - update one setting
pub async fn admin_update_setting(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(body): Json<UpdateSettingRequest>,
) -> FaucetResult<Json<ApiResponse<serde_json::Value>>> {
    let identity = require_admin(&state, &headers).await?;
    let row = state
        .settings
        .update(&name, &body.value, identity.username())
        .await
        .map_err(|message| {
            if message == "Setting not found" {
                FaucetError::NotFound(format!("setting {} not found", name))
            } else {
                FaucetError::InvalidRequest(message)
            }
        })?;

    audit(
        &state,
        identity.username(),
        "update_rate_limit",
        Some(json!({ "setting": row.setting_name, "value": row.setting_value }).to_string()),
        &headers,
        &peer,
    )
    .await;
    Ok(Json(ApiResponse::ok(json!({ "setting": row }))))
}

/// Handler for GET /api/v1/admin/config - current configuration, secrets
/// redacted
pub async fn admin_config(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> FaucetResult<Json<ApiResponse<serde_json::Value>>> {
    require_admin(&state, &headers).await?;
    let config = &state.config;
    Ok(Json(ApiResponse::ok(json!({
        "network": config.network.as_str(),
        "rpcUrl": config.rpc_url,
        "environment": config.environment,
        "defaultAmount": config.default_amount.to_string(),
        "maxAmount": config.max_amount.to_string(),
        "minWalletBalance": config.min_wallet_balance.to_string(),
        "rateWindowMs": config.rate_window_ms,
        "maxPerWallet": config.max_per_wallet,
        "maxPerIp": config.max_per_ip,
        "maxPerGlobal": config.max_per_global,
        "cacheBackend": state.cache.backend_name(),
        "databaseDegraded": state.storage.is_degraded(),
        "walletConfigured": state.dispatcher.has_wallet(),
    }))))
}

/// Handler for POST /api/v1/admin/cache/flush - drop every cache key
pub async fn admin_cache_flush(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> FaucetResult<Json<ApiResponse<serde_json::Value>>> {
    let identity = require_admin(&state, &headers).await?;
    let dropped = state.cache.flush().await;
    audit(
        &state,
        identity.username(),
        "cache_flush",
        Some(format!("dropped {} keys", dropped)),
        &headers,
        &peer,
    )
    .await;
    Ok(Json(ApiResponse::ok(json!({ "droppedKeys": dropped }))))
}

/// Handler for POST /api/v1/admin/test-transaction - exercise the
/// dispatcher end to end
pub async fn admin_test_transaction(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Extension(request): Extension<RequestContext>,
    headers: HeaderMap,
    Json(body): Json<TestTransactionRequest>,
) -> FaucetResult<Json<ApiResponse<serde_json::Value>>> {
    let identity = require_admin(&state, &headers).await?;
    let snapshot = state.settings.snapshot().await;
    let mode = state.dispatcher.resolve_mode(snapshot.faucet_mode.as_deref());
    let amount = body.amount.unwrap_or(state.config.default_amount);

    let outcome = state
        .dispatcher
        .send_tokens(&body.wallet_address, amount, &request.request_id, mode)
        .await
        .map_err(|e| FaucetError::TransactionFailed(e.to_string()))?;

    audit(
        &state,
        identity.username(),
        "test_transaction",
        Some(json!({ "txHash": outcome.tx_hash, "amount": amount.to_string() }).to_string()),
        &headers,
        &peer,
    )
    .await;

    Ok(Json(ApiResponse::ok(json!({
        "transactionHash": outcome.tx_hash,
        "amount": amount.to_string(),
        "mode": mode.as_str(),
    }))))
}

/// Handler for GET /api/v1/admin/clients - full client listing
pub async fn admin_list_clients(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pagination): Query<PaginationParams>,
) -> FaucetResult<Json<ApiResponse<serde_json::Value>>> {
    require_admin(&state, &headers).await?;
    let (rows, total) = state
        .registry
        .list(pagination.clamped_limit(), pagination.offset)
        .await?;
    let clients: Vec<AdminClientData> = rows
        .into_iter()
        .map(|client| AdminClientData {
            client_id: client.client_id,
            name: client.name,
            description: client.description,
            is_active: client.is_active,
            rate_limit_override: client.rate_limit_override,
            usage_count: client.usage_count,
            last_used_at: client.last_used_at.map(|t| t.to_rfc3339()),
            created_at: client.created_at.to_rfc3339(),
        })
        .collect();
    Ok(Json(ApiResponse::ok(json!({ "clients": clients, "total": total }))))
}

/// Handler for POST /api/v1/admin/clients/{client_id}/deactivate
pub async fn admin_deactivate_client(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
) -> FaucetResult<Json<ApiResponse<serde_json::Value>>> {
    let identity = require_admin(&state, &headers).await?;
    if !state.registry.deactivate(&client_id).await? {
        return Err(FaucetError::NotFound(format!("client {} not found", client_id)));
    }
    audit(
        &state,
        identity.username(),
        "deactivate_client",
        Some(client_id.clone()),
        &headers,
        &peer,
    )
    .await;
    Ok(Json(ApiResponse::ok(json!({ "clientId": client_id, "isActive": false }))))
}

/// Handler for POST /api/v1/admin/clients/{client_id}/regenerate - new api
/// key; the old one stops working immediately
pub async fn admin_regenerate_client(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
) -> FaucetResult<Json<ApiResponse<serde_json::Value>>> {
    let identity = require_admin(&state, &headers).await?;
    let Some((client, new_key)) = state.registry.regenerate_key(&client_id).await? else {
        return Err(FaucetError::NotFound(format!("client {} not found", client_id)));
    };
    audit(
        &state,
        identity.username(),
        "regenerate_api_key",
        Some(client_id.clone()),
        &headers,
        &peer,
    )
    .await;
    Ok(Json(ApiResponse::with_message(
        json!({ "clientId": client.client_id, "apiKey": new_key }),
        "Store the apiKey now; it is not retrievable later",
    )))
}
