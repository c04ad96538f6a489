// Handlers for the faucet endpoints

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::HeaderMap,
    Extension, Json,
};
use serde_json::json;

use crate::error::{FaucetError, FaucetResult};
use crate::handlers::AppState;
use crate::middleware::{client_ip, extract_credential, RequestContext};
use crate::models::{ApiResponse, FaucetLimits, FaucetRequestBody, FaucetStatusData};
use crate::services::admission::{Caller, FaucetRequestContext};

/// Handler for POST /api/v1/faucet/request - dispense tokens to a wallet
pub async fn request_tokens(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Extension(request): Extension<RequestContext>,
    headers: HeaderMap,
    Json(body): Json<FaucetRequestBody>,
) -> FaucetResult<Json<ApiResponse<crate::models::FaucetSuccessData>>> {
    let credential = extract_credential(&headers);
    let caller = state.admission.authenticate(credential.as_deref()).await?;

    let address = body
        .recipient()
        .ok_or_else(|| FaucetError::InvalidAddress("walletAddress is required".to_string()))?
        .to_string();
    let context = FaucetRequestContext {
        request_id: request.request_id.clone(),
        address,
        amount: body.amount,
        client_ip: client_ip(&headers, &peer),
        user_agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    let outcome = state.admission.admit(&caller, &context).await;

    // Per-client usage tracking; never fails the request it records
    if let Caller::Client(client) = &caller {
        let status = match &outcome {
            Ok(_) => 200,
            Err(err) => err.status().as_u16() as i32,
        };
        state
            .registry
            .record_usage(
                &client.client_id,
                "/api/v1/faucet/request",
                "POST",
                status,
                request.elapsed_ms() as i64,
            )
            .await;
    }

    let data = outcome?;
    Ok(Json(ApiResponse::with_message(data, "Tokens sent")))
}

/// Handler for GET /api/v1/faucet/status - balance, network and limits
pub async fn faucet_status(
    State(state): State<AppState>,
) -> FaucetResult<Json<ApiResponse<FaucetStatusData>>> {
    let snapshot = state.settings.snapshot().await;
    let mode = state.dispatcher.resolve_mode(snapshot.faucet_mode.as_deref());
    let balance = state
        .dispatcher
        .wallet_balance()
        .await
        .map(|b| b.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    Ok(Json(ApiResponse::ok(FaucetStatusData {
        network: state.config.network.as_str().to_string(),
        mode: mode.as_str().to_string(),
        balance,
        default_amount: state.config.default_amount.to_string(),
        max_amount: state.config.max_amount.to_string(),
        limits: FaucetLimits {
            window_ms: snapshot.window_ms,
            max_per_wallet: snapshot.max_per_wallet,
            max_per_ip: snapshot.effective_max_per_ip(),
            cooldown_seconds: snapshot.effective_cooldown_seconds(),
        },
    })))
}

/// Handler for GET /api/v1/faucet/mode - current dispatch mode
pub async fn faucet_mode(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    headers: HeaderMap,
) -> FaucetResult<Json<ApiResponse<serde_json::Value>>> {
    let credential = extract_credential(&headers);
    let caller = state.admission.authenticate(credential.as_deref()).await?;
    if let Caller::Client(client) = &caller {
        state
            .registry
            .record_usage(
                &client.client_id,
                "/api/v1/faucet/mode",
                "GET",
                200,
                request.elapsed_ms() as i64,
            )
            .await;
    }

    let snapshot = state.settings.snapshot().await;
    let mode = state.dispatcher.resolve_mode(snapshot.faucet_mode.as_deref());
    Ok(Json(ApiResponse::ok(json!({
        "mode": mode.as_str(),
        "walletConfigured": state.dispatcher.has_wallet(),
    }))))
}
