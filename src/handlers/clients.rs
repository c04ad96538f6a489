// Handlers for public API client registration and lookup

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{FaucetError, FaucetResult};
use crate::handlers::AppState;
use crate::models::{ApiResponse, PublicClientData, RegisteredClientData, RegisterClientRequest};

/// Handler for POST /api/v1/clients/register - create an API client.
/// The api key appears in this response and never again.
pub async fn register_client(
    State(state): State<AppState>,
    Json(body): Json<RegisterClientRequest>,
) -> FaucetResult<Json<ApiResponse<RegisteredClientData>>> {
    let created = state.registry.register(&body).await?;
    Ok(Json(ApiResponse::with_message(
        RegisteredClientData {
            client_id: created.client_id,
            api_key: created.api_key,
            name: created.name,
            created_at: created.created_at.to_rfc3339(),
        },
        "Store the apiKey now; it is not retrievable later",
    )))
}

/// Handler for GET /api/v1/clients/{client_id} - public info, no secrets
pub async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> FaucetResult<Json<ApiResponse<PublicClientData>>> {
    let client = state
        .registry
        .find_by_client_id(&client_id)
        .await?
        .ok_or_else(|| FaucetError::NotFound(format!("client {} not found", client_id)))?;

    Ok(Json(ApiResponse::ok(PublicClientData {
        client_id: client.client_id,
        name: client.name,
        description: client.description,
        homepage_url: client.homepage_url,
        is_active: client.is_active,
        created_at: client.created_at.to_rfc3339(),
    })))
}
