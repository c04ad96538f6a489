// Error types for the faucet API
// Every failure is rendered as the uniform envelope:
// { success: false, message, error: { code, details? }, timestamp }

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures from the persistence store. Connection and query problems are
/// kept apart so the store can decide which ones put it into degraded mode;
/// on the faucet path both degrade silently, on admin reads both surface as
/// DATABASE_ERROR.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),
    #[error("Database query error: {0}")]
    QueryError(String),
}

impl From<sea_orm::DbErr> for DbError {
    fn from(err: sea_orm::DbErr) -> Self {
        DbError::QueryError(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum FaucetError {
    #[error("API key is required")]
    MissingApiKey,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("API client is deactivated")]
    InactiveClient,
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimitExceeded { retry_after: u64, detail: String },
    #[error("Faucet wallet balance too low to dispense")]
    FaucetEmpty,
    #[error("Insufficient faucet balance: {0}")]
    InsufficientBalance(String),
    #[error("Upstream faucet rate limited: {0}")]
    UpstreamRateLimited(String),
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Internal error: {0}")]
    ServerError(String),
}

pub type FaucetResult<T> = Result<T, FaucetError>;

impl FaucetError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            FaucetError::MissingApiKey => "MISSING_API_KEY",
            FaucetError::InvalidApiKey => "INVALID_API_KEY",
            FaucetError::InactiveClient => "INACTIVE_CLIENT",
            FaucetError::InvalidAddress(_) => "INVALID_ADDRESS",
            FaucetError::InvalidAmount(_) => "INVALID_AMOUNT",
            FaucetError::InvalidRequest(_) => "INVALID_REQUEST",
            FaucetError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            FaucetError::FaucetEmpty => "FAUCET_EMPTY",
            FaucetError::InsufficientBalance(_) => "INSUFFICIENT_FAUCET_BALANCE",
            FaucetError::UpstreamRateLimited(_) => "UPSTREAM_RATE_LIMITED",
            FaucetError::TransactionFailed(_) => "FAUCET_TRANSACTION_FAILED",
            FaucetError::NotFound(_) => "NOT_FOUND",
            FaucetError::DatabaseError(_) => "DATABASE_ERROR",
            FaucetError::ServerError(_) => "SERVER_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            FaucetError::MissingApiKey
            | FaucetError::InvalidApiKey
            | FaucetError::InactiveClient => StatusCode::UNAUTHORIZED,
            FaucetError::InvalidAddress(_)
            | FaucetError::InvalidAmount(_)
            | FaucetError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            FaucetError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            FaucetError::FaucetEmpty
            | FaucetError::InsufficientBalance(_)
            | FaucetError::UpstreamRateLimited(_) => StatusCode::SERVICE_UNAVAILABLE,
            FaucetError::NotFound(_) => StatusCode::NOT_FOUND,
            FaucetError::TransactionFailed(_)
            | FaucetError::DatabaseError(_)
            | FaucetError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            FaucetError::RateLimitExceeded { retry_after, detail } => Some(json!({
                "retryAfter": retry_after,
                "limit": detail,
            })),
            FaucetError::InvalidAddress(detail)
            | FaucetError::InvalidAmount(detail)
            | FaucetError::InvalidRequest(detail)
            | FaucetError::InsufficientBalance(detail)
            | FaucetError::UpstreamRateLimited(detail)
            | FaucetError::TransactionFailed(detail) => Some(json!(detail)),
            _ => None,
        }
    }
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut error = json!({ "code": self.code() });
        if let Some(details) = self.details() {
            error["details"] = details;
        }

        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
            "error": error,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        let mut response = (status, body).into_response();
        if let FaucetError::RateLimitExceeded { retry_after, .. } = self {
            if let Ok(value) = header::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<DbError> for FaucetError {
    fn from(err: DbError) -> Self {
        FaucetError::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_expected_statuses() {
        assert_eq!(FaucetError::MissingApiKey.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            FaucetError::InvalidAddress("0xzz".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            FaucetError::RateLimitExceeded { retry_after: 60, detail: "wallet".into() }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(FaucetError::FaucetEmpty.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            FaucetError::TransactionFailed("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn rate_limit_code_is_stable() {
        let err = FaucetError::RateLimitExceeded { retry_after: 10, detail: "ip".into() };
        assert_eq!(err.code(), "RATE_LIMIT_EXCEEDED");
    }
}
