// API request/response models

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};

/// Success envelope wrapping every 2xx payload:
/// { success: true, message?, data, timestamp }
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
    pub timestamp: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            message: None,
            data,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        ApiResponse {
            success: true,
            message: Some(message.into()),
            data,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Custom deserializer accepting an amount as a JSON number or a string
fn deserialize_opt_amount<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match raw {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("amount must be a positive integer")),
        Some(serde_json::Value::String(s)) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom("amount must be a positive integer")),
        Some(_) => Err(serde::de::Error::custom("amount must be a number or string")),
    }
}

/// Body for POST /api/v1/faucet/request; `address` and `walletAddress` are synonyms
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetRequestBody {
    pub address: Option<String>,
    pub wallet_address: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub amount: Option<u64>,
}

impl FaucetRequestBody {
    /// The recipient address, whichever field the caller used
    pub fn recipient(&self) -> Option<&str> {
        self.wallet_address
            .as_deref()
            .or(self.address.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Payload for a successful token dispatch
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetSuccessData {
    pub transaction_hash: String,
    pub amount: String,
    pub wallet_address: String,
    pub network: String,
    pub explorer_url: String,
}

/// Payload for GET /api/v1/faucet/status
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetStatusData {
    pub network: String,
    pub mode: String,
    pub balance: String,
    pub default_amount: String,
    pub max_amount: String,
    pub limits: FaucetLimits,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetLimits {
    pub window_ms: u64,
    pub max_per_wallet: u32,
    pub max_per_ip: u32,
    pub cooldown_seconds: u64,
}

/// Body for POST /api/v1/clients/register
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterClientRequest {
    pub name: String,
    pub description: Option<String>,
    pub homepage_url: Option<String>,
    pub callback_url: Option<String>,
}

/// Creation response; the only time the api key is ever returned
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredClientData {
    pub client_id: String,
    pub api_key: String,
    pub name: String,
    pub created_at: String,
}

/// Public client info, secrets withheld
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicClientData {
    pub client_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage_url: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

/// Admin view of a client, including usage but never the key
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminClientData {
    pub client_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub rate_limit_override: Option<i32>,
    pub usage_count: i64,
    pub last_used_at: Option<String>,
    pub created_at: String,
}

/// Body for POST /api/v1/admin/login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub token: String,
    pub role: String,
    pub expires_at: String,
}

/// Body for PUT /api/v1/admin/rate-limits/bulk
#[derive(Debug, Deserialize)]
pub struct BulkSettingsRequest {
    pub settings: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct UpdatedSetting {
    pub setting_name: String,
    pub new_value: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct SettingUpdateError {
    pub setting_name: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BulkSettingsData {
    pub updated: Vec<UpdatedSetting>,
    pub errors: Vec<SettingUpdateError>,
}

/// Body for PUT /api/v1/admin/rate-limits/{name}
#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub value: serde_json::Value,
}

/// Body for POST /api/v1/admin/test-transaction
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestTransactionRequest {
    pub wallet_address: String,
    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub amount: Option<u64>,
}

/// Custom deserializer to convert string to u64
fn deserialize_string_to_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = String::deserialize(deserializer)?;
    s.parse::<u64>().map_err(serde::de::Error::custom)
}

/// Common pagination parameters for listing endpoints
#[derive(Debug, Deserialize, Default)]
pub struct PaginationParams {
    #[serde(
        default = "default_limit",
        deserialize_with = "deserialize_string_to_u64"
    )]
    pub limit: u64,
    #[serde(
        default = "default_offset",
        deserialize_with = "deserialize_string_to_u64"
    )]
    pub offset: u64,
}

fn default_limit() -> u64 {
    50
}

fn default_offset() -> u64 {
    0
}

impl PaginationParams {
    /// Clamp the limit to a sane page size
    pub fn clamped_limit(&self) -> u64 {
        self.limit.clamp(1, 500)
    }
}

/// Query parameters for GET /api/v1/admin/transactions
#[derive(Debug, Deserialize, Default)]
pub struct TransactionsQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,
    /// Restrict the listing to one wallet address
    pub wallet: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_prefers_wallet_address() {
        let body: FaucetRequestBody = serde_json::from_str(
            r#"{"address":"0x01","walletAddress":"0x02"}"#,
        )
        .unwrap();
        assert_eq!(body.recipient(), Some("0x02"));
    }

    #[test]
    fn recipient_accepts_address_alone() {
        let body: FaucetRequestBody = serde_json::from_str(r#"{"address":"0x01"}"#).unwrap();
        assert_eq!(body.recipient(), Some("0x01"));
    }

    #[test]
    fn amount_accepts_number_and_string() {
        let body: FaucetRequestBody =
            serde_json::from_str(r#"{"address":"0x01","amount":100000000}"#).unwrap();
        assert_eq!(body.amount, Some(100_000_000));

        let body: FaucetRequestBody =
            serde_json::from_str(r#"{"address":"0x01","amount":"100000000"}"#).unwrap();
        assert_eq!(body.amount, Some(100_000_000));
    }

    #[test]
    fn amount_rejects_negative_and_garbage() {
        assert!(serde_json::from_str::<FaucetRequestBody>(
            r#"{"address":"0x01","amount":-5}"#
        )
        .is_err());
        assert!(serde_json::from_str::<FaucetRequestBody>(
            r#"{"address":"0x01","amount":"abc"}"#
        )
        .is_err());
    }

    #[test]
    fn pagination_defaults_and_clamp() {
        let params = PaginationParams::default();
        assert_eq!(params.offset, 0);
        let params = PaginationParams { limit: 10_000, offset: 0 };
        assert_eq!(params.clamped_limit(), 500);
    }
}
