// API client registry
// Public registration with constrained inputs, cryptographically random
// credentials, admin lifecycle (deactivate, regenerate), and usage tracking
// that never fails the request it is recording.

use rand::RngCore;

use crate::db::repositories::NewApiClient;
use crate::db::Storage;
use crate::entity::api_clients;
use crate::error::{FaucetError, FaucetResult};
use crate::models::RegisterClientRequest;

const CREDENTIAL_PREFIX: &str = "suifx";
const CLIENT_ID_HEX_LEN: usize = 32;
const API_KEY_HEX_LEN: usize = 48;
const CLIENT_SECRET_HEX_LEN: usize = 64;

fn random_hex(hex_len: usize) -> String {
    let mut bytes = vec![0u8; hex_len / 2];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn generate_client_id() -> String {
    format!("{}_{}", CREDENTIAL_PREFIX, random_hex(CLIENT_ID_HEX_LEN))
}

pub fn generate_api_key() -> String {
    format!("{}_{}", CREDENTIAL_PREFIX, random_hex(API_KEY_HEX_LEN))
}

pub fn generate_client_secret() -> String {
    random_hex(CLIENT_SECRET_HEX_LEN)
}

/// Check the registration inputs: name 1-100 chars, description up to 500,
/// urls must parse as http(s)
pub fn validate_registration(req: &RegisterClientRequest) -> Result<(), String> {
    let name = req.name.trim();
    if name.is_empty() || name.len() > 100 {
        return Err("name must be between 1 and 100 characters".to_string());
    }
    if let Some(description) = &req.description {
        if description.len() > 500 {
            return Err("description must be at most 500 characters".to_string());
        }
    }
    for (field, url) in [
        ("homepageUrl", &req.homepage_url),
        ("callbackUrl", &req.callback_url),
    ] {
        if let Some(url) = url {
            let parsed = reqwest::Url::parse(url)
                .map_err(|_| format!("{} is not a valid URL", field))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(format!("{} must be an http(s) URL", field));
            }
        }
    }
    Ok(())
}

/// Registry service over the persistence store
pub struct ClientRegistry {
    storage: Storage,
}

impl ClientRegistry {
    pub fn new(storage: Storage) -> Self {
        ClientRegistry { storage }
    }

    /// Public registration; the returned model is the only place the api
    /// key ever appears after this call
    pub async fn register(
        &self,
        req: &RegisterClientRequest,
    ) -> FaucetResult<api_clients::Model> {
        validate_registration(req).map_err(FaucetError::InvalidRequest)?;

        let client = NewApiClient {
            client_id: generate_client_id(),
            api_key: generate_api_key(),
            client_secret: generate_client_secret(),
            name: req.name.trim().to_string(),
            description: req.description.clone(),
            homepage_url: req.homepage_url.clone(),
            callback_url: req.callback_url.clone(),
        };
        let created = self.storage.create_api_client(client).await?;
        tracing::info!(client_id = %created.client_id, name = %created.name, "API client registered");
        Ok(created)
    }

    pub async fn find_by_client_id(
        &self,
        client_id: &str,
    ) -> FaucetResult<Option<api_clients::Model>> {
        Ok(self.storage.find_api_client_by_id(client_id).await?)
    }

    pub async fn find_by_api_key(
        &self,
        api_key: &str,
    ) -> FaucetResult<Option<api_clients::Model>> {
        Ok(self.storage.find_api_client_by_key(api_key).await?)
    }

    pub async fn list(
        &self,
        limit: u64,
        offset: u64,
    ) -> FaucetResult<(Vec<api_clients::Model>, u64)> {
        Ok(self.storage.list_api_clients(limit, offset).await?)
    }

    pub async fn deactivate(&self, client_id: &str) -> FaucetResult<bool> {
        let found = self.storage.deactivate_api_client(client_id).await?;
        if found {
            tracing::info!(client_id, "API client deactivated");
        }
        Ok(found)
    }

    /// Issue a fresh api key; the previous key stops authenticating at once
    pub async fn regenerate_key(
        &self,
        client_id: &str,
    ) -> FaucetResult<Option<(api_clients::Model, String)>> {
        let new_key = generate_api_key();
        match self.storage.set_api_key(client_id, &new_key).await? {
            Some(client) => {
                tracing::info!(client_id, "API key regenerated");
                Ok(Some((client, new_key)))
            }
            None => Ok(None),
        }
    }

    /// Append a usage row and bump counters. Failures are logged and
    /// swallowed; usage tracking must never fail the originating request.
    pub async fn record_usage(
        &self,
        client_id: &str,
        endpoint: &str,
        method: &str,
        response_status: i32,
        response_time_ms: i64,
    ) {
        if let Err(e) = self
            .storage
            .record_client_usage(client_id, endpoint, method, response_status, response_time_ms)
            .await
        {
            tracing::error!(client_id, "Failed to record client usage: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> RegisterClientRequest {
        RegisterClientRequest {
            name: name.to_string(),
            description: None,
            homepage_url: None,
            callback_url: None,
        }
    }

    #[test]
    fn credentials_have_prefix_and_length() {
        let client_id = generate_client_id();
        let api_key = generate_api_key();
        let secret = generate_client_secret();

        assert!(client_id.starts_with("suifx_"));
        assert_eq!(client_id.len(), "suifx_".len() + 32);
        assert!(api_key.starts_with("suifx_"));
        assert_eq!(api_key.len(), "suifx_".len() + 48);
        assert_eq!(secret.len(), 64);
    }

    #[test]
    fn credentials_are_unique() {
        assert_ne!(generate_api_key(), generate_api_key());
        assert_ne!(generate_client_id(), generate_client_id());
    }

    #[test]
    fn registration_validation_bounds() {
        assert!(validate_registration(&request("my app")).is_ok());
        assert!(validate_registration(&request("")).is_err());
        assert!(validate_registration(&request(&"x".repeat(101))).is_err());

        let mut req = request("app");
        req.description = Some("d".repeat(501));
        assert!(validate_registration(&req).is_err());

        let mut req = request("app");
        req.homepage_url = Some("ftp://example.com".to_string());
        assert!(validate_registration(&req).is_err());

        let mut req = request("app");
        req.homepage_url = Some("https://example.com".to_string());
        req.callback_url = Some("http://localhost:3000/cb".to_string());
        assert!(validate_registration(&req).is_ok());
    }

    #[tokio::test]
    async fn degraded_registry_still_issues_credentials() {
        let registry = ClientRegistry::new(Storage::disabled());
        let created = registry.register(&request("degraded app")).await.unwrap();
        assert!(created.api_key.starts_with("suifx_"));
        // and lookups stay empty without error
        assert!(registry.find_by_client_id(&created.client_id).await.unwrap().is_none());
    }
}
