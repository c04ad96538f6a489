// Upstream public faucet client (sdk dispatch mode)
// POSTs the network faucet's fixed-amount payload and tolerates the digest
// field moving between upstream versions. Transient failures (network, 5xx)
// are retried up to three times with 2^n second backoff; rate-limit and
// validation responses are surfaced immediately.

use serde_json::{json, Value};
use std::time::Duration;

use super::ChainError;

const MAX_ATTEMPTS: u32 = 3;

pub struct UpstreamFaucetClient {
    http: reqwest::Client,
    url: String,
}

impl UpstreamFaucetClient {
    pub fn new(http: reqwest::Client, url: &str) -> Self {
        UpstreamFaucetClient { http, url: url.to_string() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request tokens for a recipient; returns the transaction digest
    pub async fn request_tokens(&self, recipient: &str) -> Result<String, ChainError> {
        let mut last_transient = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(recipient).await {
                Ok(digest) => return Ok(digest),
                Err(err) if is_transient(&err) && attempt < MAX_ATTEMPTS => {
                    let backoff = Duration::from_secs(2u64.pow(attempt));
                    tracing::warn!(
                        attempt,
                        backoff_secs = backoff.as_secs(),
                        "Upstream faucet attempt failed, retrying: {}",
                        err
                    );
                    last_transient = Some(err);
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_transient
            .unwrap_or_else(|| ChainError::UpstreamTransient("upstream faucet unreachable".into())))
    }

    async fn attempt(&self, recipient: &str) -> Result<String, ChainError> {
        let body = json!({ "FixedAmountRequest": { "recipient": recipient } });
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::UpstreamTransient(e.to_string()))?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);

        if status.as_u16() == 429 {
            return Err(ChainError::UpstreamRateLimited(upstream_message(&payload)));
        }
        if status.is_server_error() {
            return Err(ChainError::UpstreamTransient(format!(
                "upstream faucet returned {}: {}",
                status,
                upstream_message(&payload)
            )));
        }
        if !status.is_success() {
            return Err(ChainError::Upstream(format!(
                "upstream faucet returned {}: {}",
                status,
                upstream_message(&payload)
            )));
        }

        extract_digest(&payload).ok_or_else(|| {
            ChainError::Upstream("upstream faucet response carried no digest".to_string())
        })
    }
}

/// Pull the original error text out of whatever shape the upstream used
fn upstream_message(payload: &Value) -> String {
    for key in ["error", "message", "detail"] {
        if let Some(message) = payload.get(key).and_then(Value::as_str) {
            return message.to_string();
        }
    }
    payload.to_string()
}

/// Accept the first non-empty of the digest field names upstream versions
/// have used: `digest`, `task.digest`, `transaction_digest`
pub fn extract_digest(payload: &Value) -> Option<String> {
    [
        payload.get("digest"),
        payload.pointer("/task/digest"),
        payload.get("transaction_digest"),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_str)
    .map(str::trim)
    .find(|digest| !digest.is_empty())
    .map(str::to_string)
}

/// Only network and 5xx failures are worth retrying
pub fn is_transient(err: &ChainError) -> bool {
    matches!(err, ChainError::UpstreamTransient(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_top_level_digest_first() {
        let payload = json!({
            "digest": "AAA",
            "task": { "digest": "BBB" },
            "transaction_digest": "CCC",
        });
        assert_eq!(extract_digest(&payload).as_deref(), Some("AAA"));
    }

    #[test]
    fn falls_back_to_task_then_legacy_name() {
        let payload = json!({ "task": { "digest": "BBB" } });
        assert_eq!(extract_digest(&payload).as_deref(), Some("BBB"));

        let payload = json!({ "digest": "", "transaction_digest": "CCC" });
        assert_eq!(extract_digest(&payload).as_deref(), Some("CCC"));
    }

    #[test]
    fn no_digest_is_none() {
        assert_eq!(extract_digest(&json!({ "ok": true })), None);
        assert_eq!(extract_digest(&json!({ "digest": "  " })), None);
    }

    #[test]
    fn only_transient_errors_retry() {
        assert!(is_transient(&ChainError::UpstreamTransient("io".into())));
        assert!(!is_transient(&ChainError::UpstreamRateLimited("slow down".into())));
        assert!(!is_transient(&ChainError::Upstream("bad address".into())));
    }

    #[test]
    fn upstream_message_prefers_error_field() {
        let payload = json!({ "error": "too many requests", "message": "x" });
        assert_eq!(upstream_message(&payload), "too many requests");
    }
}
