// Admin sessions
// HMAC-SHA256 signed tokens, additionally tracked in an in-process active
// set so logout revokes server-side: validation requires both a good
// signature and set membership.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

const TOKEN_ISSUER: &str = "admin";
const TOKEN_AUDIENCE: &str = "api";
const TOKEN_LIFETIME_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Issued token plus its expiry for the login response
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: chrono::DateTime<Utc>,
}

pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    active: RwLock<HashSet<String>>,
}

impl SessionService {
    pub fn new(jwt_secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_audience(&[TOKEN_AUDIENCE]);

        SessionService {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
            active: RwLock::new(HashSet::new()),
        }
    }

    /// Sign a 24h token and add it to the active set
    pub async fn issue(&self, username: &str, role: &str) -> Result<IssuedToken, String> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(TOKEN_LIFETIME_HOURS);
        let claims = AdminClaims {
            sub: username.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| format!("failed to sign session token: {}", e))?;

        self.active.write().await.insert(token.clone());
        Ok(IssuedToken { token, expires_at })
    }

    /// Valid only when the signature checks out AND the token has not been
    /// revoked
    pub async fn validate(&self, token: &str) -> Option<AdminClaims> {
        let data = decode::<AdminClaims>(token, &self.decoding_key, &self.validation).ok()?;
        if !self.active.read().await.contains(token) {
            return None;
        }
        Some(data.claims)
    }

    /// Remove the token from the active set; false when it was not present
    pub async fn revoke(&self, token: &str) -> bool {
        self.active.write().await.remove(token)
    }

    pub async fn active_sessions(&self) -> usize {
        self.active.read().await.len()
    }

    /// Drop expired tokens from the set so it cannot grow unbounded
    pub async fn prune_expired(&self) {
        let mut active = self.active.write().await;
        let decoding_key = &self.decoding_key;
        let validation = &self.validation;
        active.retain(|token| decode::<AdminClaims>(token, decoding_key, validation).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issue_validate_round_trip() {
        let sessions = SessionService::new("a-test-secret-at-least-32-bytes-long");
        let issued = sessions.issue("admin", "super_admin").await.unwrap();

        let claims = sessions.validate(&issued.token).await.unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role, "super_admin");
        assert_eq!(claims.iss, "admin");
        assert_eq!(claims.aud, "api");
        assert!(claims.exp - claims.iat == 24 * 3600);
    }

    #[tokio::test]
    async fn revoked_token_fails_validation_despite_good_signature() {
        let sessions = SessionService::new("a-test-secret-at-least-32-bytes-long");
        let issued = sessions.issue("admin", "admin").await.unwrap();

        assert!(sessions.revoke(&issued.token).await);
        assert!(sessions.validate(&issued.token).await.is_none());
        // revoking twice is a no-op
        assert!(!sessions.revoke(&issued.token).await);
    }

    #[tokio::test]
    async fn token_from_other_secret_is_rejected() {
        let sessions = SessionService::new("a-test-secret-at-least-32-bytes-long");
        let other = SessionService::new("a-different-secret-also-32-bytes!!");
        let issued = other.issue("admin", "admin").await.unwrap();
        assert!(sessions.validate(&issued.token).await.is_none());
    }

    #[tokio::test]
    async fn active_set_tracks_sessions() {
        let sessions = SessionService::new("a-test-secret-at-least-32-bytes-long");
        assert_eq!(sessions.active_sessions().await, 0);
        let a = sessions.issue("a", "admin").await.unwrap();
        let _b = sessions.issue("b", "admin").await.unwrap();
        assert_eq!(sessions.active_sessions().await, 2);
        sessions.revoke(&a.token).await;
        assert_eq!(sessions.active_sessions().await, 1);
    }
}
