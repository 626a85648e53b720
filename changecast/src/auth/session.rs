//! JWT bearer tokens for webhook requests.

use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{auth::AuthHeaderProvider, config::JwtConfig};

/// JWT claims identifying the principal a webhook request is sent for
#[derive(Debug, Serialize, Deserialize)]
pub struct PrincipalClaims {
    pub sub: String, // Principal name
    pub iss: String, // Issuer
    pub exp: i64,    // Expiration time
    pub iat: i64,    // Issued at
}

impl PrincipalClaims {
    pub fn new(principal: &str, issuer: &str, expiry: Duration) -> Self {
        let now = Utc::now();
        let exp = now + expiry;

        Self {
            sub: principal.to_string(),
            iss: issuer.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Mints a fresh `Authorization: Bearer <jwt>` header for every call.
pub struct JwtAuthHeaders {
    key: EncodingKey,
    issuer: String,
    expiry: Duration,
}

impl JwtAuthHeaders {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            key: EncodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            expiry: config.expiry,
        }
    }

    pub fn create_token(&self, principal: &str) -> anyhow::Result<String> {
        let claims = PrincipalClaims::new(principal, &self.issuer, self.expiry);
        encode(&Header::default(), &claims, &self.key).map_err(|e| anyhow::anyhow!("create JWT: {e}"))
    }
}

impl AuthHeaderProvider for JwtAuthHeaders {
    fn auth_headers(&self, principal: &str) -> anyhow::Result<Vec<(String, String)>> {
        let token = self.create_token(principal)?;
        Ok(vec![("Authorization".to_string(), format!("Bearer {token}"))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    fn create_test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-for-jwt".to_string(),
            issuer: "changecast-test".to_string(),
            expiry: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_token_carries_principal() {
        let provider = JwtAuthHeaders::new(&create_test_config());
        let token = provider.create_token("admin").unwrap();

        let mut validation = Validation::default();
        validation.set_issuer(&["changecast-test"]);
        let data = decode::<PrincipalClaims>(
            &token,
            &DecodingKey::from_secret(b"test-secret-key-for-jwt"),
            &validation,
        )
        .unwrap();

        assert_eq!(data.claims.sub, "admin");
        assert!(data.claims.exp > data.claims.iat);
    }

    #[test]
    fn test_token_rejected_with_wrong_secret() {
        let provider = JwtAuthHeaders::new(&create_test_config());
        let token = provider.create_token("admin").unwrap();

        let result = decode::<PrincipalClaims>(&token, &DecodingKey::from_secret(b"different"), &Validation::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_auth_headers_bearer_format() {
        let provider = JwtAuthHeaders::new(&create_test_config());
        let headers = provider.auth_headers("alerts-bot").unwrap();

        assert_eq!(headers.len(), 1);
        let (name, value) = &headers[0];
        assert_eq!(name, "Authorization");
        assert_eq!(value.strip_prefix("Bearer ").unwrap().split('.').count(), 3);
    }
}
