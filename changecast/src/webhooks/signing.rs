//! HMAC-SHA256 payload signing.
//!
//! The signature header value is `sha256=<hex>` where `<hex>` is the
//! lowercase hex HMAC-SHA256 of the exact request body, keyed with the
//! decrypted webhook secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::crypto::SecretDecryptor;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

/// Prefix of the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Sign a payload with a plaintext secret.
///
/// Returns the header value in format `sha256={hex-hmac-sha256}`.
pub fn sign_payload(payload: &str, secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    Some(format!("{}{}", SIGNATURE_PREFIX, hex::encode(signature)))
}

/// Compute the signature header value for a payload, if a secret is set.
///
/// The secret is passed through the decryptor exactly once when a decryption
/// key is configured, and used as-is otherwise.
pub async fn signature_header(
    payload: &str,
    secret: Option<&str>,
    secrets: &dyn SecretDecryptor,
) -> anyhow::Result<Option<String>> {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let key = if secrets.is_key_configured() {
        secrets.decrypt_if_applies(secret).await?
    } else {
        secret.to_string()
    };

    let signature = sign_payload(payload, &key).ok_or_else(|| anyhow::anyhow!("Failed to sign webhook payload"))?;
    Ok(Some(signature))
}

/// Verify a signature header value against a payload.
pub fn verify_signature(payload: &str, signature: &str, secret: &str) -> bool {
    if !signature.starts_with(SIGNATURE_PREFIX) {
        return false;
    }

    let Some(expected) = sign_payload(payload, secret) else {
        return false;
    };

    constant_time_eq(signature.as_bytes(), expected.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{AesGcmSecrets, PlaintextSecrets};
    use base64::{Engine as _, engine::general_purpose};

    #[test]
    fn test_known_vector() {
        let signature = sign_payload("The quick brown fox jumps over the lazy dog", "key").unwrap();
        assert_eq!(
            signature,
            "sha256=f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_signature_format_and_determinism() {
        let payload = r#"{"id":"1","eventType":"entityUpdated"}"#;
        let signature = sign_payload(payload, "s3cr3t").unwrap();

        let hex_part = signature.strip_prefix(SIGNATURE_PREFIX).unwrap();
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(signature, sign_payload(payload, "s3cr3t").unwrap());
    }

    #[test]
    fn test_one_byte_change_changes_signature() {
        let a = sign_payload(r#"{"n":1}"#, "s3cr3t").unwrap();
        let b = sign_payload(r#"{"n":2}"#, "s3cr3t").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_sign_and_verify() {
        let payload = r#"{"type":"entityUpdated"}"#;
        let signature = sign_payload(payload, "s3cr3t").unwrap();

        assert!(verify_signature(payload, &signature, "s3cr3t"));
        assert!(!verify_signature("wrong", &signature, "s3cr3t"));
        assert!(!verify_signature(payload, &signature, "other"));
        assert!(!verify_signature(payload, "sha1=abc", "s3cr3t"));
    }

    #[tokio::test]
    async fn test_no_secret_no_header() {
        assert!(signature_header("body", None, &PlaintextSecrets).await.unwrap().is_none());
        assert!(signature_header("body", Some(""), &PlaintextSecrets).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_encrypted_secret_is_decrypted_before_signing() {
        let secrets = AesGcmSecrets::from_base64_key(&general_purpose::STANDARD.encode([3u8; 32])).unwrap();
        let encrypted = secrets.encrypt("s3cr3t").unwrap();

        let header = signature_header("body", Some(&encrypted), &secrets).await.unwrap();
        assert_eq!(header, sign_payload("body", "s3cr3t"));
    }

    #[tokio::test]
    async fn test_plaintext_secret_used_as_is_without_key() {
        let header = signature_header("body", Some("enc:looks-encrypted"), &PlaintextSecrets)
            .await
            .unwrap();
        assert_eq!(header, sign_payload("body", "enc:looks-encrypted"));
    }
}
