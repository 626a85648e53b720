//! Webhook secret decryption.
//!
//! Secrets may be stored encrypted at rest (`enc:` followed by base64 of
//! nonce + AES-256-GCM ciphertext) or as legacy plaintext. Publishers receive a
//! [`SecretDecryptor`] handle at construction and call it once per send.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use std::sync::Arc;

use crate::errors::Error;

/// Prefix marking a secret as encrypted with the process-wide key.
pub const ENCRYPTED_PREFIX: &str = "enc:";

const NONCE_LEN: usize = 12;

/// Resolves possibly-encrypted secrets to the plaintext used for signing.
#[async_trait]
pub trait SecretDecryptor: Send + Sync {
    /// Whether a decryption key is configured. When it isn't, secrets are used as-is.
    fn is_key_configured(&self) -> bool;

    /// Decrypt `secret` if it is in encrypted form, otherwise return it unchanged.
    async fn decrypt_if_applies(&self, secret: &str) -> anyhow::Result<String>;
}

/// Pass-through used when no encryption key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextSecrets;

#[async_trait]
impl SecretDecryptor for PlaintextSecrets {
    fn is_key_configured(&self) -> bool {
        false
    }

    async fn decrypt_if_applies(&self, secret: &str) -> anyhow::Result<String> {
        Ok(secret.to_string())
    }
}

/// AES-256-GCM secrets keyed by a base64-encoded 32-byte key.
pub struct AesGcmSecrets {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for AesGcmSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmSecrets").finish_non_exhaustive()
    }
}

impl AesGcmSecrets {
    /// Build from a base64-encoded key, which must decode to 32 bytes.
    pub fn from_base64_key(key_b64: &str) -> Result<Self, Error> {
        let key_bytes = general_purpose::STANDARD.decode(key_b64.trim()).map_err(|e| Error::Crypto {
            message: format!("failed to decode encryption key: {e}"),
        })?;

        if key_bytes.len() != 32 {
            return Err(Error::Crypto {
                message: format!("encryption key must be 32 bytes (256 bits), got {} bytes", key_bytes.len()),
            });
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes).map_err(|e| Error::Crypto {
            message: format!("failed to create cipher: {e}"),
        })?;

        Ok(Self { cipher })
    }

    /// Encrypt a secret into its at-rest form, `enc:<base64(nonce + ciphertext)>`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, Error> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self.cipher.encrypt(&nonce, plaintext.as_bytes()).map_err(|e| Error::Crypto {
            message: format!("encryption failed: {e}"),
        })?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);

        Ok(format!("{ENCRYPTED_PREFIX}{}", general_purpose::STANDARD.encode(sealed)))
    }

    fn decrypt(&self, encrypted_b64: &str) -> Result<String, Error> {
        let sealed = general_purpose::STANDARD.decode(encrypted_b64).map_err(|e| Error::Crypto {
            message: format!("failed to decode encrypted secret: {e}"),
        })?;

        if sealed.len() < NONCE_LEN {
            return Err(Error::Crypto {
                message: "encrypted secret too short".to_string(),
            });
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| Error::Crypto {
                message: format!("decryption failed: {e}"),
            })?;

        String::from_utf8(plaintext).map_err(|_| Error::Crypto {
            message: "decrypted secret is not valid UTF-8".to_string(),
        })
    }
}

#[async_trait]
impl SecretDecryptor for AesGcmSecrets {
    fn is_key_configured(&self) -> bool {
        true
    }

    async fn decrypt_if_applies(&self, secret: &str) -> anyhow::Result<String> {
        match secret.strip_prefix(ENCRYPTED_PREFIX) {
            Some(encrypted) => Ok(self.decrypt(encrypted)?),
            None => Ok(secret.to_string()),
        }
    }
}

/// Pick the decryptor for an optional configured key.
pub fn secrets_from_key(encryption_key: Option<&str>) -> Result<Arc<dyn SecretDecryptor>, Error> {
    match encryption_key {
        Some(key) => Ok(Arc::new(AesGcmSecrets::from_base64_key(key)?)),
        None => Ok(Arc::new(PlaintextSecrets)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> String {
        general_purpose::STANDARD.encode([7u8; 32])
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_roundtrip() {
        let secrets = AesGcmSecrets::from_base64_key(&test_key()).unwrap();

        let encrypted = secrets.encrypt("s3cr3t").expect("Encryption should succeed");
        assert!(encrypted.starts_with(ENCRYPTED_PREFIX));
        assert!(!encrypted.contains("s3cr3t"));

        let decrypted = secrets.decrypt_if_applies(&encrypted).await.unwrap();
        assert_eq!(decrypted, "s3cr3t");
    }

    #[tokio::test]
    async fn test_plaintext_secret_passes_through_configured_key() {
        let secrets = AesGcmSecrets::from_base64_key(&test_key()).unwrap();
        assert!(secrets.is_key_configured());
        assert_eq!(secrets.decrypt_if_applies("legacy-plain").await.unwrap(), "legacy-plain");
    }

    #[tokio::test]
    async fn test_plaintext_secrets_never_decrypt() {
        let secrets = PlaintextSecrets;
        assert!(!secrets.is_key_configured());
        assert_eq!(secrets.decrypt_if_applies("enc:abc").await.unwrap(), "enc:abc");
    }

    #[test]
    fn test_invalid_key_length() {
        let short = general_purpose::STANDARD.encode([0u8; 16]);
        let err = AesGcmSecrets::from_base64_key(&short).unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn test_invalid_key_encoding() {
        assert!(AesGcmSecrets::from_base64_key("not base64!!!").is_err());
    }

    #[tokio::test]
    async fn test_wrong_key_fails_to_decrypt() {
        let encrypted = AesGcmSecrets::from_base64_key(&test_key()).unwrap().encrypt("s3cr3t").unwrap();

        let other = AesGcmSecrets::from_base64_key(&general_purpose::STANDARD.encode([9u8; 32])).unwrap();
        assert!(other.decrypt_if_applies(&encrypted).await.is_err());
    }

    #[tokio::test]
    async fn test_truncated_ciphertext_fails() {
        let secrets = AesGcmSecrets::from_base64_key(&test_key()).unwrap();
        let truncated = format!("{ENCRYPTED_PREFIX}{}", general_purpose::STANDARD.encode([0u8; 5]));
        let err = secrets.decrypt_if_applies(&truncated).await.unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_encryption_produces_different_ciphertexts() {
        let secrets = AesGcmSecrets::from_base64_key(&test_key()).unwrap();
        assert_ne!(secrets.encrypt("same").unwrap(), secrets.encrypt("same").unwrap());
    }

    #[test]
    fn test_secrets_from_key() {
        assert!(!secrets_from_key(None).unwrap().is_key_configured());
        assert!(secrets_from_key(Some(&test_key())).unwrap().is_key_configured());
        assert!(secrets_from_key(Some("short")).is_err());
    }
}
