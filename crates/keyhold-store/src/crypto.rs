use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use keyhold_core::crypto::{CryptoError, EncryptionService};

use crate::keysource::KeySource;

/// Nonce prefix length for AES-256-GCM blobs.
const NONCE_LEN: usize = 12;

/// AES-256-GCM encryption service with key material from a `KeySource`.
/// Blobs are `nonce || ciphertext` so the storage layer sees a single
/// opaque byte string.
pub struct AesGcmEncryption<K: KeySource> {
    keys: K,
}

impl<K: KeySource> AesGcmEncryption<K> {
    pub fn new(keys: K) -> Self {
        Self { keys }
    }

    async fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        let material = self
            .keys
            .get_or_create()
            .await
            .map_err(|_| CryptoError::Unavailable)?;
        Aes256Gcm::new_from_slice(&material.bytes).map_err(|e| CryptoError::EncryptFailed {
            reason: format!("cipher init failed: {e}"),
        })
    }
}

#[async_trait]
impl<K: KeySource> EncryptionService for AesGcmEncryption<K> {
    async fn is_available(&self) -> bool {
        self.keys.get_or_create().await.is_ok()
    }

    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = self.cipher().await?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CryptoError::EncryptFailed {
                reason: format!("encrypt failed: {e}"),
            })?;

        let mut blob = nonce.to_vec();
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    async fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if blob.len() <= NONCE_LEN {
            return Err(CryptoError::DecryptFailed {
                reason: "blob shorter than nonce".to_string(),
            });
        }

        let cipher = self.cipher().await?;
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| CryptoError::DecryptFailed {
                reason: format!("decrypt failed: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keysource::StaticKeySource;

    #[tokio::test]
    async fn round_trip_encrypts_and_decrypts() {
        let service = AesGcmEncryption::new(StaticKeySource::default());
        let blob = service.encrypt(b"sk-hello").await.expect("encrypt");

        assert!(blob.len() > NONCE_LEN);
        let plain = service.decrypt(&blob).await.expect("decrypt");
        assert_eq!(plain, b"sk-hello");
    }

    #[tokio::test]
    async fn distinct_nonces_for_identical_plaintext() {
        let service = AesGcmEncryption::new(StaticKeySource::default());
        let first = service.encrypt(b"same").await.expect("encrypt");
        let second = service.encrypt(b"same").await.expect("encrypt");
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn rejects_truncated_blob() {
        let service = AesGcmEncryption::new(StaticKeySource::default());
        let err = service.decrypt(&[0u8; 4]).await.expect_err("too short");
        assert!(matches!(err, CryptoError::DecryptFailed { .. }));
    }

    #[tokio::test]
    async fn rejects_tampered_ciphertext() {
        let service = AesGcmEncryption::new(StaticKeySource::default());
        let mut blob = service.encrypt(b"sk-hello").await.expect("encrypt");
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;

        let err = service.decrypt(&blob).await.expect_err("tampered");
        assert!(matches!(err, CryptoError::DecryptFailed { .. }));
    }

    #[tokio::test]
    async fn wrong_key_fails_decrypt() {
        let writer = AesGcmEncryption::new(StaticKeySource::new([1u8; 32]));
        let reader = AesGcmEncryption::new(StaticKeySource::new([2u8; 32]));

        let blob = writer.encrypt(b"sk-hello").await.expect("encrypt");
        let err = reader.decrypt(&blob).await.expect_err("wrong key");
        assert!(matches!(err, CryptoError::DecryptFailed { .. }));
    }
}
