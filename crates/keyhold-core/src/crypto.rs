use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use thiserror::Error;

/// Errors at the encryption-service boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The OS secure-storage subsystem is absent or locked.
    #[error("encryption backend unavailable")]
    Unavailable,
    /// The backend rejected the encrypt call.
    #[error("encrypt rejected: {reason}")]
    EncryptFailed { reason: String },
    /// The backend rejected the decrypt call.
    #[error("decrypt rejected: {reason}")]
    DecryptFailed { reason: String },
}

/// Opaque OS-backed encryption capability. Key management is not exposed;
/// callers only see byte-to-byte transforms that may fail when the backend
/// is missing or locked.
#[async_trait]
pub trait EncryptionService: Send + Sync {
    /// Whether the backend can currently serve encrypt/decrypt calls.
    async fn is_available(&self) -> bool;

    /// Encrypt plaintext bytes into an opaque blob.
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt a blob previously produced by `encrypt`.
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// In-memory encryption double that masks bytes for tests and smoke runs.
/// This is not cryptographically secure; production implementations must use
/// AES-GCM with keys held by the OS keychain.
#[derive(Debug, Clone)]
pub struct MaskingEncryption {
    available: Arc<AtomicBool>,
}

impl MaskingEncryption {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip availability to simulate a locked or missing OS backend.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl Default for MaskingEncryption {
    fn default() -> Self {
        Self {
            available: Arc::new(AtomicBool::new(true)),
        }
    }
}

#[async_trait]
impl EncryptionService for MaskingEncryption {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(CryptoError::Unavailable);
        }
        Ok(mask(plaintext))
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(CryptoError::Unavailable);
        }
        Ok(mask(ciphertext)) // XOR twice restores original.
    }
}

const MASK_BYTE: u8 = 0xA5;

fn mask(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| b ^ MASK_BYTE).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn masking_round_trip_restores_plaintext() {
        let service = MaskingEncryption::new();
        let blob = service.encrypt(b"sk-secret").await.expect("encrypt");
        assert_ne!(blob, b"sk-secret".to_vec());

        let plain = service.decrypt(&blob).await.expect("decrypt");
        assert_eq!(plain, b"sk-secret");
    }

    #[tokio::test]
    async fn unavailable_backend_rejects_calls() {
        let service = MaskingEncryption::new();
        service.set_available(false);

        assert!(!service.is_available().await);
        let err = service.encrypt(b"x").await.expect_err("should reject");
        assert_eq!(err, CryptoError::Unavailable);
    }
}
