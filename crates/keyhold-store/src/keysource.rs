use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

/// 256-bit symmetric key for encryption at rest. Deliberately no `Debug`
/// derive so key bytes cannot end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub bytes: [u8; 32],
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Provides the encryption key (OS keyring in production; static in tests).
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError>;
}

/// OS keyring-backed source. The key lives as a base64 password entry under
/// a service/account pair owned by this application.
pub struct KeyringSource {
    service: String,
    account: String,
}

impl KeyringSource {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }
}

#[async_trait]
impl KeySource for KeyringSource {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        // Keyring operations are synchronous; wrap in async for trait compatibility.
        let entry = keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| KeyError::Keyring(e.to_string()))?;

        if let Ok(encoded) = entry.get_password() {
            return decode_key(&encoded);
        }

        let material = generate_key();
        entry
            .set_password(&STANDARD.encode(material.bytes))
            .map_err(|e| KeyError::Keyring(e.to_string()))?;
        Ok(material)
    }
}

/// Fixed-key source for tests and ephemeral stores.
#[derive(Clone)]
pub struct StaticKeySource {
    material: KeyMaterial,
}

impl StaticKeySource {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self {
            material: KeyMaterial { bytes },
        }
    }
}

impl Default for StaticKeySource {
    fn default() -> Self {
        Self {
            material: generate_key(),
        }
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        Ok(self.material.clone())
    }
}

fn generate_key() -> KeyMaterial {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    KeyMaterial { bytes }
}

fn decode_key(encoded: &str) -> Result<KeyMaterial, KeyError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| KeyError::Decode(e.to_string()))?;

    if bytes.len() != 32 {
        return Err(KeyError::Decode(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(KeyMaterial { bytes: out })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_source_returns_same_key() {
        let source = StaticKeySource::default();
        let first = source.get_or_create().await.expect("first key");
        let second = source.get_or_create().await.expect("second key");
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        // matches! instead of expect_err: KeyMaterial has no Debug on purpose.
        assert!(matches!(decode_key("abcd"), Err(KeyError::Decode(_))));
    }

    #[test]
    fn decode_round_trips_generated_key() {
        let material = generate_key();
        let encoded = STANDARD.encode(material.bytes);
        let decoded = decode_key(&encoded).expect("decode");
        assert_eq!(decoded.bytes, material.bytes);
    }
}
