use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use keyhold_core::error::StoreError;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Non-sensitive metadata persisted next to the encrypted blob so display
/// paths never need a decrypt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayMetadata {
    pub last_four: String,
}

impl DisplayMetadata {
    /// Last four characters of the raw secret; the whole secret when it has
    /// fewer than four. Preserved literally for short secrets rather than
    /// rejecting them (stored-metadata semantics depend on it).
    pub fn from_secret(secret: &str) -> Self {
        let chars: Vec<char> = secret.chars().collect();
        let start = chars.len().saturating_sub(4);
        Self {
            last_four: chars[start..].iter().collect(),
        }
    }
}

/// On-disk credential record: one JSON file per identifier under the
/// storage root.
#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub encrypted_blob: String,
    pub metadata: DisplayMetadata,
}

impl CredentialRecord {
    pub fn new(blob: &[u8], metadata: DisplayMetadata) -> Self {
        Self {
            encrypted_blob: URL_SAFE_NO_PAD.encode(blob),
            metadata,
        }
    }

    /// Decode the encrypted blob back to raw bytes.
    pub fn blob_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE_NO_PAD.decode(&self.encrypted_blob)
    }
}

/// Read outcomes the engine maps onto its own error kinds.
#[derive(Debug, Error)]
pub enum RecordReadError {
    #[error("record file not found")]
    NotFound,
    #[error("record unparseable: {0}")]
    Unparseable(String),
    #[error("read failed: {0}")]
    Io(String),
}

/// Atomic write: serialize into a temp file in the same directory, then
/// rename over the destination so readers never observe a partial record.
pub fn write(path: &Path, record: &CredentialRecord) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::io("record path has no parent directory"))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(StoreError::io)?;
    let json = serde_json::to_vec(record).map_err(StoreError::io)?;
    tmp.write_all(&json).map_err(StoreError::io)?;
    tmp.flush().map_err(StoreError::io)?;
    tmp.persist(path).map_err(|e| StoreError::io(e.error))?;
    Ok(())
}

pub fn read(path: &Path) -> Result<CredentialRecord, RecordReadError> {
    let mut file = File::open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            RecordReadError::NotFound
        } else {
            RecordReadError::Io(err.to_string())
        }
    })?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .map_err(|err| RecordReadError::Io(err.to_string()))?;
    serde_json::from_slice(&buf).map_err(|err| RecordReadError::Unparseable(err.to_string()))
}
