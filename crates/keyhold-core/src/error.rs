use thiserror::Error;

/// Errors produced by the secure storage engine and its collaborators.
/// Messages never carry secret material, full or partial.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Identifier failed the path-safety check or is not registered.
    #[error("invalid identifier: {reason}")]
    InvalidIdentifier { reason: String },
    /// Secret does not match the provider's expected format.
    #[error("secret does not match the expected format for {identifier}")]
    InvalidFormat { identifier: String },
    /// The encryption service reports the OS backend as absent or locked.
    #[error("encryption service unavailable")]
    EncryptionUnavailable,
    /// The encryption service accepted the call but failed to encrypt.
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },
    /// The encryption service accepted the call but failed to decrypt.
    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },
    /// No stored credential for the identifier.
    #[error("no stored credential for {identifier}")]
    NotFound { identifier: String },
    /// A record exists but is unparseable or missing required fields.
    #[error("stored record for {identifier} is corrupt: {reason}")]
    Corrupt { identifier: String, reason: String },
    /// Filesystem failure other than not-found.
    #[error("storage failure: {reason}")]
    IoFailure { reason: String },
}

impl StoreError {
    pub fn invalid_identifier(reason: impl Into<String>) -> Self {
        StoreError::InvalidIdentifier {
            reason: reason.into(),
        }
    }

    pub fn corrupt(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    pub fn io(reason: impl ToString) -> Self {
        StoreError::IoFailure {
            reason: reason.to_string(),
        }
    }
}
