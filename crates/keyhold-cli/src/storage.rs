use std::{path::PathBuf, sync::Arc};

use color_eyre::Result;
use dirs::data_dir;
use keyhold_core::catalog::default_registry;
use keyhold_store::{
    crypto::AesGcmEncryption, engine::SecureStorageEngine, keysource::KeyringSource,
};
use tracing::debug;

use crate::config::Config;

pub type CliEngine = SecureStorageEngine<AesGcmEncryption<KeyringSource>>;

/// Resolve the default storage root for keyhold credentials.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("keyhold").join("credentials"))
}

/// Open the production engine (OS keychain key, built-in provider catalog)
/// and run the startup scan to completion. A one-shot process wants the
/// scan finished before answering queries, so this does not use the
/// background variant.
pub async fn open_engine(config: &Config) -> Result<CliEngine> {
    let root = match &config.data_dir {
        Some(root) => {
            debug!(?root, "opening encrypted store (config override)");
            root.clone()
        }
        None => {
            let root = default_data_dir()?;
            debug!(?root, "opening encrypted store");
            root
        }
    };

    let crypto = AesGcmEncryption::new(KeyringSource::new("keyhold", "data-key"));
    let engine = SecureStorageEngine::new(root, Arc::new(default_registry()), crypto)
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;
    engine.scan_storage_root().await;
    Ok(engine)
}

/// Helper for tests to construct an engine rooted at a temp dir with an
/// in-memory encryption double.
#[cfg(test)]
pub fn test_engine(
    root: impl Into<PathBuf>,
) -> SecureStorageEngine<keyhold_core::crypto::MaskingEncryption> {
    SecureStorageEngine::new(
        root,
        Arc::new(default_registry()),
        keyhold_core::crypto::MaskingEncryption::new(),
    )
    .expect("engine should initialize")
}
