use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use keyhold_core::{
    crypto::{CryptoError, EncryptionService},
    error::StoreError,
    registry::ProviderRegistry,
};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::{
    path as record_path,
    record::{self, CredentialRecord, DisplayMetadata, RecordReadError},
};

/// Non-sensitive answer for display surfaces. Carries at most the last four
/// characters of a secret, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    pub is_stored: bool,
    pub last_four: Option<String>,
}

impl DisplayInfo {
    fn absent() -> Self {
        Self {
            is_stored: false,
            last_four: None,
        }
    }
}

#[derive(Default)]
struct CacheState {
    /// identifier -> last-four metadata, mirroring disk.
    entries: HashMap<String, String>,
    /// Identifiers mutated by a caller since startup. The startup scan skips
    /// these so it can never regress a delete or clobber a newer store.
    touched: HashSet<String>,
}

/// Secure storage engine: orchestrates the provider registry, path resolver,
/// encryption service, and filesystem. Plaintext secrets exist only on the
/// call stack of `store` (until encrypted) and inside the
/// `with_decrypted_secret` callback.
pub struct SecureStorageEngine<E> {
    root: PathBuf,
    registry: Arc<ProviderRegistry>,
    crypto: E,
    cache: Mutex<CacheState>,
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<E: EncryptionService> SecureStorageEngine<E> {
    /// Create an engine rooted at `root`, creating the directory if needed.
    /// Fails when the root cannot be created; does not scan existing records
    /// (see `initialize` and `scan_storage_root`).
    pub fn new(
        root: impl Into<PathBuf>,
        registry: Arc<ProviderRegistry>,
        crypto: E,
    ) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(StoreError::io)?;
        Ok(Self {
            root,
            registry,
            crypto,
            cache: Mutex::new(CacheState::default()),
            write_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Scan the storage root and populate the metadata cache from records of
    /// registered identifiers. Per-identifier failures are logged and
    /// skipped; the scan only ever adds entries and leaves identifiers
    /// already touched by a caller alone.
    pub async fn scan_storage_root(&self) {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("startup scan could not list storage root: {err}");
                return;
            }
        };

        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(err) => {
                    warn!("startup scan skipping unreadable directory entry: {err}");
                    continue;
                }
            };
            let Some(identifier) = record_path::identifier_for(&path) else {
                continue;
            };
            if !self.registry.contains(&identifier) {
                debug!(identifier = %identifier, "startup scan skipping unregistered record");
                continue;
            }
            self.scan_record(&identifier, &path).await;
        }
    }

    async fn scan_record(&self, identifier: &str, path: &Path) {
        let lock = self.write_lock(identifier).await;
        let _guard = lock.lock().await;

        {
            let cache = self.cache.lock().await;
            if cache.touched.contains(identifier) || cache.entries.contains_key(identifier) {
                return;
            }
        }

        match record::read(path) {
            Ok(rec) => {
                let mut cache = self.cache.lock().await;
                // Re-check: a store/delete may have landed while reading.
                if !cache.touched.contains(identifier) {
                    cache
                        .entries
                        .insert(identifier.to_string(), rec.metadata.last_four);
                }
            }
            Err(err) => {
                warn!(identifier, "startup scan skipping record: {err}");
            }
        }
    }

    /// Validate, encrypt, and persist a secret for `identifier`. The cache
    /// is updated only after the atomic write succeeds; no plaintext is
    /// retained once this returns.
    #[instrument(skip_all, fields(identifier = %identifier))]
    pub async fn store(&self, identifier: &str, secret: &str) -> Result<(), StoreError> {
        let path = record_path::resolve(&self.root, identifier)?;
        let validator = self.registry.get(identifier).ok_or_else(|| {
            StoreError::invalid_identifier(format!("unregistered provider: {identifier}"))
        })?;
        if !validator(secret) {
            return Err(StoreError::InvalidFormat {
                identifier: identifier.to_string(),
            });
        }
        if !self.crypto.is_available().await {
            return Err(StoreError::EncryptionUnavailable);
        }

        let blob = self
            .crypto
            .encrypt(secret.as_bytes())
            .await
            .map_err(map_crypto)?;
        let metadata = DisplayMetadata::from_secret(secret);
        let rec = CredentialRecord::new(&blob, metadata.clone());

        let lock = self.write_lock(identifier).await;
        let _guard = lock.lock().await;
        record::write(&path, &rec)?;

        let mut cache = self.cache.lock().await;
        cache
            .entries
            .insert(identifier.to_string(), metadata.last_four);
        cache.touched.insert(identifier.to_string());
        debug!("credential stored");
        Ok(())
    }

    /// Remove the record and its cache entry. A missing file counts as
    /// already deleted; other filesystem failures surface as `IoFailure`.
    #[instrument(skip_all, fields(identifier = %identifier))]
    pub async fn delete(&self, identifier: &str) -> Result<(), StoreError> {
        let path = record_path::resolve(&self.root, identifier)?;

        let lock = self.write_lock(identifier).await;
        let _guard = lock.lock().await;

        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(StoreError::io(err)),
        }

        let mut cache = self.cache.lock().await;
        cache.entries.remove(identifier);
        cache.touched.insert(identifier.to_string());
        debug!("credential deleted");
        Ok(())
    }

    /// Cache-first existence check. On a miss the record file is the
    /// authority, read under the per-identifier lock so an interleaved
    /// delete cannot leave a stale answer: a readable record backfills the
    /// cache, a present-but-unparseable one still reports stored.
    pub async fn is_stored(&self, identifier: &str) -> bool {
        {
            let cache = self.cache.lock().await;
            if cache.entries.contains_key(identifier) {
                return true;
            }
        }

        let Ok(path) = record_path::resolve(&self.root, identifier) else {
            return false;
        };

        let lock = self.write_lock(identifier).await;
        let _guard = lock.lock().await;
        match record::read(&path) {
            Ok(rec) => {
                let mut cache = self.cache.lock().await;
                cache
                    .entries
                    .insert(identifier.to_string(), rec.metadata.last_four);
                true
            }
            Err(RecordReadError::NotFound) => false,
            Err(err) => {
                warn!(identifier, "stored record present but unreadable: {err}");
                true
            }
        }
    }

    /// Identifiers currently known to this engine instance (the cache is
    /// the source of truth; unscanned records become visible once the
    /// startup scan or an access backfills them).
    pub async fn list_stored_identifiers(&self) -> BTreeSet<String> {
        let cache = self.cache.lock().await;
        cache.entries.keys().cloned().collect()
    }

    /// Display metadata without decryption. Cache hit answers immediately;
    /// a miss falls back to the file; missing or unparseable records report
    /// not-stored.
    pub async fn get_display_info(&self, identifier: &str) -> DisplayInfo {
        {
            let cache = self.cache.lock().await;
            if let Some(last_four) = cache.entries.get(identifier) {
                return DisplayInfo {
                    is_stored: true,
                    last_four: Some(last_four.clone()),
                };
            }
        }

        let Ok(path) = record_path::resolve(&self.root, identifier) else {
            return DisplayInfo::absent();
        };

        let lock = self.write_lock(identifier).await;
        let _guard = lock.lock().await;
        match record::read(&path) {
            Ok(rec) => {
                let mut cache = self.cache.lock().await;
                cache
                    .entries
                    .insert(identifier.to_string(), rec.metadata.last_four.clone());
                DisplayInfo {
                    is_stored: true,
                    last_four: Some(rec.metadata.last_four),
                }
            }
            Err(_) => DisplayInfo::absent(),
        }
    }

    /// Decrypt the stored secret and hand it to `operation`; the plaintext
    /// does not outlive this call frame. The operation's result is returned
    /// unchanged; only lookup/decrypt failures use engine error kinds.
    #[instrument(skip_all, fields(identifier = %identifier))]
    pub async fn with_decrypted_secret<F, T>(
        &self,
        identifier: &str,
        operation: F,
    ) -> Result<T, StoreError>
    where
        F: FnOnce(&str) -> T,
    {
        let path = record_path::resolve(&self.root, identifier)?;

        let rec = {
            let lock = self.write_lock(identifier).await;
            let _guard = lock.lock().await;
            record::read(&path).map_err(|err| match err {
                RecordReadError::NotFound => StoreError::NotFound {
                    identifier: identifier.to_string(),
                },
                RecordReadError::Unparseable(reason) => StoreError::corrupt(identifier, reason),
                RecordReadError::Io(reason) => StoreError::IoFailure { reason },
            })?
        };

        let blob = rec
            .blob_bytes()
            .map_err(|e| StoreError::corrupt(identifier, format!("blob decode: {e}")))?;

        if !self.crypto.is_available().await {
            return Err(StoreError::EncryptionUnavailable);
        }
        let plaintext = self.crypto.decrypt(&blob).await.map_err(map_crypto)?;
        let secret = String::from_utf8(plaintext)
            .map_err(|_| StoreError::corrupt(identifier, "decrypted payload is not valid UTF-8"))?;

        // Defensive re-check against corruption or tampering.
        if !self.registry.validate(identifier, &secret) {
            return Err(StoreError::InvalidFormat {
                identifier: identifier.to_string(),
            });
        }

        Ok(operation(&secret))
    }

    /// Registry passthrough for the caller-facing surface.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    async fn write_lock(&self, identifier: &str) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        // Drop locks nobody holds, otherwise lookups of arbitrary
        // identifiers grow the map without bound.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(identifier.to_string()).or_default().clone()
    }
}

impl<E: EncryptionService + 'static> SecureStorageEngine<E> {
    /// Create the engine and kick off the background startup scan. Callers
    /// needing a deterministic scan (one-shot processes, tests) can use
    /// `new` + `scan_storage_root` instead.
    pub fn initialize(
        root: impl Into<PathBuf>,
        registry: Arc<ProviderRegistry>,
        crypto: E,
    ) -> Result<Arc<Self>, StoreError> {
        let engine = Arc::new(Self::new(root, registry, crypto)?);
        let scanner = Arc::clone(&engine);
        tokio::spawn(async move {
            scanner.scan_storage_root().await;
        });
        Ok(engine)
    }
}

fn map_crypto(err: CryptoError) -> StoreError {
    match err {
        CryptoError::Unavailable => StoreError::EncryptionUnavailable,
        CryptoError::EncryptFailed { reason } => StoreError::EncryptionFailed { reason },
        CryptoError::DecryptFailed { reason } => StoreError::DecryptionFailed { reason },
    }
}
