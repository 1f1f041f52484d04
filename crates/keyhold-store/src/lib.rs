//! Concrete credential storage with encryption at rest.
//! AES-GCM blobs on disk, keys sourced from the OS keyring (or test doubles),
//! orchestrated by the secure storage engine.

pub mod crypto;
pub mod engine;
pub mod keysource;
pub mod path;
pub mod record;
