//! Core abstractions for Keyhold: error kinds, the encryption-service
//! contract, and the provider registry.
//! This crate is intentionally small to keep dependency surface minimal.

pub mod catalog;
pub mod crypto;
pub mod error;
pub mod registry;
