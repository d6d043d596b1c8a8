//! Enclave Core: foundation types for the identity vault
//!
//! This crate holds the pieces every other Enclave crate builds on:
//!
//! - **Unified error system**: a single [`VaultError`] enum covering both the
//!   identity-specific failure kinds (no identity, remote share gone, bad
//!   decryption) and the ambient ones (serialization, storage, transport).
//! - **Shared types**: [`Hash256`] derivation labels and the
//!   [`ExecutionMode`] root/restricted boundary.
//! - **Configuration**: [`VaultConfig`] with the remote service endpoints.
//!
//! Nothing in here performs I/O or cryptography; those live in
//! `enclave-crypto` and `enclave-identity`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

pub use config::VaultConfig;
pub use error::{Result, VaultError};
pub use types::{ExecutionMode, Hash256};
