//! Remote store seams
//!
//! Two external collaborators hold everything that leaves the device: the
//! share store keeps the remote half of the master seed (fetchable only by
//! the auth key, revocable by a derived revocation key), and the object
//! store keeps the enrollment registry document, addressed by the registry
//! public key. Both are plain async traits so transports stay swappable;
//! retry and timeout policy belongs to implementations, never to callers.

use async_trait::async_trait;
use enclave_core::Result;
use enclave_crypto::{Envelope, PublicKey, SecretKey};

/// Remote custody of the master seed's remote half
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Store an envelope, fetchable by `auth_pub`'s holder and revocable by
    /// `revoke_pub`'s holder
    async fn store(
        &self,
        auth_pub: &PublicKey,
        revoke_pub: &PublicKey,
        envelope: &Envelope,
    ) -> Result<()>;

    /// Fetch the envelope stored under this auth keypair; `None` when it is
    /// missing or has been revoked
    async fn fetch(&self, auth_key: &SecretKey) -> Result<Option<Envelope>>;

    /// Permanently invalidate the envelope stored under this revocation key
    async fn revoke(&self, revoke_key: &SecretKey) -> Result<()>;
}

/// Remote document store for the enrollment registry
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Overwrite the document owned by `auth_key` in one atomic step
    async fn store(&self, auth_key: &SecretKey, data: &[u8]) -> Result<()>;

    /// Fetch the document addressed by an owner public key (lowercase hex);
    /// `None` when no document exists
    async fn fetch(&self, owner_pub_hex: &str) -> Result<Option<Vec<u8>>>;
}
