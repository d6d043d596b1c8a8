//! In-memory remote stores for tests
//!
//! Counting implementations of [`ShareStore`] and [`ObjectStore`]. The
//! share store can be told to yield before answering a fetch so tests can
//! overlap two reconstructions deterministically on a current-thread
//! runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use enclave_core::{Result, VaultError};
use enclave_crypto::{public_key_hex, Envelope, PublicKey, SecretKey};
use parking_lot::Mutex;
use secp256k1::SECP256K1;

use crate::remote::{ObjectStore, ShareStore};

struct StoredShare {
    revoke_pub: String,
    envelope: Envelope,
}

/// Counting in-memory [`ShareStore`]
#[derive(Default)]
pub struct MemoryShareStore {
    entries: Mutex<HashMap<String, StoredShare>>,
    fetch_calls: AtomicUsize,
    store_calls: AtomicUsize,
    revoke_calls: AtomicUsize,
    fetch_yields: AtomicUsize,
    fail_next_fetch: Mutex<Option<VaultError>>,
}

impl MemoryShareStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `fetch` calls served so far
    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of `store` calls served so far
    pub fn store_count(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    /// Number of `revoke` calls served so far
    pub fn revoke_count(&self) -> usize {
        self.revoke_calls.load(Ordering::SeqCst)
    }

    /// Make every fetch yield to the executor `n` times before answering
    pub fn set_fetch_yields(&self, n: usize) {
        self.fetch_yields.store(n, Ordering::SeqCst);
    }

    /// Fail the next fetch with the given error
    pub fn fail_next_fetch(&self, error: VaultError) {
        *self.fail_next_fetch.lock() = Some(error);
    }

    /// Whether a share is currently stored under this auth public key
    pub fn contains(&self, auth_pub: &PublicKey) -> bool {
        self.entries.lock().contains_key(&public_key_hex(auth_pub))
    }

    /// Drop the share stored under this auth public key, simulating a
    /// server-side revocation performed elsewhere
    pub fn drop_share(&self, auth_pub: &PublicKey) {
        self.entries.lock().remove(&public_key_hex(auth_pub));
    }
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    async fn store(
        &self,
        auth_pub: &PublicKey,
        revoke_pub: &PublicKey,
        envelope: &Envelope,
    ) -> Result<()> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().insert(
            public_key_hex(auth_pub),
            StoredShare {
                revoke_pub: public_key_hex(revoke_pub),
                envelope: envelope.clone(),
            },
        );
        Ok(())
    }

    async fn fetch(&self, auth_key: &SecretKey) -> Result<Option<Envelope>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        for _ in 0..self.fetch_yields.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        if let Some(error) = self.fail_next_fetch.lock().take() {
            return Err(error);
        }
        let auth_pub = public_key_hex(&auth_key.public_key(SECP256K1));
        Ok(self
            .entries
            .lock()
            .get(&auth_pub)
            .map(|s| s.envelope.clone()))
    }

    async fn revoke(&self, revoke_key: &SecretKey) -> Result<()> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        let revoke_pub = public_key_hex(&revoke_key.public_key(SECP256K1));
        self.entries
            .lock()
            .retain(|_, s| s.revoke_pub != revoke_pub);
        Ok(())
    }
}

/// Counting in-memory [`ObjectStore`]
#[derive(Default)]
pub struct MemoryObjectStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    store_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MemoryObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `store` calls served so far
    pub fn store_count(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch` calls served so far
    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Overwrite a blob without an owner key, simulating external corruption
    pub fn inject(&self, owner_pub_hex: &str, data: Vec<u8>) {
        self.blobs.lock().insert(owner_pub_hex.to_string(), data);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn store(&self, auth_key: &SecretKey, data: &[u8]) -> Result<()> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        let owner = public_key_hex(&auth_key.public_key(SECP256K1));
        self.blobs.lock().insert(owner, data.to_vec());
        Ok(())
    }

    async fn fetch(&self, owner_pub_hex: &str) -> Result<Option<Vec<u8>>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.blobs.lock().get(owner_pub_hex).cloned())
    }
}
