//! Local identity persistence
//!
//! The device keeps three secrets: its local keypair (encrypts its shares),
//! its auth keypair (authenticates remote share access) and the sealed
//! local half of the master seed. They live in a small string key-value
//! store so the hosting platform can back it with whatever it has; the
//! in-memory and JSON-file implementations here cover tests and native use.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use enclave_core::{Result, VaultError};
use enclave_crypto::{secret_key_from_hex, secret_key_hex, Envelope, SecretKey};
use parking_lot::Mutex;
use tracing::info;

const KEY_AUTH: &str = "authkey";
const KEY_LOCAL: &str = "localkey";
const KEY_LOCAL_SHARE: &str = "localshare";
const KEY_PROVISIONED: &str = "provisioned";

/// Backing store for local identity state
pub trait LocalStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>>;
    /// Write a value
    fn put(&self, key: &str, value: &str) -> Result<()>;
    /// Delete a value
    fn remove(&self, key: &str) -> Result<()>;
    /// Delete everything
    fn clear(&self) -> Result<()>;
}

/// In-memory store for tests
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

/// Single-file JSON store for native deployments
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store backed by the given file; the file is created lazily
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| VaultError::storage(format!("Corrupt local store file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(VaultError::storage(format!(
                "Failed to read local store: {}",
                e
            ))),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(map)
            .map_err(|e| VaultError::storage(format!("Failed to encode local store: {}", e)))?;
        std::fs::write(&self.path, bytes)
            .map_err(|e| VaultError::storage(format!("Failed to write local store: {}", e)))
    }
}

impl LocalStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_map()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        map.remove(key);
        self.write_map(&map)
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock();
        self.write_map(&HashMap::new())
    }
}

/// The device's complete local identity state
pub struct LocalIdentity {
    /// Authenticates remote share fetch/store/revoke
    pub auth_key: SecretKey,
    /// Encrypts/decrypts this device's shares
    pub local_key: SecretKey,
    /// The sealed local half of the master seed
    pub local_share: Envelope,
}

/// Typed view over a [`LocalStore`]
#[derive(Clone)]
pub struct LocalIdentityStore {
    store: Arc<dyn LocalStore>,
}

impl LocalIdentityStore {
    /// Wrap a backing store
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Whether the vault has a complete identity
    pub fn is_provisioned(&self) -> Result<bool> {
        Ok(self.store.get(KEY_PROVISIONED)?.is_some())
    }

    /// Persist the device keypairs (pre-enrollment state)
    pub fn save_keys(&self, auth_key: &SecretKey, local_key: &SecretKey) -> Result<()> {
        self.store.put(KEY_AUTH, &secret_key_hex(auth_key))?;
        self.store.put(KEY_LOCAL, &secret_key_hex(local_key))
    }

    /// Load the device keypairs
    pub fn load_keys(&self) -> Result<(SecretKey, SecretKey)> {
        let auth = self
            .store
            .get(KEY_AUTH)?
            .ok_or_else(|| VaultError::local_identity("Auth key missing from local store"))?;
        let local = self
            .store
            .get(KEY_LOCAL)?
            .ok_or_else(|| VaultError::local_identity("Local key missing from local store"))?;
        Ok((
            secret_key_from_hex(&auth)
                .map_err(|e| VaultError::local_identity(format!("Corrupt auth key: {}", e)))?,
            secret_key_from_hex(&local)
                .map_err(|e| VaultError::local_identity(format!("Corrupt local key: {}", e)))?,
        ))
    }

    /// Persist the sealed local share and mark the identity complete
    pub fn save_local_share(&self, envelope: &Envelope) -> Result<()> {
        self.store.put(KEY_LOCAL_SHARE, &envelope.to_json()?)?;
        self.store.put(KEY_PROVISIONED, "true")
    }

    /// Persist a complete identity in one step
    pub fn save(&self, identity: &LocalIdentity) -> Result<()> {
        self.save_keys(&identity.auth_key, &identity.local_key)?;
        self.save_local_share(&identity.local_share)
    }

    /// Load the complete identity
    ///
    /// `NoIdentity` when the vault was never provisioned; `LocalIdentity`
    /// when provisioned state is present but missing pieces or corrupt.
    pub fn load(&self) -> Result<LocalIdentity> {
        if !self.is_provisioned()? {
            return Err(VaultError::no_identity("Vault has no identity"));
        }
        let (auth_key, local_key) = self.load_keys()?;
        let share_json = self.store.get(KEY_LOCAL_SHARE)?.ok_or_else(|| {
            VaultError::local_identity("Local share missing from local store")
        })?;
        let local_share = Envelope::from_json(&share_json)
            .map_err(|e| VaultError::local_identity(format!("Corrupt local share: {}", e)))?;
        Ok(LocalIdentity {
            auth_key,
            local_key,
            local_share,
        })
    }

    /// Destroy all local identity state
    pub fn wipe(&self) -> Result<()> {
        info!("Wiping local identity state");
        self.store.clear()
    }
}
