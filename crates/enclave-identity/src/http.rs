//! HTTP clients for the remote stores
//!
//! Both services speak JSON over HTTPS. Requests that touch stored data
//! are authenticated by a timestamp + recoverable-signature pair: the
//! client signs `sha256(timestamp)` with the relevant secret key and the
//! service recovers the public key to locate the record. Byte fields are
//! lowercase hex on the wire.
//!
//! Transport failures surface as `RemoteUnavailable` and are never retried
//! here; a well-formed "error" reply to a fetch means the record is absent.

use async_trait::async_trait;
use enclave_core::{Hash256, Result, VaultError};
use enclave_crypto::{public_key_hex, sign_recoverable, Effects, Envelope, PublicKey, SecretKey};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::remote::{ObjectStore, ShareStore};

/// HTTP client for the remote share store
pub struct HttpShareStore {
    base_url: String,
    client: reqwest::Client,
    effects: Effects,
}

impl HttpShareStore {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: impl Into<String>, effects: Effects) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            effects,
        }
    }

    fn signed_timestamp(&self, key: &SecretKey) -> Result<Value> {
        let timestamp = self.effects.unix_millis()?.to_string();
        let sig = sign_recoverable(&timestamp_digest(&timestamp), key);
        Ok(json!({
            "timestamp": timestamp,
            "sig": hex::encode(sig.signature),
            "recovery": sig.recovery,
        }))
    }
}

#[async_trait]
impl ShareStore for HttpShareStore {
    async fn store(
        &self,
        auth_pub: &PublicKey,
        revoke_pub: &PublicKey,
        envelope: &Envelope,
    ) -> Result<()> {
        let body = json!({
            "authpubkey": public_key_hex(auth_pub),
            "revokepubkey": public_key_hex(revoke_pub),
            "data": envelope,
        });
        let reply = post_json(&self.client, &join(&self.base_url, "store"), &body).await?;
        if let Some(error) = reply.get("error") {
            return Err(VaultError::remote_unavailable(format!(
                "Share store rejected store: {}",
                error
            )));
        }
        Ok(())
    }

    async fn fetch(&self, auth_key: &SecretKey) -> Result<Option<Envelope>> {
        let body = self.signed_timestamp(auth_key)?;
        let reply = post_json(&self.client, &join(&self.base_url, "fetch"), &body).await?;
        if let Some(error) = reply.get("error") {
            debug!("Share store reports no share: {}", error);
            return Ok(None);
        }
        let data = reply
            .get("data")
            .cloned()
            .ok_or_else(|| VaultError::remote_unavailable("Share store reply missing data"))?;
        serde_json::from_value(data)
            .map(Some)
            .map_err(|e| VaultError::serialization(format!("Malformed share envelope: {}", e)))
    }

    async fn revoke(&self, revoke_key: &SecretKey) -> Result<()> {
        let body = self.signed_timestamp(revoke_key)?;
        let reply = post_json(&self.client, &join(&self.base_url, "revoke"), &body).await?;
        if let Some(error) = reply.get("error") {
            // An error reply here means the share is already gone, which is
            // what revocation wanted.
            warn!("Share store revoke reported: {}", error);
        }
        Ok(())
    }
}

/// HTTP client for the remote object store
pub struct HttpObjectStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpObjectStore {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn store(&self, auth_key: &SecretKey, data: &[u8]) -> Result<()> {
        let digest = Hash256::new(Sha256::digest(data).into());
        let sig = sign_recoverable(&digest, auth_key);
        let body = json!({
            "sig": hex::encode(sig.signature),
            "recovery": sig.recovery,
            "data": hex::encode(data),
        });
        let reply = post_json(&self.client, &join(&self.base_url, "perma_store"), &body).await?;
        if let Some(error) = reply.get("error") {
            return Err(VaultError::remote_unavailable(format!(
                "Object store rejected store: {}",
                error
            )));
        }
        Ok(())
    }

    async fn fetch(&self, owner_pub_hex: &str) -> Result<Option<Vec<u8>>> {
        let body = json!({ "pubkey": owner_pub_hex });
        let reply = post_json(&self.client, &join(&self.base_url, "perma_fetch"), &body).await?;
        if let Some(error) = reply.get("error") {
            debug!("Object store reports no document: {}", error);
            return Ok(None);
        }
        let data = reply
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| VaultError::remote_unavailable("Object store reply missing data"))?;
        hex::decode(data)
            .map(Some)
            .map_err(|e| VaultError::serialization(format!("Malformed document hex: {}", e)))
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

fn timestamp_digest(timestamp: &str) -> Hash256 {
    Hash256::new(Sha256::digest(timestamp.as_bytes()).into())
}

async fn post_json(client: &reqwest::Client, url: &str, body: &Value) -> Result<Value> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| VaultError::remote_unavailable(format!("{}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(VaultError::remote_unavailable(format!(
            "{} returned {}",
            url, status
        )));
    }

    response
        .json()
        .await
        .map_err(|e| VaultError::remote_unavailable(format!("{}: malformed reply: {}", url, e)))
}
