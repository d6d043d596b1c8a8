//! Enrollment registry
//!
//! The append/revoke set of devices, cards and recovery methods authorized
//! to reach the identity. The whole set is one JSON document, sealed to a
//! registry key derived from the `"devices"` label and overwritten
//! atomically in the object store on every mutation — so mutations are
//! serialized through an internal async mutex, and at most one live record
//! exists per device key (the most recently enrolled one wins).

use std::sync::Arc;

use async_lock::Mutex;
use enclave_core::{Hash256, Result, VaultError};
use enclave_crypto::{public_key_hex, Effects, Envelope, KeyNode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::lifecycle::SecretLifecycle;
use crate::remote::{ObjectStore, ShareStore};

const REGISTRY_LABEL: &str = "devices";

/// What kind of principal a record enrolls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    /// A browser/device holding a share pair
    Device,
    /// A smartcard with passcode-protected recovery data
    Card,
    /// A recovery method addressed by name
    Uri,
}

/// One authorized device, card or recovery method
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
    /// Record kind
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Human-readable name (for devices, the key's last 8 hex chars)
    pub name: String,
    /// The principal's public key, uncompressed hex
    pub device_key: String,
    /// Separate signing key, present for cards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,
    /// Enrollment time, Unix milliseconds
    #[serde(default)]
    pub created_at: u64,
    /// Forward-compatible extra properties
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EnrollmentRecord {
    /// Build a device record
    pub fn device(name: impl Into<String>, device_key: impl Into<String>, created_at: u64) -> Self {
        Self {
            record_type: RecordType::Device,
            name: name.into(),
            device_key: device_key.into(),
            signing_key: None,
            created_at,
            extra: Map::new(),
        }
    }

    /// Build a card record
    pub fn card(
        name: impl Into<String>,
        device_key: impl Into<String>,
        signing_key: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            record_type: RecordType::Card,
            name: name.into(),
            device_key: device_key.into(),
            signing_key: Some(signing_key.into()),
            created_at,
            extra: Map::new(),
        }
    }

    /// Build a named recovery-method record
    pub fn recovery(
        name: impl Into<String>,
        device_key: impl Into<String>,
        created_at: u64,
    ) -> Self {
        Self {
            record_type: RecordType::Uri,
            name: name.into(),
            device_key: device_key.into(),
            signing_key: None,
            created_at,
            extra: Map::new(),
        }
    }

    /// The stable identifier whose derived key revokes this record's
    /// remote data
    pub fn revocation_label(&self) -> String {
        match self.record_type {
            RecordType::Device | RecordType::Card => format!("devices/{}", self.device_key),
            RecordType::Uri => format!("recovery/{}", self.name),
        }
    }
}

/// The identity's enrollment set, persisted remotely as one sealed document
pub struct EnrollmentRegistry {
    lifecycle: Arc<SecretLifecycle>,
    objects: Arc<dyn ObjectStore>,
    shares: Arc<dyn ShareStore>,
    effects: Effects,
    // Whole-document overwrite is not commutative; one mutation at a time
    write_lock: Mutex<()>,
}

impl EnrollmentRegistry {
    /// Create a registry over the identity's lifecycle and remote stores
    pub fn new(
        lifecycle: Arc<SecretLifecycle>,
        objects: Arc<dyn ObjectStore>,
        shares: Arc<dyn ShareStore>,
        effects: Effects,
    ) -> Self {
        Self {
            lifecycle,
            objects,
            shares,
            effects,
            write_lock: Mutex::new(()),
        }
    }

    /// Fetch and decrypt the current enrollment set
    ///
    /// A missing or undecodable document is the normal state for a freshly
    /// created identity and yields an empty set; only transport failures
    /// are errors.
    pub async fn enrollments(&self) -> Result<Vec<EnrollmentRecord>> {
        let node = self.registry_node().await?;
        self.fetch_with(&node).await
    }

    /// Append a record; exactly one record survives per device key and the
    /// survivor is the most recently enrolled one
    pub async fn enroll(&self, record: EnrollmentRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let node = self.registry_node().await?;

        info!(name = %record.name, "Enrolling {:?} record", record.record_type);
        let mut records = self.fetch_with(&node).await?;
        records.push(record);
        let records = dedup_last_wins(records);
        self.upload(&node, &records).await
    }

    /// Remove the record for `device_key`, revoking its remote data first
    pub async fn revoke(&self, device_key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let node = self.registry_node().await?;

        let mut records = self.fetch_with(&node).await?;
        let position = records
            .iter()
            .position(|r| r.device_key == device_key)
            .ok_or_else(|| {
                VaultError::record_not_found(format!("No enrollment for key {}", device_key))
            })?;
        let record = records.remove(position);

        // Invalidate the remote share/record before rewriting the registry,
        // so a record never disappears while its remote data is still live.
        let label = record.revocation_label();
        info!(name = %record.name, label = %label, "Revoking enrollment");
        let revoke_node = self.lifecycle.derive(Hash256::label(&label)).await?;
        self.shares.revoke(revoke_node.secret_key()).await?;

        self.upload(&node, &records).await
    }

    async fn registry_node(&self) -> Result<KeyNode> {
        self.lifecycle.derive(Hash256::label(REGISTRY_LABEL)).await
    }

    async fn fetch_with(&self, node: &KeyNode) -> Result<Vec<EnrollmentRecord>> {
        let owner = public_key_hex(&node.public_key());
        let Some(blob) = self.objects.fetch(&owner).await? else {
            return Ok(Vec::new());
        };

        let parsed = std::str::from_utf8(&blob)
            .map_err(|e| VaultError::serialization(format!("Registry blob not UTF-8: {}", e)))
            .and_then(|json| Envelope::from_json(json))
            .and_then(|envelope| envelope.open(node.secret_key()))
            .and_then(|plain| {
                serde_json::from_slice::<Vec<EnrollmentRecord>>(&plain).map_err(|e| {
                    VaultError::serialization(format!("Registry document malformed: {}", e))
                })
            });

        match parsed {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!("Treating unreadable enrollment registry as empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn upload(&self, node: &KeyNode, records: &[EnrollmentRecord]) -> Result<()> {
        let plain = serde_json::to_vec(records)
            .map_err(|e| VaultError::serialization(format!("Registry encoding failed: {}", e)))?;
        let envelope = Envelope::seal(&node.public_key(), &plain, &self.effects)?;
        self.objects
            .store(node.secret_key(), envelope.to_json()?.as_bytes())
            .await
    }
}

/// Keep exactly one record per device key — the most recently appended
fn dedup_last_wins(records: Vec<EnrollmentRecord>) -> Vec<EnrollmentRecord> {
    let mut seen = std::collections::HashSet::new();
    let mut out: Vec<EnrollmentRecord> = records
        .into_iter()
        .rev()
        .filter(|r| seen.insert(r.device_key.clone()))
        .collect();
    out.reverse();
    out
}
