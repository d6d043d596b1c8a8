//! Identity provisioning and assembly
//!
//! [`IdentityService`] wires the local store, remote stores, lifecycle and
//! registry together for one identity, and implements the provisioning
//! flows: creating a fresh identity, preparing keys for a device joining an
//! existing identity, adopting the sealed share that enrollment produces,
//! and wiping local state.

use std::sync::Arc;

use enclave_core::{Hash256, Result, VaultError};
use enclave_crypto::{
    derive_node, public_key_hex, split, Effects, Envelope, MasterSeed, PublicKey,
};
use secp256k1::SECP256K1;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::lifecycle::SecretLifecycle;
use crate::local::{LocalIdentity, LocalIdentityStore, LocalStore};
use crate::registry::{EnrollmentRecord, EnrollmentRegistry};
use crate::remote::{ObjectStore, ShareStore};

/// Public halves of a prospective device's freshly generated keypairs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrolleeKeys {
    /// The device's local public key, uncompressed hex
    #[serde(rename = "localpubkey")]
    pub local_pubkey: String,
    /// The device's auth public key, uncompressed hex
    #[serde(rename = "authpubkey")]
    pub auth_pubkey: String,
}

/// Everything one identity needs, wired together
pub struct IdentityService {
    local: LocalIdentityStore,
    shares: Arc<dyn ShareStore>,
    lifecycle: Arc<SecretLifecycle>,
    registry: Arc<EnrollmentRegistry>,
    effects: Effects,
}

impl IdentityService {
    /// Assemble the service over a local backing store and remote stores
    pub fn new(
        local_backing: Arc<dyn LocalStore>,
        shares: Arc<dyn ShareStore>,
        objects: Arc<dyn ObjectStore>,
        effects: Effects,
    ) -> Self {
        let local = LocalIdentityStore::new(local_backing);
        let lifecycle = Arc::new(SecretLifecycle::new(local.clone(), Arc::clone(&shares)));
        let registry = Arc::new(EnrollmentRegistry::new(
            Arc::clone(&lifecycle),
            objects,
            Arc::clone(&shares),
            effects.clone(),
        ));
        Self {
            local,
            shares,
            lifecycle,
            registry,
            effects,
        }
    }

    /// The device's local identity store
    pub fn local(&self) -> &LocalIdentityStore {
        &self.local
    }

    /// The master-seed custodian
    pub fn lifecycle(&self) -> &Arc<SecretLifecycle> {
        &self.lifecycle
    }

    /// The enrollment registry
    pub fn registry(&self) -> &Arc<EnrollmentRegistry> {
        &self.registry
    }

    /// The remote share store
    pub fn shares(&self) -> &Arc<dyn ShareStore> {
        &self.shares
    }

    /// The injected effects
    pub fn effects(&self) -> &Effects {
        &self.effects
    }

    /// Whether this device holds a complete identity
    pub fn is_provisioned(&self) -> Result<bool> {
        self.local.is_provisioned()
    }

    /// This device's local public key, uncompressed hex
    pub fn local_pubkey_hex(&self) -> Result<String> {
        let (_, local_key) = self.local.load_keys()?;
        Ok(public_key_hex(&local_key.public_key(SECP256K1)))
    }

    /// Create a brand new identity on this device
    pub async fn create_identity(&self) -> Result<()> {
        if self.is_provisioned()? {
            return Err(VaultError::invalid(
                "Vault already holds an identity; wipe it before creating another",
            ));
        }
        info!("Generating identity keys");
        let seed = MasterSeed::generate(&self.effects);
        self.provision_from_seed(seed).await
    }

    /// Provision this device from an existing master seed (identity
    /// creation and recovery restore share this path)
    pub async fn provision_from_seed(&self, seed: MasterSeed) -> Result<()> {
        let local_key = self.effects.secret_key();
        let auth_key = self.effects.secret_key();
        let local_pub = local_key.public_key(SECP256K1);
        let local_pub_hex = public_key_hex(&local_pub);

        // Predetermined revocation key for this device's remote share
        let revoke_label = format!("devices/{}", local_pub_hex);
        let revoke_node = derive_node(&seed, &Hash256::label(&revoke_label))?;

        info!("Splitting identity into local and remote halves");
        let (local_share, remote_share) = split(seed.as_bytes(), &self.effects);
        let local_envelope = Envelope::seal(&local_pub, &local_share.to_bytes(), &self.effects)?;
        let remote_envelope = Envelope::seal(&local_pub, &remote_share.to_bytes(), &self.effects)?;

        info!("Storing remote identity half");
        self.shares
            .store(
                &auth_key.public_key(SECP256K1),
                &revoke_node.public_key(),
                &remote_envelope,
            )
            .await?;

        self.local.save(&LocalIdentity {
            auth_key,
            local_key,
            local_share: local_envelope,
        })?;

        info!("Creating enrollment registry entry for this device");
        self.registry
            .enroll(EnrollmentRecord::device(
                short_name(&local_pub_hex),
                local_pub_hex,
                self.effects.unix_millis()?,
            ))
            .await?;

        info!("Identity created");
        Ok(())
    }

    /// Generate and persist keypairs for joining an existing identity;
    /// returns the public halves for the enrolling device
    pub fn enrollee_keys(&self) -> Result<EnrolleeKeys> {
        let local_key = self.effects.secret_key();
        let auth_key = self.effects.secret_key();
        self.local.save_keys(&auth_key, &local_key)?;
        Ok(EnrolleeKeys {
            local_pubkey: public_key_hex(&local_key.public_key(SECP256K1)),
            auth_pubkey: public_key_hex(&auth_key.public_key(SECP256K1)),
        })
    }

    /// Split the live master seed for a new device: seal both halves to its
    /// local key, push the remote half under its auth key, return the local
    /// half for delivery to the device
    pub async fn split_for_device(
        &self,
        device_pub: PublicKey,
        device_auth_pub: PublicKey,
    ) -> Result<Envelope> {
        let effects = self.effects.clone();
        let shares = Arc::clone(&self.shares);
        self.lifecycle
            .with_master_seed(move |seed| async move {
                let revoke_label = format!("devices/{}", public_key_hex(&device_pub));
                let revoke_node = derive_node(&seed, &Hash256::label(&revoke_label))?;

                let (local_share, remote_share) = split(seed.as_bytes(), &effects);
                let local_envelope =
                    Envelope::seal(&device_pub, &local_share.to_bytes(), &effects)?;
                let remote_envelope =
                    Envelope::seal(&device_pub, &remote_share.to_bytes(), &effects)?;

                shares
                    .store(&device_auth_pub, &revoke_node.public_key(), &remote_envelope)
                    .await?;
                Ok(local_envelope)
            })
            .await
    }

    /// Adopt the sealed local half delivered by the enrolling device,
    /// completing this device's membership
    pub async fn adopt_local_share(&self, envelope: Envelope) -> Result<()> {
        let (_, local_key) = self.local.load_keys()?;
        self.local.save_local_share(&envelope)?;

        let local_pub_hex = public_key_hex(&local_key.public_key(SECP256K1));
        self.registry
            .enroll(EnrollmentRecord::device(
                short_name(&local_pub_hex),
                local_pub_hex,
                self.effects.unix_millis()?,
            ))
            .await?;
        info!("Device enrollment complete");
        Ok(())
    }

    /// Destroy all local identity state
    pub fn wipe_local(&self) -> Result<()> {
        self.local.wipe()
    }
}

/// Short display name for a key: its last 8 hex characters
fn short_name(pub_hex: &str) -> String {
    let tail = pub_hex.len().saturating_sub(8);
    pub_hex[tail..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_is_the_key_tail() {
        assert_eq!(short_name("04deadbeefcafe"), "beefcafe");
        assert_eq!(short_name("abc"), "abc");
    }
}
