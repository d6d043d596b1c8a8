//! Recovery methods
//!
//! A recovery method is the master seed sealed to a caller-held key and
//! parked in the share store under a fresh auth keypair, revocable through
//! a `"recovery/" + id` derivation. All of it is root-only: creating one,
//! restoring an identity from one, the debug export, revoking by name and
//! the local wipe.

use std::sync::Arc;

use async_trait::async_trait;
use enclave_core::{ExecutionMode, Hash256, Result, VaultError};
use enclave_crypto::{
    derive_node, public_key_hex, secret_key_hex, Envelope, MasterSeed, SecretKey,
};
use enclave_identity::EnrollmentRecord;
use secp256k1::SECP256K1;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::shared::HandlerContext;
use crate::dispatch::Receiver;
use crate::message::Request;

const SUB_OPS: [&str; 5] = ["create", "restore", "export", "revoke", "wipe"];

/// Receiver for the root-mode recovery operations
pub struct RecoveryHandler {
    context: Arc<HandlerContext>,
}

impl RecoveryHandler {
    /// Create the receiver
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    fn sub_params<T: serde::de::DeserializeOwned>(request: &Request, sub: &str) -> Result<T> {
        let value = request
            .op("recovery")
            .and_then(|v| v.get(sub))
            .cloned()
            .ok_or_else(|| VaultError::invalid(format!("Missing recovery.{} parameters", sub)))?;
        serde_json::from_value(value)
            .map_err(|e| VaultError::invalid(format!("Bad recovery.{} parameters: {}", sub, e)))
    }

    /// Seal the master seed to a caller-supplied key and park it remotely
    async fn create(&self, request: &Request) -> Result<Value> {
        #[derive(Deserialize)]
        struct CreateParams {
            id: String,
            key: String,
        }
        let params: CreateParams = Self::sub_params(request, "create")?;
        let enc_secret = recovery_secret(&params.key)?;
        let enc_pub = enc_secret.public_key(SECP256K1);

        let identity = &self.context.identity;
        let effects = identity.effects().clone();
        let shares = Arc::clone(identity.shares());
        let registry = Arc::clone(identity.registry());

        let auth_key = effects.secret_key();
        let auth_pub = auth_key.public_key(SECP256K1);

        info!(id = %params.id, "Creating recovery method");
        // Park the sealed seed and enroll the method in one seed window
        identity
            .lifecycle()
            .with_master_seed(move |seed| async move {
                let label = format!("recovery/{}", params.id);
                let revoke_node = derive_node(&seed, &Hash256::label(&label))?;
                let envelope = Envelope::seal(&enc_pub, seed.as_bytes(), &effects)?;
                shares
                    .store(&auth_pub, &revoke_node.public_key(), &envelope)
                    .await?;

                registry
                    .enroll(EnrollmentRecord::recovery(
                        params.id,
                        public_key_hex(&enc_pub),
                        effects.unix_millis()?,
                    ))
                    .await
            })
            .await?;

        Ok(json!({ "authkey": secret_key_hex(&auth_key) }))
    }

    /// Re-provision this device from a recovery envelope
    async fn restore(&self, request: &Request) -> Result<Value> {
        #[derive(Deserialize)]
        struct RestoreParams {
            key: String,
            recovery: Envelope,
        }
        let params: RestoreParams = Self::sub_params(request, "restore")?;
        let enc_secret = recovery_secret(&params.key)?;

        // Decryption failure aborts before any local state is touched
        let seed_bytes = params.recovery.open(&enc_secret)?;
        let seed = MasterSeed::new(seed_bytes)?;

        info!("Restoring identity from recovery data");
        self.context.identity.wipe_local()?;
        self.context.identity.provision_from_seed(seed).await?;
        Ok(json!(true))
    }

    /// Debug export: seal the seed to a fresh key returned to the caller
    ///
    /// The same key revokes the parked data, so an importer destroys the
    /// export as soon as it has been consumed.
    async fn export(&self) -> Result<Value> {
        let identity = &self.context.identity;
        let effects = identity.effects().clone();
        let shares = Arc::clone(identity.shares());

        let auth_key = effects.secret_key();
        let auth_pub = auth_key.public_key(SECP256K1);

        identity
            .lifecycle()
            .with_master_seed(move |seed| async move {
                let envelope = Envelope::seal(&auth_pub, seed.as_bytes(), &effects)?;
                shares.store(&auth_pub, &auth_pub, &envelope).await
            })
            .await?;

        Ok(json!({ "authkey": secret_key_hex(&auth_key) }))
    }

    /// Revoke a recovery method by its enrollment name
    async fn revoke(&self, request: &Request) -> Result<Value> {
        #[derive(Deserialize)]
        struct RevokeParams {
            name: String,
        }
        let params: RevokeParams = Self::sub_params(request, "revoke")?;

        let records = self.context.identity.registry().enrollments().await?;
        let record = records
            .iter()
            .find(|r| r.name == params.name)
            .ok_or_else(|| {
                VaultError::record_not_found(format!("No enrollment named {:?}", params.name))
            })?;

        self.context
            .identity
            .registry()
            .revoke(&record.device_key)
            .await?;
        Ok(json!(true))
    }

    fn wipe(&self) -> Result<Value> {
        self.context.identity.wipe_local()?;
        Ok(json!(true))
    }
}

#[async_trait]
impl Receiver for RecoveryHandler {
    fn claims(&self, mode: ExecutionMode, request: &Request) -> bool {
        mode.is_root()
            && request
                .op("recovery")
                .is_some_and(|v| SUB_OPS.iter().any(|sub| v.get(sub).is_some()))
    }

    async fn handle(&self, _mode: ExecutionMode, request: &Request) -> Result<Value> {
        let Some(recovery) = request.op("recovery") else {
            return Err(VaultError::invalid(
                "Unclaimed request reached RecoveryHandler",
            ));
        };
        if recovery.get("create").is_some() {
            return self.create(request).await;
        }
        if recovery.get("restore").is_some() {
            return self.restore(request).await;
        }
        if recovery.get("export").is_some() {
            return self.export().await;
        }
        if recovery.get("revoke").is_some() {
            return self.revoke(request).await;
        }
        if recovery.get("wipe").is_some() {
            return self.wipe();
        }
        Err(VaultError::invalid("Unknown recovery operation"))
    }
}

/// The first 32 bytes of a caller-supplied recovery key, as a secret key
fn recovery_secret(key_hex: &str) -> Result<SecretKey> {
    let bytes = hex::decode(key_hex)
        .map_err(|e| VaultError::invalid(format!("Bad recovery key hex: {}", e)))?;
    if bytes.len() < 32 {
        return Err(VaultError::invalid("Recovery key shorter than 32 bytes"));
    }
    SecretKey::from_slice(&bytes[..32])
        .map_err(|e| VaultError::invalid(format!("Unusable recovery key: {}", e)))
}
