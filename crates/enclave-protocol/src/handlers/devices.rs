//! Multi-device and card enrollment
//!
//! The enrollment handshake between an enrolled device (root mode) and a
//! joining device: the joiner generates keys (`enroleeinfo`), the enrolled
//! device splits the live seed for it (`enrolldevice`) and the joiner
//! adopts its sealed half (`finishenrollment`). Cards get passcode-guarded
//! recovery data instead of a share pair (`enrollcard`).

use std::sync::Arc;

use async_trait::async_trait;
use enclave_core::{ExecutionMode, Hash256, Result, VaultError};
use enclave_crypto::{derive_node, public_key_from_hex, public_key_hex, Envelope};
use enclave_identity::EnrollmentRecord;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::info;
use zeroize::Zeroizing;

use super::shared::{ensure_root, HandlerContext};
use crate::dispatch::Receiver;
use crate::message::Request;

/// Wrong passcode attempts a card verifier allows before destroying its
/// recovery data
const CARD_MAX_TRIES: u16 = 3;

/// Receiver for device and card enrollment operations
pub struct DevicesHandler {
    context: Arc<HandlerContext>,
}

impl DevicesHandler {
    /// Create the receiver
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    async fn cardinfo(&self, request: &Request) -> Result<Value> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct CardInfoParams {
            device_key: String,
        }
        let params: CardInfoParams = request.params("cardinfo")?;
        let records = self.context.identity.registry().enrollments().await?;
        let found = records.into_iter().find(|r| r.device_key == params.device_key);
        serde_json::to_value(found)
            .map_err(|e| VaultError::serialization(format!("Record encoding failed: {}", e)))
    }

    async fn enrolldevice(&self, request: &Request) -> Result<Value> {
        #[derive(Deserialize)]
        struct EnrollDeviceParams {
            devicepubkey: String,
            authpubkey: String,
        }
        let params: EnrollDeviceParams = request.params("enrolldevice")?;
        let device_pub = public_key_from_hex(&params.devicepubkey)?;
        let device_auth_pub = public_key_from_hex(&params.authpubkey)?;

        let local_envelope = self
            .context
            .identity
            .split_for_device(device_pub, device_auth_pub)
            .await?;
        serde_json::to_value(local_envelope)
            .map_err(|e| VaultError::serialization(format!("Envelope encoding failed: {}", e)))
    }

    async fn enrollcard(&self, request: &Request) -> Result<Value> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct EnrollCardParams {
            recovery_key: String,
            signing_key: String,
            passcode: String,
        }
        let params: EnrollCardParams = request.params("enrollcard")?;
        let recovery_pub = public_key_from_hex(&params.recovery_key)?;
        let signing_pub = public_key_from_hex(&params.signing_key)?;
        let recovery_hex = public_key_hex(&recovery_pub);

        let identity = &self.context.identity;
        let effects = identity.effects().clone();
        let shares = Arc::clone(identity.shares());
        let registry = Arc::clone(identity.registry());
        let passcode = params.passcode;
        let revoke_label = format!("devices/{}", recovery_hex);

        info!("Generating card recovery data");
        // Enrollment happens inside the seed window so the whole operation
        // costs one reconstruction.
        identity
            .lifecycle()
            .with_master_seed(move |seed| async move {
                let revoke_node = derive_node(&seed, &Hash256::label(&revoke_label))?;

                // passcode digest || max tries || seed; the card verifier
                // burns the record after CARD_MAX_TRIES wrong passcodes
                let mut recovery_data = Zeroizing::new(Vec::with_capacity(34 + 64));
                recovery_data.extend_from_slice(&Sha256::digest(passcode.as_bytes()));
                recovery_data.extend_from_slice(&CARD_MAX_TRIES.to_be_bytes());
                recovery_data.extend_from_slice(seed.as_bytes());

                let envelope = Envelope::seal(&recovery_pub, &recovery_data, &effects)?;
                shares
                    .store(&signing_pub, &revoke_node.public_key(), &envelope)
                    .await?;

                registry
                    .enroll(EnrollmentRecord::card(
                        short_name(&recovery_hex),
                        recovery_hex,
                        public_key_hex(&signing_pub),
                        effects.unix_millis()?,
                    ))
                    .await
            })
            .await?;

        Ok(json!(true))
    }

    async fn finishenrollment(&self, request: &Request) -> Result<Value> {
        let envelope: Envelope = request.params("finishenrollment")?;
        self.context.identity.adopt_local_share(envelope).await?;
        Ok(json!(true))
    }
}

#[async_trait]
impl Receiver for DevicesHandler {
    fn claims(&self, mode: ExecutionMode, request: &Request) -> bool {
        if request.has("cardinfo") {
            return true;
        }
        mode.is_root()
            && (request.has("enrollcard")
                || request.has("enroleeinfo")
                || request.has("enrolldevice")
                || request.has("finishenrollment"))
    }

    async fn handle(&self, mode: ExecutionMode, request: &Request) -> Result<Value> {
        if request.has("cardinfo") {
            return self.cardinfo(request).await;
        }
        if request.has("enroleeinfo") {
            ensure_root(mode, "enroleeinfo")?;
            let keys = self.context.identity.enrollee_keys()?;
            return serde_json::to_value(keys)
                .map_err(|e| VaultError::serialization(format!("Key encoding failed: {}", e)));
        }
        if request.has("enrolldevice") {
            ensure_root(mode, "enrolldevice")?;
            return self.enrolldevice(request).await;
        }
        if request.has("enrollcard") {
            ensure_root(mode, "enrollcard")?;
            return self.enrollcard(request).await;
        }
        if request.has("finishenrollment") {
            ensure_root(mode, "finishenrollment")?;
            return self.finishenrollment(request).await;
        }
        Err(VaultError::invalid(
            "Unclaimed request reached DevicesHandler",
        ))
    }
}

fn short_name(pub_hex: &str) -> String {
    let tail = pub_hex.len().saturating_sub(8);
    pub_hex[tail..].to_string()
}
