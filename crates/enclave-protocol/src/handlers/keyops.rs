//! Per-application key operations
//!
//! Every calling origin gets its own key subtree: the origin string is
//! hashed into a derivation label, so an application can only ever reach
//! keys under `hash(origin)`. These operations work in any execution mode —
//! the capability is the origin-scoped derivation itself.

use std::sync::Arc;

use async_trait::async_trait;
use enclave_core::{ExecutionMode, Hash256, Result, VaultError};
use enclave_crypto::{
    public_key_from_hex, public_key_hex, sign_recoverable, Envelope, KeyNode,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::shared::HandlerContext;
use crate::dispatch::Receiver;
use crate::message::Request;

/// Relative derivation under the origin's subtree
#[derive(Debug, Deserialize)]
struct KeySpec {
    #[serde(default)]
    derive: Option<String>,
}

impl KeySpec {
    fn path(&self) -> &str {
        self.derive.as_deref().unwrap_or("m")
    }
}

/// Receiver for origin-scoped signing and encryption
pub struct KeyOpsHandler {
    context: Arc<HandlerContext>,
}

impl KeyOpsHandler {
    /// Create the receiver
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// The caller's key node: the origin hash path, then the relative path
    async fn origin_node(&self, origin: &str, spec: &KeySpec) -> Result<KeyNode> {
        let node = self
            .context
            .identity
            .lifecycle()
            .derive(Hash256::label(origin))
            .await?;
        node.derive_path(spec.path())
    }

    async fn keyinfo(&self, request: &Request) -> Result<Value> {
        #[derive(Deserialize)]
        struct KeyInfoParams {
            key: KeySpec,
        }
        let params: KeyInfoParams = request.params("secp256k1KeyInfo")?;
        let node = self.origin_node(&request.origin, &params.key).await?;
        Ok(json!({
            "pubkey": public_key_hex(&node.public_key()),
            "chainCode": hex::encode(node.chain_code()),
        }))
    }

    async fn sign(&self, request: &Request) -> Result<Value> {
        #[derive(Deserialize)]
        struct SignParams {
            hash: String,
            key: KeySpec,
        }
        let params: SignParams = request.params("secp256k1Sign")?;
        let digest = Hash256::from_hex(&params.hash)
            .map_err(|e| VaultError::invalid(format!("Bad digest hex: {}", e)))?;

        let node = self.origin_node(&request.origin, &params.key).await?;
        let sig = sign_recoverable(&digest, node.secret_key());
        Ok(json!({
            "signature": hex::encode(sig.signature),
            "recovery": sig.recovery,
            "hash": params.hash,
        }))
    }

    fn encrypt(&self, request: &Request) -> Result<Value> {
        #[derive(Deserialize)]
        struct EncryptParams {
            pubkey: String,
            plaintext: String,
        }
        let params: EncryptParams = request.params("secp256k1Encrypt")?;
        let recipient = public_key_from_hex(&params.pubkey)?;
        let plaintext = hex::decode(&params.plaintext)
            .map_err(|e| VaultError::invalid(format!("Bad plaintext hex: {}", e)))?;

        let envelope = Envelope::seal(&recipient, &plaintext, self.context.identity.effects())?;
        serde_json::to_value(envelope)
            .map_err(|e| VaultError::serialization(format!("Envelope encoding failed: {}", e)))
    }

    async fn decrypt(&self, request: &Request) -> Result<Value> {
        #[derive(Deserialize)]
        struct DecryptParams {
            key: KeySpec,
        }
        // The envelope fields and the key spec share one parameter object
        let envelope: Envelope = request.params("secp256k1Decrypt")?;
        let params: DecryptParams = request.params("secp256k1Decrypt")?;

        let node = self.origin_node(&request.origin, &params.key).await?;
        let plaintext = envelope.open(node.secret_key())?;
        Ok(json!(hex::encode(plaintext)))
    }
}

#[async_trait]
impl Receiver for KeyOpsHandler {
    fn claims(&self, _mode: ExecutionMode, request: &Request) -> bool {
        request.has("secp256k1KeyInfo")
            || request.has("secp256k1Sign")
            || request.has("secp256k1Encrypt")
            || request.has("secp256k1Decrypt")
    }

    async fn handle(&self, _mode: ExecutionMode, request: &Request) -> Result<Value> {
        if request.has("secp256k1KeyInfo") {
            return self.keyinfo(request).await;
        }
        if request.has("secp256k1Sign") {
            return self.sign(request).await;
        }
        if request.has("secp256k1Encrypt") {
            return self.encrypt(request);
        }
        if request.has("secp256k1Decrypt") {
            return self.decrypt(request).await;
        }
        Err(VaultError::invalid(
            "Unclaimed request reached KeyOpsHandler",
        ))
    }
}
