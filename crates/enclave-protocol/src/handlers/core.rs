//! Core vault operations
//!
//! Version and configuration queries work in any mode; identity creation
//! and enrollment revocation are root-only. This receiver registers last so
//! its general-purpose operations can never shadow an identity-sensitive
//! receiver.

use std::sync::Arc;

use async_trait::async_trait;
use enclave_core::{ExecutionMode, Result, VaultError};
use serde::Deserialize;
use serde_json::{json, Value};

use super::shared::{ensure_root, HandlerContext};
use crate::dispatch::Receiver;
use crate::message::Request;

const LOCAL_DEVICE_NAME: &str = "local";

/// Receiver for the core vault operations
pub struct CoreHandler {
    context: Arc<HandlerContext>,
}

impl CoreHandler {
    /// Create the receiver
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    async fn enrollments(&self) -> Result<Value> {
        let mut records = self.context.identity.registry().enrollments().await?;

        // Callers see their own device under a fixed name
        if let Ok(local_key) = self.context.identity.local_pubkey_hex() {
            for record in &mut records {
                if record.device_key == local_key {
                    record.name = LOCAL_DEVICE_NAME.to_string();
                }
            }
        }

        serde_json::to_value(records)
            .map_err(|e| VaultError::serialization(format!("Enrollment encoding failed: {}", e)))
    }

    async fn revoke(&self, request: &Request) -> Result<Value> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RevokeParams {
            device_key: String,
        }
        let params: RevokeParams = request.params("revoke")?;
        self.context
            .identity
            .registry()
            .revoke(&params.device_key)
            .await?;
        Ok(json!(true))
    }
}

#[async_trait]
impl Receiver for CoreHandler {
    fn claims(&self, mode: ExecutionMode, request: &Request) -> bool {
        if mode.is_root() && (request.has("newidentity") || request.has("revoke")) {
            return true;
        }
        request.has("version") || request.has("config") || request.has("enrollments")
    }

    async fn handle(&self, mode: ExecutionMode, request: &Request) -> Result<Value> {
        if request.has("version") {
            return Ok(json!(env!("CARGO_PKG_VERSION")));
        }
        if request.has("config") {
            return serde_json::to_value(&self.context.config)
                .map_err(|e| VaultError::serialization(format!("Config encoding failed: {}", e)));
        }
        if request.has("enrollments") {
            return self.enrollments().await;
        }
        if request.has("newidentity") {
            ensure_root(mode, "newidentity")?;
            self.context.identity.create_identity().await?;
            return Ok(json!(true));
        }
        if request.has("revoke") {
            ensure_root(mode, "revoke")?;
            return self.revoke(request).await;
        }
        Err(VaultError::invalid("Unclaimed request reached CoreHandler"))
    }
}
