//! Vault assembly
//!
//! Wires one identity's stores and handlers into a dispatcher. Receiver
//! order is deliberate: devices, key operations and recovery go first, the
//! general-purpose core receiver last, so a forged request can never match
//! a less-privileged handler ahead of a sensitive one.

use std::sync::Arc;

use enclave_core::{ExecutionMode, VaultConfig};
use enclave_crypto::Effects;
use enclave_identity::{
    HttpObjectStore, HttpShareStore, IdentityService, LocalStore, ObjectStore, ShareStore,
};
use tracing::info;

use crate::dispatch::Dispatcher;
use crate::handlers::{CoreHandler, DevicesHandler, HandlerContext, KeyOpsHandler, RecoveryHandler};
use crate::message::{Request, Response};

/// One identity vault: dispatcher plus the identity it serves
pub struct Vault {
    dispatcher: Dispatcher,
    context: Arc<HandlerContext>,
}

impl Vault {
    /// Assemble a vault over explicit stores
    pub fn new(
        config: VaultConfig,
        mode: ExecutionMode,
        local: Arc<dyn LocalStore>,
        shares: Arc<dyn ShareStore>,
        objects: Arc<dyn ObjectStore>,
        effects: Effects,
    ) -> Self {
        info!(?mode, "Configuring vault");
        let identity = Arc::new(IdentityService::new(local, shares, objects, effects));
        let context = Arc::new(HandlerContext::new(config, identity));

        let mut dispatcher = Dispatcher::new(mode);
        dispatcher.add_receiver(Arc::new(DevicesHandler::new(Arc::clone(&context))));
        dispatcher.add_receiver(Arc::new(KeyOpsHandler::new(Arc::clone(&context))));
        dispatcher.add_receiver(Arc::new(RecoveryHandler::new(Arc::clone(&context))));
        dispatcher.add_receiver(Arc::new(CoreHandler::new(Arc::clone(&context))));

        Self {
            dispatcher,
            context,
        }
    }

    /// Assemble a vault whose remote stores are the HTTP services named in
    /// the configuration
    pub fn over_http(
        config: VaultConfig,
        mode: ExecutionMode,
        local: Arc<dyn LocalStore>,
        effects: Effects,
    ) -> Self {
        let shares = Arc::new(HttpShareStore::new(
            config.share_store_url.clone(),
            effects.clone(),
        ));
        let objects = Arc::new(HttpObjectStore::new(config.object_store_url.clone()));
        Self::new(config, mode, local, shares, objects, effects)
    }

    /// Route one request; `None` means nothing recognized it
    pub async fn dispatch(&self, request: Request) -> Option<Response> {
        self.dispatcher.dispatch(request).await
    }

    /// The identity this vault serves
    pub fn identity(&self) -> &Arc<IdentityService> {
        &self.context.identity
    }

    /// The mode this vault runs in
    pub fn mode(&self) -> ExecutionMode {
        self.dispatcher.mode()
    }
}
