//! Shared handler state and helpers

use std::sync::Arc;

use enclave_core::{ExecutionMode, Result, VaultConfig, VaultError};
use enclave_identity::IdentityService;

/// State shared by every handler of one vault instance
pub struct HandlerContext {
    /// Static vault configuration, echoed by the `config` operation
    pub config: VaultConfig,
    /// The identity this vault serves
    pub identity: Arc<IdentityService>,
}

impl HandlerContext {
    /// Bundle the context for one identity
    pub fn new(config: VaultConfig, identity: Arc<IdentityService>) -> Self {
        Self { config, identity }
    }
}

/// Refuse a privileged operation outside root mode
///
/// `claims` already hides privileged shapes in restricted mode; this is the
/// second check inside the handler so a mis-registered receiver still
/// cannot leak a privileged operation.
pub fn ensure_root(mode: ExecutionMode, operation: &str) -> Result<()> {
    if mode.is_root() {
        Ok(())
    } else {
        Err(VaultError::unauthorized(format!(
            "{} requires root mode",
            operation
        )))
    }
}
