//! Unified error system for the Enclave vault
//!
//! One error enum for the whole workspace. Variants carry a message rather
//! than source chains so errors stay `Clone + Serialize` and can travel
//! through shared futures and protocol responses unchanged.

use serde::{Deserialize, Serialize};

/// Result alias used throughout the workspace
pub type Result<T> = std::result::Result<T, VaultError>;

/// Unified error type for all vault operations
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum VaultError {
    /// Vault has not been provisioned with an identity yet
    #[error("No identity: {message}")]
    NoIdentity {
        /// What was attempted without an identity
        message: String,
    },

    /// Local share or device key is missing or corrupt
    #[error("Local identity error: {message}")]
    LocalIdentity {
        /// Description of the local state problem
        message: String,
    },

    /// Remote share is missing or revoked; the identity can no longer be
    /// reconstructed from this device's surviving half
    #[error("Remote identity error: {message}")]
    RemoteIdentity {
        /// Description of the remote state problem
        message: String,
    },

    /// Transient network or service failure; the caller may retry
    #[error("Remote service unavailable: {message}")]
    RemoteUnavailable {
        /// Description of the transport failure
        message: String,
    },

    /// Authentication-tag mismatch while opening an envelope
    #[error("Decryption failed: {message}")]
    Decryption {
        /// Description of the decryption failure
        message: String,
    },

    /// Revoke or update target is absent
    #[error("Record not found: {message}")]
    RecordNotFound {
        /// Which record was looked for
        message: String,
    },

    /// Execution-mode check failed
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Which privileged operation was refused
        message: String,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Cryptographic operation failed
    #[error("Crypto error: {message}")]
    Crypto {
        /// Error message describing the cryptographic failure
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Local storage operation failed
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },
}

impl VaultError {
    /// Create a no-identity error
    pub fn no_identity(message: impl Into<String>) -> Self {
        Self::NoIdentity {
            message: message.into(),
        }
    }

    /// Create a local identity error
    pub fn local_identity(message: impl Into<String>) -> Self {
        Self::LocalIdentity {
            message: message.into(),
        }
    }

    /// Create a remote identity error
    pub fn remote_identity(message: impl Into<String>) -> Self {
        Self::RemoteIdentity {
            message: message.into(),
        }
    }

    /// Create a transient remote failure
    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            message: message.into(),
        }
    }

    /// Create a decryption failure
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::Decryption {
            message: message.into(),
        }
    }

    /// Create a record-not-found error
    pub fn record_not_found(message: impl Into<String>) -> Self {
        Self::RecordNotFound {
            message: message.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Whether the caller may usefully retry the failed operation.
    ///
    /// Only transient transport failures qualify; retry policy itself
    /// belongs to the transport collaborator, never to the core.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable { .. })
    }

    /// Whether this failure invalidates locally persisted identity state.
    ///
    /// A missing remote share means the master seed can never again be
    /// reconstructed from this device's surviving half, so the local half
    /// is dead weight and gets wiped.
    pub fn wipes_local_state(&self) -> bool {
        matches!(self, Self::RemoteIdentity { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = VaultError::record_not_found("device 04ab");
        assert_eq!(err.to_string(), "Record not found: device 04ab");
    }

    #[test]
    fn only_remote_unavailable_is_retryable() {
        assert!(VaultError::remote_unavailable("timeout").is_retryable());
        assert!(!VaultError::remote_identity("revoked").is_retryable());
        assert!(!VaultError::decryption("bad tag").is_retryable());
    }

    #[test]
    fn only_remote_identity_wipes_local_state() {
        assert!(VaultError::remote_identity("share gone").wipes_local_state());
        assert!(!VaultError::remote_unavailable("503").wipes_local_state());
        assert!(!VaultError::no_identity("not set up").wipes_local_state());
    }

    #[test]
    fn errors_survive_serde_round_trip() {
        let err = VaultError::unauthorized("enrollcard requires root mode");
        let json = serde_json::to_string(&err).unwrap();
        let back: VaultError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, VaultError::Unauthorized { .. }));
    }
}
