//! Shared types for the Enclave vault

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Type-safe 256-bit hash value
///
/// Every derivation path in the vault starts from one of these: application
/// origins, registry labels and revocation identifiers are all reduced to a
/// `Hash256` before key derivation, so no derivation table ever needs to be
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Create a new Hash256 from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash a stable textual label (SHA-256 over the UTF-8 bytes)
    pub fn label(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        Self(digest.into())
    }

    /// Get the raw bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Execution mode of the vault context
///
/// Root mode is granted only to the top-level execution context; every
/// embedded or child context runs restricted. Authorization decisions are a
/// pure function of `(mode, request shape)` — there is no ambient escalation
/// path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Top-level, fully privileged context
    Root,
    /// Embedded, capability-limited context
    Restricted,
}

impl ExecutionMode {
    /// True for the fully privileged top-level context
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }
}
