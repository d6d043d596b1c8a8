//! secp256k1 key helpers
//!
//! Hex encodings and signing primitives shared by the remote-store auth
//! protocol and the per-application key operations. Public keys travel as
//! uncompressed (65-byte) lowercase hex on the wire; parsing accepts the
//! compressed form as well.

use enclave_core::{Hash256, Result, VaultError};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};
use serde::{Deserialize, Serialize};

/// Encode a public key as uncompressed lowercase hex
pub fn public_key_hex(key: &PublicKey) -> String {
    hex::encode(key.serialize_uncompressed())
}

/// Parse a public key from hex (compressed or uncompressed)
pub fn public_key_from_hex(s: &str) -> Result<PublicKey> {
    let bytes = hex::decode(s)
        .map_err(|e| VaultError::invalid(format!("Malformed public key hex: {}", e)))?;
    PublicKey::from_slice(&bytes)
        .map_err(|e| VaultError::invalid(format!("Malformed public key: {}", e)))
}

/// Encode a secret key as lowercase hex
pub fn secret_key_hex(key: &SecretKey) -> String {
    hex::encode(key.secret_bytes())
}

/// Parse a secret key from hex
pub fn secret_key_from_hex(s: &str) -> Result<SecretKey> {
    let bytes = hex::decode(s)
        .map_err(|e| VaultError::invalid(format!("Malformed secret key hex: {}", e)))?;
    SecretKey::from_slice(&bytes)
        .map_err(|e| VaultError::invalid(format!("Malformed secret key: {}", e)))
}

/// A compact ECDSA signature with its recovery id
///
/// The remote share store identifies devices by recovering the signer's
/// public key from `(sig, recovery)` over a timestamp digest, so the
/// recovery id is part of the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverableSig {
    /// 64-byte compact signature, hex on the wire
    #[serde(rename = "sig", with = "crate::serde_hex::hex_array")]
    pub signature: [u8; 64],
    /// Recovery id (0..=3)
    pub recovery: u8,
}

/// Sign a 32-byte digest, producing a recoverable compact signature
pub fn sign_recoverable(digest: &Hash256, key: &SecretKey) -> RecoverableSig {
    let message = Message::from_digest(*digest.as_bytes());
    let signature = SECP256K1.sign_ecdsa_recoverable(&message, key);
    let (recovery, compact) = signature.serialize_compact();
    RecoverableSig {
        signature: compact,
        recovery: recovery.to_i32() as u8,
    }
}

/// Recover the signing public key from a digest and recoverable signature
pub fn recover(digest: &Hash256, sig: &RecoverableSig) -> Result<PublicKey> {
    let recovery = RecoveryId::from_i32(sig.recovery as i32)
        .map_err(|e| VaultError::invalid(format!("Bad recovery id: {}", e)))?;
    let signature = RecoverableSignature::from_compact(&sig.signature, recovery)
        .map_err(|e| VaultError::invalid(format!("Malformed signature: {}", e)))?;
    let message = Message::from_digest(*digest.as_bytes());
    SECP256K1
        .recover_ecdsa(&message, &signature)
        .map_err(|e| VaultError::crypto(format!("Signature recovery failed: {}", e)))
}
