//! Envelope encryption for shares and registry documents
//!
//! Public-key authenticated encryption: an ephemeral secp256k1 keypair is
//! combined with the recipient's public key via ECDH and the resulting
//! shared secret keys AES-256-GCM. The four fields (iv, ephemeral public
//! key, ciphertext, tag) are each independently hex-encoded on the wire.
//!
//! Opening with any key other than the recipient's fails authentication —
//! it never yields garbage plaintext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use enclave_core::{Result, VaultError};
use secp256k1::ecdh::SharedSecret;
use secp256k1::{PublicKey, SecretKey, SECP256K1};
use serde::{Deserialize, Serialize};

use crate::effects::Effects;

const TAG_LEN: usize = 16;

/// A sealed payload addressed to one public key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// GCM nonce
    #[serde(with = "crate::serde_hex::hex_array")]
    pub iv: [u8; 12],
    /// Ephemeral public key, uncompressed SEC1 encoding
    #[serde(rename = "ephemeralPublicKey", with = "crate::serde_hex::hex_vec")]
    pub ephemeral_public_key: Vec<u8>,
    /// Encrypted payload without the tag
    #[serde(with = "crate::serde_hex::hex_vec")]
    pub ciphertext: Vec<u8>,
    /// GCM authentication tag
    #[serde(with = "crate::serde_hex::hex_array")]
    pub tag: [u8; TAG_LEN],
}

impl Envelope {
    /// Seal `plaintext` to `recipient`
    pub fn seal(recipient: &PublicKey, plaintext: &[u8], effects: &Effects) -> Result<Self> {
        let ephemeral = effects.secret_key();
        let shared = SharedSecret::new(recipient, &ephemeral);

        let cipher = Aes256Gcm::new_from_slice(&shared.secret_bytes())
            .map_err(|e| VaultError::crypto(format!("Failed to create cipher: {}", e)))?;
        let iv: [u8; 12] = effects.random_bytes();
        let nonce = Nonce::from(iv);

        let mut ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| VaultError::crypto(format!("Envelope encryption failed: {}", e)))?;

        let tag_bytes = ciphertext.split_off(ciphertext.len() - TAG_LEN);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&tag_bytes);

        Ok(Self {
            iv,
            ephemeral_public_key: ephemeral
                .public_key(SECP256K1)
                .serialize_uncompressed()
                .to_vec(),
            ciphertext,
            tag,
        })
    }

    /// Open the envelope with the recipient's secret key
    pub fn open(&self, recipient: &SecretKey) -> Result<Vec<u8>> {
        let ephemeral = PublicKey::from_slice(&self.ephemeral_public_key)
            .map_err(|e| VaultError::invalid(format!("Malformed ephemeral public key: {}", e)))?;
        let shared = SharedSecret::new(&ephemeral, recipient);

        let cipher = Aes256Gcm::new_from_slice(&shared.secret_bytes())
            .map_err(|e| VaultError::crypto(format!("Failed to create cipher: {}", e)))?;
        let nonce = Nonce::from(self.iv);

        let mut sealed = Vec::with_capacity(self.ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(&self.ciphertext);
        sealed.extend_from_slice(&self.tag);

        cipher
            .decrypt(&nonce, sealed.as_slice())
            .map_err(|_| VaultError::decryption("Envelope authentication tag mismatch"))
    }

    /// Serialize to the JSON wire form
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| VaultError::serialization(format!("Envelope encoding failed: {}", e)))
    }

    /// Parse the JSON wire form
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| VaultError::serialization(format!("Envelope decoding failed: {}", e)))
    }
}
