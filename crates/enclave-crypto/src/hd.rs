//! Hardened hierarchical key derivation
//!
//! The derivation engine is a pure function from (master seed, 256-bit
//! label hash) to a key node. Each 4-byte little-endian word of the hash
//! contributes two hardened steps — the child at `word >> 31` then the
//! child at `word & 0x7fff_ffff` — so any label maps to a unique,
//! collision-resistant 16-step path without a stored derivation table.
//!
//! Nodes follow the standard HMAC-SHA512 chain-code construction over
//! secp256k1; hardened steps never expose the parent public key.

use enclave_core::{Hash256, Result, VaultError};
use hmac::{Hmac, Mac};
use secp256k1::{PublicKey, Scalar, SecretKey, SECP256K1};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::effects::Effects;

type HmacSha512 = Hmac<Sha512>;

/// First hardened child index
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";

/// The user's master secret
///
/// 32 or 64 bytes of high-entropy material. Exists only transiently in
/// memory; the backing storage is zeroized on drop and the type never
/// appears in logs.
#[derive(Clone)]
pub struct MasterSeed {
    bytes: Zeroizing<Vec<u8>>,
}

impl MasterSeed {
    /// Wrap existing seed material; only 32- or 64-byte seeds are valid
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        let len = bytes.len();
        if len != 32 && len != 64 {
            return Err(VaultError::invalid(format!(
                "Master seed must be 32 or 64 bytes, got {}",
                len
            )));
        }
        Ok(Self {
            bytes: Zeroizing::new(bytes),
        })
    }

    /// Generate a fresh 32-byte seed
    pub fn generate(effects: &Effects) -> Self {
        Self {
            bytes: Zeroizing::new(effects.random_vec(32)),
        }
    }

    /// Raw seed bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for MasterSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterSeed({} bytes)", self.bytes.len())
    }
}

/// A private key node in the derivation hierarchy
#[derive(Debug, Clone)]
pub struct KeyNode {
    secret: SecretKey,
    chain_code: [u8; 32],
    depth: u8,
}

impl KeyNode {
    /// Master node from a seed (HMAC-SHA512 under the standard master key)
    pub fn from_seed(seed: &MasterSeed) -> Result<Self> {
        let i = hmac_sha512(MASTER_HMAC_KEY, &[seed.as_bytes()])?;
        let (il, ir) = i.split_at(32);
        let secret = SecretKey::from_slice(il)
            .map_err(|e| VaultError::crypto(format!("Unusable master key material: {}", e)))?;
        Ok(Self {
            secret,
            chain_code: chain_code_from(ir),
            depth: 0,
        })
    }

    /// Derive the hardened child at `index` (index below 2^31)
    pub fn derive_hardened(&self, index: u32) -> Result<Self> {
        if index >= HARDENED_OFFSET {
            return Err(VaultError::invalid("Hardened index out of range"));
        }
        self.derive(index | HARDENED_OFFSET)
    }

    /// Derive the non-hardened child at `index`
    pub fn derive_child(&self, index: u32) -> Result<Self> {
        if index >= HARDENED_OFFSET {
            return Err(VaultError::invalid("Child index out of range"));
        }
        self.derive(index)
    }

    fn derive(&self, index: u32) -> Result<Self> {
        let data = if index >= HARDENED_OFFSET {
            // Hardened: 0x00 || ser256(parent secret) || ser32(index)
            let mut data = Vec::with_capacity(37);
            data.push(0u8);
            data.extend_from_slice(&self.secret.secret_bytes());
            data.extend_from_slice(&index.to_be_bytes());
            Zeroizing::new(data)
        } else {
            // Normal: serP(parent public) || ser32(index)
            let mut data = Vec::with_capacity(37);
            data.extend_from_slice(&self.public_key().serialize());
            data.extend_from_slice(&index.to_be_bytes());
            Zeroizing::new(data)
        };

        let i = hmac_sha512(&self.chain_code, &[&data])?;
        let (il, ir) = i.split_at(32);
        let secret = self
            .secret
            .add_tweak(&scalar_from(il)?)
            .map_err(|e| VaultError::crypto(format!("Key derivation tweak failed: {}", e)))?;

        Ok(Self {
            secret,
            chain_code: chain_code_from(ir),
            depth: self.depth.saturating_add(1),
        })
    }

    /// Walk the 16 hardened steps encoded by a 256-bit label hash
    pub fn derive_hash_path(&self, hash: &Hash256) -> Result<Self> {
        let mut node = self.clone();
        for word in hash.as_bytes().chunks_exact(4) {
            let v = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            node = node.derive_hardened(v >> 31)?;
            node = node.derive_hardened(v & 0x7fff_ffff)?;
        }
        Ok(node)
    }

    /// Derive along a relative path such as `m/0`, `m/1'/2`
    pub fn derive_path(&self, path: &str) -> Result<Self> {
        let mut node = self.clone();
        for index in parse_path(path)? {
            node = node.derive(index)?;
        }
        Ok(node)
    }

    /// The node's secret key
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// The node's public key
    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key(SECP256K1)
    }

    /// The node's chain code
    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    /// Depth in the hierarchy (master node is 0)
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Drop the private half, keeping the public derivation capability
    pub fn public_node(&self) -> PublicNode {
        PublicNode {
            public: self.public_key(),
            chain_code: self.chain_code,
            depth: self.depth,
        }
    }
}

/// A public-only key node; supports non-hardened derivation
#[derive(Debug, Clone)]
pub struct PublicNode {
    public: PublicKey,
    chain_code: [u8; 32],
    depth: u8,
}

impl PublicNode {
    /// Derive the non-hardened child at `index`
    pub fn derive_child(&self, index: u32) -> Result<Self> {
        if index >= HARDENED_OFFSET {
            return Err(VaultError::invalid(
                "Hardened derivation requires the private node",
            ));
        }
        let mut data = Vec::with_capacity(37);
        data.extend_from_slice(&self.public.serialize());
        data.extend_from_slice(&index.to_be_bytes());

        let i = hmac_sha512(&self.chain_code, &[&data])?;
        let (il, ir) = i.split_at(32);
        let public = self
            .public
            .add_exp_tweak(SECP256K1, &scalar_from(il)?)
            .map_err(|e| VaultError::crypto(format!("Public derivation tweak failed: {}", e)))?;

        Ok(Self {
            public,
            chain_code: chain_code_from(ir),
            depth: self.depth.saturating_add(1),
        })
    }

    /// Derive along a relative path; hardened segments are rejected
    pub fn derive_path(&self, path: &str) -> Result<Self> {
        let mut node = self.clone();
        for index in parse_path(path)? {
            node = node.derive_child(index)?;
        }
        Ok(node)
    }

    /// The node's public key
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// The node's chain code
    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }
}

/// Derive the key node for a label hash directly from a master seed
pub fn derive_node(seed: &MasterSeed, hash: &Hash256) -> Result<KeyNode> {
    KeyNode::from_seed(seed)?.derive_hash_path(hash)
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Result<Zeroizing<[u8; 64]>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| VaultError::crypto(format!("HMAC init failed: {}", e)))?;
    for part in parts {
        mac.update(part);
    }
    let digest = mac.finalize().into_bytes();
    Ok(Zeroizing::new(digest.into()))
}

fn chain_code_from(ir: &[u8]) -> [u8; 32] {
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(ir);
    chain_code
}

fn scalar_from(il: &[u8]) -> Result<Scalar> {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(il);
    // Probability ~2^-127; a caller hitting this has a broken hash input
    Scalar::from_be_bytes(bytes)
        .map_err(|_| VaultError::crypto("Derivation tweak out of field range"))
}

/// Parse a relative derivation path (`m/0/1'`); `'` marks a hardened step
fn parse_path(path: &str) -> Result<Vec<u32>> {
    let mut indices = Vec::new();
    for (pos, segment) in path.split('/').enumerate() {
        if pos == 0 && (segment == "m" || segment == "M") {
            continue;
        }
        if segment.is_empty() {
            return Err(VaultError::invalid(format!(
                "Empty segment in derivation path {:?}",
                path
            )));
        }
        let (digits, hardened) = match segment.strip_suffix('\'') {
            Some(digits) => (digits, true),
            None => (segment, false),
        };
        let index: u32 = digits.parse().map_err(|_| {
            VaultError::invalid(format!("Bad segment {:?} in derivation path", segment))
        })?;
        if index >= HARDENED_OFFSET {
            return Err(VaultError::invalid(format!(
                "Index {} out of range in derivation path",
                index
            )));
        }
        indices.push(if hardened { index | HARDENED_OFFSET } else { index });
    }
    Ok(indices)
}
