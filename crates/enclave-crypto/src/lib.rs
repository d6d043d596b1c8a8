//! Enclave Crypto: the vault's cryptographic engine
//!
//! Pure, stateless building blocks — nothing in this crate performs I/O or
//! holds long-lived secrets:
//!
//! - **Effects**: injectable randomness and time so every nonce, keypair and
//!   timestamp is reproducible under test.
//! - **Key derivation**: hardened hierarchical derivation turning a master
//!   seed plus a 256-bit label hash into a stable per-purpose key node.
//! - **Secret shares**: 2-of-2 split/combine of the master seed.
//! - **Envelopes**: ECIES public-key encryption (secp256k1 ECDH +
//!   AES-256-GCM) used for every share and registry document at rest.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod effects;
pub mod envelope;
pub mod hd;
pub mod keys;
pub mod serde_hex;
pub mod shares;

pub use effects::{Effects, FixedTimeSource, SystemTimeSource, TimeSource};
pub use envelope::Envelope;
pub use hd::{derive_node, KeyNode, MasterSeed, PublicNode, HARDENED_OFFSET};
pub use keys::{
    public_key_from_hex, public_key_hex, secret_key_from_hex, secret_key_hex, sign_recoverable,
    RecoverableSig,
};
pub use shares::{combine, split, Share};

// Re-export the curve types callers need at the seams
pub use secp256k1::{PublicKey, SecretKey};
