//! 2-of-2 secret sharing
//!
//! The master seed is split into a local half and a remote half. The split
//! is a one-time pad: share 1 is uniform random, share 2 is the secret XOR
//! share 1, so either half alone is indistinguishable from noise and both
//! halves together reproduce the secret exactly. Each share carries an
//! index byte so two copies of the same half cannot be combined.

use enclave_core::{Result, VaultError};
use zeroize::Zeroizing;

use crate::effects::Effects;

/// One half of a 2-of-2 split
#[derive(Clone)]
pub struct Share {
    index: u8,
    data: Zeroizing<Vec<u8>>,
}

impl Share {
    /// Wrap raw share material
    pub fn new(index: u8, data: Vec<u8>) -> Self {
        Self {
            index,
            data: Zeroizing::new(data),
        }
    }

    /// Which half of the split this is
    pub fn index(&self) -> u8 {
        self.index
    }

    /// The share payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Serialize as index byte followed by the payload
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Vec::with_capacity(1 + self.data.len());
        bytes.push(self.index);
        bytes.extend_from_slice(&self.data);
        Zeroizing::new(bytes)
    }

    /// Parse the `to_bytes` encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.split_first() {
            Some((&index, data)) if !data.is_empty() => Ok(Self::new(index, data.to_vec())),
            _ => Err(VaultError::invalid("Share payload too short")),
        }
    }
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Share(index {}, {} bytes)", self.index, self.data.len())
    }
}

/// Split a secret into two shares, both required to reconstruct it
pub fn split(secret: &[u8], effects: &Effects) -> (Share, Share) {
    let pad = effects.random_vec(secret.len());
    let masked: Vec<u8> = secret.iter().zip(pad.iter()).map(|(s, p)| s ^ p).collect();
    (Share::new(1, pad), Share::new(2, masked))
}

/// Recombine two shares of the same split into the original secret
pub fn combine(a: &Share, b: &Share) -> Result<Zeroizing<Vec<u8>>> {
    if a.index() == b.index() {
        return Err(VaultError::invalid(
            "Cannot combine two copies of the same share",
        ));
    }
    if a.data().len() != b.data().len() {
        return Err(VaultError::invalid("Share lengths differ"));
    }
    Ok(Zeroizing::new(
        a.data()
            .iter()
            .zip(b.data().iter())
            .map(|(x, y)| x ^ y)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_inverts_split() {
        let effects = Effects::test();
        let secret = effects.random_vec(32);
        let (local, remote) = split(&secret, &effects);
        assert_eq!(*combine(&local, &remote).unwrap(), secret);
        // Order does not matter
        assert_eq!(*combine(&remote, &local).unwrap(), secret);
    }

    #[test]
    fn single_share_is_not_the_secret() {
        let effects = Effects::test();
        let secret = effects.random_vec(32);
        let (local, remote) = split(&secret, &effects);
        assert_ne!(local.data(), &secret[..]);
        assert_ne!(remote.data(), &secret[..]);
    }

    #[test]
    fn shares_from_different_splits_do_not_combine_to_the_secret() {
        let effects = Effects::test();
        let secret = effects.random_vec(32);
        let (local, _) = split(&secret, &effects);
        let (_, other_remote) = split(&secret, &effects);
        assert_ne!(*combine(&local, &other_remote).unwrap(), secret);
    }

    #[test]
    fn same_index_is_rejected() {
        let effects = Effects::test();
        let (local, _) = split(&[1, 2, 3], &effects);
        assert!(matches!(
            combine(&local, &local.clone()),
            Err(VaultError::Invalid { .. })
        ));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let a = Share::new(1, vec![0; 4]);
        let b = Share::new(2, vec![0; 5]);
        assert!(combine(&a, &b).is_err());
    }

    #[test]
    fn byte_encoding_round_trip() {
        let share = Share::new(2, vec![9, 8, 7]);
        let parsed = Share::from_bytes(&share.to_bytes()).unwrap();
        assert_eq!(parsed.index(), 2);
        assert_eq!(parsed.data(), &[9, 8, 7]);
        assert!(Share::from_bytes(&[1]).is_err());
        assert!(Share::from_bytes(&[]).is_err());
    }
}
