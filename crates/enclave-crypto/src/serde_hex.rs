//! Serde helpers for hex-encoded byte fields
//!
//! Every byte field crossing the protocol boundary is a lowercase hex
//! string. These modules centralize that convention; use them with
//! `#[serde(with = "...")]`.

use serde::{Deserialize, Deserializer, Serializer};

/// Serde module for variable-length byte vectors
pub mod hex_vec {
    use super::*;

    /// Serialize bytes as a lowercase hex string
    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    /// Deserialize bytes from a hex string
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde module for fixed-length byte arrays
pub mod hex_array {
    use super::*;

    /// Serialize a fixed array as a lowercase hex string
    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    /// Deserialize a fixed array from a hex string
    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        let mut bytes = [0u8; N];
        hex::decode_to_slice(&s, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(bytes)
    }
}
