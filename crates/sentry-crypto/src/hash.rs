//! Content hashing (BLAKE3) for audit chain-linking and cache keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A BLAKE3 content hash (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash arbitrary data.
    #[must_use]
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash multiple chunks as if concatenated, without an intermediate
    /// allocation.
    #[must_use]
    pub fn hash_multi(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// The zero hash, used as the `previous_hash` of the first audit entry.
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Whether this is the zero hash.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Build from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Try to build from a slice; `None` unless it is exactly 32 bytes.
    #[must_use]
    pub fn try_from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Some(Self(bytes))
    }

    /// Hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        Self::try_from_slice(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }

    /// Domain-separated hash, so the same bytes hashed for two different
    /// purposes (e.g. dedup keys vs. audit chaining) never collide.
    #[must_use]
    pub fn hash_with_domain(domain: &str, data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(domain);
        hasher.update(data);
        Self(*hasher.finalize().as_bytes())
    }

    /// First `n` hex digits of the hash — used by the Prompt Cache's
    /// content-addressed key (16 hex digits by default).
    #[must_use]
    pub fn hex_prefix(&self, n: usize) -> String {
        let full = self.to_hex();
        full[..n.min(full.len())].to_string()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl Default for ContentHash {
    fn default() -> Self {
        Self::zero()
    }
}

impl AsRef<[u8]> for ContentHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_hash() {
        let data = b"hello world";
        assert_eq!(ContentHash::hash(data), ContentHash::hash(data));
        assert_ne!(ContentHash::hash(data), ContentHash::hash(b"different"));
    }

    #[test]
    fn multi_matches_concatenation() {
        let parts: &[&[u8]] = &[b"hello", b" ", b"world"];
        assert_eq!(ContentHash::hash_multi(parts), ContentHash::hash(b"hello world"));
    }

    #[test]
    fn domain_separation_changes_hash() {
        let data = b"same data";
        assert_ne!(
            ContentHash::hash_with_domain("cache", data),
            ContentHash::hash_with_domain("audit", data)
        );
    }

    #[test]
    fn hex_prefix_takes_leading_digits() {
        let hash = ContentHash::hash(b"prompt cache key");
        let prefix = hash.hex_prefix(16);
        assert_eq!(prefix.len(), 16);
        assert!(hash.to_hex().starts_with(&prefix));
    }

    #[test]
    fn hex_roundtrip() {
        let hash = ContentHash::hash(b"test");
        assert_eq!(ContentHash::from_hex(&hash.to_hex()).unwrap(), hash);
    }
}
