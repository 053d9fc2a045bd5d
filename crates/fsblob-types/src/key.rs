use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length in bytes of the digests the store assigns.
pub const DIGEST_LEN: usize = 32;

/// Longest hex key accepted from callers.
pub const MAX_KEY_HEX_LEN: usize = 128;

/// Content-derived key of a stored blob.
///
/// A `BlobKey` is a lowercase hex string. Keys assigned by the store are the
/// hex-encoded BLAKE3 digest of the blob's bytes, so identical content always
/// produces the same key. Keys parsed from caller input only need to be
/// well-formed hex; a well-formed key the store never produced simply does
/// not resolve to any blob.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobKey(String);

impl BlobKey {
    /// Build a key from a raw digest.
    pub fn from_digest(digest: [u8; DIGEST_LEN]) -> Self {
        Self(hex::encode(digest))
    }

    /// Parse a hex key. Uppercase digits are normalised to lowercase.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidKey {
            key: s.to_string(),
            reason: reason.into(),
        };

        if s.is_empty() {
            return Err(invalid("key must not be empty"));
        }
        if s.len() > MAX_KEY_HEX_LEN {
            return Err(invalid("key is too long"));
        }
        if s.len() % 2 != 0 {
            return Err(invalid("key must have an even number of hex digits"));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid("key must be hexadecimal"));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// The hex representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }

    /// Decode the key back into raw bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Validated on construction.
        hex::decode(&self.0).unwrap_or_default()
    }
}

impl fmt::Debug for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobKey({})", self.short_hex())
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BlobKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BlobKey {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<BlobKey> for String {
    fn from(key: BlobKey) -> Self {
        key.0
    }
}

impl From<[u8; DIGEST_LEN]> for BlobKey {
    fn from(digest: [u8; DIGEST_LEN]) -> Self {
        Self::from_digest(digest)
    }
}
