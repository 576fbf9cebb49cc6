//! Content hashing of build output.
//!
//! The platform reports an installed module's hash as the SHA-256 of its wasm,
//! so local hashes use the same function and compare directly.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a module's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Accept a 64 character hex digest (any case).
    pub fn from_hex(hex: &str) -> anyhow::Result<Self> {
        let normalized = hex.trim().to_ascii_lowercase();
        if normalized.len() != 64 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("Invalid module hash: '{}'", hex);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        // sha256("") is a well-known constant
        assert_eq!(
            ContentHash::of(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn identical_bytes_identical_hash() {
        let wasm = b"\0asm\x01\0\0\0";
        assert_eq!(ContentHash::of(wasm), ContentHash::of(wasm));
        assert_ne!(ContentHash::of(wasm), ContentHash::of(b"\0asm\x01\0\0\x01"));
    }

    #[test]
    fn from_hex_normalizes_case() {
        let upper = "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855";
        assert_eq!(ContentHash::from_hex(upper).unwrap(), ContentHash::of(b""));
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(ContentHash::from_hex("abc").is_err());
        assert!(ContentHash::from_hex(&"g".repeat(64)).is_err());
    }

    #[test]
    fn serde_rejects_invalid_hash() {
        let err = serde_json::from_str::<ContentHash>("\"nope\"");
        assert!(err.is_err());
        let hash: ContentHash = serde_json::from_str(&format!("\"{}\"", ContentHash::of(b"x")))
            .unwrap();
        assert_eq!(hash, ContentHash::of(b"x"));
    }
}
