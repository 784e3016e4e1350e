//! Object ID - SHA256 content digest naming an object in the store.

use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;

use crate::{Error, Result};

/// Content-derived object identifier - a SHA256 digest of the stored bytes.
///
/// Never mutated after creation; equality, ordering and hashing all derive
/// from the digest bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid {
    bytes: [u8; 32],
}

impl Oid {
    /// Create an OID from raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Oid { bytes }
    }

    /// Parse an OID from a hex string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim();
        if hex.len() != 64 {
            return Err(Error::InvalidOid(format!(
                "expected 64 hex chars, got {}",
                hex.len()
            )));
        }

        let decoded = hex::decode(hex).map_err(|e| Error::InvalidOid(e.to_string()))?;

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Oid { bytes })
    }

    /// Compute the OID of a buffer.
    pub fn from_content(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Oid { bytes }
    }

    /// Compute the OID of streamed content without buffering it.
    ///
    /// Returns the OID together with the number of bytes consumed.
    pub fn from_reader<R: Read>(mut reader: R) -> std::io::Result<(Self, u64)> {
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        let mut total = 0u64;

        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            total += n as u64;
        }

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Ok((Oid { bytes }, total))
    }

    /// Get the OID as a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Abbreviated 8-char hex prefix, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.bytes[..4])
    }

    /// Get the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.to_hex())
    }
}

impl std::str::FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Oid::from_hex(s)
    }
}

impl serde::Serialize for Oid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Oid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex: String = serde::Deserialize::deserialize(deserializer)?;
        Oid::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oid_from_content() {
        let oid = Oid::from_content(b"Hello, World!");
        // SHA256 of "Hello, World!"
        assert_eq!(
            oid.to_hex(),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_oid_from_hex_roundtrip() {
        let hex = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";
        let oid = Oid::from_hex(hex).unwrap();
        assert_eq!(oid.to_hex(), hex);
        assert_eq!(oid, Oid::from_content(b"Hello, World!"));
    }

    #[test]
    fn test_oid_invalid_hex() {
        assert!(Oid::from_hex("abc").is_err()); // too short
        assert!(Oid::from_hex(&"zz".repeat(32)).is_err()); // not hex
    }

    #[test]
    fn test_oid_from_reader_matches_from_content() {
        let content = b"streamed content of moderate length";
        let (oid, size) = Oid::from_reader(&content[..]).unwrap();
        assert_eq!(oid, Oid::from_content(content));
        assert_eq!(size, content.len() as u64);
    }

    #[test]
    fn test_oid_short() {
        let oid = Oid::from_content(b"Hello, World!");
        assert_eq!(oid.short(), "dffd6021");
    }

    #[test]
    fn test_oid_serde_as_hex() {
        let oid = Oid::from_content(b"serde me");
        let json = serde_json::to_string(&oid).unwrap();
        assert_eq!(json, format!("\"{}\"", oid.to_hex()));

        let back: Oid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, oid);

        let bad: std::result::Result<Oid, _> = serde_json::from_str("\"not hex\"");
        assert!(bad.is_err());
    }
}
