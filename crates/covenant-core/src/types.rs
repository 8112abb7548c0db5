//! Core type definitions for Covenant

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque account identifier (a party, the loan itself, or a fee recipient)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque fungible-asset identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 32-byte digest binding a refinance proposal (hex-encoded on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitmentHash(pub [u8; 32]);

impl CommitmentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Display for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for CommitmentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CommitmentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| serde::de::Error::custom("expected 64 hex chars"))
    }
}

/// Asset amount in raw units. Scaled rates also use this width.
pub type Amount = u128;

/// Monotonic timestamp in seconds, supplied by the host environment
pub type Timestamp = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_display() {
        let id = AccountId::new("borrower-1");
        assert_eq!(id.to_string(), "borrower-1");
        assert_eq!(id.as_str(), "borrower-1");
    }

    #[test]
    fn test_commitment_hash_hex_roundtrip() {
        let hash = CommitmentHash([0xab; 32]);
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(CommitmentHash::from_hex(&hex), Some(hash));
    }

    #[test]
    fn test_commitment_hash_rejects_bad_hex() {
        assert!(CommitmentHash::from_hex("zz").is_none());
        assert!(CommitmentHash::from_hex("abcd").is_none());
    }

    #[test]
    fn test_commitment_hash_serde() {
        let hash = CommitmentHash([7; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        let parsed: CommitmentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, hash);
    }
}
