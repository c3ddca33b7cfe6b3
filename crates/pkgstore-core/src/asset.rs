//! Assets and the blobs they reference
//!
//! An asset is a path-addressed entry within a repository. It always points
//! at exactly one committed blob and optionally belongs to a component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::checksum::{Checksum, Digests, HashAlgorithm};
use crate::error::{ContentError, Result};
use crate::types::{AssetId, Attributes, ComponentId, RepositoryId};

/// Reference to a committed, content-addressed blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobRef {
    /// Name of the blob store holding the bytes
    pub store: String,
    /// SHA-256 of the content
    pub blob_id: String,
}

impl BlobRef {
    pub fn new(store: impl Into<String>, blob_id: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            blob_id: blob_id.into(),
        }
    }

    /// The content address as a checksum
    pub fn checksum(&self) -> Result<Checksum> {
        Checksum::new(HashAlgorithm::CONTENT_ADDRESS, self.blob_id.clone())
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.store, self.blob_id)
    }
}

impl FromStr for BlobRef {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.rsplit_once('@') {
            Some((store, blob_id)) if !store.is_empty() && !blob_id.is_empty() => {
                Ok(BlobRef::new(store, blob_id))
            }
            _ => Err(ContentError::ValidationError(format!(
                "Invalid blob reference: {}",
                s
            ))),
        }
    }
}

/// Blob row as attached to an asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBlob {
    pub blob_ref: BlobRef,
    pub size: u64,
    pub content_type: String,
    pub checksums: Digests,
    pub created_at: DateTime<Utc>,
}

impl AssetBlob {
    /// Digest for one algorithm, if it was computed at ingestion
    pub fn checksum(&self, algorithm: HashAlgorithm) -> Option<&str> {
        self.checksums.get(&algorithm).map(String::as_str)
    }
}

/// A path-addressed entry within a repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub repository_id: RepositoryId,
    /// Canonical path, always with a leading `/`
    pub path: String,
    pub kind: String,
    pub component_id: Option<ComponentId>,
    pub attributes: Attributes,
    pub blob: AssetBlob,
    /// Set whenever the content was freshly written or validated
    pub last_verified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Asset {
    /// Read a top-level boolean attribute, treating absence as `false`
    pub fn flag(&self, key: &str) -> bool {
        self.attributes.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_ref_round_trip() {
        let blob_ref = BlobRef::new("default", "abc123");
        assert_eq!(blob_ref.to_string(), "default@abc123");
        assert_eq!("default@abc123".parse::<BlobRef>().unwrap(), blob_ref);
    }

    #[test]
    fn test_blob_ref_rejects_malformed() {
        assert!("no-separator".parse::<BlobRef>().is_err());
        assert!("@abc".parse::<BlobRef>().is_err());
        assert!("store@".parse::<BlobRef>().is_err());
    }

    #[test]
    fn test_blob_ref_checksum() {
        let blob_ref = BlobRef::new("default", "A".repeat(64));
        let checksum = blob_ref.checksum().unwrap();
        assert_eq!(checksum.algorithm(), HashAlgorithm::Sha256);
        assert_eq!(checksum.value(), "a".repeat(64));

        assert!(BlobRef::new("default", "short").checksum().is_err());
    }
}
