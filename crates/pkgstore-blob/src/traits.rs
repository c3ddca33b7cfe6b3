//! Blob store trait definitions

use async_trait::async_trait;
use pkgstore_core::asset::BlobRef;
use pkgstore_core::checksum::{Digests, HashAlgorithm};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio::io::AsyncRead;
use uuid::Uuid;

use crate::error::{BlobError, BlobResult};

/// Read buffer size for streaming writes (64 KiB)
pub const WRITE_CHUNK_SIZE: usize = 64 * 1024;

/// Handle to hashed but uncommitted bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TempBlobId(Uuid);

impl TempBlobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TempBlobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TempBlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of staging a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedWrite {
    pub temp_id: TempBlobId,
    /// SHA-256 of the content, the id it will be committed under
    pub blob_id: String,
    pub digests: Digests,
    pub size: u64,
}

/// Read-only snapshot of blob store usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobStoreMetrics {
    pub blob_count: u64,
    pub total_size: u64,
    pub temp_count: u64,
    pub temp_size: u64,
    /// Usable bytes keyed by `fileStore:<name>`
    pub available_space: BTreeMap<String, u64>,
}

/// Content-addressed, write-once byte storage with a staging area
///
/// Bytes are first written to a temporary entry while being hashed, then
/// either promoted under their SHA-256 or discarded.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Store name recorded in every [`BlobRef`] this store hands out
    fn name(&self) -> &str;

    /// Stream `reader` into a temporary entry, computing `algorithms` plus SHA-256
    ///
    /// A failed write leaves no temporary entry behind.
    async fn write_temp(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        algorithms: &[HashAlgorithm],
    ) -> BlobResult<StagedWrite>;

    /// Read back staged bytes
    async fn read_temp(&self, temp_id: TempBlobId) -> BlobResult<Vec<u8>>;

    /// Release a staged entry; returns whether it existed
    ///
    /// Synchronous so that it can run from `Drop`.
    fn discard_temp(&self, temp_id: TempBlobId) -> bool;

    /// Commit a staged entry under its SHA-256
    ///
    /// Promoting content that is already committed is a no-op success.
    async fn promote(&self, temp_id: TempBlobId) -> BlobResult<BlobRef>;

    async fn read(&self, blob_ref: &BlobRef) -> BlobResult<Vec<u8>>;

    async fn exists(&self, blob_ref: &BlobRef) -> BlobResult<bool>;

    fn metrics(&self) -> BlobStoreMetrics;

    async fn health_check(&self) -> BlobResult<()> {
        Ok(())
    }
}

/// Key under which a store reports usable space
pub fn space_key(store: &str) -> String {
    format!("fileStore:{}", store)
}

/// Tracks bytes held against an optional capacity limit
#[derive(Debug, Clone, Copy)]
pub(crate) struct Capacity {
    pub limit: Option<u64>,
}

impl Capacity {
    pub fn check(&self, store: &str, held: u64, incoming: u64) -> BlobResult<()> {
        match self.limit {
            Some(limit) if held.saturating_add(incoming) > limit => {
                Err(BlobError::CapacityExhausted {
                    store: store.to_string(),
                    requested: incoming,
                    available: limit.saturating_sub(held),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn report(&self, store: &str, held: u64, into: &mut BTreeMap<String, u64>) {
        if let Some(limit) = self.limit {
            into.insert(space_key(store), limit.saturating_sub(held));
        }
    }
}
