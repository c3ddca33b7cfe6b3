//! Content-addressed blob storage for the package content store
//!
//! This crate provides:
//! - The [`BlobStore`] contract: staged writes, promotion by SHA-256, reads
//!   and capacity reporting
//! - Single-pass multi-digest hashing
//! - Backends: local filesystem and in-memory

pub mod backends;
pub mod config;
pub mod digest;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FileBlobStore, memory::MemoryBlobStore};
pub use config::BlobStoreConfig;
pub use digest::{digest_bytes, MultiHasher};
pub use error::{BlobError, BlobResult};
pub use traits::{space_key, BlobStore, BlobStoreMetrics, StagedWrite, TempBlobId};

use std::sync::Arc;

/// Create a blob store from configuration
pub async fn from_config(config: &BlobStoreConfig) -> BlobResult<Arc<dyn BlobStore>> {
    config.validate()?;

    match config {
        BlobStoreConfig::File {
            name,
            path,
            capacity_bytes,
        } => {
            let store = FileBlobStore::open(name.clone(), path, *capacity_bytes).await?;
            Ok(Arc::new(store))
        }
        BlobStoreConfig::Memory {
            name,
            capacity_bytes,
        } => {
            let store = MemoryBlobStore::new(name.clone());
            let store = match capacity_bytes {
                Some(capacity) => store.with_capacity(*capacity),
                None => store,
            };
            Ok(Arc::new(store))
        }
    }
}
