//! In-memory blob store

use async_trait::async_trait;
use parking_lot::Mutex;
use pkgstore_core::asset::BlobRef;
use pkgstore_core::checksum::HashAlgorithm;
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, instrument};

use crate::digest::MultiHasher;
use crate::error::{BlobError, BlobResult};
use crate::traits::{BlobStore, BlobStoreMetrics, Capacity, StagedWrite, TempBlobId, WRITE_CHUNK_SIZE};

struct TempEntry {
    blob_id: String,
    data: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    blobs: HashMap<String, Vec<u8>>,
    temps: HashMap<TempBlobId, TempEntry>,
    total_size: u64,
    temp_size: u64,
}

impl Inner {
    fn held(&self) -> u64 {
        self.total_size + self.temp_size
    }
}

/// Blob store keeping everything in process memory
pub struct MemoryBlobStore {
    name: String,
    capacity: Capacity,
    inner: Mutex<Inner>,
}

impl MemoryBlobStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: Capacity { limit: None },
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Limit the bytes this store may hold, committed and staged together
    pub fn with_capacity(mut self, capacity_bytes: u64) -> Self {
        self.capacity = Capacity {
            limit: Some(capacity_bytes),
        };
        self
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, reader), fields(store = %self.name))]
    async fn write_temp(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        algorithms: &[HashAlgorithm],
    ) -> BlobResult<StagedWrite> {
        let mut hasher = MultiHasher::new(algorithms);
        let mut data = Vec::new();
        let mut buf = vec![0u8; WRITE_CHUNK_SIZE];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let held = self.inner.lock().held();
            self.capacity
                .check(&self.name, held, hasher.size() + n as u64)?;
            hasher.update(&buf[..n]);
            data.extend_from_slice(&buf[..n]);
        }

        let (digests, size) = hasher.finalize();
        let blob_id = digests
            .get(&HashAlgorithm::CONTENT_ADDRESS)
            .cloned()
            .unwrap_or_default();
        let temp_id = TempBlobId::new();

        {
            let mut inner = self.inner.lock();
            // another writer may have filled the store while we were reading
            self.capacity.check(&self.name, inner.held(), size)?;
            inner.temp_size += size;
            inner.temps.insert(
                temp_id,
                TempEntry {
                    blob_id: blob_id.clone(),
                    data,
                },
            );
        }

        debug!(temp_id = %temp_id, size, "Staged blob");
        Ok(StagedWrite {
            temp_id,
            blob_id,
            digests,
            size,
        })
    }

    async fn read_temp(&self, temp_id: TempBlobId) -> BlobResult<Vec<u8>> {
        self.inner
            .lock()
            .temps
            .get(&temp_id)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| BlobError::TempNotFound(temp_id.to_string()))
    }

    fn discard_temp(&self, temp_id: TempBlobId) -> bool {
        let mut inner = self.inner.lock();
        match inner.temps.remove(&temp_id) {
            Some(entry) => {
                inner.temp_size -= entry.data.len() as u64;
                true
            }
            None => false,
        }
    }

    #[instrument(skip(self), fields(store = %self.name))]
    async fn promote(&self, temp_id: TempBlobId) -> BlobResult<BlobRef> {
        let mut inner = self.inner.lock();
        let entry = inner
            .temps
            .remove(&temp_id)
            .ok_or_else(|| BlobError::TempNotFound(temp_id.to_string()))?;
        let size = entry.data.len() as u64;
        inner.temp_size -= size;

        if !inner.blobs.contains_key(&entry.blob_id) {
            inner.total_size += size;
            inner.blobs.insert(entry.blob_id.clone(), entry.data);
        }

        Ok(BlobRef::new(&self.name, entry.blob_id))
    }

    async fn read(&self, blob_ref: &BlobRef) -> BlobResult<Vec<u8>> {
        if blob_ref.store != self.name {
            return Err(BlobError::NotFound(blob_ref.to_string()));
        }
        self.inner
            .lock()
            .blobs
            .get(&blob_ref.blob_id)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(blob_ref.to_string()))
    }

    async fn exists(&self, blob_ref: &BlobRef) -> BlobResult<bool> {
        Ok(blob_ref.store == self.name && self.inner.lock().blobs.contains_key(&blob_ref.blob_id))
    }

    fn metrics(&self) -> BlobStoreMetrics {
        let inner = self.inner.lock();
        let mut metrics = BlobStoreMetrics {
            blob_count: inner.blobs.len() as u64,
            total_size: inner.total_size,
            temp_count: inner.temps.len() as u64,
            temp_size: inner.temp_size,
            ..Default::default()
        };
        self.capacity
            .report(&self.name, inner.held(), &mut metrics.available_space);
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::space_key;

    #[tokio::test]
    async fn test_stage_and_promote() {
        let store = MemoryBlobStore::new("mem");
        let mut input: &[u8] = b"hello";
        let staged = store
            .write_temp(&mut input, &[HashAlgorithm::Sha1])
            .await
            .unwrap();

        assert_eq!(staged.size, 5);
        assert_eq!(staged.digests.len(), 2);
        assert_eq!(store.read_temp(staged.temp_id).await.unwrap(), b"hello");
        assert_eq!(store.metrics().temp_count, 1);

        let blob_ref = store.promote(staged.temp_id).await.unwrap();
        assert_eq!(blob_ref.blob_id, staged.blob_id);
        assert_eq!(store.read(&blob_ref).await.unwrap(), b"hello");

        let metrics = store.metrics();
        assert_eq!(metrics.blob_count, 1);
        assert_eq!(metrics.total_size, 5);
        assert_eq!(metrics.temp_count, 0);
        assert!(metrics.available_space.is_empty());
    }

    #[tokio::test]
    async fn test_promote_identical_content_twice() {
        let store = MemoryBlobStore::new("mem");
        let mut first: &[u8] = b"same";
        let mut second: &[u8] = b"same";
        let a = store.write_temp(&mut first, &[]).await.unwrap();
        let b = store.write_temp(&mut second, &[]).await.unwrap();

        let ref_a = store.promote(a.temp_id).await.unwrap();
        let ref_b = store.promote(b.temp_id).await.unwrap();
        assert_eq!(ref_a, ref_b);

        let metrics = store.metrics();
        assert_eq!(metrics.blob_count, 1);
        assert_eq!(metrics.total_size, 4);
        assert!(store.promote(a.temp_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_discard_releases_capacity() {
        let store = MemoryBlobStore::new("mem").with_capacity(10);
        let mut input: &[u8] = b"12345678";
        let staged = store.write_temp(&mut input, &[]).await.unwrap();
        assert_eq!(store.metrics().available_space[&space_key("mem")], 2);

        assert!(store.discard_temp(staged.temp_id));
        assert!(!store.discard_temp(staged.temp_id));
        assert_eq!(store.metrics().available_space[&space_key("mem")], 10);
        assert_eq!(store.metrics().temp_size, 0);
    }

    #[tokio::test]
    async fn test_capacity_exhausted() {
        let store = MemoryBlobStore::new("mem").with_capacity(4);
        let mut input: &[u8] = b"too large";
        let err = store.write_temp(&mut input, &[]).await.unwrap_err();

        assert!(err.is_capacity_exhausted());
        assert_eq!(store.metrics().temp_count, 0);
    }

    #[tokio::test]
    async fn test_read_foreign_store_ref() {
        let store = MemoryBlobStore::new("mem");
        let foreign = BlobRef::new("other", "abc");
        assert!(store.read(&foreign).await.unwrap_err().is_not_found());
        assert!(!store.exists(&foreign).await.unwrap());
    }
}
