//! Local filesystem blob store
//!
//! Layout under the root directory:
//!
//! ```text
//! tmp/<uuid>.bytes                      staged writes
//! content/<aa>/<bb>/<sha256>.bytes      committed blobs
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use pkgstore_core::asset::BlobRef;
use pkgstore_core::checksum::HashAlgorithm;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

use crate::digest::MultiHasher;
use crate::error::{BlobError, BlobResult};
use crate::traits::{BlobStore, BlobStoreMetrics, Capacity, StagedWrite, TempBlobId, WRITE_CHUNK_SIZE};

const TMP_DIR: &str = "tmp";
const CONTENT_DIR: &str = "content";
const BLOB_EXTENSION: &str = "bytes";

struct TempEntry {
    blob_id: String,
    size: u64,
}

#[derive(Default)]
struct Counters {
    blob_count: u64,
    total_size: u64,
    temp_size: u64,
    temps: HashMap<TempBlobId, TempEntry>,
}

impl Counters {
    fn held(&self) -> u64 {
        self.total_size + self.temp_size
    }
}

/// Blob store backed by a local directory
pub struct FileBlobStore {
    name: String,
    root: PathBuf,
    capacity: Capacity,
    counters: Mutex<Counters>,
}

impl FileBlobStore {
    /// Open (or create) a store rooted at `root`
    ///
    /// Leftover staged files from a previous process are removed and the
    /// committed blob counters are rebuilt from disk.
    pub async fn open(
        name: impl Into<String>,
        root: impl AsRef<Path>,
        capacity_bytes: Option<u64>,
    ) -> BlobResult<Self> {
        let name = name.into();
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(TMP_DIR)).await?;
        fs::create_dir_all(root.join(CONTENT_DIR)).await?;

        let stale = clear_dir(&root.join(TMP_DIR)).await?;
        if stale > 0 {
            warn!(store = %name, count = stale, "Removed stale staged blobs");
        }

        let (blob_count, total_size) = scan_content(&root.join(CONTENT_DIR)).await?;
        info!(store = %name, blob_count, total_size, root = %root.display(), "Opened blob store");

        Ok(Self {
            name,
            root,
            capacity: Capacity {
                limit: capacity_bytes,
            },
            counters: Mutex::new(Counters {
                blob_count,
                total_size,
                ..Default::default()
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn temp_path(&self, temp_id: TempBlobId) -> PathBuf {
        self.root
            .join(TMP_DIR)
            .join(format!("{}.{}", temp_id, BLOB_EXTENSION))
    }

    fn content_path(&self, blob_id: &str) -> BlobResult<PathBuf> {
        if blob_id.len() < 4 || !blob_id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BlobError::NotFound(blob_id.to_string()));
        }
        Ok(self
            .root
            .join(CONTENT_DIR)
            .join(&blob_id[0..2])
            .join(&blob_id[2..4])
            .join(format!("{}.{}", blob_id, BLOB_EXTENSION)))
    }

    async fn write_file(
        &self,
        path: &Path,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        hasher: &mut MultiHasher,
    ) -> BlobResult<()> {
        let mut file = fs::File::create(path).await?;
        let mut buf = vec![0u8; WRITE_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let held = self.counters.lock().held();
            self.capacity
                .check(&self.name, held, hasher.size() + n as u64)?;
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
        }
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, reader), fields(store = %self.name))]
    async fn write_temp(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        algorithms: &[HashAlgorithm],
    ) -> BlobResult<StagedWrite> {
        let temp_id = TempBlobId::new();
        let path = self.temp_path(temp_id);
        let mut hasher = MultiHasher::new(algorithms);

        // removes the partial file on error or if this future is dropped mid-write
        let guard = PartialTemp::new(path.clone());
        self.write_file(&path, reader, &mut hasher).await?;
        guard.disarm();

        let (digests, size) = hasher.finalize();
        let blob_id = digests
            .get(&HashAlgorithm::CONTENT_ADDRESS)
            .cloned()
            .unwrap_or_default();

        {
            let mut counters = self.counters.lock();
            counters.temp_size += size;
            counters.temps.insert(
                temp_id,
                TempEntry {
                    blob_id: blob_id.clone(),
                    size,
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
        if !self.counters.lock().temps.contains_key(&temp_id) {
            return Err(BlobError::TempNotFound(temp_id.to_string()));
        }
        Ok(fs::read(self.temp_path(temp_id)).await?)
    }

    fn discard_temp(&self, temp_id: TempBlobId) -> bool {
        let removed = {
            let mut counters = self.counters.lock();
            match counters.temps.remove(&temp_id) {
                Some(entry) => {
                    counters.temp_size -= entry.size;
                    true
                }
                None => false,
            }
        };
        if removed {
            if let Err(e) = std::fs::remove_file(self.temp_path(temp_id)) {
                warn!(temp_id = %temp_id, "Failed to remove staged blob: {}", e);
            }
        }
        removed
    }

    #[instrument(skip(self), fields(store = %self.name))]
    async fn promote(&self, temp_id: TempBlobId) -> BlobResult<BlobRef> {
        let (blob_id, size) = {
            let counters = self.counters.lock();
            let entry = counters
                .temps
                .get(&temp_id)
                .ok_or_else(|| BlobError::TempNotFound(temp_id.to_string()))?;
            (entry.blob_id.clone(), entry.size)
        };

        let temp_path = self.temp_path(temp_id);
        let target = self.content_path(&blob_id)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        // hard_link fails if the target exists, so only one writer counts the blob
        let created = match fs::hard_link(&temp_path, &target).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => false,
            Err(e) => return Err(e.into()),
        };

        {
            let mut counters = self.counters.lock();
            if let Some(entry) = counters.temps.remove(&temp_id) {
                counters.temp_size -= entry.size;
            }
            if created {
                counters.blob_count += 1;
                counters.total_size += size;
            }
        }
        fs::remove_file(&temp_path).await?;

        debug!(blob_id = %blob_id, created, "Promoted staged blob");
        Ok(BlobRef::new(&self.name, blob_id))
    }

    async fn read(&self, blob_ref: &BlobRef) -> BlobResult<Vec<u8>> {
        if blob_ref.store != self.name {
            return Err(BlobError::NotFound(blob_ref.to_string()));
        }
        let path = self.content_path(&blob_ref.blob_id)?;
        fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BlobError::NotFound(blob_ref.to_string())
            } else {
                BlobError::Io(e)
            }
        })
    }

    async fn exists(&self, blob_ref: &BlobRef) -> BlobResult<bool> {
        if blob_ref.store != self.name {
            return Ok(false);
        }
        match self.content_path(&blob_ref.blob_id) {
            Ok(path) => Ok(fs::try_exists(&path).await?),
            Err(_) => Ok(false),
        }
    }

    fn metrics(&self) -> BlobStoreMetrics {
        let counters = self.counters.lock();
        let mut metrics = BlobStoreMetrics {
            blob_count: counters.blob_count,
            total_size: counters.total_size,
            temp_count: counters.temps.len() as u64,
            temp_size: counters.temp_size,
            ..Default::default()
        };
        self.capacity
            .report(&self.name, counters.held(), &mut metrics.available_space);
        metrics
    }

    async fn health_check(&self) -> BlobResult<()> {
        fs::metadata(self.root.join(CONTENT_DIR)).await?;
        Ok(())
    }
}

/// Staged file that is deleted on drop unless disarmed
struct PartialTemp {
    path: Option<PathBuf>,
}

impl PartialTemp {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn disarm(mut self) {
        self.path = None;
    }
}

impl Drop for PartialTemp {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Removed partial staged blob"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "Failed to remove partial staged blob: {}", e),
        }
    }
}

async fn clear_dir(dir: &Path) -> BlobResult<u64> {
    let mut removed = 0;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

async fn scan_content(dir: &Path) -> BlobResult<(u64, u64)> {
    let mut count = 0;
    let mut size = 0;
    let mut stack = vec![dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                count += 1;
                size += entry.metadata().await?.len();
            }
        }
    }
    Ok((count, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::space_key;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_stage_promote_read() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open("default", dir.path(), None).await.unwrap();

        let mut input: &[u8] = b"hello";
        let staged = store
            .write_temp(&mut input, &[HashAlgorithm::Md5])
            .await
            .unwrap();
        assert_eq!(
            staged.blob_id,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(store.temp_path(staged.temp_id).exists());

        let blob_ref = store.promote(staged.temp_id).await.unwrap();
        assert!(!store.temp_path(staged.temp_id).exists());
        assert!(dir
            .path()
            .join("content/2c/f2")
            .join(format!("{}.bytes", staged.blob_id))
            .exists());
        assert_eq!(store.read(&blob_ref).await.unwrap(), b"hello");
        assert!(store.exists(&blob_ref).await.unwrap());
    }

    #[tokio::test]
    async fn test_promote_is_idempotent_by_digest() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open("default", dir.path(), None).await.unwrap();

        let mut a: &[u8] = b"payload";
        let mut b: &[u8] = b"payload";
        let first = store.write_temp(&mut a, &[]).await.unwrap();
        let second = store.write_temp(&mut b, &[]).await.unwrap();
        store.promote(first.temp_id).await.unwrap();
        store.promote(second.temp_id).await.unwrap();

        let metrics = store.metrics();
        assert_eq!(metrics.blob_count, 1);
        assert_eq!(metrics.total_size, 7);
        assert_eq!(metrics.temp_count, 0);
    }

    #[tokio::test]
    async fn test_discard_removes_file() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open("default", dir.path(), Some(100)).await.unwrap();

        let mut input: &[u8] = b"abc";
        let staged = store.write_temp(&mut input, &[]).await.unwrap();
        assert_eq!(store.metrics().available_space[&space_key("default")], 97);

        assert!(store.discard_temp(staged.temp_id));
        assert!(!store.temp_path(staged.temp_id).exists());
        assert_eq!(store.metrics().available_space[&space_key("default")], 100);
        assert!(store.read_temp(staged.temp_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_capacity_failure_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open("default", dir.path(), Some(3)).await.unwrap();

        let mut input: &[u8] = b"four";
        let err = store.write_temp(&mut input, &[]).await.unwrap_err();
        assert!(err.is_capacity_exhausted());

        let mut entries = std::fs::read_dir(dir.path().join("tmp")).unwrap();
        assert!(entries.next().is_none());
        assert_eq!(store.metrics().temp_count, 0);
    }

    /// Yields one chunk, then never completes
    struct StalledReader {
        sent: bool,
    }

    impl AsyncRead for StalledReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if self.sent {
                return std::task::Poll::Pending;
            }
            self.sent = true;
            buf.put_slice(&[7u8; 1024]);
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_cancelled_write_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::open("default", dir.path(), None).await.unwrap();

        let mut reader = StalledReader { sent: false };
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            store.write_temp(&mut reader, &[HashAlgorithm::Sha1]),
        )
        .await;
        assert!(result.is_err());

        let mut entries = std::fs::read_dir(dir.path().join("tmp")).unwrap();
        assert!(entries.next().is_none());
        let metrics = store.metrics();
        assert_eq!(metrics.temp_count, 0);
        assert_eq!(metrics.temp_size, 0);
    }

    #[tokio::test]
    async fn test_reopen_rebuilds_counters() {
        let dir = tempdir().unwrap();
        {
            let store = FileBlobStore::open("default", dir.path(), None).await.unwrap();
            let mut input: &[u8] = b"persisted";
            let staged = store.write_temp(&mut input, &[]).await.unwrap();
            store.promote(staged.temp_id).await.unwrap();

            let mut orphan: &[u8] = b"orphan";
            // never promoted nor discarded, as after a crash
            store.write_temp(&mut orphan, &[]).await.unwrap();
        }

        let store = FileBlobStore::open("default", dir.path(), None).await.unwrap();
        let metrics = store.metrics();
        assert_eq!(metrics.blob_count, 1);
        assert_eq!(metrics.total_size, 9);

        let mut entries = std::fs::read_dir(dir.path().join("tmp")).unwrap();
        assert!(entries.next().is_none());
    }
}
