//! Staged blob ingestion
//!
//! A payload is streamed into the blob store's staging area exactly once.
//! The resulting [`StagedBlob`] can be read back for parsing any number of
//! times, then either committed under its SHA-256 or discarded. A staged blob
//! dropped without either is discarded automatically, so abandoned writes
//! never leak temporary entries.

use pkgstore_blob::{BlobStore, StagedWrite, TempBlobId};
use pkgstore_core::{BlobRef, Digests, HashAlgorithm};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::content::Payload;
use crate::error::{ServiceError, ServiceResult};

/// Writes payloads into a blob store's staging area
#[derive(Clone)]
pub struct BlobIngestor {
    store: Arc<dyn BlobStore>,
}

impl BlobIngestor {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Stream a payload into staging, computing every requested digest
    #[instrument(skip(self, payload), fields(store = %self.store.name()))]
    pub async fn ingest(
        &self,
        payload: Payload,
        algorithms: &[HashAlgorithm],
    ) -> ServiceResult<StagedBlob> {
        let (mut reader, content_type) = payload.into_parts();
        let staged = self.store.write_temp(&mut *reader, algorithms).await?;

        debug!(
            temp_id = %staged.temp_id,
            size = staged.size,
            blob_id = %staged.blob_id,
            "Payload staged"
        );

        Ok(StagedBlob {
            store: Arc::clone(&self.store),
            write: staged,
            content_type,
            state: StageState::Staged,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StageState {
    Staged,
    Committed(BlobRef),
    Discarded,
}

/// Hashed bytes awaiting a commit-or-discard decision
pub struct StagedBlob {
    store: Arc<dyn BlobStore>,
    write: StagedWrite,
    content_type: Option<String>,
    state: StageState,
}

impl StagedBlob {
    pub fn temp_id(&self) -> TempBlobId {
        self.write.temp_id
    }

    /// SHA-256 the blob is or will be committed under
    pub fn blob_id(&self) -> &str {
        &self.write.blob_id
    }

    pub fn digests(&self) -> &Digests {
        &self.write.digests
    }

    pub fn size(&self) -> u64 {
        self.write.size
    }

    /// Content type declared with the payload
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn is_committed(&self) -> bool {
        matches!(self.state, StageState::Committed(_))
    }

    /// Read the staged bytes; repeatable until commit or discard
    pub async fn bytes(&self) -> ServiceResult<Vec<u8>> {
        match &self.state {
            StageState::Staged => Ok(self.store.read_temp(self.write.temp_id).await?),
            StageState::Committed(blob_ref) => Ok(self.store.read(blob_ref).await?),
            StageState::Discarded => Err(ServiceError::Internal(format!(
                "staged blob {} was already discarded",
                self.write.temp_id
            ))),
        }
    }

    /// Promote the staged bytes; repeated calls return the same reference
    #[instrument(skip(self), fields(blob_id = %self.write.blob_id))]
    pub async fn commit(&mut self) -> ServiceResult<BlobRef> {
        match &self.state {
            StageState::Committed(blob_ref) => Ok(blob_ref.clone()),
            StageState::Discarded => Err(ServiceError::Internal(format!(
                "cannot commit discarded blob {}",
                self.write.temp_id
            ))),
            StageState::Staged => {
                let blob_ref = self.store.promote(self.write.temp_id).await?;
                debug!(blob_ref = %blob_ref, "Staged blob committed");
                self.state = StageState::Committed(blob_ref.clone());
                Ok(blob_ref)
            }
        }
    }

    /// Release the staged bytes without committing them
    pub fn discard(&mut self) {
        if self.state == StageState::Staged {
            if !self.store.discard_temp(self.write.temp_id) {
                warn!(temp_id = %self.write.temp_id, "Staged blob was already gone");
            }
            self.state = StageState::Discarded;
        }
    }
}

impl Drop for StagedBlob {
    fn drop(&mut self) {
        if self.state == StageState::Staged {
            debug!(temp_id = %self.write.temp_id, "Discarding abandoned staged blob");
            self.store.discard_temp(self.write.temp_id);
        }
    }
}

impl std::fmt::Debug for StagedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedBlob")
            .field("store", &self.store.name())
            .field("write", &self.write)
            .field("state", &self.state)
            .finish()
    }
}
