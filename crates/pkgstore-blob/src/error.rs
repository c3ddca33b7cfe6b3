//! Blob store error types

use thiserror::Error;

/// Result type for blob store operations
pub type BlobResult<T> = std::result::Result<T, BlobError>;

/// Blob store operation errors
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No committed blob under this reference
    #[error("blob not found: {0}")]
    NotFound(String),

    /// Staged blob was already promoted or discarded
    #[error("staged blob not found: {0}")]
    TempNotFound(String),

    #[error("blob store {store} is full: {requested} bytes requested, {available} available")]
    CapacityExhausted {
        store: String,
        requested: u64,
        available: u64,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl BlobError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound(_) | BlobError::TempNotFound(_))
    }

    pub fn is_capacity_exhausted(&self) -> bool {
        matches!(self, BlobError::CapacityExhausted { .. })
    }
}
