//! Error types for the content store domain

use thiserror::Error;

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, ContentError>;

/// Main error type for domain operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    /// Path cannot be mapped onto the repository layout
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Coordinates derived from a path or descriptor are inconsistent
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// An asset already exists and the effective policy forbids overwriting it
    #[error("Write conflict: {0}")]
    WriteConflict(String),

    /// The effective policy rejects the write outright
    #[error("Write denied by policy: {0}")]
    PolicyDenied(String),

    /// Structured content failed required parsing
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ContentError {
    /// Expected, caller-caused outcomes that should not be logged as errors
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ContentError::WriteConflict(_)
                | ContentError::PolicyDenied(_)
                | ContentError::ValidationError(_)
                | ContentError::InvalidPath(_)
        )
    }
}

impl From<serde_json::Error> for ContentError {
    fn from(err: serde_json::Error) -> Self {
        ContentError::SerializationError(err.to_string())
    }
}
