//! Service-layer error types
//!
//! Domain, blob store and database errors are folded into one taxonomy that
//! callers of the format facets act on. Missing content is not an error here:
//! reads and deletes of absent paths return `None` or `false`.

use pkgstore_blob::BlobError;
use pkgstore_core::ContentError;
use pkgstore_db::DbError;
use thiserror::Error;

/// Result type alias for service operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Service-layer error types
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A row the operation depends on disappeared
    #[error("Not found: {0}")]
    NotFound(String),

    /// An asset exists and the effective policy is ALLOW_ONCE
    #[error("Write conflict: {0}")]
    WriteConflict(String),

    /// The effective policy rejects the write
    #[error("Write denied by policy: {0}")]
    PolicyDenied(String),

    /// Structured content failed required parsing
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// An asset references a blob that cannot be read back intact
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    /// Blob store unreachable or full
    #[error("I/O failure: {0}")]
    Io(String),

    /// Path cannot be mapped onto the repository layout
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Operation not offered by this repository's format
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Internal service error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Expected, caller-caused outcomes; logged at debug rather than error
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            ServiceError::WriteConflict(_)
                | ServiceError::PolicyDenied(_)
                | ServiceError::ValidationFailed(_)
                | ServiceError::InvalidPath(_)
                | ServiceError::Unsupported(_)
        )
    }

    /// Short label used for operation outcome metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::WriteConflict(_) => "write_conflict",
            ServiceError::PolicyDenied(_) => "policy_denied",
            ServiceError::ValidationFailed(_) => "validation_failed",
            ServiceError::IntegrityViolation(_) => "integrity_violation",
            ServiceError::Io(_) => "io_failure",
            ServiceError::InvalidPath(_) => "invalid_path",
            ServiceError::Unsupported(_) => "unsupported",
            ServiceError::Database(_) => "database",
            ServiceError::Internal(_) => "internal",
        }
    }
}

impl From<ContentError> for ServiceError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::InvalidPath(msg) => ServiceError::InvalidPath(msg),
            ContentError::InvalidCoordinates(msg) => ServiceError::InvalidPath(msg),
            ContentError::ChecksumMismatch { expected, actual } => ServiceError::IntegrityViolation(
                format!("expected {}, got {}", expected, actual),
            ),
            ContentError::WriteConflict(msg) => ServiceError::WriteConflict(msg),
            ContentError::PolicyDenied(msg) => ServiceError::PolicyDenied(msg),
            ContentError::ValidationError(msg) => ServiceError::ValidationFailed(msg),
            ContentError::SerializationError(msg)
            | ContentError::ConfigurationError(msg)
            | ContentError::InternalError(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => ServiceError::NotFound(msg),
            DbError::AlreadyExists(path) => ServiceError::WriteConflict(format!(
                "asset already exists and may not be redeployed: {}",
                path
            )),
            DbError::UniqueViolation(msg) => ServiceError::WriteConflict(msg),
            DbError::ConstraintViolation(msg) => ServiceError::ValidationFailed(msg),
            DbError::ForeignKeyViolation(msg) => ServiceError::Internal(msg),
            DbError::Connection(msg)
            | DbError::Pool(msg)
            | DbError::Query(msg)
            | DbError::Transaction(msg) => ServiceError::Database(msg),
            DbError::InvalidData(msg) | DbError::Serialization(msg) => {
                ServiceError::Internal(msg)
            }
            DbError::InvalidQuery(msg) => ServiceError::Internal(msg),
            DbError::Configuration(msg) | DbError::Migration(msg) | DbError::Internal(msg) => {
                ServiceError::Internal(msg)
            }
            DbError::Domain(err) => ServiceError::from(err),
        }
    }
}

impl From<BlobError> for ServiceError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::Config(msg) => ServiceError::Internal(msg),
            other => ServiceError::Io(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Internal(format!("Serialization error: {}", err))
    }
}
