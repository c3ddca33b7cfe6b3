//! Errors raised by the SQLite content and event stores
//!
//! SQLite constraint failures are classified by kind so callers can tell a
//! duplicate path apart from a dangling reference.

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Result of a content or event store call
pub type DbResult<T> = Result<T, DbError>;

/// Failures of the content and event stores
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database unreachable: {0}")]
    Connection(String),

    /// Pool exhausted or closed
    #[error("Pool unavailable: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    /// Embedded schema migration failed
    #[error("Schema migration failed: {0}")]
    Migration(String),

    /// Transaction aborted, including a busy or locked database
    #[error("Transaction aborted: {0}")]
    Transaction(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Asset already recorded at this path
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// NOT NULL or CHECK constraint
    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    /// Row references a missing repository or component
    #[error("Dangling reference: {0}")]
    ForeignKeyViolation(String),

    /// Duplicate coordinates or path
    #[error("Duplicate row: {0}")]
    UniqueViolation(String),

    /// Stored row could not be mapped back to domain types
    #[error("Malformed row: {0}")]
    InvalidData(String),

    /// Attribute or digest JSON could not be (de)serialized
    #[error("Attribute encoding error: {0}")]
    Serialization(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid pool configuration
    #[error("Invalid pool configuration: {0}")]
    Configuration(String),

    #[error("Unexpected database error: {0}")]
    Internal(String),

    #[error(transparent)]
    Domain(#[from] pkgstore_core::error::ContentError),
}

impl DbError {
    /// True for a missing row
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }

    /// True for any constraint failure reported by SQLite
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DbError::ConstraintViolation(_)
                | DbError::ForeignKeyViolation(_)
                | DbError::UniqueViolation(_)
        )
    }

    /// True when a write collided with an existing row
    pub fn is_already_exists(&self) -> bool {
        matches!(self, DbError::AlreadyExists(_) | DbError::UniqueViolation(_))
    }

    /// True when retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Connection(_) | DbError::Pool(_) | DbError::Transaction(_)
        )
    }
}

// SQLITE_BUSY and SQLITE_LOCKED primary result codes
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound("no matching row".to_string()),

            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation(message),
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation(message),
                    ErrorKind::NotNullViolation | ErrorKind::CheckViolation => {
                        DbError::ConstraintViolation(message)
                    }
                    _ => match db_err.code().as_deref() {
                        Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => DbError::Transaction(message),
                        _ => DbError::Query(message),
                    },
                }
            }

            sqlx::Error::PoolTimedOut => DbError::Pool("timed out waiting for a connection".to_string()),

            sqlx::Error::PoolClosed => DbError::Pool("pool closed".to_string()),

            sqlx::Error::Io(io_err) => DbError::Connection(format!("I/O error: {}", io_err)),

            sqlx::Error::Protocol(msg) => DbError::Connection(format!("Protocol error: {}", msg)),

            sqlx::Error::TypeNotFound { type_name } => {
                DbError::InvalidData(format!("Type not found: {}", type_name))
            }

            sqlx::Error::ColumnNotFound(col) => {
                DbError::InvalidData(format!("Column not found: {}", col))
            }

            sqlx::Error::Decode(msg) => DbError::Serialization(format!("Decode error: {}", msg)),

            sqlx::Error::Migrate(migrate_err) => DbError::Migration(format!("{}", migrate_err)),

            _ => DbError::Internal(format!("{}", err)),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(format!("{}", err))
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(format!("{}", err))
    }
}
