//! Database layer for pkgstore
//!
//! This crate persists the content graph of every repository:
//! - Connection pool management for SQLite
//! - The [`ContentStore`] trait scoping component/asset rows to one repository
//! - A SQLite implementation with single-transaction saves
//! - An event store for graph mutations and rebuild requests
//! - Database migrations
//!
//! # Example
//!
//! ```rust,no_run
//! use pkgstore_db::{create_pool, ContentStore, PoolConfig, SqliteContentStore};
//! use pkgstore_core::{Format, RepositoryType};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(&PoolConfig::new("sqlite://data/pkgstore.db")).await?;
//! let store =
//!     SqliteContentStore::open(pool, "maven-releases", Format::Maven2, RepositoryType::Hosted)
//!         .await?;
//!
//! let exists = store.asset_exists("/com/x/lib/1.0/lib-1.0.jar").await?;
//! # Ok(())
//! # }
//! ```

// Re-export core domain types for convenience
pub use pkgstore_core;

// Public modules
pub mod error;
pub mod event_store;
pub mod pool;
pub mod repository;
pub mod sqlite;

// Re-exports for convenience
pub use error::{DbError, DbResult};
pub use event_store::{EventQuery, EventQueryResults, EventStore, SqliteEventStore};
pub use pool::{
    close_pool, create_pool, get_pool_stats, run_migrations, verify_pool_health, PoolConfig,
    PoolStats,
};
pub use repository::{
    ComponentUpsert, ContentStore, CoordinateFilter, DeletedAsset, NewAsset, NewBlob,
    NewComponent, ReleasedLine, SaveOutcome, SaveRequest, SnapshotLine,
};
pub use sqlite::SqliteContentStore;

// Re-export sqlx types that users may need
pub use sqlx::sqlite::SqlitePool;

/// Database layer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default database URL environment variable name
pub const DEFAULT_DATABASE_URL_ENV: &str = "DATABASE_URL";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_env_var() {
        assert_eq!(DEFAULT_DATABASE_URL_ENV, "DATABASE_URL");
    }
}
