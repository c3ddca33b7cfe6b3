//! Service layer for pkgstore
//!
//! This crate sits between callers and the storage layers. It implements the
//! per-format content surface on top of the blob store and content store.
//!
//! # Architecture
//!
//! - **BlobIngestor**: streams payloads into staging, hashing them once
//! - **ContentFacet**: the Maven and APT facets behind one closed enum
//! - **MetadataConsistencyEngine**: deletes or flags metadata descriptors
//!   when components disappear
//! - **SnapshotRetention**: selects snapshot components eligible for removal
//! - **RepositoryRegistry**: one facet per configured repository
//!
//! # Example
//!
//! ```rust,no_run
//! use pkgstore_blob::MemoryBlobStore;
//! use pkgstore_core::Format;
//! use pkgstore_db::{create_pool, PoolConfig};
//! use pkgstore_service::{Payload, RepositoryConfig, RepositoryRegistryBuilder};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(&PoolConfig::in_memory()).await?;
//! let registry = RepositoryRegistryBuilder::new()
//!     .pool(pool)
//!     .blob_store(Arc::new(MemoryBlobStore::new("default")))
//!     .repository(RepositoryConfig::new("maven-releases", Format::Maven2))
//!     .build()
//!     .await?;
//!
//! let facet = registry.require("maven-releases")?;
//! facet
//!     .put("com/x/lib/1.0/lib-1.0.jar", Payload::from_bytes(b"...".to_vec()))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod content;
pub mod error;
pub mod events;
pub mod facet;
pub mod ingest;
pub mod metadata;
pub mod parser;
pub mod retention;

// Re-export main types for convenience
pub use config::{MavenConfig, RepositoryConfig};
pub use content::{guess_content_type, Content, ContentDescriptor, Payload};
pub use error::{ServiceError, ServiceResult};
pub use events::EventPublisher;
pub use facet::{AptFacet, ContentFacet, MavenFacet, RepositoryUsage};
pub use ingest::{BlobIngestor, StagedBlob};
pub use metadata::{MetadataConsistencyEngine, MetadataOutcome, MetadataPlan, Presence};
pub use retention::SnapshotRetention;

use pkgstore_blob::{BlobStore, BlobStoreMetrics};
use pkgstore_db::{ContentStore, EventStore, SqliteContentStore, SqliteEventStore, SqlitePool};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Holds one facet per configured repository
///
/// All repositories share the database pool, blob store and event store.
#[derive(Clone)]
pub struct RepositoryRegistry {
    facets: BTreeMap<String, ContentFacet>,
    blob_store: Arc<dyn BlobStore>,
    event_store: Arc<dyn EventStore>,
}

impl RepositoryRegistry {
    /// Look up a repository by name
    pub fn get(&self, name: &str) -> Option<&ContentFacet> {
        self.facets.get(name)
    }

    /// Look up a repository, failing when it is not configured
    pub fn require(&self, name: &str) -> ServiceResult<&ContentFacet> {
        self.get(name)
            .ok_or_else(|| ServiceError::NotFound(format!("repository {}", name)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.facets.keys().map(String::as_str)
    }

    pub fn facets(&self) -> impl Iterator<Item = &ContentFacet> {
        self.facets.values()
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blob_store
    }

    pub fn event_store(&self) -> &Arc<dyn EventStore> {
        &self.event_store
    }

    /// Read-only snapshot of blob store usage
    pub fn blob_metrics(&self) -> BlobStoreMetrics {
        self.blob_store.metrics()
    }

    /// Component and asset totals per repository
    pub async fn usage(&self) -> ServiceResult<BTreeMap<String, RepositoryUsage>> {
        let mut usage = BTreeMap::new();
        for (name, facet) in &self.facets {
            usage.insert(name.clone(), facet.usage().await?);
        }
        Ok(usage)
    }
}

/// Builder for RepositoryRegistry
#[derive(Default)]
pub struct RepositoryRegistryBuilder {
    pool: Option<SqlitePool>,
    blob_store: Option<Arc<dyn BlobStore>>,
    event_store: Option<Arc<dyn EventStore>>,
    repositories: Vec<RepositoryConfig>,
}

impl RepositoryRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database pool
    pub fn pool(mut self, pool: SqlitePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Set the blob store
    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    /// Set a custom event store; defaults to one on the same pool
    pub fn event_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.event_store = Some(store);
        self
    }

    /// Add a repository
    pub fn repository(mut self, config: RepositoryConfig) -> Self {
        self.repositories.push(config);
        self
    }

    pub fn repositories(mut self, configs: impl IntoIterator<Item = RepositoryConfig>) -> Self {
        self.repositories.extend(configs);
        self
    }

    /// Open every configured repository, creating rows that do not exist yet
    pub async fn build(self) -> ServiceResult<RepositoryRegistry> {
        let pool = self
            .pool
            .ok_or_else(|| ServiceError::Internal("Database pool is required".to_string()))?;
        let blob_store = self
            .blob_store
            .ok_or_else(|| ServiceError::Internal("Blob store is required".to_string()))?;
        let event_store = self
            .event_store
            .unwrap_or_else(|| Arc::new(SqliteEventStore::new(pool.clone())));

        let mut facets = BTreeMap::new();
        for config in self.repositories {
            if facets.contains_key(&config.name) {
                return Err(ServiceError::Internal(format!(
                    "repository {} is configured twice",
                    config.name
                )));
            }
            config.validate()?;

            let store: Arc<dyn ContentStore> = Arc::new(
                SqliteContentStore::open(pool.clone(), &config.name, config.format, config.repo_type)
                    .await?,
            );
            info!(
                repository = %config.name,
                format = %config.format,
                write_policy = %config.write_policy,
                "Repository opened"
            );

            let name = config.name.clone();
            let facet = ContentFacet::from_config(
                config,
                store,
                Arc::clone(&blob_store),
                Arc::clone(&event_store),
            )?;
            facets.insert(name, facet);
        }

        Ok(RepositoryRegistry {
            facets,
            blob_store,
            event_store,
        })
    }
}
