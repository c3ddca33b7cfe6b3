//! Common test utilities and helpers
//!
//! Integration tests run against an in-memory SQLite database and an
//! in-memory blob store unless they ask for a file-backed database.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use pkgstore_blob::{BlobStore, MemoryBlobStore};
use pkgstore_core::{ComponentId, Format};
use pkgstore_db::{
    create_pool, ContentStore, EventStore, PoolConfig, SqliteContentStore, SqliteEventStore,
    SqlitePool,
};
use pkgstore_service::{
    AptFacet, ContentFacet, MavenFacet, Payload, RepositoryConfig, RepositoryRegistry,
    RepositoryRegistryBuilder,
};
use std::path::Path;
use std::sync::Arc;

pub mod fixtures;

/// Maven repository with the default ALLOW_ONCE policy
pub const RELEASES: &str = "maven-releases";
/// Maven repository that accepts releases and snapshots
pub const HOSTED: &str = "maven-hosted";
/// Debian repository
pub const DEBS: &str = "apt-hosted";

/// Repositories, database and blob store wired together
pub struct TestStore {
    pub pool: SqlitePool,
    pub blobs: Arc<MemoryBlobStore>,
    pub registry: RepositoryRegistry,
}

impl TestStore {
    /// Default repositories on an in-memory database
    pub async fn new() -> Self {
        Self::with_repositories(default_repositories()).await
    }

    pub async fn with_repositories(configs: Vec<RepositoryConfig>) -> Self {
        let pool = create_pool(&PoolConfig::in_memory())
            .await
            .expect("Failed to create database pool");
        Self::build(pool, configs).await
    }

    /// Default repositories on a database file, with room for concurrent writers
    pub async fn on_file(path: &Path) -> Self {
        let url = format!("sqlite://{}", path.display());
        let pool = create_pool(&PoolConfig::new(url).max_connections(8))
            .await
            .expect("Failed to create database pool");
        Self::build(pool, default_repositories()).await
    }

    async fn build(pool: SqlitePool, configs: Vec<RepositoryConfig>) -> Self {
        let blobs = Arc::new(MemoryBlobStore::new("default"));
        let registry = RepositoryRegistryBuilder::new()
            .pool(pool.clone())
            .blob_store(blobs.clone())
            .repositories(configs)
            .build()
            .await
            .expect("Failed to open repositories");

        Self {
            pool,
            blobs,
            registry,
        }
    }

    pub fn facet(&self, name: &str) -> &ContentFacet {
        self.registry.require(name).expect("repository is configured")
    }

    pub fn maven(&self, name: &str) -> &MavenFacet {
        self.facet(name).as_maven().expect("maven2 repository")
    }

    pub fn apt(&self, name: &str) -> &AptFacet {
        self.facet(name).as_apt().expect("apt repository")
    }

    /// Direct access to a repository's component and asset rows
    pub async fn content_store(&self, name: &str) -> Arc<dyn ContentStore> {
        let config = self.facet(name).config();
        Arc::new(
            SqliteContentStore::open(self.pool.clone(), name, config.format, config.repo_type)
                .await
                .expect("Failed to open content store"),
        )
    }

    pub fn event_store(&self) -> SqliteEventStore {
        SqliteEventStore::new(self.pool.clone())
    }

    /// Number of recorded events of one type
    pub async fn event_count(&self, event_type: &str) -> i64 {
        self.event_store()
            .count_by_type(event_type)
            .await
            .expect("Failed to count events")
    }

    pub fn temp_blob_count(&self) -> u64 {
        self.blobs.metrics().temp_count
    }

    /// Store text at a path, panicking on failure
    pub async fn put(&self, repository: &str, path: &str, content: impl Into<Vec<u8>>) {
        self.facet(repository)
            .put(path, Payload::from_bytes(content))
            .await
            .unwrap_or_else(|e| panic!("put {} failed: {}", path, e));
    }

    /// Store a jar for one version of an artifact
    pub async fn put_jar(&self, repository: &str, group: &str, artifact: &str, version: &str) {
        let path = fixtures::artifact_path(group, artifact, version, "jar");
        self.put(repository, &path, format!("{}:{}:{}", group, artifact, version))
            .await;
    }

    pub async fn component_id(
        &self,
        repository: &str,
        namespace: &str,
        name: &str,
        version: &str,
    ) -> ComponentId {
        self.content_store(repository)
            .await
            .find_component(namespace, name, version)
            .await
            .expect("Failed to read component")
            .unwrap_or_else(|| panic!("component {}:{}:{} missing", namespace, name, version))
            .id
    }

    /// Rewrite a component's creation time
    pub async fn backdate_component(&self, id: ComponentId, created_at: DateTime<Utc>) {
        sqlx::query("UPDATE components SET created_at = ? WHERE id = ?")
            .bind(created_at)
            .bind(id.get())
            .execute(&self.pool)
            .await
            .expect("Failed to backdate component");
    }

    /// Attribute value stored on an asset
    pub async fn asset_attribute(
        &self,
        repository: &str,
        path: &str,
        key: &str,
    ) -> Option<serde_json::Value> {
        self.content_store(repository)
            .await
            .find_asset(path)
            .await
            .expect("Failed to read asset")
            .and_then(|asset| asset.attributes.get(key).cloned())
    }
}

pub fn default_repositories() -> Vec<RepositoryConfig> {
    vec![
        RepositoryConfig::new(RELEASES, Format::Maven2),
        RepositoryConfig::new(HOSTED, Format::Maven2),
        RepositoryConfig::new(DEBS, Format::Apt),
    ]
}
