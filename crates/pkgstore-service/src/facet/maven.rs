//! Maven 2 facet

use chrono::{DateTime, Duration, Utc};
use pkgstore_core::maven::{self, MavenPath};
use pkgstore_core::policy::{self, WriteTarget};
use pkgstore_core::{Component, ComponentId, Format, HashAlgorithm, WritePolicy};
use pkgstore_db::{NewAsset, NewBlob, NewComponent, SaveRequest};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

use super::FacetCore;
use crate::content::{guess_content_type, Content, ContentDescriptor, Payload};
use crate::error::{ServiceError, ServiceResult};
use crate::events::EventPublisher;
use crate::metadata::MetadataConsistencyEngine;
use crate::parser::{MetadataValidator, PomReader};
use crate::retention::SnapshotRetention;

/// Serves a Maven 2 layout repository
#[derive(Clone)]
pub struct MavenFacet {
    pub(crate) core: FacetCore,
    metadata: MetadataConsistencyEngine,
    retention: SnapshotRetention,
}

impl MavenFacet {
    pub(crate) fn new(core: FacetCore) -> Self {
        let metadata = MetadataConsistencyEngine::new(core.store.clone(), core.events.clone());
        let retention = SnapshotRetention::new(core.store.clone());
        Self {
            core,
            metadata,
            retention,
        }
    }

    pub fn metadata_engine(&self) -> &MetadataConsistencyEngine {
        &self.metadata
    }

    fn parse(path: &str) -> ServiceResult<MavenPath> {
        Ok(MavenPath::parse(path)?)
    }

    pub async fn get(&self, path: &str) -> ServiceResult<Option<Content>> {
        let parsed = Self::parse(path)?;
        self.core.get(&parsed.asset_path()).await
    }

    pub async fn exists(&self, path: &str) -> ServiceResult<bool> {
        let parsed = Self::parse(path)?;
        self.core.exists(&parsed.asset_path()).await
    }

    /// Reject paths and versions this repository does not accept
    fn check_policies(&self, parsed: &MavenPath) -> ServiceResult<()> {
        let maven = &self.core.config.maven;
        if !maven.layout_policy.permits(parsed) {
            return Err(ServiceError::InvalidPath(format!(
                "{} does not follow the Maven 2 layout",
                parsed.asset_path()
            )));
        }
        if let Some(coordinates) = parsed.coordinates() {
            if !maven.version_policy.permits(coordinates) {
                return Err(ServiceError::PolicyDenied(format!(
                    "version {} is not accepted by this repository",
                    coordinates.version
                )));
            }
        }
        Ok(())
    }

    /// Store content at a layout path
    #[instrument(skip(self, payload), fields(repository = %self.core.name(), path = %path))]
    pub async fn put(&self, path: &str, payload: Payload) -> ServiceResult<ContentDescriptor> {
        let result = self.put_inner(path, payload).await;
        if let Err(e) = &result {
            if e.is_user_facing() {
                debug!("Put rejected: {}", e);
            }
        }
        result
    }

    async fn put_inner(&self, path: &str, payload: Payload) -> ServiceResult<ContentDescriptor> {
        let parsed = Self::parse(path)?;
        self.check_policies(&parsed)?;

        let asset_path = parsed.asset_path();
        let kind = parsed.kind();
        let effective = policy::evaluate(
            Format::Maven2,
            self.core.config.write_policy,
            WriteTarget {
                path: &asset_path,
                kind: kind.as_str(),
            },
        );
        let exists = match effective {
            WritePolicy::AllowOnce => self.core.store.asset_exists(&asset_path).await?,
            _ => false,
        };
        effective.authorize(&asset_path, exists)?;

        let mut staged = self
            .core
            .ingestor
            .ingest(payload, &maven::HASH_ALGORITHMS)
            .await?;

        if parsed.is_metadata() && !parsed.is_subordinate() && self.core.config.maven.metadata_validation
        {
            MetadataValidator::validate(&parsed, &staged.bytes().await?)?;
        }

        let component = match parsed.coordinates() {
            Some(coordinates) => {
                let packaging = if parsed.is_pom() {
                    match PomReader::read(&staged.bytes().await?) {
                        Ok(model) => Some(model.packaging),
                        Err(e) => {
                            warn!(path = %asset_path, "Unreadable project descriptor: {}", e);
                            None
                        }
                    }
                } else {
                    None
                };

                let mut component = NewComponent::new(
                    &coordinates.group_id,
                    &coordinates.artifact_id,
                    &coordinates.version,
                )
                .base_version(&coordinates.base_version)
                .attributes(maven::component_attributes(coordinates, packaging.as_deref()));
                if let Some(packaging) = packaging {
                    component = component.kind(packaging);
                }
                Some(component)
            }
            None => None,
        };

        let content_type = staged
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| guess_content_type(&asset_path).to_string());
        let blob = NewBlob {
            blob_ref: staged.commit().await?,
            size: staged.size(),
            content_type,
            checksums: staged.digests().clone(),
        };

        let outcome = self
            .core
            .store
            .save(SaveRequest {
                component,
                asset: NewAsset {
                    path: asset_path.clone(),
                    kind: kind.as_str().to_string(),
                    component_id: None,
                    attributes: parsed.asset_attributes(),
                    blob,
                },
                overwrite: effective.permits_overwrite(),
            })
            .await?;

        if let Some(upsert) = &outcome.component {
            let correlation = EventPublisher::correlation_id();
            let mut events = Vec::new();
            if upsert.created {
                info!(component = %upsert.component, "Component created");
                events.push(self.core.events.component_created(&upsert.component));
            }
            if upsert.component.is_kind(maven::MAVEN_ARCHETYPE_KIND)
                && (upsert.created || parsed.is_pom())
            {
                events.push(self.core.events.archetype_catalog_rebuild());
            }
            self.core.events.emit_all(events, &correlation).await;
        }

        debug!(size = outcome.asset.blob.size, "Asset stored");
        Ok(ContentDescriptor::from(&outcome.asset))
    }

    async fn remove(&self, paths: Vec<String>) -> ServiceResult<Vec<String>> {
        let correlation = EventPublisher::correlation_id();
        let removal = self.core.remove(&paths, &correlation).await?;

        if removal
            .components
            .iter()
            .any(|c| c.is_kind(maven::MAVEN_ARCHETYPE_KIND))
        {
            self.core
                .events
                .emit(self.core.events.archetype_catalog_rebuild(), &correlation)
                .await;
        }
        for component in &removal.components {
            self.metadata.on_component_deleted(component).await;
        }

        Ok(removal.assets.into_iter().map(|a| a.path).collect())
    }

    #[instrument(skip(self), fields(repository = %self.core.name()))]
    pub async fn delete(&self, path: &str) -> ServiceResult<bool> {
        let parsed = Self::parse(path)?;
        let deleted = self.remove(vec![parsed.asset_path()]).await?;
        Ok(!deleted.is_empty())
    }

    #[instrument(skip(self, paths), fields(repository = %self.core.name(), requested = paths.len()))]
    pub async fn delete_paths(&self, paths: &[String]) -> ServiceResult<u64> {
        let canonical = paths
            .iter()
            .map(|p| Self::parse(p).map(|parsed| parsed.asset_path()))
            .collect::<ServiceResult<Vec<_>>>()?;
        let deleted = self.remove(canonical).await?;
        Ok(deleted.len() as u64)
    }

    /// Delete a file together with its hash siblings
    #[instrument(skip(self), fields(repository = %self.core.name()))]
    pub async fn delete_with_hashes(&self, path: &str) -> ServiceResult<BTreeSet<String>> {
        let main = Self::parse(path)?.main();
        let mut paths = vec![main.asset_path()];
        for algorithm in maven::HASH_ALGORITHMS {
            paths.push(main.hash(algorithm)?.asset_path());
        }

        let deleted = self.remove(paths).await?;
        Ok(deleted.into_iter().collect())
    }

    /// Remove every published index file
    #[instrument(skip(self), fields(repository = %self.core.name()))]
    pub async fn unpublish_index(&self) -> ServiceResult<u64> {
        let prefix = format!("/{}", maven::INDEX_PREFIX);
        let deleted = self.core.store.delete_assets_with_prefix(&prefix).await?;
        info!(deleted, "Index unpublished");
        Ok(deleted)
    }

    /// Purge components by id and reconcile metadata above them
    #[instrument(skip(self, ids), fields(repository = %self.core.name(), requested = ids.len()))]
    pub async fn purge_components(&self, ids: &[ComponentId]) -> ServiceResult<u64> {
        let correlation = EventPublisher::correlation_id();
        let purged = self.core.purge(ids, &correlation).await?;

        if purged.iter().any(|c| c.is_kind(maven::MAVEN_ARCHETYPE_KIND)) {
            self.core
                .events
                .emit(self.core.events.archetype_catalog_rebuild(), &correlation)
                .await;
        }
        let coordinates = self.metadata.on_components_purged(&purged).await;
        debug!(coordinates, "Metadata reconciled after purge");

        Ok(purged.len() as u64)
    }

    pub async fn find_snapshot_candidates(
        &self,
        minimum_retained: u32,
    ) -> ServiceResult<Vec<Component>> {
        self.retention.find_snapshot_candidates(minimum_retained).await
    }

    pub async fn find_snapshots_after_release(
        &self,
        grace: Duration,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<Component>> {
        self.retention.find_snapshots_after_release(grace, now).await
    }

    /// Digest of a stored file as written in its hash sibling
    pub async fn checksum(&self, path: &str, algorithm: HashAlgorithm) -> ServiceResult<Option<String>> {
        let parsed = Self::parse(path)?;
        Ok(self
            .core
            .store
            .find_asset(&parsed.main().asset_path())
            .await?
            .and_then(|asset| asset.blob.checksum(algorithm).map(str::to_string)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoryConfig;
    use crate::events::tests::failing_event_store;
    use crate::facet::ContentFacet;
    use pkgstore_blob::{BlobStore, MemoryBlobStore};
    use pkgstore_core::maven::{LayoutPolicy, VersionPolicy};
    use pkgstore_core::RepositoryType;
    use pkgstore_db::{create_pool, ContentStore, PoolConfig, SqliteContentStore, SqliteEventStore};
    use std::sync::Arc;

    async fn maven_facet(config: RepositoryConfig) -> (MavenFacet, Arc<dyn ContentStore>) {
        let pool = create_pool(&PoolConfig::in_memory()).await.unwrap();
        let store: Arc<dyn ContentStore> = Arc::new(
            SqliteContentStore::open(pool.clone(), &config.name, Format::Maven2, RepositoryType::Hosted)
                .await
                .unwrap(),
        );
        let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new("default"));
        let events = Arc::new(SqliteEventStore::new(pool));

        let facet = ContentFacet::from_config(config, store.clone(), blobs, events).unwrap();
        match facet {
            ContentFacet::Maven(maven) => (maven, store),
            ContentFacet::Apt(_) => unreachable!(),
        }
    }

    const POM: &str = "<project><groupId>com.x</groupId><artifactId>lib</artifactId>\
        <version>1.0</version><packaging>bundle</packaging></project>";

    #[tokio::test]
    async fn test_put_pom_sets_kind() {
        let (facet, store) = maven_facet(RepositoryConfig::new("releases", Format::Maven2)).await;

        let descriptor = facet
            .put("com/x/lib/1.0/lib-1.0.pom", Payload::from(POM))
            .await
            .unwrap();
        assert_eq!(descriptor.path, "/com/x/lib/1.0/lib-1.0.pom");
        assert_eq!(descriptor.content_type, "application/xml");
        assert!(descriptor.digests.contains_key(&HashAlgorithm::Sha512));

        let component = store.find_component("com.x", "lib", "1.0").await.unwrap().unwrap();
        assert_eq!(component.kind.as_deref(), Some("bundle"));
        assert_eq!(component.base_version.as_deref(), Some("1.0"));
        assert_eq!(component.attribute("maven2", "packaging"), Some("bundle"));
    }

    #[tokio::test]
    async fn test_unreadable_pom_still_stored() {
        let (facet, store) = maven_facet(RepositoryConfig::new("releases", Format::Maven2)).await;

        facet
            .put("com/x/lib/1.0/lib-1.0.pom", Payload::from("garbage"))
            .await
            .unwrap();
        let component = store.find_component("com.x", "lib", "1.0").await.unwrap().unwrap();
        assert!(component.kind.is_none());
    }

    #[tokio::test]
    async fn test_version_policy() {
        let config = RepositoryConfig::new("releases", Format::Maven2)
            .version_policy(VersionPolicy::Release);
        let (facet, store) = maven_facet(config).await;

        let err = facet
            .put("com/x/lib/1.0-SNAPSHOT/lib-1.0-SNAPSHOT.jar", Payload::from("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PolicyDenied(_)));
        assert_eq!(store.count_assets().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_strict_layout() {
        let (facet, _) = maven_facet(RepositoryConfig::new("releases", Format::Maven2)).await;
        let err = facet.put("readme.txt", Payload::from("x")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidPath(_)));

        let config = RepositoryConfig::new("loose", Format::Maven2)
            .layout_policy(LayoutPolicy::Permissive);
        let (facet, _) = maven_facet(config).await;
        assert!(facet.put("readme.txt", Payload::from("x")).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_metadata_rejected_before_mutation() {
        let (facet, store) = maven_facet(RepositoryConfig::new("releases", Format::Maven2)).await;

        let err = facet
            .put("com/x/lib/maven-metadata.xml", Payload::from("<html/>"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationFailed(_)));
        assert_eq!(store.count_assets().await.unwrap(), 0);
        assert_eq!(facet.core.ingestor.store().metrics().temp_count, 0);
    }

    #[tokio::test]
    async fn test_deny_rejects_metadata_too() {
        let config = RepositoryConfig::new("frozen", Format::Maven2).write_policy(WritePolicy::Deny);
        let (facet, _) = maven_facet(config).await;

        let err = facet
            .put("com/x/lib/maven-metadata.xml", Payload::from("<metadata/>"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PolicyDenied(_)));
        assert_eq!(facet.core.ingestor.store().metrics().temp_count, 0);
    }

    #[tokio::test]
    async fn test_delete_with_hashes() {
        let (facet, store) = maven_facet(
            RepositoryConfig::new("releases", Format::Maven2).write_policy(WritePolicy::Allow),
        )
        .await;
        facet.put("com/x/lib/1.0/lib-1.0.jar", Payload::from("jar")).await.unwrap();
        facet.put("com/x/lib/1.0/lib-1.0.jar.sha1", Payload::from("aa")).await.unwrap();
        facet.put("com/x/lib/1.0/lib-1.0.jar.md5", Payload::from("bb")).await.unwrap();

        let deleted = facet.delete_with_hashes("com/x/lib/1.0/lib-1.0.jar.sha1").await.unwrap();
        assert_eq!(deleted.len(), 3);
        assert!(deleted.contains("/com/x/lib/1.0/lib-1.0.jar"));
        assert_eq!(store.count_assets().await.unwrap(), 0);
        assert_eq!(store.count_components().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unpublish_index() {
        let (facet, store) = maven_facet(RepositoryConfig::new("releases", Format::Maven2)).await;
        facet
            .put(".index/nexus-maven-repository-index.gz", Payload::from("idx"))
            .await
            .unwrap();
        facet
            .put(".index/nexus-maven-repository-index.properties", Payload::from("p"))
            .await
            .unwrap();
        facet.put("com/x/lib/1.0/lib-1.0.jar", Payload::from("jar")).await.unwrap();

        assert_eq!(facet.unpublish_index().await.unwrap(), 2);
        assert_eq!(store.count_assets().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_checksum_lookup() {
        let (facet, _) = maven_facet(RepositoryConfig::new("releases", Format::Maven2)).await;
        facet.put("com/x/lib/1.0/lib-1.0.jar", Payload::from("abc")).await.unwrap();

        let sha1 = facet
            .checksum("com/x/lib/1.0/lib-1.0.jar.sha1", HashAlgorithm::Sha1)
            .await
            .unwrap();
        assert_eq!(sha1.as_deref(), Some("a9993e364706816aba3e25717850c26c9cd0d89d"));
    }

    #[tokio::test]
    async fn test_event_failure_does_not_fail_put() {
        let pool = create_pool(&PoolConfig::in_memory()).await.unwrap();
        let store: Arc<dyn ContentStore> = Arc::new(
            SqliteContentStore::open(pool, "releases", Format::Maven2, RepositoryType::Hosted)
                .await
                .unwrap(),
        );
        let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new("default"));
        let facet = ContentFacet::from_config(
            RepositoryConfig::new("releases", Format::Maven2),
            store.clone(),
            blobs,
            failing_event_store(),
        )
        .unwrap();

        facet
            .put("com/x/lib/1.0/lib-1.0.jar", Payload::from("jar"))
            .await
            .unwrap();
        assert!(facet.delete("com/x/lib/1.0/lib-1.0.jar").await.unwrap());
        assert_eq!(store.count_components().await.unwrap(), 0);
    }
}
