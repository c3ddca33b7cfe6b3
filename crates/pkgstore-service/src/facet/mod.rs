//! Format facets
//!
//! Each repository is served by exactly one facet, chosen from its configured
//! format. Facets never touch rows directly; every mutation goes through the
//! [`ContentStore`].

pub mod apt;
pub mod maven;

use chrono::{DateTime, Duration, Utc};
use pkgstore_blob::BlobStore;
use pkgstore_core::{Component, ComponentId, Format};
use pkgstore_db::{ContentStore, DeletedAsset, EventStore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::RepositoryConfig;
use crate::content::{Content, ContentDescriptor, Payload};
use crate::error::{ServiceError, ServiceResult};
use crate::events::EventPublisher;
use crate::ingest::BlobIngestor;

pub use apt::AptFacet;
pub use maven::MavenFacet;

/// Component and asset totals of one repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryUsage {
    pub components: i64,
    pub assets: i64,
}

/// Components and assets removed by one delete call
#[derive(Debug, Clone, Default)]
pub(crate) struct Removal {
    pub assets: Vec<DeletedAsset>,
    pub components: Vec<Component>,
}

/// State and behaviour shared by every facet
#[derive(Clone)]
pub(crate) struct FacetCore {
    pub config: RepositoryConfig,
    pub store: Arc<dyn ContentStore>,
    pub ingestor: BlobIngestor,
    pub events: EventPublisher,
}

impl FacetCore {
    fn new(
        config: RepositoryConfig,
        store: Arc<dyn ContentStore>,
        blobs: Arc<dyn BlobStore>,
        events: Arc<dyn EventStore>,
    ) -> ServiceResult<Self> {
        config.validate()?;

        let repository = store.repository();
        if repository.name != config.name || repository.format != config.format {
            return Err(ServiceError::Internal(format!(
                "store is scoped to {} ({}), configuration names {} ({})",
                repository.name, repository.format, config.name, config.format
            )));
        }

        let events = EventPublisher::new(events, config.name.clone());
        Ok(Self {
            config,
            store,
            ingestor: BlobIngestor::new(blobs),
            events,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Read an asset and verify its blob against the content address
    pub async fn get(&self, path: &str) -> ServiceResult<Option<Content>> {
        let asset = match self.store.find_asset(path).await? {
            Some(asset) => asset,
            None => return Ok(None),
        };

        let blob_ref = &asset.blob.blob_ref;
        let bytes = self.ingestor.store().read(blob_ref).await.map_err(|e| {
            if e.is_not_found() {
                ServiceError::IntegrityViolation(format!(
                    "{} references missing blob {}",
                    path, blob_ref
                ))
            } else {
                ServiceError::from(e)
            }
        })?;

        let actual = format!("{:x}", Sha256::digest(&bytes));
        if !actual.eq_ignore_ascii_case(&blob_ref.blob_id) {
            return Err(ServiceError::IntegrityViolation(format!(
                "{} blob {} hashes to {}",
                path, blob_ref, actual
            )));
        }

        Ok(Some(Content {
            descriptor: ContentDescriptor::from(&asset),
            bytes,
        }))
    }

    pub async fn exists(&self, path: &str) -> ServiceResult<bool> {
        Ok(self.store.asset_exists(path).await?)
    }

    /// Delete assets, then every component they leave without assets
    pub async fn remove(&self, paths: &[String], correlation: &str) -> ServiceResult<Removal> {
        let assets = self.store.delete_assets_by_paths(paths).await?;

        let owners: BTreeSet<ComponentId> =
            assets.iter().filter_map(|a| a.component_id).collect();
        let mut components = Vec::new();
        for id in owners {
            if let Some(component) = self.store.delete_component_if_orphaned(id).await? {
                components.push(component);
            }
        }

        let mut events: Vec<_> = components
            .iter()
            .map(|c| self.events.component_deleted(c))
            .collect();
        events.extend(assets.iter().map(|a| self.events.asset_deleted(&a.path)));
        self.events.emit_all(events, correlation).await;

        debug!(
            assets = assets.len(),
            components = components.len(),
            "Removed content"
        );
        Ok(Removal { assets, components })
    }

    /// Purge components with their assets
    pub async fn purge(&self, ids: &[ComponentId], correlation: &str) -> ServiceResult<Vec<Component>> {
        let purged = self.store.purge_components(ids).await?;
        if !purged.is_empty() {
            self.events
                .emit(self.events.components_purged(purged.len() as u64), correlation)
                .await;
        }
        info!(repository = %self.name(), purged = purged.len(), "Components purged");
        Ok(purged)
    }

    pub async fn usage(&self) -> ServiceResult<RepositoryUsage> {
        Ok(RepositoryUsage {
            components: self.store.count_components().await?,
            assets: self.store.count_assets().await?,
        })
    }
}

/// The closed set of format facets
#[derive(Clone)]
pub enum ContentFacet {
    Maven(MavenFacet),
    Apt(AptFacet),
}

impl ContentFacet {
    /// Build the facet matching the configured format
    pub fn from_config(
        config: RepositoryConfig,
        store: Arc<dyn ContentStore>,
        blobs: Arc<dyn BlobStore>,
        events: Arc<dyn EventStore>,
    ) -> ServiceResult<Self> {
        let format = config.format;
        let core = FacetCore::new(config, store, blobs, events)?;
        Ok(match format {
            Format::Maven2 => ContentFacet::Maven(MavenFacet::new(core)),
            Format::Apt => ContentFacet::Apt(AptFacet::new(core)),
        })
    }

    fn core(&self) -> &FacetCore {
        match self {
            ContentFacet::Maven(facet) => &facet.core,
            ContentFacet::Apt(facet) => &facet.core,
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.core().config
    }

    pub fn name(&self) -> &str {
        self.core().name()
    }

    pub fn format(&self) -> Format {
        self.core().config.format
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        self.core().ingestor.store()
    }

    pub fn as_maven(&self) -> Option<&MavenFacet> {
        match self {
            ContentFacet::Maven(facet) => Some(facet),
            ContentFacet::Apt(_) => None,
        }
    }

    pub fn as_apt(&self) -> Option<&AptFacet> {
        match self {
            ContentFacet::Apt(facet) => Some(facet),
            ContentFacet::Maven(_) => None,
        }
    }

    pub async fn get(&self, path: &str) -> ServiceResult<Option<Content>> {
        match self {
            ContentFacet::Maven(facet) => facet.get(path).await,
            ContentFacet::Apt(facet) => facet.get(path).await,
        }
    }

    pub async fn put(&self, path: &str, payload: Payload) -> ServiceResult<ContentDescriptor> {
        match self {
            ContentFacet::Maven(facet) => facet.put(path, payload).await,
            ContentFacet::Apt(facet) => facet.put(path, payload).await,
        }
    }

    pub async fn delete(&self, path: &str) -> ServiceResult<bool> {
        match self {
            ContentFacet::Maven(facet) => facet.delete(path).await,
            ContentFacet::Apt(facet) => facet.delete(path).await,
        }
    }

    pub async fn delete_paths(&self, paths: &[String]) -> ServiceResult<u64> {
        match self {
            ContentFacet::Maven(facet) => facet.delete_paths(paths).await,
            ContentFacet::Apt(facet) => facet.delete_paths(paths).await,
        }
    }

    pub async fn exists(&self, path: &str) -> ServiceResult<bool> {
        match self {
            ContentFacet::Maven(facet) => facet.exists(path).await,
            ContentFacet::Apt(facet) => facet.exists(path).await,
        }
    }

    pub async fn purge_components(&self, ids: &[ComponentId]) -> ServiceResult<u64> {
        match self {
            ContentFacet::Maven(facet) => facet.purge_components(ids).await,
            ContentFacet::Apt(facet) => facet.purge_components(ids).await,
        }
    }

    #[instrument(skip(self), fields(repository = %self.name()))]
    pub async fn find_snapshot_candidates(
        &self,
        minimum_retained: u32,
    ) -> ServiceResult<Vec<Component>> {
        match self {
            ContentFacet::Maven(facet) => facet.find_snapshot_candidates(minimum_retained).await,
            ContentFacet::Apt(_) => Err(unsupported("snapshot retention", Format::Apt)),
        }
    }

    #[instrument(skip(self, now), fields(repository = %self.name()))]
    pub async fn find_snapshots_after_release(
        &self,
        grace: Duration,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<Component>> {
        match self {
            ContentFacet::Maven(facet) => facet.find_snapshots_after_release(grace, now).await,
            ContentFacet::Apt(_) => Err(unsupported("snapshot retention", Format::Apt)),
        }
    }

    pub async fn usage(&self) -> ServiceResult<RepositoryUsage> {
        self.core().usage().await
    }
}

pub(crate) fn unsupported(operation: &str, format: Format) -> ServiceError {
    ServiceError::Unsupported(format!("{} is not available for {} repositories", operation, format))
}
