//! Content graph store abstraction
//!
//! One [`ContentStore`] is scoped to a single content repository. It owns all
//! mutation of component and asset rows; format facets describe what they
//! want written with the request types below and never touch rows directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pkgstore_core::{Asset, Attributes, BlobRef, Component, ComponentId, Digests, Repository};
use serde_json::Value;

use crate::error::DbResult;

/// Coordinates and attributes for get-or-create
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewComponent {
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub kind: Option<String>,
    /// Version line the component belongs to, used for snapshot retention
    pub base_version: Option<String>,
    /// Merged into the stored attributes when the component already exists
    pub attributes: Attributes,
}

impl NewComponent {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn base_version(mut self, base_version: impl Into<String>) -> Self {
        self.base_version = Some(base_version.into());
        self
    }

    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Result of get-or-create
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentUpsert {
    pub component: Component,
    /// True only for the caller whose insert won
    pub created: bool,
}

/// A committed blob about to be referenced by an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlob {
    pub blob_ref: BlobRef,
    pub size: u64,
    pub content_type: String,
    pub checksums: Digests,
}

/// Asset row to create or update
#[derive(Debug, Clone, PartialEq)]
pub struct NewAsset {
    /// Canonical path with a leading '/'
    pub path: String,
    pub kind: String,
    pub component_id: Option<ComponentId>,
    /// Replaces the stored attributes on overwrite
    pub attributes: Attributes,
    pub blob: NewBlob,
}

/// Everything one put writes, applied in a single transaction
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    /// Component the asset attaches to; its id overrides `asset.component_id`
    pub component: Option<NewComponent>,
    pub asset: NewAsset,
    /// Whether an existing asset at the path may be replaced
    pub overwrite: bool,
}

/// Rows written by [`ContentStore::save`]
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub asset: Asset,
    pub component: Option<ComponentUpsert>,
}

/// Identity of a removed asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedAsset {
    pub path: String,
    pub component_id: Option<ComponentId>,
}

/// Existence probe over component coordinates
///
/// Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinateFilter {
    pub namespace: String,
    pub name: Option<String>,
    pub base_version: Option<String>,
}

impl CoordinateFilter {
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn base_version(mut self, base_version: impl Into<String>) -> Self {
        self.base_version = Some(base_version.into());
        self
    }
}

/// A snapshot version line and how many components it holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLine {
    pub namespace: String,
    pub name: String,
    pub base_version: String,
    pub count: i64,
}

/// A snapshot version line whose release exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedLine {
    pub namespace: String,
    pub name: String,
    pub base_version: String,
    /// When the release component was created
    pub released_at: DateTime<Utc>,
}

/// Transactional component/asset store for one repository
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// The repository this store is scoped to
    fn repository(&self) -> &Repository;

    /// Find the asset at a canonical path
    async fn find_asset(&self, path: &str) -> DbResult<Option<Asset>>;

    /// Check whether an asset exists at a canonical path
    async fn asset_exists(&self, path: &str) -> DbResult<bool>;

    /// Insert-or-fetch a component by coordinates
    ///
    /// Concurrent calls with identical coordinates converge on one row and
    /// exactly one of them observes `created == true`. When the row already
    /// exists its kind is refined and the given attributes merged in.
    async fn get_or_create_component(&self, component: NewComponent) -> DbResult<ComponentUpsert>;

    /// Find a component by its coordinates
    async fn find_component(
        &self,
        namespace: &str,
        name: &str,
        version: &str,
    ) -> DbResult<Option<Component>>;

    async fn read_component(&self, id: ComponentId) -> DbResult<Option<Component>>;

    /// Create or update the asset at `asset.path`, linking its blob row
    ///
    /// Without `overwrite`, an existing asset fails with
    /// [`DbError::AlreadyExists`](crate::DbError::AlreadyExists) and is left untouched.
    async fn upsert_asset(&self, asset: NewAsset, overwrite: bool) -> DbResult<Asset>;

    /// Get-or-create the component and attach the asset in one transaction
    async fn save(&self, request: SaveRequest) -> DbResult<SaveOutcome>;

    /// Delete the asset at a path, returning what was removed
    async fn delete_asset(&self, path: &str) -> DbResult<Option<DeletedAsset>>;

    /// Delete every listed asset that exists
    async fn delete_assets_by_paths(&self, paths: &[String]) -> DbResult<Vec<DeletedAsset>>;

    /// Delete every asset whose path starts with `prefix`
    async fn delete_assets_with_prefix(&self, prefix: &str) -> DbResult<u64>;

    /// Delete components by id together with their assets
    async fn purge_components(&self, ids: &[ComponentId]) -> DbResult<Vec<Component>>;

    /// Delete a component only if no asset references it any more
    async fn delete_component_if_orphaned(&self, id: ComponentId) -> DbResult<Option<Component>>;

    /// Whether any component matches the filter
    async fn component_exists(&self, filter: &CoordinateFilter) -> DbResult<bool>;

    /// Set one top-level attribute on an asset; false if the asset is absent
    async fn set_asset_attribute(&self, path: &str, key: &str, value: Value) -> DbResult<bool>;

    /// Snapshot lines holding more than `minimum_retained` components
    async fn find_snapshot_lines(&self, minimum_retained: u32) -> DbResult<Vec<SnapshotLine>>;

    /// Components of one version line, newest first
    async fn find_line_components(
        &self,
        namespace: &str,
        name: &str,
        base_version: &str,
    ) -> DbResult<Vec<Component>>;

    /// Snapshot lines whose corresponding release component exists
    async fn find_released_snapshot_lines(&self) -> DbResult<Vec<ReleasedLine>>;

    async fn count_components(&self) -> DbResult<i64>;

    async fn count_assets(&self) -> DbResult<i64>;

    /// Health check for the store
    async fn health_check(&self) -> DbResult<()>;
}
