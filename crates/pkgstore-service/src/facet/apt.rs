//! Debian APT facet

use pkgstore_core::apt::{self, AptAssetKind, PackageInfo};
use pkgstore_core::policy::{self, WriteTarget};
use pkgstore_core::{Attributes, ComponentId, Format, WritePolicy};
use pkgstore_db::{NewAsset, NewBlob, NewComponent, SaveRequest};
use serde_json::json;
use tracing::{debug, info, instrument};

use super::FacetCore;
use crate::content::{guess_content_type, Content, ContentDescriptor, Payload};
use crate::error::{ServiceError, ServiceResult};
use crate::events::EventPublisher;
use crate::ingest::StagedBlob;
use crate::parser::DebPackageReader;

/// Serves a Debian package repository
#[derive(Clone)]
pub struct AptFacet {
    pub(crate) core: FacetCore,
}

impl AptFacet {
    pub(crate) fn new(core: FacetCore) -> Self {
        Self { core }
    }

    /// Canonical path, rejecting relative and empty segments
    fn canonical(path: &str) -> ServiceResult<String> {
        let normalized = apt::normalize_asset_path(path);
        let relative = &normalized[1..];
        if relative.is_empty()
            || relative
                .split('/')
                .any(|s| s.is_empty() || s == "." || s == "..")
        {
            return Err(ServiceError::InvalidPath(format!(
                "Not a repository file path: {}",
                path
            )));
        }
        Ok(normalized)
    }

    pub async fn get(&self, path: &str) -> ServiceResult<Option<Content>> {
        self.core.get(&Self::canonical(path)?).await
    }

    pub async fn exists(&self, path: &str) -> ServiceResult<bool> {
        self.core.exists(&Self::canonical(path)?).await
    }

    pub async fn put(&self, path: &str, payload: Payload) -> ServiceResult<ContentDescriptor> {
        self.put_package(path, payload, None).await
    }

    /// Control fields for a staged package: supplied, then control file, then file name
    async fn package_info(
        path: &str,
        staged: &StagedBlob,
        supplied: Option<PackageInfo>,
    ) -> ServiceResult<PackageInfo> {
        if let Some(info) = supplied {
            return Ok(info);
        }
        if let Some(info) = DebPackageReader::read(&staged.bytes().await?)? {
            return Ok(info);
        }
        Ok(PackageInfo::from_file_name(path)?)
    }

    /// Store a file, optionally with known package control fields
    #[instrument(skip(self, payload, info), fields(repository = %self.core.name(), path = %path))]
    pub async fn put_package(
        &self,
        path: &str,
        payload: Payload,
        info: Option<PackageInfo>,
    ) -> ServiceResult<ContentDescriptor> {
        let asset_path = Self::canonical(path)?;
        let kind = AptAssetKind::for_path(&asset_path);
        let effective = policy::evaluate(
            Format::Apt,
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
        if let Err(e) = effective.authorize(&asset_path, exists) {
            debug!("Put rejected: {}", e);
            return Err(e.into());
        }

        let mut staged = self
            .core
            .ingestor
            .ingest(payload, &apt::HASH_ALGORITHMS)
            .await?;

        let (component, attributes) = match kind {
            AptAssetKind::Deb => {
                let info = Self::package_info(&asset_path, &staged, info).await?;
                let component = NewComponent::new(&info.architecture, &info.package, &info.version)
                    .kind(AptAssetKind::Deb.as_str().to_ascii_lowercase())
                    .attributes(info.attributes());
                (Some(component), info.asset_attributes())
            }
            AptAssetKind::Metadata => {
                let mut attributes = Attributes::new();
                attributes.insert(
                    apt::FORMAT_NAME.into(),
                    json!({ "asset_kind": kind.as_str() }),
                );
                (None, attributes)
            }
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
                    path: asset_path,
                    kind: kind.as_str().to_string(),
                    component_id: None,
                    attributes,
                    blob,
                },
                overwrite: effective.permits_overwrite(),
            })
            .await?;

        if let Some(upsert) = outcome.component.as_ref().filter(|u| u.created) {
            info!(component = %upsert.component, "Package component created");
            self.core
                .events
                .emit(
                    self.core.events.component_created(&upsert.component),
                    &EventPublisher::correlation_id(),
                )
                .await;
        }

        Ok(ContentDescriptor::from(&outcome.asset))
    }

    #[instrument(skip(self), fields(repository = %self.core.name()))]
    pub async fn delete(&self, path: &str) -> ServiceResult<bool> {
        let path = Self::canonical(path)?;
        let removal = self
            .core
            .remove(&[path], &EventPublisher::correlation_id())
            .await?;
        Ok(!removal.assets.is_empty())
    }

    #[instrument(skip(self, paths), fields(repository = %self.core.name(), requested = paths.len()))]
    pub async fn delete_paths(&self, paths: &[String]) -> ServiceResult<u64> {
        let canonical = paths
            .iter()
            .map(|p| Self::canonical(p))
            .collect::<ServiceResult<Vec<_>>>()?;
        let removal = self
            .core
            .remove(&canonical, &EventPublisher::correlation_id())
            .await?;
        Ok(removal.assets.len() as u64)
    }

    pub async fn purge_components(&self, ids: &[ComponentId]) -> ServiceResult<u64> {
        let purged = self
            .core
            .purge(ids, &EventPublisher::correlation_id())
            .await?;
        Ok(purged.len() as u64)
    }
}
