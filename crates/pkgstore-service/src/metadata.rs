//! Metadata consistency engine
//!
//! When components disappear, the `maven-metadata.xml` descriptors above them
//! are either deleted (nothing remains to describe) or flagged for rebuild.
//! Failures here are logged and never block the deletion that triggered them.

use pkgstore_core::maven::{self, base_version_of, Gav, MavenPath, MetadataLevel};
use pkgstore_core::Component;
use pkgstore_db::{ContentStore, CoordinateFilter};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::ServiceResult;
use crate::events::EventPublisher;

/// Which coordinate levels still hold components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presence {
    /// Same group, artifact and base version
    pub version: bool,
    /// Same group and artifact
    pub artifact: bool,
    /// Same group
    pub group: bool,
}

/// Descriptors to delete and the one to flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataPlan {
    pub delete: Vec<MetadataLevel>,
    pub flag: Option<MetadataLevel>,
}

/// Decide what happens to each descriptor level; the first populated level wins
pub fn plan(presence: Presence) -> MetadataPlan {
    if presence.version {
        MetadataPlan {
            delete: vec![],
            flag: Some(MetadataLevel::Version),
        }
    } else if presence.artifact {
        MetadataPlan {
            delete: vec![MetadataLevel::Version],
            flag: Some(MetadataLevel::Artifact),
        }
    } else if presence.group {
        MetadataPlan {
            delete: vec![MetadataLevel::Version, MetadataLevel::Artifact],
            flag: Some(MetadataLevel::Group),
        }
    } else {
        MetadataPlan {
            delete: vec![
                MetadataLevel::Version,
                MetadataLevel::Artifact,
                MetadataLevel::Group,
            ],
            flag: None,
        }
    }
}

/// What one engine run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataOutcome {
    pub deleted: Vec<String>,
    pub flagged: Option<String>,
}

/// Coordinate lineage of a component, from its identity fields
///
/// A mismatch with the stored format attributes is reported but the identity
/// fields are used.
pub fn gav_of(component: &Component) -> Gav {
    let base_version = component
        .base_version
        .clone()
        .unwrap_or_else(|| base_version_of(&component.version));
    let gav = Gav::new(&component.namespace, &component.name, base_version);

    let stored = (
        component.attribute(maven::FORMAT_NAME, maven::ATTR_GROUP_ID),
        component.attribute(maven::FORMAT_NAME, maven::ATTR_ARTIFACT_ID),
        component.attribute(maven::FORMAT_NAME, maven::ATTR_BASE_VERSION),
    );
    if let (Some(group_id), Some(artifact_id), Some(base_version)) = stored {
        if group_id != gav.group_id || artifact_id != gav.artifact_id || base_version != gav.base_version
        {
            warn!(
                component_id = %component.id,
                identity = %gav,
                attributes = %format!("{}:{}:{}", group_id, artifact_id, base_version),
                "Component attributes disagree with identity, using identity"
            );
        }
    }

    gav
}

/// Keeps metadata descriptors consistent with the components beneath them
#[derive(Clone)]
pub struct MetadataConsistencyEngine {
    store: Arc<dyn ContentStore>,
    events: EventPublisher,
}

impl MetadataConsistencyEngine {
    pub fn new(store: Arc<dyn ContentStore>, events: EventPublisher) -> Self {
        Self { store, events }
    }

    async fn presence(&self, gav: &Gav) -> ServiceResult<Presence> {
        let group = CoordinateFilter::namespace(&gav.group_id);
        let artifact = group.clone().name(&gav.artifact_id);
        let version = artifact.clone().base_version(&gav.base_version);

        Ok(Presence {
            version: self.store.component_exists(&version).await?,
            artifact: self.store.component_exists(&artifact).await?,
            group: self.store.component_exists(&group).await?,
        })
    }

    /// Descriptor path plus its hash siblings
    fn descriptor_paths(path: &str) -> Vec<String> {
        let mut paths = vec![path.to_string()];
        if let Ok(parsed) = MavenPath::parse(path) {
            for algorithm in maven::HASH_ALGORITHMS {
                if let Ok(sibling) = parsed.hash(algorithm) {
                    paths.push(sibling.asset_path());
                }
            }
        }
        paths
    }

    /// Delete or flag the descriptors above one coordinate
    ///
    /// Re-running against unchanged state changes nothing further.
    #[instrument(skip(self), fields(repository = %self.events.repository(), gav = %gav))]
    pub async fn apply(&self, gav: &Gav) -> ServiceResult<MetadataOutcome> {
        let presence = self.presence(gav).await?;
        let plan = plan(presence);
        debug!(?presence, ?plan, "Metadata plan");

        let correlation = EventPublisher::correlation_id();
        let mut outcome = MetadataOutcome::default();
        let mut events = Vec::new();

        for level in &plan.delete {
            let descriptor = level.path(gav);
            let paths = Self::descriptor_paths(&descriptor);
            let deleted = self.store.delete_assets_by_paths(&paths).await?;

            if deleted.iter().any(|d| d.path == descriptor) {
                events.push(self.events.metadata_deleted(&descriptor));
                outcome.deleted.push(descriptor);
            }
        }

        if let Some(level) = plan.flag {
            let descriptor = level.path(gav);
            let present = self
                .store
                .set_asset_attribute(&descriptor, maven::METADATA_REBUILD_KEY, Value::Bool(true))
                .await?;
            debug!(path = %descriptor, present, "Descriptor flagged for rebuild");
            events.push(self.events.metadata_flagged(&descriptor));
            outcome.flagged = Some(descriptor);
        }

        if !outcome.deleted.is_empty() {
            info!(deleted = outcome.deleted.len(), "Removed metadata descriptors");
        }
        self.events.emit_all(events, &correlation).await;

        Ok(outcome)
    }

    /// Reconcile after a single component deletion; failures are logged
    pub async fn on_component_deleted(&self, component: &Component) {
        let gav = gav_of(component);
        if let Err(e) = self.apply(&gav).await {
            warn!(gav = %gav, "Metadata reconciliation failed, left for a later pass: {}", e);
        }
    }

    /// Reconcile once per distinct coordinate of a purged batch
    pub async fn on_components_purged(&self, components: &[Component]) -> usize {
        let gavs: BTreeSet<Gav> = components.iter().map(gav_of).collect();
        for gav in &gavs {
            if let Err(e) = self.apply(gav).await {
                warn!(gav = %gav, "Metadata reconciliation failed, left for a later pass: {}", e);
            }
        }
        gavs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pkgstore_core::{ComponentId, RepositoryId};
    use serde_json::json;

    fn presence(version: bool, artifact: bool, group: bool) -> Presence {
        Presence {
            version,
            artifact,
            group,
        }
    }

    #[test]
    fn test_plan_version_remains() {
        let plan = plan(presence(true, true, true));
        assert!(plan.delete.is_empty());
        assert_eq!(plan.flag, Some(MetadataLevel::Version));
    }

    #[test]
    fn test_plan_artifact_remains() {
        let plan = plan(presence(false, true, true));
        assert_eq!(plan.delete, vec![MetadataLevel::Version]);
        assert_eq!(plan.flag, Some(MetadataLevel::Artifact));
    }

    #[test]
    fn test_plan_group_remains() {
        let plan = plan(presence(false, false, true));
        assert_eq!(plan.delete, vec![MetadataLevel::Version, MetadataLevel::Artifact]);
        assert_eq!(plan.flag, Some(MetadataLevel::Group));
    }

    #[test]
    fn test_plan_nothing_remains() {
        let plan = plan(presence(false, false, false));
        assert_eq!(plan.delete.len(), 3);
        assert_eq!(plan.flag, None);
    }

    fn component(namespace: &str, name: &str, version: &str, attrs: Value) -> Component {
        let now = Utc::now();
        Component {
            id: ComponentId::new(1),
            repository_id: RepositoryId::new(1),
            namespace: namespace.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            kind: None,
            base_version: None,
            attributes: attrs.as_object().cloned().unwrap_or_default(),
            created_at: now,
            last_updated: now,
        }
    }

    #[test]
    fn test_gav_from_identity() {
        let c = component("com.x", "lib", "1.0-20240101.120000-3", json!({}));
        assert_eq!(gav_of(&c), Gav::new("com.x", "lib", "1.0-SNAPSHOT"));
    }

    #[test]
    fn test_gav_prefers_identity_over_attributes() {
        let c = component(
            "com.x",
            "lib",
            "2.0",
            json!({"maven2": {"groupId": "org.stale", "artifactId": "lib", "baseVersion": "2.0"}}),
        );
        assert_eq!(gav_of(&c), Gav::new("com.x", "lib", "2.0"));
    }

    #[test]
    fn test_descriptor_paths_include_hashes() {
        let paths = MetadataConsistencyEngine::descriptor_paths("/com/x/lib/maven-metadata.xml");
        assert_eq!(paths[0], "/com/x/lib/maven-metadata.xml");
        assert!(paths.contains(&"/com/x/lib/maven-metadata.xml.sha1".to_string()));
        assert!(paths.contains(&"/com/x/lib/maven-metadata.xml.md5".to_string()));
        assert_eq!(paths.len(), 1 + maven::HASH_ALGORITHMS.len());
    }
}
