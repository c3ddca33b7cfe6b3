//! Content event emission
//!
//! Events are appended to the event store after the mutation they describe
//! has committed. A failed append is logged and never fails the operation.

use pkgstore_core::{Component, ContentEvent, EventType};
use pkgstore_db::EventStore;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Subsystem name recorded on emitted events
pub const EVENT_SOURCE: &str = "pkgstore-service";

/// Emits events for one repository
#[derive(Clone)]
pub struct EventPublisher {
    store: Arc<dyn EventStore>,
    repository: String,
}

impl EventPublisher {
    pub fn new(store: Arc<dyn EventStore>, repository: impl Into<String>) -> Self {
        Self {
            store,
            repository: repository.into(),
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Fresh id grouping the events of one operation
    pub fn correlation_id() -> String {
        Uuid::new_v4().to_string()
    }

    fn build(&self, event_type: EventType, correlation_id: &str) -> ContentEvent {
        ContentEvent::builder(event_type)
            .correlation_id(correlation_id)
            .source(EVENT_SOURCE)
            .build()
    }

    pub async fn emit(&self, event_type: EventType, correlation_id: &str) {
        let event = self.build(event_type, correlation_id);
        let name = event.event_name().to_string();

        match self.store.append(event).await {
            Ok(_) => debug!(event = %name, repository = %self.repository, "Event emitted"),
            Err(e) => warn!("Failed to emit {} event: {}", name, e),
        }
    }

    pub async fn emit_all(&self, event_types: Vec<EventType>, correlation_id: &str) {
        if event_types.is_empty() {
            return;
        }
        let events: Vec<ContentEvent> = event_types
            .into_iter()
            .map(|t| self.build(t, correlation_id))
            .collect();
        let count = events.len();

        if let Err(e) = self.store.append_batch(events).await {
            warn!("Failed to emit {} events: {}", count, e);
        }
    }

    pub fn component_created(&self, component: &Component) -> EventType {
        EventType::ComponentCreated {
            repository: self.repository.clone(),
            component_id: component.id,
            namespace: component.namespace.clone(),
            name: component.name.clone(),
            version: component.version.clone(),
            kind: component.kind.clone(),
        }
    }

    pub fn component_deleted(&self, component: &Component) -> EventType {
        EventType::ComponentDeleted {
            repository: self.repository.clone(),
            component_id: component.id,
            namespace: component.namespace.clone(),
            name: component.name.clone(),
            version: component.version.clone(),
            kind: component.kind.clone(),
        }
    }

    pub fn components_purged(&self, count: u64) -> EventType {
        EventType::ComponentsPurged {
            repository: self.repository.clone(),
            count,
        }
    }

    pub fn asset_deleted(&self, path: &str) -> EventType {
        EventType::AssetDeleted {
            repository: self.repository.clone(),
            path: path.to_string(),
        }
    }

    pub fn metadata_flagged(&self, path: &str) -> EventType {
        EventType::MetadataFlaggedForRebuild {
            repository: self.repository.clone(),
            path: path.to_string(),
        }
    }

    pub fn metadata_deleted(&self, path: &str) -> EventType {
        EventType::MetadataDeleted {
            repository: self.repository.clone(),
            path: path.to_string(),
        }
    }

    pub fn archetype_catalog_rebuild(&self) -> EventType {
        EventType::ArchetypeCatalogRebuild {
            repository: self.repository.clone(),
        }
    }
}
