//! Content events
//!
//! Events record graph mutations and rebuild requests. They are appended to
//! the event store after the mutation commits; downstream consumers such as
//! metadata and archetype catalog rebuilders read them from there.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::types::ComponentId;

/// Kinds of content events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventType {
    /// A component row was inserted
    ComponentCreated {
        repository: String,
        component_id: ComponentId,
        namespace: String,
        name: String,
        version: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
    },

    /// A component row was removed
    ComponentDeleted {
        repository: String,
        component_id: ComponentId,
        namespace: String,
        name: String,
        version: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
    },

    /// A batch of components was purged
    ComponentsPurged { repository: String, count: u64 },

    /// An asset was removed
    AssetDeleted { repository: String, path: String },

    /// A metadata descriptor was marked for regeneration
    MetadataFlaggedForRebuild { repository: String, path: String },

    /// A metadata descriptor was removed because nothing remains beneath it
    MetadataDeleted { repository: String, path: String },

    /// The archetype catalog needs regenerating
    ArchetypeCatalogRebuild { repository: String },
}

impl EventType {
    pub fn event_name(&self) -> &str {
        match self {
            EventType::ComponentCreated { .. } => "component_created",
            EventType::ComponentDeleted { .. } => "component_deleted",
            EventType::ComponentsPurged { .. } => "components_purged",
            EventType::AssetDeleted { .. } => "asset_deleted",
            EventType::MetadataFlaggedForRebuild { .. } => "metadata_flagged_for_rebuild",
            EventType::MetadataDeleted { .. } => "metadata_deleted",
            EventType::ArchetypeCatalogRebuild { .. } => "archetype_catalog_rebuild",
        }
    }

    /// Name of the repository the event belongs to
    pub fn repository(&self) -> &str {
        match self {
            EventType::ComponentCreated { repository, .. }
            | EventType::ComponentDeleted { repository, .. }
            | EventType::ComponentsPurged { repository, .. }
            | EventType::AssetDeleted { repository, .. }
            | EventType::MetadataFlaggedForRebuild { repository, .. }
            | EventType::MetadataDeleted { repository, .. }
            | EventType::ArchetypeCatalogRebuild { repository } => repository,
        }
    }

    pub fn component_id(&self) -> Option<ComponentId> {
        match self {
            EventType::ComponentCreated { component_id, .. }
            | EventType::ComponentDeleted { component_id, .. } => Some(*component_id),
            _ => None,
        }
    }

    /// Whether a consumer is expected to regenerate something
    pub fn is_rebuild_request(&self) -> bool {
        matches!(
            self,
            EventType::MetadataFlaggedForRebuild { .. } | EventType::ArchetypeCatalogRebuild { .. }
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event_name())
    }
}

/// A content event with metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEvent {
    /// Event type and details
    #[serde(flatten)]
    pub event_type: EventType,

    pub timestamp: DateTime<Utc>,

    /// Groups the events emitted by one operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    /// Subsystem that emitted the event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, String>,
}

impl ContentEvent {
    /// Create a new event with the current timestamp
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            correlation_id: None,
            actor: None,
            source: None,
            context: HashMap::new(),
        }
    }

    pub fn builder(event_type: EventType) -> ContentEventBuilder {
        ContentEventBuilder::new(event_type)
    }

    pub fn event_name(&self) -> &str {
        self.event_type.event_name()
    }

    pub fn repository(&self) -> &str {
        self.event_type.repository()
    }

    pub fn add_context(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.context.insert(key.into(), value.into());
    }

    pub fn get_context(&self, key: &str) -> Option<&String> {
        self.context.get(key)
    }
}

impl fmt::Display for ContentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ContentEvent({} in {} at {}",
            self.event_name(),
            self.repository(),
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        )?;

        if let Some(ref source) = self.source {
            write!(f, ", source={}", source)?;
        }

        write!(f, ")")
    }
}

/// Builder for constructing ContentEvent instances
pub struct ContentEventBuilder {
    event: ContentEvent,
}

impl ContentEventBuilder {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event: ContentEvent::new(event_type),
        }
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.event.timestamp = timestamp;
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.event.correlation_id = Some(id.into());
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.event.actor = Some(actor.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.event.source = Some(source.into());
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.event.context.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> ContentEvent {
        self.event
    }
}
