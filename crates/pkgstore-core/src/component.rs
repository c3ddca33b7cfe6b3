//! Components: named, versioned units owning zero or more assets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{section_str, Attributes, ComponentId, RepositoryId};

/// A named, versioned unit within one repository
///
/// (repository, namespace, name, version) is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub repository_id: RepositoryId,
    /// Group id for Maven, architecture for APT
    pub namespace: String,
    pub name: String,
    pub version: String,
    /// Packaging kind, e.g. `jar` or `maven-archetype`
    pub kind: Option<String>,
    /// Version line this component belongs to, if the format has one
    pub base_version: Option<String>,
    pub attributes: Attributes,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Component {
    /// Read a string attribute from a format section
    pub fn attribute(&self, section: &str, key: &str) -> Option<&str> {
        section_str(&self.attributes, section, key)
    }

    /// Whether this component has the given kind
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_component_attribute_and_display() {
        let now = Utc::now();
        let component = Component {
            id: ComponentId::new(1),
            repository_id: RepositoryId::new(1),
            namespace: "com.x".to_string(),
            name: "lib".to_string(),
            version: "1.0".to_string(),
            kind: Some("jar".to_string()),
            base_version: Some("1.0".to_string()),
            attributes: json!({"maven2": {"baseVersion": "1.0"}})
                .as_object()
                .cloned()
                .unwrap(),
            created_at: now,
            last_updated: now,
        };

        assert_eq!(component.to_string(), "com.x:lib:1.0");
        assert_eq!(component.attribute("maven2", "baseVersion"), Some("1.0"));
        assert_eq!(component.attribute("apt", "package"), None);
        assert!(component.is_kind("jar"));
    }
}
