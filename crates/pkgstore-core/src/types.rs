//! Core type definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a database row id
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying row id
            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<i64>()
                    .map(Self)
                    .map_err(|e| format!("Invalid {}: {}", stringify!($name), e))
            }
        }
    };
}

row_id!(
    /// Identifier of a content repository
    RepositoryId
);
row_id!(
    /// Identifier of a component, unique across repositories
    ComponentId
);
row_id!(
    /// Identifier of an asset, unique across repositories
    AssetId
);

/// Format-specific attribute map attached to components and assets
pub type Attributes = Map<String, Value>;

/// Deep-merge `patch` into `target`
///
/// Nested objects are merged key by key; any other value in `patch` replaces
/// the value in `target`.
pub fn merge_attributes(target: &mut Attributes, patch: &Attributes) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_attributes(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Read a string attribute nested one level below `section`
pub fn section_str<'a>(attributes: &'a Attributes, section: &str, key: &str) -> Option<&'a str> {
    attributes
        .get(section)
        .and_then(Value::as_object)
        .and_then(|s| s.get(key))
        .and_then(Value::as_str)
}
