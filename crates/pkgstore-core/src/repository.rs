//! Logical content repositories

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ContentError, Result};
use crate::types::RepositoryId;

/// Package format served by a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Maven 2 layout
    Maven2,
    /// Debian APT
    Apt,
}

impl Format {
    /// Stable identifier, also used as the attribute section name
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Maven2 => "maven2",
            Format::Apt => "apt",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "maven2" | "maven" => Ok(Format::Maven2),
            "apt" => Ok(Format::Apt),
            _ => Err(ContentError::ConfigurationError(format!(
                "Unknown repository format: {}",
                s
            ))),
        }
    }
}

/// Repository type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    /// Content authored directly into this repository
    Hosted,
    /// Content cached from a remote
    Proxy,
    /// Aggregate of other repositories
    Group,
}

impl Default for RepositoryType {
    fn default() -> Self {
        Self::Hosted
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hosted => write!(f, "hosted"),
            Self::Proxy => write!(f, "proxy"),
            Self::Group => write!(f, "group"),
        }
    }
}

impl FromStr for RepositoryType {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hosted" => Ok(Self::Hosted),
            "proxy" => Ok(Self::Proxy),
            "group" => Ok(Self::Group),
            _ => Err(ContentError::ConfigurationError(format!(
                "Invalid repository type: {}",
                s
            ))),
        }
    }
}

/// A provisioned content repository; identity is immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub name: String,
    pub format: Format,
    pub repo_type: RepositoryType,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_round_trip() {
        for format in [Format::Maven2, Format::Apt] {
            assert_eq!(format.to_string().parse::<Format>().unwrap(), format);
        }
        assert_eq!("maven".parse::<Format>().unwrap(), Format::Maven2);
        assert!("npm".parse::<Format>().is_err());
    }

    #[test]
    fn test_repository_type_default() {
        assert_eq!(RepositoryType::default(), RepositoryType::Hosted);
        assert_eq!("proxy".parse::<RepositoryType>().unwrap(), RepositoryType::Proxy);
    }
}
