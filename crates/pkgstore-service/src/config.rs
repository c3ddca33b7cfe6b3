//! Per-repository configuration
//!
//! Each format facet is constructed with its own [`RepositoryConfig`]; there
//! is no process-wide configuration state.

use pkgstore_core::maven::{LayoutPolicy, VersionPolicy};
use pkgstore_core::{Format, RepositoryType, WritePolicy};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

fn default_true() -> bool {
    true
}

/// Maven-specific repository settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MavenConfig {
    #[serde(default)]
    pub version_policy: VersionPolicy,

    #[serde(default)]
    pub layout_policy: LayoutPolicy,

    /// Reject malformed maven-metadata.xml uploads
    #[serde(default = "default_true")]
    pub metadata_validation: bool,
}

impl Default for MavenConfig {
    fn default() -> Self {
        Self {
            version_policy: VersionPolicy::default(),
            layout_policy: LayoutPolicy::default(),
            metadata_validation: true,
        }
    }
}

/// Configuration of one content repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,

    pub format: Format,

    #[serde(default)]
    pub repo_type: RepositoryType,

    #[serde(default)]
    pub write_policy: WritePolicy,

    #[serde(default)]
    pub maven: MavenConfig,
}

impl RepositoryConfig {
    /// Create a configuration with default policies
    pub fn new(name: impl Into<String>, format: Format) -> Self {
        Self {
            name: name.into(),
            format,
            repo_type: RepositoryType::default(),
            write_policy: WritePolicy::default(),
            maven: MavenConfig::default(),
        }
    }

    pub fn repo_type(mut self, repo_type: RepositoryType) -> Self {
        self.repo_type = repo_type;
        self
    }

    pub fn write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn version_policy(mut self, policy: VersionPolicy) -> Self {
        self.maven.version_policy = policy;
        self
    }

    pub fn layout_policy(mut self, policy: LayoutPolicy) -> Self {
        self.maven.layout_policy = policy;
        self
    }

    pub fn metadata_validation(mut self, enabled: bool) -> Self {
        self.maven.metadata_validation = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ServiceResult<()> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::Internal(
                "Repository name cannot be empty".to_string(),
            ));
        }

        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(ServiceError::Internal(format!(
                "Repository name may only contain letters, digits, '-', '_' and '.': {}",
                self.name
            )));
        }

        Ok(())
    }
}
