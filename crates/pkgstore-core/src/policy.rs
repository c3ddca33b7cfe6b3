//! Write policy evaluation
//!
//! Evaluation is a pure function of the repository's configured policy and the
//! target asset. Formats widen or narrow the configured policy per asset kind;
//! `DENY` is never widened.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::apt;
use crate::error::{ContentError, Result};
use crate::maven::MavenAssetKind;
use crate::repository::Format;

/// Overwrite semantics for a repository or a single asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WritePolicy {
    /// Any write succeeds, including overwrite
    Allow,
    /// A write succeeds only if nothing exists at the path yet
    AllowOnce,
    /// No writes accepted
    Deny,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self::AllowOnce
    }
}

impl WritePolicy {
    /// Whether an existing asset may be replaced
    pub fn permits_overwrite(&self) -> bool {
        matches!(self, WritePolicy::Allow)
    }

    /// Authorize a write to `path` given whether an asset already exists there
    pub fn authorize(&self, path: &str, exists: bool) -> Result<()> {
        match self {
            WritePolicy::Deny => Err(ContentError::PolicyDenied(format!(
                "repository is read-only: {}",
                path
            ))),
            WritePolicy::AllowOnce if exists => Err(ContentError::WriteConflict(format!(
                "asset already exists and may not be redeployed: {}",
                path
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePolicy::Allow => write!(f, "ALLOW"),
            WritePolicy::AllowOnce => write!(f, "ALLOW_ONCE"),
            WritePolicy::Deny => write!(f, "DENY"),
        }
    }
}

impl FromStr for WritePolicy {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "ALLOW" => Ok(WritePolicy::Allow),
            "ALLOW_ONCE" => Ok(WritePolicy::AllowOnce),
            "DENY" => Ok(WritePolicy::Deny),
            _ => Err(ContentError::ConfigurationError(format!(
                "Invalid write policy: {}",
                s
            ))),
        }
    }
}

/// The asset a write is aimed at
#[derive(Debug, Clone, Copy)]
pub struct WriteTarget<'a> {
    /// Canonical asset path
    pub path: &'a str,
    /// Format-specific kind tag
    pub kind: &'a str,
}

/// Effective policy for one write
pub fn evaluate(format: Format, base: WritePolicy, target: WriteTarget<'_>) -> WritePolicy {
    if base != WritePolicy::AllowOnce {
        return base;
    }
    match format {
        Format::Maven2 => {
            if target.kind == MavenAssetKind::RepositoryMetadata.as_str()
                || target.kind == MavenAssetKind::RepositoryIndex.as_str()
            {
                WritePolicy::Allow
            } else {
                base
            }
        }
        Format::Apt => {
            if apt::is_deb_package(target.path) {
                WritePolicy::AllowOnce
            } else {
                WritePolicy::Allow
            }
        }
    }
}
