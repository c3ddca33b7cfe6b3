//! Debian APT repository model

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::checksum::HashAlgorithm;
use crate::error::{ContentError, Result};
use crate::types::Attributes;

/// Attribute section name for APT components
pub const FORMAT_NAME: &str = "apt";

/// Digests computed for every APT upload
pub const HASH_ALGORITHMS: [HashAlgorithm; 3] =
    [HashAlgorithm::Md5, HashAlgorithm::Sha1, HashAlgorithm::Sha256];

/// Asset kinds in an APT repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AptAssetKind {
    /// A binary package
    Deb,
    /// Release files, package indexes and signatures
    Metadata,
}

impl AptAssetKind {
    pub fn for_path(path: &str) -> Self {
        if is_deb_package(path) {
            AptAssetKind::Deb
        } else {
            AptAssetKind::Metadata
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AptAssetKind::Deb => "DEB",
            AptAssetKind::Metadata => "METADATA",
        }
    }
}

impl fmt::Display for AptAssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a path names a binary package
pub fn is_deb_package(path: &str) -> bool {
    path.ends_with(".deb")
}

/// Canonical asset path: exactly one leading `/`
pub fn normalize_asset_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Control fields identifying a binary package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub package: String,
    pub version: String,
    pub architecture: String,
}

impl PackageInfo {
    pub fn new(
        package: impl Into<String>,
        version: impl Into<String>,
        architecture: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            architecture: architecture.into(),
        }
    }

    /// Read `Package`, `Version` and `Architecture` from a control stanza
    pub fn from_control(control: &str) -> Result<Self> {
        let mut package = None;
        let mut version = None;
        let mut architecture = None;

        for line in control.lines() {
            // continuation lines belong to multi-line fields we do not read
            if line.starts_with(' ') || line.starts_with('\t') {
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                let value = value.trim();
                match key.trim() {
                    "Package" => package = Some(value.to_string()),
                    "Version" => version = Some(value.to_string()),
                    "Architecture" => architecture = Some(value.to_string()),
                    _ => {}
                }
            }
        }

        match (package, version, architecture) {
            (Some(p), Some(v), Some(a)) if !p.is_empty() && !v.is_empty() && !a.is_empty() => {
                Ok(Self::new(p, v, a))
            }
            _ => Err(ContentError::ValidationError(
                "control data lacks Package, Version or Architecture".to_string(),
            )),
        }
    }

    /// Derive from a pool file name of the form `name_version_arch.deb`
    ///
    /// Epochs are encoded as `%3a` in file names.
    pub fn from_file_name(path: &str) -> Result<Self> {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let stem = file_name.strip_suffix(".deb").ok_or_else(|| {
            ContentError::ValidationError(format!("not a package file: {}", path))
        })?;

        let parts: Vec<&str> = stem.split('_').collect();
        match parts.as_slice() {
            [package, version, architecture]
                if !package.is_empty() && !version.is_empty() && !architecture.is_empty() =>
            {
                let version = version.replace("%3a", ":").replace("%3A", ":");
                Ok(Self::new(*package, version, *architecture))
            }
            _ => Err(ContentError::ValidationError(format!(
                "package file name is not name_version_arch.deb: {}",
                file_name
            ))),
        }
    }

    /// Format attributes stored on the component
    pub fn attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(
            FORMAT_NAME.into(),
            json!({
                "package": self.package,
                "version": self.version,
                "architecture": self.architecture,
            }),
        );
        attributes
    }

    /// Asset attributes for the package file
    pub fn asset_attributes(&self) -> Attributes {
        let mut attributes = self.attributes();
        if let Some(Value::Object(section)) = attributes.get_mut(FORMAT_NAME) {
            section.insert("asset_kind".into(), json!(AptAssetKind::Deb.as_str()));
        }
        attributes
    }
}
