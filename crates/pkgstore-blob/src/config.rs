//! Blob store configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{BlobError, BlobResult};

fn default_name() -> String {
    "default".to_string()
}

/// Which backend holds blob bytes, and under what name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlobStoreConfig {
    File {
        #[serde(default = "default_name")]
        name: String,
        path: PathBuf,
        /// Bytes the store may hold; unlimited when absent
        #[serde(default)]
        capacity_bytes: Option<u64>,
    },
    Memory {
        #[serde(default = "default_name")]
        name: String,
        #[serde(default)]
        capacity_bytes: Option<u64>,
    },
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        BlobStoreConfig::File {
            name: default_name(),
            path: PathBuf::from("./data/blobs"),
            capacity_bytes: None,
        }
    }
}

impl BlobStoreConfig {
    pub fn name(&self) -> &str {
        match self {
            BlobStoreConfig::File { name, .. } | BlobStoreConfig::Memory { name, .. } => name,
        }
    }

    pub fn capacity_bytes(&self) -> Option<u64> {
        match self {
            BlobStoreConfig::File { capacity_bytes, .. }
            | BlobStoreConfig::Memory { capacity_bytes, .. } => *capacity_bytes,
        }
    }

    pub fn validate(&self) -> BlobResult<()> {
        if self.name().is_empty() {
            return Err(BlobError::Config("blob store name cannot be empty".to_string()));
        }
        if self.name().contains('@') {
            return Err(BlobError::Config(format!(
                "blob store name cannot contain '@': {}",
                self.name()
            )));
        }
        if self.capacity_bytes() == Some(0) {
            return Err(BlobError::Config("capacity_bytes must be greater than 0".to_string()));
        }
        if let BlobStoreConfig::File { path, .. } = self {
            if path.as_os_str().is_empty() {
                return Err(BlobError::Config("blob store path cannot be empty".to_string()));
            }
        }
        Ok(())
    }
}
