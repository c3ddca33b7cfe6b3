//! Core domain model for the package content store
//!
//! This crate holds the repository/component/asset graph types, checksum
//! handling, the write policy evaluator and the Maven 2 and APT path models.
//! It performs no I/O.

pub mod apt;
pub mod asset;
pub mod checksum;
pub mod component;
pub mod error;
pub mod event;
pub mod maven;
pub mod policy;
pub mod repository;
pub mod types;

// Re-exports for convenience
pub use asset::{Asset, AssetBlob, BlobRef};
pub use checksum::{Checksum, Digests, HashAlgorithm};
pub use component::Component;
pub use error::{ContentError, Result};
pub use event::{ContentEvent, EventType};
pub use policy::{WritePolicy, WriteTarget};
pub use repository::{Format, Repository, RepositoryType};
pub use types::{AssetId, Attributes, ComponentId, RepositoryId};
