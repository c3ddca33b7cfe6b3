//! Payloads going in and content descriptors coming out

use chrono::{DateTime, Utc};
use pkgstore_core::{Asset, BlobRef, ComponentId, Digests};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use tokio::io::AsyncRead;

/// Default content type for anything not recognised
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Bytes to be written, read exactly once during ingestion
pub struct Payload {
    reader: Box<dyn AsyncRead + Unpin + Send>,
    content_type: Option<String>,
}

impl Payload {
    pub fn from_reader(reader: impl AsyncRead + Unpin + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            content_type: None,
        }
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_reader(Cursor::new(bytes.into()))
    }

    /// Open a file for streaming
    pub async fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::from_reader(file))
    }

    /// Content type declared by the caller
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub(crate) fn into_parts(self) -> (Box<dyn AsyncRead + Unpin + Send>, Option<String>) {
        (self.reader, self.content_type)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::from_bytes(bytes)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::from_bytes(text.as_bytes().to_vec())
    }
}

/// What a stored asset looks like to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub path: String,
    pub kind: String,
    pub size: u64,
    pub content_type: String,
    /// Every digest computed at ingestion, SHA-256 included
    pub digests: Digests,
    /// Handle for downloading the bytes from the blob store
    pub blob_ref: BlobRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_id: Option<ComponentId>,
    pub last_modified: DateTime<Utc>,
}

impl From<&Asset> for ContentDescriptor {
    fn from(asset: &Asset) -> Self {
        Self {
            path: asset.path.clone(),
            kind: asset.kind.clone(),
            size: asset.blob.size,
            content_type: asset.blob.content_type.clone(),
            digests: asset.blob.checksums.clone(),
            blob_ref: asset.blob.blob_ref.clone(),
            component_id: asset.component_id,
            last_modified: asset.last_updated,
        }
    }
}

/// A descriptor together with the verified bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub descriptor: ContentDescriptor,
    pub bytes: Vec<u8>,
}

/// Guess a content type from the file extension
pub fn guess_content_type(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let extension = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return OCTET_STREAM,
    };

    match extension.as_str() {
        "jar" | "war" | "ear" => "application/java-archive",
        "pom" | "xml" => "application/xml",
        "deb" => "application/vnd.debian.binary-package",
        "gz" | "tgz" => "application/gzip",
        "bz2" => "application/x-bzip2",
        "xz" => "application/x-xz",
        "zip" => "application/zip",
        "json" => "application/json",
        "asc" | "gpg" => "application/pgp-signature",
        "md5" | "sha1" | "sha256" | "sha512" | "txt" => "text/plain",
        _ if file_name == "Release" || file_name == "Packages" || file_name == "InRelease" => {
            "text/plain"
        }
        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("/com/x/lib/1.0/lib-1.0.jar"), "application/java-archive");
        assert_eq!(guess_content_type("/com/x/lib/1.0/lib-1.0.pom"), "application/xml");
        assert_eq!(guess_content_type("/com/x/lib/1.0/lib-1.0.jar.sha1"), "text/plain");
        assert_eq!(
            guess_content_type("/pool/main/f/foo_1.0_amd64.deb"),
            "application/vnd.debian.binary-package"
        );
        assert_eq!(guess_content_type("/dists/stable/Release"), OCTET_STREAM);
        assert_eq!(guess_content_type("/blob.UNKNOWN"), OCTET_STREAM);
    }

    #[test]
    fn test_payload_content_type() {
        let payload = Payload::from("hello").with_content_type("text/plain");
        assert_eq!(payload.content_type(), Some("text/plain"));
        assert!(Payload::from_bytes(vec![1, 2, 3]).content_type().is_none());
    }
}
