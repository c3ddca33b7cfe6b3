//! Content Integration Tests
//!
//! Store, fetch and delete through the Maven and APT facets, including write
//! policy enforcement and staging cleanup.

mod common;

use common::fixtures::{artifact_path, deb, metadata_xml};
use common::{TestStore, DEBS, HOSTED, RELEASES};
use pkgstore_blob::{BlobStore, FileBlobStore, MemoryBlobStore};
use pkgstore_core::{BlobRef, Format, HashAlgorithm, WritePolicy};
use pkgstore_db::{create_pool, PoolConfig};
use pkgstore_service::{
    BlobIngestor, Payload, RepositoryConfig, RepositoryRegistry, RepositoryRegistryBuilder,
    ServiceError,
};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_round_trip_preserves_bytes_and_digests() {
    let store = TestStore::new().await;
    let facet = store.facet(RELEASES);
    let bytes: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
    let path = artifact_path("com.example", "lib", "1.0", "jar");

    let stored = facet
        .put(&path, Payload::from_bytes(bytes.clone()))
        .await
        .expect("put failed");
    assert_eq!(stored.size, bytes.len() as u64);
    assert_eq!(stored.content_type, "application/java-archive");
    assert!(stored.component_id.is_some());

    let content = facet.get(&path).await.unwrap().expect("content missing");
    assert_eq!(content.bytes, bytes);
    assert_eq!(
        content.descriptor.digests[&HashAlgorithm::Sha256],
        format!("{:x}", Sha256::digest(&bytes))
    );
    for algorithm in pkgstore_core::maven::HASH_ALGORITHMS {
        assert!(content.descriptor.digests.contains_key(&algorithm));
    }
    assert_eq!(content.descriptor.blob_ref, stored.blob_ref);
}

#[tokio::test]
async fn test_allow_once_conflict_keeps_original() {
    let store = TestStore::new().await;
    let facet = store.facet(RELEASES);
    let path = artifact_path("com.example", "lib", "1.0", "jar");

    facet.put(&path, Payload::from("original")).await.unwrap();
    let err = facet.put(&path, Payload::from("replacement")).await.unwrap_err();
    assert!(matches!(err, ServiceError::WriteConflict(_)));

    let content = facet.get(&path).await.unwrap().unwrap();
    assert_eq!(content.bytes, b"original");
    assert_eq!(store.temp_blob_count(), 0);
    assert_eq!(store.blobs.metrics().blob_count, 1);
}

#[tokio::test]
async fn test_allow_once_still_rewrites_metadata() {
    let store = TestStore::new().await;
    let facet = store.facet(RELEASES);
    let path = "com/example/lib/maven-metadata.xml";

    facet
        .put(path, Payload::from(metadata_xml("com.example", "lib", &["1.0"]).as_str()))
        .await
        .unwrap();
    facet
        .put(path, Payload::from(metadata_xml("com.example", "lib", &["1.0", "2.0"]).as_str()))
        .await
        .unwrap();

    let content = facet.get(path).await.unwrap().unwrap();
    assert!(String::from_utf8(content.bytes).unwrap().contains("2.0"));
}

#[tokio::test]
async fn test_deny_rejects_every_write() {
    let store = TestStore::with_repositories(vec![
        RepositoryConfig::new("frozen", Format::Maven2).write_policy(WritePolicy::Deny),
    ])
    .await;
    let facet = store.facet("frozen");

    let err = facet
        .put("com/example/lib/maven-metadata.xml", Payload::from("<metadata/>"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PolicyDenied(_)));
    assert!(!facet.exists("com/example/lib/maven-metadata.xml").await.unwrap());
    assert_eq!(store.temp_blob_count(), 0);
}

#[tokio::test]
async fn test_invalid_metadata_leaves_nothing_behind() {
    let store = TestStore::new().await;
    let facet = store.facet(HOSTED);

    let err = facet
        .put(
            "com/example/lib/maven-metadata.xml",
            Payload::from(metadata_xml("org.other", "lib", &["1.0"]).as_str()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationFailed(_)));
    assert_eq!(store.temp_blob_count(), 0);
    assert_eq!(store.blobs.metrics().blob_count, 0);
    assert_eq!(facet.usage().await.unwrap().assets, 0);
}

#[tokio::test]
async fn test_abandoned_staged_blob_is_discarded() {
    let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new("staging"));
    let ingestor = BlobIngestor::new(blobs.clone());

    let staged = ingestor
        .ingest(Payload::from("never committed"), &[HashAlgorithm::Sha1])
        .await
        .unwrap();
    assert_eq!(blobs.metrics().temp_count, 1);

    drop(staged);
    let metrics = blobs.metrics();
    assert_eq!(metrics.temp_count, 0);
    assert_eq!(metrics.blob_count, 0);
}

#[tokio::test]
async fn test_delete_removes_orphaned_component() {
    let store = TestStore::new().await;
    let facet = store.facet(HOSTED);
    let jar = artifact_path("com.example", "lib", "1.0", "jar");
    let pom = artifact_path("com.example", "lib", "1.0", "pom");

    store.put(HOSTED, &jar, "jar").await;
    store
        .put(HOSTED, &pom, common::fixtures::pom("com.example", "lib", "1.0", "jar"))
        .await;
    assert_eq!(facet.usage().await.unwrap().components, 1);

    assert!(facet.delete(&jar).await.unwrap());
    assert_eq!(facet.usage().await.unwrap().components, 1);

    assert_eq!(facet.delete_paths(&[pom.clone(), jar.clone()]).await.unwrap(), 1);
    let usage = facet.usage().await.unwrap();
    assert_eq!(usage.components, 0);
    assert_eq!(usage.assets, 0);

    assert_eq!(store.event_count("component_created").await, 1);
    assert_eq!(store.event_count("component_deleted").await, 1);
    assert_eq!(store.event_count("asset_deleted").await, 2);
}

#[tokio::test]
async fn test_unpublish_index() {
    let store = TestStore::new().await;
    let maven = store.maven(HOSTED);

    store.put(HOSTED, ".index/nexus-maven-repository-index.gz", "index").await;
    store
        .put(HOSTED, ".index/nexus-maven-repository-index.properties", "props")
        .await;
    store.put_jar(HOSTED, "com.example", "lib", "1.0").await;

    assert_eq!(maven.unpublish_index().await.unwrap(), 2);
    assert_eq!(store.facet(HOSTED).usage().await.unwrap().assets, 1);
}

#[tokio::test]
async fn test_deb_stored_once_metadata_rewritten() {
    let store = TestStore::new().await;
    let facet = store.facet(DEBS);
    let path = "pool/main/h/hello/hello_2.10-3_amd64.deb";

    let stored = facet
        .put(path, Payload::from_bytes(deb("hello", "2.10-3", "amd64")))
        .await
        .unwrap();
    assert_eq!(stored.kind, "DEB");

    let err = facet
        .put(path, Payload::from_bytes(deb("hello", "2.10-3", "amd64")))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::WriteConflict(_)));

    let component = store.component_id(DEBS, "amd64", "hello", "2.10-3").await;
    assert_eq!(stored.component_id, Some(component));

    store.put(DEBS, "dists/stable/main/binary-amd64/Packages", "v1").await;
    store.put(DEBS, "dists/stable/main/binary-amd64/Packages", "v2").await;
    let packages = facet
        .get("dists/stable/main/binary-amd64/Packages")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(packages.bytes, b"v2");
    assert_eq!(packages.descriptor.kind, "METADATA");
    assert!(packages.descriptor.component_id.is_none());

    assert_eq!(store.event_count("component_created").await, 1);
    assert_eq!(store.temp_blob_count(), 0);
}

#[tokio::test]
async fn test_snapshot_retention_unsupported_for_apt() {
    let store = TestStore::new().await;
    let err = store
        .facet(DEBS)
        .find_snapshot_candidates(1)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unsupported(_)));
}

#[tokio::test]
async fn test_registry_usage_and_blob_sharing() {
    let store = TestStore::new().await;
    store.put_jar(RELEASES, "com.example", "lib", "1.0").await;
    store.put_jar(HOSTED, "com.example", "lib", "1.0").await;

    let usage = store.registry.usage().await.unwrap();
    assert_eq!(usage[RELEASES].components, 1);
    assert_eq!(usage[HOSTED].components, 1);
    assert_eq!(usage[DEBS].assets, 0);

    // identical bytes land on one blob
    assert_eq!(store.registry.blob_metrics().blob_count, 1);
}

/// Registry whose blobs live on disk so they can be tampered with
async fn file_backed(root: &Path) -> RepositoryRegistry {
    let pool = create_pool(&PoolConfig::in_memory()).await.unwrap();
    let blobs = FileBlobStore::open("default", root, None).await.unwrap();
    RepositoryRegistryBuilder::new()
        .pool(pool)
        .blob_store(Arc::new(blobs))
        .repositories(common::default_repositories())
        .build()
        .await
        .unwrap()
}

fn blob_file(root: &Path, blob_ref: &BlobRef) -> PathBuf {
    let id = &blob_ref.blob_id;
    root.join("content")
        .join(&id[0..2])
        .join(&id[2..4])
        .join(format!("{}.bytes", id))
}

#[tokio::test]
async fn test_missing_blob_is_integrity_violation() {
    let dir = tempdir().unwrap();
    let registry = file_backed(dir.path()).await;
    let facet = registry.require(HOSTED).unwrap();
    let path = artifact_path("com.example", "lib", "1.0", "jar");

    let stored = facet.put(&path, Payload::from("jar bytes")).await.unwrap();
    std::fs::remove_file(blob_file(dir.path(), &stored.blob_ref)).unwrap();

    let err = facet.get(&path).await.unwrap_err();
    assert!(matches!(err, ServiceError::IntegrityViolation(_)));

    assert!(facet.exists(&path).await.unwrap());
    let usage = facet.usage().await.unwrap();
    assert_eq!(usage.components, 1);
    assert_eq!(usage.assets, 1);
}

#[tokio::test]
async fn test_corrupted_blob_is_integrity_violation() {
    let dir = tempdir().unwrap();
    let registry = file_backed(dir.path()).await;
    let facet = registry.require(HOSTED).unwrap();
    let path = artifact_path("com.example", "lib", "1.0", "jar");

    let stored = facet.put(&path, Payload::from("jar bytes")).await.unwrap();
    std::fs::write(blob_file(dir.path(), &stored.blob_ref), b"tampered").unwrap();

    let err = facet.get(&path).await.unwrap_err();
    assert!(matches!(err, ServiceError::IntegrityViolation(_)));

    assert!(facet.exists(&path).await.unwrap());
    assert_eq!(facet.usage().await.unwrap().assets, 1);
    assert_eq!(registry.blob_metrics().blob_count, 1);
}
