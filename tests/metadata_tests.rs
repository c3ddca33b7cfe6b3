//! Metadata Consistency Tests
//!
//! Removing components deletes or flags the `maven-metadata.xml`
//! descriptors above them.

mod common;

use common::fixtures::{artifact_path, group_metadata_xml, metadata_xml, timestamped};
use common::{TestStore, HOSTED};
use pkgstore_core::maven::{Gav, METADATA_REBUILD_KEY};
use serde_json::Value;

const VERSION_METADATA: &str = "/com/example/lib/1.0/maven-metadata.xml";
const ARTIFACT_METADATA: &str = "/com/example/lib/maven-metadata.xml";
const GROUP_METADATA: &str = "/com/example/maven-metadata.xml";

/// lib 1.0 and 2.0 with descriptors at every level
async fn seeded() -> TestStore {
    let store = TestStore::new().await;
    store.put_jar(HOSTED, "com.example", "lib", "1.0").await;
    store.put_jar(HOSTED, "com.example", "lib", "2.0").await;

    store
        .put(HOSTED, VERSION_METADATA, metadata_xml("com.example", "lib", &["1.0"]))
        .await;
    store
        .put(HOSTED, &format!("{}.sha1", VERSION_METADATA), "0000000000000000000000000000000000000000")
        .await;
    store
        .put(HOSTED, ARTIFACT_METADATA, metadata_xml("com.example", "lib", &["1.0", "2.0"]))
        .await;
    store.put(HOSTED, GROUP_METADATA, group_metadata_xml("example")).await;
    store
}

async fn is_flagged(store: &TestStore, path: &str) -> bool {
    store.asset_attribute(HOSTED, path, METADATA_REBUILD_KEY).await == Some(Value::Bool(true))
}

#[tokio::test]
async fn test_deleting_one_version_flags_artifact_metadata() {
    let store = seeded().await;
    let facet = store.facet(HOSTED);

    let jar = artifact_path("com.example", "lib", "1.0", "jar");
    assert!(facet.delete(&jar).await.unwrap());

    assert!(!facet.exists(VERSION_METADATA).await.unwrap());
    assert!(!facet.exists(&format!("{}.sha1", VERSION_METADATA)).await.unwrap());
    assert!(is_flagged(&store, ARTIFACT_METADATA).await);
    assert!(!is_flagged(&store, GROUP_METADATA).await);
    assert!(facet.exists(GROUP_METADATA).await.unwrap());

    assert_eq!(store.event_count("metadata_deleted").await, 1);
    assert_eq!(store.event_count("metadata_flagged_for_rebuild").await, 1);
}

#[tokio::test]
async fn test_last_artifact_in_group_removes_all_descriptors() {
    let store = seeded().await;
    let facet = store.facet(HOSTED);
    let ids = vec![
        store.component_id(HOSTED, "com.example", "lib", "1.0").await,
        store.component_id(HOSTED, "com.example", "lib", "2.0").await,
    ];

    assert_eq!(facet.purge_components(&ids).await.unwrap(), 2);

    for path in [VERSION_METADATA, ARTIFACT_METADATA, GROUP_METADATA] {
        assert!(!facet.exists(path).await.unwrap(), "{} should be gone", path);
    }
    assert_eq!(facet.usage().await.unwrap().assets, 0);
    assert_eq!(store.event_count("components_purged").await, 1);
}

#[tokio::test]
async fn test_sibling_artifact_keeps_group_descriptor() {
    let store = seeded().await;
    store.put_jar(HOSTED, "com.example", "other", "1.0").await;
    let facet = store.facet(HOSTED);
    let ids = vec![
        store.component_id(HOSTED, "com.example", "lib", "1.0").await,
        store.component_id(HOSTED, "com.example", "lib", "2.0").await,
    ];

    facet.purge_components(&ids).await.unwrap();

    assert!(!facet.exists(ARTIFACT_METADATA).await.unwrap());
    assert!(facet.exists(GROUP_METADATA).await.unwrap());
    assert!(is_flagged(&store, GROUP_METADATA).await);
}

#[tokio::test]
async fn test_deleting_every_version_by_path_removes_descriptors() {
    let store = seeded().await;
    let facet = store.facet(HOSTED);
    let jars = vec![
        artifact_path("com.example", "lib", "1.0", "jar"),
        artifact_path("com.example", "lib", "2.0", "jar"),
    ];

    assert_eq!(facet.delete_paths(&jars).await.unwrap(), 2);

    for path in [VERSION_METADATA, ARTIFACT_METADATA, GROUP_METADATA] {
        assert!(!facet.exists(path).await.unwrap(), "{} should be gone", path);
    }
    assert_eq!(store.event_count("component_deleted").await, 2);
    assert_eq!(store.event_count("metadata_deleted").await, 3);
    assert_eq!(store.event_count("metadata_flagged_for_rebuild").await, 0);
}

#[tokio::test]
async fn test_engine_is_idempotent() {
    let store = seeded().await;
    let facet = store.facet(HOSTED);
    let engine = store.maven(HOSTED).metadata_engine();

    let jar = artifact_path("com.example", "lib", "1.0", "jar");
    facet.delete(&jar).await.unwrap();
    let assets = facet.usage().await.unwrap().assets;

    let gav = Gav::new("com.example", "lib", "1.0");
    let again = engine.apply(&gav).await.unwrap();
    assert!(again.deleted.is_empty());
    assert_eq!(again.flagged.as_deref(), Some(ARTIFACT_METADATA));

    assert_eq!(facet.usage().await.unwrap().assets, assets);
    assert!(is_flagged(&store, ARTIFACT_METADATA).await);
    assert_eq!(store.event_count("metadata_deleted").await, 1);
}

#[tokio::test]
async fn test_purge_reconciles_each_line_once() {
    let store = TestStore::new().await;
    store.put_jar(HOSTED, "com.example", "lib", "2.0").await;
    store
        .put(HOSTED, ARTIFACT_METADATA, metadata_xml("com.example", "lib", &["2.0"]))
        .await;

    let mut ids = Vec::new();
    for n in 1..=3 {
        let version = timestamped("1.0", n);
        store.put_jar(HOSTED, "com.example", "lib", &version).await;
        ids.push(store.component_id(HOSTED, "com.example", "lib", &version).await);
    }

    let facet = store.facet(HOSTED);
    assert_eq!(facet.purge_components(&ids).await.unwrap(), 3);

    assert_eq!(store.event_count("metadata_flagged_for_rebuild").await, 1);
    assert!(is_flagged(&store, ARTIFACT_METADATA).await);
    assert_eq!(facet.usage().await.unwrap().components, 1);
}

#[tokio::test]
async fn test_purge_ignores_unknown_ids() {
    let store = seeded().await;
    let facet = store.facet(HOSTED);

    let purged = facet
        .purge_components(&[pkgstore_core::ComponentId::new(9_999)])
        .await
        .unwrap();
    assert_eq!(purged, 0);
    assert_eq!(facet.usage().await.unwrap().components, 2);
    assert!(!is_flagged(&store, ARTIFACT_METADATA).await);
}
