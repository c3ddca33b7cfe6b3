//! Maven 2 repository layout
//!
//! Paths are parsed into [`MavenPath`] values carrying optional artifact
//! [`Coordinates`]. Metadata descriptors (`maven-metadata.xml`) live at three
//! levels of the coordinate hierarchy and carry no coordinates themselves.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::checksum::HashAlgorithm;
use crate::error::{ContentError, Result};
use crate::types::Attributes;

/// Attribute section name for Maven components and assets
pub const FORMAT_NAME: &str = "maven2";

pub const METADATA_FILENAME: &str = "maven-metadata.xml";

pub const ARCHETYPE_CATALOG_FILENAME: &str = "archetype-catalog.xml";

pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// Directory holding Maven indexer files
pub const INDEX_PREFIX: &str = ".index/";

/// Asset attribute marking a metadata descriptor as awaiting regeneration
pub const METADATA_REBUILD_KEY: &str = "forceRebuild";

pub const MAVEN_ARCHETYPE_KIND: &str = "maven-archetype";

pub const SIGNATURE_EXTENSION: &str = "asc";

/// Digests computed for every Maven upload
pub const HASH_ALGORITHMS: [HashAlgorithm; 4] = [
    HashAlgorithm::Sha1,
    HashAlgorithm::Md5,
    HashAlgorithm::Sha256,
    HashAlgorithm::Sha512,
];

pub const ATTR_GROUP_ID: &str = "groupId";
pub const ATTR_ARTIFACT_ID: &str = "artifactId";
pub const ATTR_VERSION: &str = "version";
pub const ATTR_BASE_VERSION: &str = "baseVersion";
pub const ATTR_PACKAGING: &str = "packaging";
pub const ATTR_CLASSIFIER: &str = "classifier";
pub const ATTR_EXTENSION: &str = "extension";
pub const ATTR_ASSET_KIND: &str = "asset_kind";

static TIMESTAMP_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+)-(\d{8}\.\d{6})-(\d+)$").expect("timestamp version pattern is valid")
});

static TIMESTAMP_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{8}\.\d{6})-(\d+)").expect("timestamp prefix pattern is valid")
});

/// Whether a version string denotes a snapshot, plain or timestamped
pub fn is_snapshot_version(version: &str) -> bool {
    version.ends_with(SNAPSHOT_SUFFIX) || TIMESTAMP_VERSION.is_match(version)
}

/// Version line of a version: `1.0-20240101.120000-3` becomes `1.0-SNAPSHOT`
pub fn base_version_of(version: &str) -> String {
    match TIMESTAMP_VERSION.captures(version) {
        Some(caps) => format!("{}{}", &caps[1], SNAPSHOT_SUFFIX),
        None => version.to_string(),
    }
}

/// Release version a snapshot line leads up to, if `base_version` is one
pub fn release_version_of(base_version: &str) -> Option<&str> {
    base_version.strip_suffix(SNAPSHOT_SUFFIX)
}

/// Canonical path of a metadata descriptor
///
/// `base_version` is only honoured together with `artifact_id`.
pub fn metadata_path(group_id: &str, artifact_id: Option<&str>, base_version: Option<&str>) -> String {
    let mut path = format!("/{}", group_id.replace('.', "/"));
    if let Some(artifact_id) = artifact_id {
        path.push('/');
        path.push_str(artifact_id);
        if let Some(base_version) = base_version {
            path.push('/');
            path.push_str(base_version);
        }
    }
    path.push('/');
    path.push_str(METADATA_FILENAME);
    path
}

/// Group/artifact/baseVersion triple identifying a component lineage
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gav {
    pub group_id: String,
    pub artifact_id: String,
    pub base_version: String,
}

impl Gav {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        base_version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            base_version: base_version.into(),
        }
    }
}

impl fmt::Display for Gav {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.base_version)
    }
}

/// Specificity level of a metadata descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataLevel {
    Group,
    Artifact,
    Version,
}

impl MetadataLevel {
    /// Descriptor path for this level of `gav`
    pub fn path(&self, gav: &Gav) -> String {
        match self {
            MetadataLevel::Group => metadata_path(&gav.group_id, None, None),
            MetadataLevel::Artifact => metadata_path(&gav.group_id, Some(&gav.artifact_id), None),
            MetadataLevel::Version => metadata_path(
                &gav.group_id,
                Some(&gav.artifact_id),
                Some(&gav.base_version),
            ),
        }
    }
}

/// Artifact coordinates derived from a layout path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinates {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub base_version: String,
    pub snapshot: bool,
    pub timestamp: Option<String>,
    pub build_number: Option<u32>,
    pub classifier: Option<String>,
    pub extension: String,
}

impl Coordinates {
    pub fn gav(&self) -> Gav {
        Gav::new(&self.group_id, &self.artifact_id, &self.base_version)
    }
}

/// Asset kinds in a Maven repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MavenAssetKind {
    Artifact,
    ArtifactSubordinate,
    RepositoryMetadata,
    RepositoryIndex,
    Other,
}

impl MavenAssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MavenAssetKind::Artifact => "ARTIFACT",
            MavenAssetKind::ArtifactSubordinate => "ARTIFACT_SUBORDINATE",
            MavenAssetKind::RepositoryMetadata => "REPOSITORY_METADATA",
            MavenAssetKind::RepositoryIndex => "REPOSITORY_INDEX",
            MavenAssetKind::Other => "OTHER",
        }
    }

    /// Regenerated content that must stay re-writable
    pub fn is_regenerated(&self) -> bool {
        matches!(
            self,
            MavenAssetKind::RepositoryMetadata | MavenAssetKind::RepositoryIndex
        )
    }
}

impl fmt::Display for MavenAssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed Maven 2 layout path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MavenPath {
    path: String,
    file_name: String,
    coordinates: Option<Coordinates>,
    hash_type: Option<HashAlgorithm>,
    signature: bool,
}

impl MavenPath {
    /// Parse a request path, with or without a leading `/`
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim_start_matches('/');
        if trimmed.is_empty() || trimmed.ends_with('/') {
            return Err(ContentError::InvalidPath(format!(
                "Not a file path: {}",
                path
            )));
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == "..")
        {
            return Err(ContentError::InvalidPath(format!(
                "Path contains empty or relative segments: {}",
                path
            )));
        }

        let file_name = segments[segments.len() - 1];
        let (main_name, hash_type) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => match HashAlgorithm::from_file_extension(ext) {
                Some(alg) => (stem, Some(alg)),
                None => (file_name, None),
            },
            None => (file_name, None),
        };
        let (main_name, signature) = match main_name.strip_suffix(".asc") {
            Some(stem) => (stem, true),
            None => (main_name, false),
        };

        let coordinates = if main_name == METADATA_FILENAME || trimmed.starts_with(INDEX_PREFIX) {
            None
        } else {
            parse_coordinates(&segments, main_name)
        };

        Ok(Self {
            path: trimmed.to_string(),
            file_name: file_name.to_string(),
            coordinates,
            hash_type,
            signature,
        })
    }

    /// Path relative to the repository root, without a leading `/`
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Canonical asset path with a leading `/`
    pub fn asset_path(&self) -> String {
        format!("/{}", self.path)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn coordinates(&self) -> Option<&Coordinates> {
        self.coordinates.as_ref()
    }

    pub fn hash_type(&self) -> Option<HashAlgorithm> {
        self.hash_type
    }

    pub fn is_signature(&self) -> bool {
        self.signature
    }

    /// Hash or signature of another file
    pub fn is_subordinate(&self) -> bool {
        self.hash_type.is_some() || self.signature
    }

    /// Main file name with hash and signature suffixes removed
    fn main_file_name(&self) -> &str {
        let mut name = self.file_name.as_str();
        if let Some(ext) = self.hash_type.and_then(|h| h.file_extension()) {
            name = name.strip_suffix(ext).and_then(|n| n.strip_suffix('.')).unwrap_or(name);
        }
        if self.signature {
            name = name.strip_suffix(".asc").unwrap_or(name);
        }
        name
    }

    /// A metadata descriptor or one of its hash/signature files
    pub fn is_metadata(&self) -> bool {
        self.main_file_name() == METADATA_FILENAME
    }

    pub fn is_index(&self) -> bool {
        self.path.starts_with(INDEX_PREFIX)
    }

    pub fn is_archetype_catalog(&self) -> bool {
        self.main_file_name() == ARCHETYPE_CATALOG_FILENAME
    }

    /// A project descriptor itself, not its hash or signature
    pub fn is_pom(&self) -> bool {
        !self.is_subordinate()
            && self
                .coordinates
                .as_ref()
                .map(|c| c.extension == "pom")
                .unwrap_or(false)
    }

    /// The file this path is a hash of, or `self` when it is not a hash
    pub fn main(&self) -> MavenPath {
        match self.hash_type.and_then(|h| h.file_extension()) {
            Some(ext) => {
                let stripped = self
                    .path
                    .strip_suffix(ext)
                    .and_then(|p| p.strip_suffix('.'))
                    .unwrap_or(&self.path);
                // A prefix of a valid path is still valid.
                MavenPath::parse(stripped).unwrap_or_else(|_| self.clone())
            }
            None => self.clone(),
        }
    }

    /// Hash sibling of the main file for `algorithm`
    pub fn hash(&self, algorithm: HashAlgorithm) -> Result<MavenPath> {
        let ext = algorithm.file_extension().ok_or_else(|| {
            ContentError::InvalidPath(format!("{} has no sidecar file", algorithm))
        })?;
        MavenPath::parse(&format!("{}.{}", self.main().path, ext))
    }

    pub fn kind(&self) -> MavenAssetKind {
        if self.is_index() {
            MavenAssetKind::RepositoryIndex
        } else if self.is_metadata() {
            MavenAssetKind::RepositoryMetadata
        } else if self.coordinates.is_some() {
            if self.is_subordinate() {
                MavenAssetKind::ArtifactSubordinate
            } else {
                MavenAssetKind::Artifact
            }
        } else {
            MavenAssetKind::Other
        }
    }

    /// Format attributes stored on the asset at this path
    pub fn asset_attributes(&self) -> Attributes {
        let mut section = serde_json::Map::new();
        if let Some(c) = &self.coordinates {
            section.insert(ATTR_GROUP_ID.into(), json!(c.group_id));
            section.insert(ATTR_ARTIFACT_ID.into(), json!(c.artifact_id));
            section.insert(ATTR_VERSION.into(), json!(c.version));
            section.insert(ATTR_BASE_VERSION.into(), json!(c.base_version));
            if let Some(classifier) = &c.classifier {
                section.insert(ATTR_CLASSIFIER.into(), json!(classifier));
            }
            section.insert(ATTR_EXTENSION.into(), json!(c.extension));
        }
        section.insert(ATTR_ASSET_KIND.into(), json!(self.kind().as_str()));

        let mut attributes = Attributes::new();
        attributes.insert(FORMAT_NAME.into(), Value::Object(section));
        attributes
    }
}

impl fmt::Display for MavenPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

fn parse_coordinates(segments: &[&str], file_name: &str) -> Option<Coordinates> {
    let n = segments.len();
    if n < 4 {
        return None;
    }
    let base_version = segments[n - 2];
    let artifact_id = segments[n - 3];
    let group_id = segments[..n - 3].join(".");

    let rest = file_name.strip_prefix(artifact_id)?.strip_prefix('-')?;

    let (version, timestamp, build_number, tail) = match release_version_of(base_version) {
        Some(release) => match rest.strip_prefix(base_version) {
            Some(tail) => (base_version.to_string(), None, None, tail),
            None => {
                let after = rest.strip_prefix(release)?.strip_prefix('-')?;
                let caps = TIMESTAMP_PREFIX.captures(after)?;
                let whole = caps.get(0)?;
                let build_number = caps[2].parse::<u32>().ok()?;
                (
                    format!("{}-{}", release, whole.as_str()),
                    Some(caps[1].to_string()),
                    Some(build_number),
                    &after[whole.end()..],
                )
            }
        },
        None => (
            base_version.to_string(),
            None,
            None,
            rest.strip_prefix(base_version)?,
        ),
    };

    let (classifier, extension) = if let Some(t) = tail.strip_prefix('-') {
        let (classifier, extension) = t.split_once('.')?;
        if classifier.is_empty() {
            return None;
        }
        (Some(classifier.to_string()), extension)
    } else {
        (None, tail.strip_prefix('.')?)
    };
    if extension.is_empty() {
        return None;
    }

    Some(Coordinates {
        group_id,
        artifact_id: artifact_id.to_string(),
        snapshot: is_snapshot_version(&version),
        version,
        base_version: base_version.to_string(),
        timestamp,
        build_number,
        classifier,
        extension: extension.to_string(),
    })
}

/// Format attributes stored on a component
pub fn component_attributes(coordinates: &Coordinates, packaging: Option<&str>) -> Attributes {
    let mut section = serde_json::Map::new();
    section.insert(ATTR_GROUP_ID.into(), json!(coordinates.group_id));
    section.insert(ATTR_ARTIFACT_ID.into(), json!(coordinates.artifact_id));
    section.insert(ATTR_VERSION.into(), json!(coordinates.version));
    section.insert(ATTR_BASE_VERSION.into(), json!(coordinates.base_version));
    if let Some(packaging) = packaging {
        section.insert(ATTR_PACKAGING.into(), json!(packaging));
    }

    let mut attributes = Attributes::new();
    attributes.insert(FORMAT_NAME.into(), Value::Object(section));
    attributes
}

/// Which versions a repository accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionPolicy {
    Release,
    Snapshot,
    Mixed,
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self::Mixed
    }
}

impl VersionPolicy {
    pub fn permits(&self, coordinates: &Coordinates) -> bool {
        match self {
            VersionPolicy::Release => !coordinates.snapshot,
            VersionPolicy::Snapshot => coordinates.snapshot,
            VersionPolicy::Mixed => true,
        }
    }
}

/// How strictly request paths must follow the Maven 2 layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayoutPolicy {
    Strict,
    Permissive,
}

impl Default for LayoutPolicy {
    fn default() -> Self {
        Self::Strict
    }
}

impl LayoutPolicy {
    pub fn permits(&self, path: &MavenPath) -> bool {
        match self {
            LayoutPolicy::Permissive => true,
            LayoutPolicy::Strict => {
                path.coordinates().is_some()
                    || path.is_metadata()
                    || path.is_index()
                    || path.is_archetype_catalog()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_release_artifact() {
        let path = MavenPath::parse("/com/x/lib/1.0/lib-1.0.jar").unwrap();
        let c = path.coordinates().unwrap();
        assert_eq!(c.group_id, "com.x");
        assert_eq!(c.artifact_id, "lib");
        assert_eq!(c.version, "1.0");
        assert_eq!(c.base_version, "1.0");
        assert_eq!(c.extension, "jar");
        assert!(c.classifier.is_none());
        assert!(!c.snapshot);
        assert_eq!(path.kind(), MavenAssetKind::Artifact);
        assert_eq!(path.asset_path(), "/com/x/lib/1.0/lib-1.0.jar");
    }

    #[test]
    fn test_parse_classifier_and_compound_extension() {
        let path = MavenPath::parse("org/acme/tool/2.1/tool-2.1-sources.jar").unwrap();
        let c = path.coordinates().unwrap();
        assert_eq!(c.classifier.as_deref(), Some("sources"));
        assert_eq!(c.extension, "jar");

        let path = MavenPath::parse("org/acme/tool/2.1/tool-2.1.tar.gz").unwrap();
        assert_eq!(path.coordinates().unwrap().extension, "tar.gz");
    }

    #[test]
    fn test_parse_timestamped_snapshot() {
        let path =
            MavenPath::parse("com/x/lib/1.0-SNAPSHOT/lib-1.0-20240102.030405-7.pom").unwrap();
        let c = path.coordinates().unwrap();
        assert_eq!(c.version, "1.0-20240102.030405-7");
        assert_eq!(c.base_version, "1.0-SNAPSHOT");
        assert_eq!(c.timestamp.as_deref(), Some("20240102.030405"));
        assert_eq!(c.build_number, Some(7));
        assert!(c.snapshot);
        assert!(path.is_pom());
    }

    #[test]
    fn test_parse_plain_snapshot() {
        let path = MavenPath::parse("com/x/lib/1.0-SNAPSHOT/lib-1.0-SNAPSHOT.jar").unwrap();
        let c = path.coordinates().unwrap();
        assert_eq!(c.version, "1.0-SNAPSHOT");
        assert!(c.snapshot);
        assert!(c.timestamp.is_none());
    }

    #[test]
    fn test_parse_hash_and_signature() {
        let path = MavenPath::parse("com/x/lib/1.0/lib-1.0.jar.sha1").unwrap();
        assert_eq!(path.hash_type(), Some(HashAlgorithm::Sha1));
        assert_eq!(path.kind(), MavenAssetKind::ArtifactSubordinate);
        assert_eq!(path.main().path(), "com/x/lib/1.0/lib-1.0.jar");
        assert!(path.coordinates().is_some());

        let sig = MavenPath::parse("com/x/lib/1.0/lib-1.0.pom.asc").unwrap();
        assert!(sig.is_signature());
        assert!(!sig.is_pom());
        assert_eq!(sig.kind(), MavenAssetKind::ArtifactSubordinate);
    }

    #[test]
    fn test_hash_sibling() {
        let path = MavenPath::parse("com/x/lib/1.0/lib-1.0.jar").unwrap();
        let md5 = path.hash(HashAlgorithm::Md5).unwrap();
        assert_eq!(md5.path(), "com/x/lib/1.0/lib-1.0.jar.md5");
        assert_eq!(md5.hash(HashAlgorithm::Sha512).unwrap().path(), "com/x/lib/1.0/lib-1.0.jar.sha512");
        assert!(path.hash(HashAlgorithm::Blake3).is_err());
    }

    #[test]
    fn test_parse_metadata_and_index() {
        let path = MavenPath::parse("/com/x/lib/maven-metadata.xml").unwrap();
        assert!(path.coordinates().is_none());
        assert!(path.is_metadata());
        assert_eq!(path.kind(), MavenAssetKind::RepositoryMetadata);

        let hash = MavenPath::parse("/com/x/lib/1.0/maven-metadata.xml.sha1").unwrap();
        assert!(hash.is_metadata());
        assert_eq!(hash.kind(), MavenAssetKind::RepositoryMetadata);

        let index = MavenPath::parse(".index/nexus-maven-repository-index.gz").unwrap();
        assert_eq!(index.kind(), MavenAssetKind::RepositoryIndex);
    }

    #[test]
    fn test_parse_non_layout_paths() {
        let path = MavenPath::parse("/readme.txt").unwrap();
        assert!(path.coordinates().is_none());
        assert_eq!(path.kind(), MavenAssetKind::Other);

        // artifact prefix does not match the directory
        let path = MavenPath::parse("com/x/lib/1.0/other-1.0.jar").unwrap();
        assert!(path.coordinates().is_none());

        assert!(MavenPath::parse("/").is_err());
        assert!(MavenPath::parse("com/x/").is_err());
        assert!(MavenPath::parse("com/../x/lib-1.0.jar").is_err());
    }

    #[test]
    fn test_version_helpers() {
        assert!(is_snapshot_version("1.0-SNAPSHOT"));
        assert!(is_snapshot_version("1.0-20240102.030405-7"));
        assert!(!is_snapshot_version("1.0"));
        assert_eq!(base_version_of("1.0-20240102.030405-7"), "1.0-SNAPSHOT");
        assert_eq!(base_version_of("1.0"), "1.0");
        assert_eq!(release_version_of("2.0-SNAPSHOT"), Some("2.0"));
        assert_eq!(release_version_of("2.0"), None);
    }

    #[test]
    fn test_metadata_paths() {
        let gav = Gav::new("com.x", "lib", "1.0");
        assert_eq!(MetadataLevel::Version.path(&gav), "/com/x/lib/1.0/maven-metadata.xml");
        assert_eq!(MetadataLevel::Artifact.path(&gav), "/com/x/lib/maven-metadata.xml");
        assert_eq!(MetadataLevel::Group.path(&gav), "/com/x/maven-metadata.xml");
        assert_eq!(metadata_path("com.x", None, Some("1.0")), "/com/x/maven-metadata.xml");
    }

    #[test]
    fn test_policies() {
        let release = MavenPath::parse("com/x/lib/1.0/lib-1.0.jar").unwrap();
        let snapshot = MavenPath::parse("com/x/lib/1.0-SNAPSHOT/lib-1.0-SNAPSHOT.jar").unwrap();
        let rc = release.coordinates().unwrap();
        let sc = snapshot.coordinates().unwrap();

        assert!(VersionPolicy::Release.permits(rc));
        assert!(!VersionPolicy::Release.permits(sc));
        assert!(VersionPolicy::Snapshot.permits(sc));
        assert!(!VersionPolicy::Snapshot.permits(rc));
        assert!(VersionPolicy::Mixed.permits(sc));

        let stray = MavenPath::parse("notes/readme.txt").unwrap();
        assert!(!LayoutPolicy::Strict.permits(&stray));
        assert!(LayoutPolicy::Permissive.permits(&stray));
        assert!(LayoutPolicy::Strict.permits(&release));
        assert!(LayoutPolicy::Strict.permits(&MavenPath::parse("archetype-catalog.xml").unwrap()));
    }

    #[test]
    fn test_attributes() {
        let path = MavenPath::parse("com/x/lib/1.0/lib-1.0-tests.jar").unwrap();
        let attrs = path.asset_attributes();
        let section = attrs.get(FORMAT_NAME).unwrap();
        assert_eq!(section[ATTR_CLASSIFIER], "tests");
        assert_eq!(section[ATTR_ASSET_KIND], "ARTIFACT");

        let attrs = component_attributes(path.coordinates().unwrap(), Some("jar"));
        assert_eq!(attrs[FORMAT_NAME][ATTR_BASE_VERSION], "1.0");
        assert_eq!(attrs[FORMAT_NAME][ATTR_PACKAGING], "jar");
    }

    proptest! {
        #[test]
        fn prop_layout_paths_round_trip(
            groups in prop::collection::vec("[a-z][a-z0-9]{0,6}", 1..4),
            artifact in "[a-z][a-z0-9]{0,8}",
            version in "[1-9][0-9]?\\.[0-9]{1,2}",
            ext in prop::sample::select(vec!["jar", "pom", "war", "zip"]),
        ) {
            let path = format!(
                "{}/{}/{}/{}-{}.{}",
                groups.join("/"), artifact, version, artifact, version, ext
            );
            let parsed = MavenPath::parse(&path).unwrap();
            let c = parsed.coordinates().unwrap();
            prop_assert_eq!(&c.group_id, &groups.join("."));
            prop_assert_eq!(&c.artifact_id, &artifact);
            prop_assert_eq!(&c.version, &version);
            prop_assert_eq!(c.extension.as_str(), ext);
            prop_assert_eq!(parsed.kind(), MavenAssetKind::Artifact);
        }
    }
}
