//! Test fixtures
//!
//! Payload builders for Maven and Debian content.

/// Path of a main Maven artifact
pub fn artifact_path(group: &str, artifact: &str, version: &str, extension: &str) -> String {
    let base = pkgstore_core::maven::base_version_of(version);
    format!(
        "{}/{}/{}/{}-{}.{}",
        group.replace('.', "/"),
        artifact,
        base,
        artifact,
        version,
        extension
    )
}

/// Timestamped snapshot version for build `n` of a `-SNAPSHOT` line
pub fn timestamped(release: &str, n: u32) -> String {
    format!("{}-20240101.{:06}-{}", release, n, n)
}

/// A POM declaring the given packaging
pub fn pom(group: &str, artifact: &str, version: &str, packaging: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>{}</groupId>
  <artifactId>{}</artifactId>
  <version>{}</version>
  <packaging>{}</packaging>
</project>
"#,
        group, artifact, version, packaging
    )
}

/// Artifact-level or version-level `maven-metadata.xml`
pub fn metadata_xml(group: &str, artifact: &str, versions: &[&str]) -> String {
    let versions: String = versions
        .iter()
        .map(|v| format!("<version>{}</version>", v))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>{}</groupId>
  <artifactId>{}</artifactId>
  <versioning><versions>{}</versions></versioning>
</metadata>
"#,
        group, artifact, versions
    )
}

/// Group-level `maven-metadata.xml`
pub fn group_metadata_xml(prefix: &str) -> String {
    format!(
        "<metadata><plugins><plugin><prefix>{}</prefix><artifactId>{}-maven-plugin</artifactId></plugin></plugins></metadata>",
        prefix, prefix
    )
}

const AR_MAGIC: &[u8] = b"!<arch>\n";
const TAR_BLOCK: usize = 512;

fn ar_member(name: &str, data: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "{:<16}{:<12}{:<6}{:<6}{:<8}{:<10}`\n",
        name,
        0,
        0,
        0,
        100644,
        data.len()
    )
    .into_bytes();
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(b'\n');
    }
    out
}

fn tar_file(name: &str, data: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; TAR_BLOCK];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out[124..136].copy_from_slice(format!("{:011o}\0", data.len()).as_bytes());
    out[156] = b'0';

    out.extend_from_slice(data);
    out.resize(out.len() + (TAR_BLOCK - data.len() % TAR_BLOCK) % TAR_BLOCK, 0);
    out.resize(out.len() + TAR_BLOCK * 2, 0);
    out
}

/// A Debian binary package with an uncompressed control archive
pub fn deb(package: &str, version: &str, architecture: &str) -> Vec<u8> {
    let control = format!(
        "Package: {}\nVersion: {}\nArchitecture: {}\nMaintainer: Test <test@example.com>\nDescription: test package\n",
        package, version, architecture
    );
    let mut out = AR_MAGIC.to_vec();
    out.extend(ar_member("debian-binary", b"2.0\n"));
    out.extend(ar_member("control.tar", &tar_file("./control", control.as_bytes())));
    out.extend(ar_member("data.tar", &[0u8; TAR_BLOCK * 2]));
    out
}
