//! Structured-content readers for staged payloads
//!
//! Only the handful of fields the facets need are extracted. POM reading is
//! advisory; metadata validation and package control reading are not.

use once_cell::sync::Lazy;
use pkgstore_core::apt::PackageInfo;
use pkgstore_core::maven::MavenPath;
use regex::Regex;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};

/// Packaging Maven assumes when a POM declares none
pub const DEFAULT_PACKAGING: &str = "jar";

static XML_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));

static PROJECT_ROOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<project[\s>]").expect("valid project regex"));

static METADATA_ROOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<metadata[\s>/]").expect("valid metadata regex"));

/// Blocks whose nested coordinates would shadow the project's own
static NESTED_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<(parent|dependencies|dependencyManagement|build|profiles|reporting|plugins|versioning)\b.*?</(parent|dependencies|dependencyManagement|build|profiles|reporting|plugins|versioning)>",
    )
    .expect("valid nested block regex")
});

static PACKAGING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<packaging>\s*([^<\s]+)\s*</packaging>").expect("valid packaging regex")
});

static GROUP_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<groupId>\s*([^<]*?)\s*</groupId>").expect("valid groupId regex"));

static ARTIFACT_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<artifactId>\s*([^<]*?)\s*</artifactId>").expect("valid artifactId regex")
});

fn as_text(bytes: &[u8], what: &str) -> ServiceResult<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ServiceError::ValidationFailed(format!("{} is not valid UTF-8", what)))?;
    Ok(XML_COMMENT.replace_all(text, "").into_owned())
}

/// Fields read from a project descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomModel {
    pub packaging: String,
}

/// Reads the packaging of a project descriptor
pub struct PomReader;

impl PomReader {
    pub fn read(bytes: &[u8]) -> ServiceResult<PomModel> {
        let text = as_text(bytes, "project descriptor")?;
        if !PROJECT_ROOT.is_match(&text) {
            return Err(ServiceError::ValidationFailed(
                "project descriptor lacks a <project> root".to_string(),
            ));
        }

        let top_level = NESTED_BLOCKS.replace_all(&text, "");
        let packaging = PACKAGING
            .captures(&top_level)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| DEFAULT_PACKAGING.to_string());

        Ok(PomModel { packaging })
    }
}

/// Checks `maven-metadata.xml` uploads against the path they are stored at
pub struct MetadataValidator;

impl MetadataValidator {
    pub fn validate(path: &MavenPath, bytes: &[u8]) -> ServiceResult<()> {
        let text = as_text(bytes, "metadata")?;
        if !METADATA_ROOT.is_match(&text) {
            return Err(ServiceError::ValidationFailed(format!(
                "{} lacks a <metadata> root",
                path.asset_path()
            )));
        }

        // directory segments above the file name
        let segments: Vec<&str> = path.path().split('/').collect();
        let directories = &segments[..segments.len().saturating_sub(1)];
        let top_level = NESTED_BLOCKS.replace_all(&text, "");

        if let Some(group_id) = GROUP_ID.captures(&top_level).and_then(|c| c.get(1)) {
            let group_segments: Vec<&str> = group_id.as_str().split('.').collect();
            if !directories.starts_with(&group_segments) {
                return Err(ServiceError::ValidationFailed(format!(
                    "groupId {} does not match metadata path {}",
                    group_id.as_str(),
                    path.asset_path()
                )));
            }
        }

        if let Some(artifact_id) = ARTIFACT_ID.captures(&top_level).and_then(|c| c.get(1)) {
            if !directories.contains(&artifact_id.as_str()) {
                return Err(ServiceError::ValidationFailed(format!(
                    "artifactId {} does not match metadata path {}",
                    artifact_id.as_str(),
                    path.asset_path()
                )));
            }
        }

        debug!(path = %path.asset_path(), "Metadata validated");
        Ok(())
    }
}

const AR_MAGIC: &[u8] = b"!<arch>\n";
const AR_HEADER_LEN: usize = 60;
const TAR_BLOCK: usize = 512;

fn corrupt(msg: impl Into<String>) -> ServiceError {
    ServiceError::ValidationFailed(format!("corrupt package archive: {}", msg.into()))
}

fn parse_decimal(field: &[u8]) -> Option<usize> {
    std::str::from_utf8(field).ok()?.trim().parse().ok()
}

fn parse_octal(field: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(field).ok()?;
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if text.is_empty() {
        return Some(0);
    }
    usize::from_str_radix(text, 8).ok()
}

/// Iterates over the members of an ar archive
struct ArMembers<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for ArMembers<'a> {
    type Item = ServiceResult<(&'a str, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }
        let header_end = self.offset + AR_HEADER_LEN;
        if header_end > self.data.len() {
            self.offset = self.data.len();
            return Some(Err(corrupt("truncated member header")));
        }

        let header = &self.data[self.offset..header_end];
        if &header[58..60] != b"`\n" {
            self.offset = self.data.len();
            return Some(Err(corrupt("bad member header terminator")));
        }

        let name = std::str::from_utf8(&header[0..16])
            .map(|n| n.trim_end().trim_end_matches('/'))
            .unwrap_or("");
        let size = match parse_decimal(&header[48..58]) {
            Some(size) => size,
            None => {
                self.offset = self.data.len();
                return Some(Err(corrupt("bad member size")));
            }
        };

        let body_end = header_end + size;
        if body_end > self.data.len() {
            self.offset = self.data.len();
            return Some(Err(corrupt(format!("member {} is truncated", name))));
        }

        // members are aligned to even offsets
        self.offset = body_end + (size % 2);
        Some(Ok((name, &self.data[header_end..body_end])))
    }
}

/// Find a regular file in an uncompressed tar stream
fn tar_entry<'a>(data: &'a [u8], wanted: &[&str]) -> ServiceResult<Option<&'a [u8]>> {
    let mut offset = 0;
    while offset + TAR_BLOCK <= data.len() {
        let header = &data[offset..offset + TAR_BLOCK];
        if header.iter().all(|b| *b == 0) {
            return Ok(None);
        }

        let name_end = header[..100].iter().position(|b| *b == 0).unwrap_or(100);
        let name = std::str::from_utf8(&header[..name_end])
            .map_err(|_| corrupt("non UTF-8 control entry name"))?;
        let size = parse_octal(&header[124..136]).ok_or_else(|| corrupt("bad control entry size"))?;
        let body_start = offset + TAR_BLOCK;
        let body_end = body_start + size;
        if body_end > data.len() {
            return Err(corrupt(format!("control entry {} is truncated", name)));
        }

        let is_file = matches!(header[156], b'0' | 0);
        if is_file && wanted.contains(&name) {
            return Ok(Some(&data[body_start..body_end]));
        }

        offset = body_start + size.div_ceil(TAR_BLOCK) * TAR_BLOCK;
    }
    Ok(None)
}

/// Reads package control fields from a binary package
pub struct DebPackageReader;

impl DebPackageReader {
    /// Package info from the control file
    ///
    /// `Ok(None)` when the payload is not an ar archive or its control member
    /// is compressed; the caller falls back to the file name.
    pub fn read(bytes: &[u8]) -> ServiceResult<Option<PackageInfo>> {
        let Some(body) = bytes.strip_prefix(AR_MAGIC) else {
            return Ok(None);
        };

        let members = ArMembers { data: body, offset: 0 };
        for member in members {
            let (name, data) = member?;
            if !name.starts_with("control.tar") {
                continue;
            }
            if name != "control.tar" {
                debug!(member = name, "Compressed control member, not read");
                return Ok(None);
            }

            let control = tar_entry(data, &["./control", "control"])?
                .ok_or_else(|| corrupt("control member has no control file"))?;
            let control = std::str::from_utf8(control)
                .map_err(|_| corrupt("control file is not UTF-8"))?;
            return Ok(Some(PackageInfo::from_control(control)?));
        }

        Ok(None)
    }
}
