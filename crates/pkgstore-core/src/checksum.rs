//! Checksum verification and hashing algorithm support
//!
//! Blobs are content addressed by SHA-256; package formats additionally ask for
//! the legacy digests their clients expect (SHA-1 and MD5 for Maven and APT).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ContentError, Result};

/// Supported hashing algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// MD5, only for client compatibility
    Md5,
    /// SHA-1, only for client compatibility
    Sha1,
    /// SHA-256, the content address of every blob
    Sha256,
    /// SHA-512
    Sha512,
    /// SHA3-256
    Sha3_256,
    /// BLAKE3
    Blake3,
}

/// Digests keyed by algorithm, hex encoded
pub type Digests = BTreeMap<HashAlgorithm, String>;

impl HashAlgorithm {
    /// Algorithm used to address blob content
    pub const CONTENT_ADDRESS: HashAlgorithm = HashAlgorithm::Sha256;

    /// Get the expected length of the hash in bytes
    pub fn hash_length(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
            HashAlgorithm::Sha3_256 => 32,
            HashAlgorithm::Blake3 => 32,
        }
    }

    /// Get the expected length of the hash in hexadecimal characters
    pub fn hex_length(&self) -> usize {
        self.hash_length() * 2
    }

    /// File extension of a sidecar file carrying this digest, if the
    /// algorithm has one in repository layouts
    pub fn file_extension(&self) -> Option<&'static str> {
        match self {
            HashAlgorithm::Md5 => Some("md5"),
            HashAlgorithm::Sha1 => Some("sha1"),
            HashAlgorithm::Sha256 => Some("sha256"),
            HashAlgorithm::Sha512 => Some("sha512"),
            HashAlgorithm::Sha3_256 | HashAlgorithm::Blake3 => None,
        }
    }

    /// Inverse of [`HashAlgorithm::file_extension`]
    pub fn from_file_extension(ext: &str) -> Option<Self> {
        match ext {
            "md5" => Some(HashAlgorithm::Md5),
            "sha1" => Some(HashAlgorithm::Sha1),
            "sha256" => Some(HashAlgorithm::Sha256),
            "sha512" => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Validate that a hash string has the correct length for this algorithm
    pub fn validate_hash_format(&self, hash: &str) -> Result<()> {
        let expected_len = self.hex_length();
        let actual_len = hash.len();

        if actual_len != expected_len {
            return Err(ContentError::ValidationError(format!(
                "Invalid hash length for {}: expected {} characters, got {}",
                self, expected_len, actual_len
            )));
        }

        if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ContentError::ValidationError(
                "Invalid hash format: must be hexadecimal string".to_string(),
            ));
        }

        Ok(())
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Md5 => write!(f, "MD5"),
            HashAlgorithm::Sha1 => write!(f, "SHA1"),
            HashAlgorithm::Sha256 => write!(f, "SHA256"),
            HashAlgorithm::Sha512 => write!(f, "SHA512"),
            HashAlgorithm::Sha3_256 => write!(f, "SHA3-256"),
            HashAlgorithm::Blake3 => write!(f, "BLAKE3"),
        }
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::CONTENT_ADDRESS
    }
}

impl FromStr for HashAlgorithm {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "MD5" => Ok(HashAlgorithm::Md5),
            "SHA1" | "SHA-1" => Ok(HashAlgorithm::Sha1),
            "SHA256" | "SHA-256" => Ok(HashAlgorithm::Sha256),
            "SHA512" | "SHA-512" => Ok(HashAlgorithm::Sha512),
            "SHA3-256" | "SHA3_256" => Ok(HashAlgorithm::Sha3_256),
            "BLAKE3" => Ok(HashAlgorithm::Blake3),
            _ => Err(ContentError::ValidationError(format!(
                "Invalid hash algorithm: {}",
                s
            ))),
        }
    }
}

/// A hash value along with the algorithm used to compute it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    /// The hashing algorithm used
    pub algorithm: HashAlgorithm,
    /// The hash value as a hexadecimal string
    pub value: String,
}

impl Checksum {
    /// Create a new checksum with validation
    ///
    /// # Errors
    /// Returns an error if the hash value format is invalid for the algorithm
    pub fn new(algorithm: HashAlgorithm, value: String) -> Result<Self> {
        let normalized_value = value.to_lowercase();
        algorithm.validate_hash_format(&normalized_value)?;

        Ok(Self {
            algorithm,
            value: normalized_value,
        })
    }

    /// Verify if this checksum matches another checksum
    pub fn verify(&self, other: &Checksum) -> bool {
        self.algorithm == other.algorithm && self.value == other.value
    }

    /// Verify if this checksum matches a raw hash value, ignoring case
    pub fn verify_hash(&self, hash_value: &str) -> bool {
        self.value == hash_value.to_lowercase()
    }

    /// Fail with [`ContentError::ChecksumMismatch`] unless `hash_value` matches
    pub fn ensure_matches(&self, hash_value: &str) -> Result<()> {
        if self.verify_hash(hash_value) {
            Ok(())
        } else {
            Err(ContentError::ChecksumMismatch {
                expected: self.value.clone(),
                actual: hash_value.to_lowercase(),
            })
        }
    }

    /// Get a reference to the hash value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Get the algorithm used
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}
