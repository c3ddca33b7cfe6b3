//! Single-pass multi-algorithm hashing

use md5::Md5;
use pkgstore_core::checksum::{Digests, HashAlgorithm};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use sha3::Sha3_256;

enum Hasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
    Sha3_256(Sha3_256),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => Hasher::Md5(Md5::new()),
            HashAlgorithm::Sha1 => Hasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
            HashAlgorithm::Sha3_256 => Hasher::Sha3_256(Sha3_256::new()),
            HashAlgorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(h) => h.update(data),
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
            Hasher::Sha3_256(h) => h.update(data),
            Hasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize(self) -> String {
        match self {
            Hasher::Md5(h) => format!("{:x}", h.finalize()),
            Hasher::Sha1(h) => format!("{:x}", h.finalize()),
            Hasher::Sha256(h) => format!("{:x}", h.finalize()),
            Hasher::Sha512(h) => format!("{:x}", h.finalize()),
            Hasher::Sha3_256(h) => format!("{:x}", h.finalize()),
            Hasher::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Computes several digests over one stream of bytes
///
/// SHA-256 is always included since it is the content address.
pub struct MultiHasher {
    hashers: Vec<(HashAlgorithm, Hasher)>,
    size: u64,
}

impl MultiHasher {
    pub fn new(algorithms: &[HashAlgorithm]) -> Self {
        let mut selected: Vec<HashAlgorithm> = algorithms.to_vec();
        selected.push(HashAlgorithm::CONTENT_ADDRESS);
        selected.sort();
        selected.dedup();

        Self {
            hashers: selected
                .into_iter()
                .map(|alg| (alg, Hasher::new(alg)))
                .collect(),
            size: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        for (_, hasher) in &mut self.hashers {
            hasher.update(data);
        }
        self.size += data.len() as u64;
    }

    /// Bytes seen so far
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn finalize(self) -> (Digests, u64) {
        let digests = self
            .hashers
            .into_iter()
            .map(|(alg, hasher)| (alg, hasher.finalize()))
            .collect();
        (digests, self.size)
    }
}

/// Hash an in-memory buffer
pub fn digest_bytes(algorithms: &[HashAlgorithm], data: &[u8]) -> Digests {
    let mut hasher = MultiHasher::new(algorithms);
    hasher.update(data);
    hasher.finalize().0
}
