use arca_types::HashAlgorithm;
use md5::Md5;
use sha2::{Digest, Sha256};

use crate::error::HashResult;
use crate::tree::TreeHasher;

/// Running digest state for one algorithm.
///
/// An accumulator is not `Clone`: it is owned by exactly one strategy and
/// [`finalize`](Accumulator::finalize) consumes it, so a finalized digest
/// cannot be fed again.
pub enum Accumulator {
    Md5(Md5),
    Sha256(Sha256),
    TreeSha256(TreeHasher),
    Blake3(Box<blake3::Hasher>),
    Crc32(crc32fast::Hasher),
}

impl Accumulator {
    /// Fresh state for `algorithm`.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => Self::Md5(Md5::new()),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::TreeSha256 => Self::TreeSha256(TreeHasher::new()),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Crc32 => Self::Crc32(crc32fast::Hasher::new()),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            Self::Md5(_) => HashAlgorithm::Md5,
            Self::Sha256(_) => HashAlgorithm::Sha256,
            Self::TreeSha256(_) => HashAlgorithm::TreeSha256,
            Self::Blake3(_) => HashAlgorithm::Blake3,
            Self::Crc32(_) => HashAlgorithm::Crc32,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::TreeSha256(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
            Self::Crc32(h) => h.update(data),
        }
    }

    /// Finish the digest as lowercase hex.
    ///
    /// Only the tree hash can fail, when no byte was ever fed.
    pub fn finalize(self) -> HashResult<String> {
        Ok(match self {
            Self::Md5(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::TreeSha256(h) => h.finalize()?.to_hex(),
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
            Self::Crc32(h) => format!("{:08x}", h.finalize()),
        })
    }
}

/// One-shot digest of `data` as lowercase hex.
pub fn digest_hex(algorithm: HashAlgorithm, data: &[u8]) -> HashResult<String> {
    let mut acc = Accumulator::new(algorithm);
    acc.update(data);
    acc.finalize()
}
