use arca_types::{part_count, HashAlgorithm};
use serde::{Deserialize, Serialize};

use crate::error::{UploadError, UploadResult};

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;

/// Part-size limits and hash requirements of one backend.
///
/// The signing algorithm produces the per-part hash used to authenticate
/// requests; the content algorithm produces the per-part integrity hash the
/// backend checks on receipt. They are configured independently and only
/// coincide when both name the same algorithm.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartUploadInfo {
    pub part_size: u64,
    pub min_part_size: u64,
    pub max_part_size: u64,
    pub max_parts: u64,
    /// Part sizes must be 1 MiB times a power of two.
    pub power_of_two_parts: bool,
    pub signing_algorithm: HashAlgorithm,
    pub content_algorithm: HashAlgorithm,
    /// Whole-content hashes the backend needs at completion.
    pub required_algorithms: Vec<HashAlgorithm>,
}

impl MultipartUploadInfo {
    /// S3-style object storage: 5 MiB to 5 GiB parts, MD5 content check.
    pub fn object_storage() -> Self {
        Self {
            part_size: 8 * MIB,
            min_part_size: 5 * MIB,
            max_part_size: 5 * GIB,
            max_parts: 10_000,
            power_of_two_parts: false,
            signing_algorithm: HashAlgorithm::Sha256,
            content_algorithm: HashAlgorithm::Md5,
            required_algorithms: vec![HashAlgorithm::Md5, HashAlgorithm::Sha256],
        }
    }

    /// Glacier-style cold archive: power-of-two MiB parts, tree-hash check.
    pub fn cold_archive() -> Self {
        Self {
            part_size: 8 * MIB,
            min_part_size: MIB,
            max_part_size: 4 * GIB,
            max_parts: 10_000,
            power_of_two_parts: true,
            signing_algorithm: HashAlgorithm::Sha256,
            content_algorithm: HashAlgorithm::TreeSha256,
            required_algorithms: vec![HashAlgorithm::TreeSha256, HashAlgorithm::Sha256],
        }
    }

    /// Replace the configured part size after checking it against the limits.
    pub fn with_part_size(mut self, part_size: u64) -> UploadResult<Self> {
        self.validate_part_size(part_size)?;
        self.part_size = part_size;
        Ok(self)
    }

    pub fn validate_part_size(&self, part_size: u64) -> UploadResult<()> {
        let invalid = |reason: String| UploadError::InvalidPartSize { part_size, reason };
        if part_size < self.min_part_size {
            return Err(invalid(format!("below minimum of {}", self.min_part_size)));
        }
        if part_size > self.max_part_size {
            return Err(invalid(format!("above maximum of {}", self.max_part_size)));
        }
        if self.power_of_two_parts && !is_power_of_two_mib(part_size) {
            return Err(invalid("must be 1 MiB times a power of two".into()));
        }
        Ok(())
    }

    /// Number of parts `content_length` splits into at the configured size.
    pub fn validate_content_length(&self, content_length: u64) -> UploadResult<u64> {
        if content_length == 0 {
            return Err(UploadError::EmptyContent);
        }
        let parts = part_count(self.part_size, content_length)?;
        if parts > self.max_parts {
            return Err(UploadError::TooManyParts {
                parts,
                max: self.max_parts,
            });
        }
        Ok(parts)
    }

    /// Smallest valid part size, no smaller than the configured one, that
    /// keeps `content_length` within the part-count limit.
    pub fn fit_part_size(&self, content_length: u64) -> UploadResult<u64> {
        let needed = content_length.div_ceil(self.max_parts.max(1));
        if needed <= self.part_size {
            return Ok(self.part_size);
        }
        let mib = needed.div_ceil(MIB);
        let size = if self.power_of_two_parts {
            mib.next_power_of_two().saturating_mul(MIB)
        } else {
            mib.saturating_mul(MIB)
        };
        if size > self.max_part_size {
            return Err(UploadError::TooManyParts {
                parts: part_count(self.max_part_size, content_length)?,
                max: self.max_parts,
            });
        }
        Ok(size)
    }
}

fn is_power_of_two_mib(size: u64) -> bool {
    size % MIB == 0 && (size / MIB).is_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn object_storage_limits() {
        let info = MultipartUploadInfo::object_storage();
        assert!(info.validate_part_size(5 * MIB).is_ok());
        assert!(info.validate_part_size(5 * MIB + 1).is_ok());
        assert!(matches!(
            info.validate_part_size(MIB),
            Err(UploadError::InvalidPartSize { .. })
        ));
        assert!(info.validate_part_size(6 * GIB).is_err());
        assert_eq!(info.content_algorithm, HashAlgorithm::Md5);
        assert_eq!(info.signing_algorithm, HashAlgorithm::Sha256);
    }

    #[test]
    fn cold_archive_requires_power_of_two() {
        let info = MultipartUploadInfo::cold_archive();
        assert!(info.validate_part_size(MIB).is_ok());
        assert!(info.validate_part_size(64 * MIB).is_ok());
        assert!(info.validate_part_size(4 * GIB).is_ok());
        assert!(info.validate_part_size(3 * MIB).is_err());
        assert!(info.validate_part_size(MIB + 1).is_err());
        assert!(info.validate_part_size(8 * GIB).is_err());
    }

    #[test]
    fn with_part_size_rejects_invalid() {
        assert!(MultipartUploadInfo::cold_archive().with_part_size(5 * MIB).is_err());
        let info = MultipartUploadInfo::cold_archive().with_part_size(2 * MIB).unwrap();
        assert_eq!(info.part_size, 2 * MIB);
    }

    #[test]
    fn content_length_checks() {
        let info = MultipartUploadInfo::object_storage();
        assert!(matches!(
            info.validate_content_length(0),
            Err(UploadError::EmptyContent)
        ));
        assert_eq!(info.validate_content_length(1).unwrap(), 1);
        assert_eq!(info.validate_content_length(8 * MIB + 1).unwrap(), 2);
        assert!(matches!(
            info.validate_content_length(10_001 * 8 * MIB),
            Err(UploadError::TooManyParts { parts: 10_001, max: 10_000 })
        ));
    }

    #[test]
    fn fit_keeps_configured_size_when_possible() {
        let info = MultipartUploadInfo::object_storage();
        assert_eq!(info.fit_part_size(100 * MIB).unwrap(), 8 * MIB);
    }

    #[test]
    fn fit_grows_part_size_for_large_content() {
        let info = MultipartUploadInfo::object_storage();
        let len = 200 * GIB;
        let size = info.fit_part_size(len).unwrap();
        assert!(part_count(size, len).unwrap() <= 10_000);
        assert_eq!(size % MIB, 0);
        assert!(part_count(size - MIB, len).unwrap() > 10_000);

        let archive = MultipartUploadInfo::cold_archive();
        let size = archive.fit_part_size(len).unwrap();
        assert!(is_power_of_two_mib(size));
        assert_eq!(size, 32 * MIB);
    }

    #[test]
    fn fit_fails_beyond_backend_capacity() {
        let info = MultipartUploadInfo::cold_archive();
        assert!(matches!(
            info.fit_part_size(50_000 * GIB),
            Err(UploadError::TooManyParts { .. })
        ));
    }

    proptest! {
        #[test]
        fn fitted_part_size_is_accepted(len in 1u64..60_000 * GIB, archive in any::<bool>()) {
            let info = if archive {
                MultipartUploadInfo::cold_archive()
            } else {
                MultipartUploadInfo::object_storage()
            };
            let capacity = info.max_part_size * info.max_parts;
            match info.fit_part_size(len) {
                Ok(size) => {
                    prop_assert!(size >= info.part_size);
                    let fitted = info.clone().with_part_size(size).unwrap();
                    prop_assert!(fitted.validate_content_length(len).is_ok());
                }
                Err(_) => prop_assert!(len > capacity),
            }
        }
    }
}
