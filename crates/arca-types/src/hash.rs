use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::range::ByteRange;

/// Digest algorithms a hash strategy can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "md5")]
    Md5,
    #[serde(rename = "sha256")]
    Sha256,
    /// SHA-256 tree hash over 1 MiB sub-chunks.
    #[serde(rename = "sha256-tree")]
    TreeSha256,
    #[serde(rename = "blake3")]
    Blake3,
    #[serde(rename = "crc32")]
    Crc32,
}

impl HashAlgorithm {
    /// Every supported algorithm.
    pub const ALL: [HashAlgorithm; 5] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha256,
        HashAlgorithm::TreeSha256,
        HashAlgorithm::Blake3,
        HashAlgorithm::Crc32,
    ];

    /// Canonical name used in hash records and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::TreeSha256 => "sha256-tree",
            HashAlgorithm::Blake3 => "blake3",
            HashAlgorithm::Crc32 => "crc32",
        }
    }

    /// Length of the finalized hex value.
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Crc32 => 8,
            HashAlgorithm::Sha256 | HashAlgorithm::TreeSha256 | HashAlgorithm::Blake3 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HashAlgorithm::ALL
            .into_iter()
            .find(|alg| alg.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TypeError::UnknownAlgorithm(s.to_string()))
    }
}

/// A finalized hash value.
///
/// A hash without a range covers the whole content. Once built a `Hash` is
/// never modified; it serializes to the compact [`HashRecord`] form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "HashRecord", into = "HashRecord")]
pub struct Hash {
    algorithm: HashAlgorithm,
    value: String,
    range: Option<ByteRange>,
}

impl Hash {
    /// A whole-content hash.
    pub fn new(algorithm: HashAlgorithm, value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.is_empty() {
            return Err(TypeError::EmptyHashValue);
        }
        Ok(Self {
            algorithm,
            value,
            range: None,
        })
    }

    /// A hash over `range` only.
    pub fn with_range(
        algorithm: HashAlgorithm,
        value: impl Into<String>,
        range: ByteRange,
    ) -> Result<Self, TypeError> {
        let mut hash = Self::new(algorithm, value)?;
        hash.range = Some(range);
        Ok(hash)
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The textual hash value (lowercase hex for locally computed hashes).
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn range(&self) -> Option<ByteRange> {
        self.range
    }

    /// Returns `true` if this hash covers the whole content.
    pub fn is_whole_content(&self) -> bool {
        self.range.is_none()
    }

    /// Same algorithm, same range and a case-insensitively equal value.
    pub fn matches(&self, other: &Hash) -> bool {
        self.algorithm == other.algorithm
            && self.range == other.range
            && self.value.eq_ignore_ascii_case(&other.value)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range {
            Some(range) => write!(f, "{}[{}]:{}", self.algorithm, range, self.value),
            None => write!(f, "{}:{}", self.algorithm, self.value),
        }
    }
}

/// Wire and persisted form of a [`Hash`].
///
/// `offset` is the first covered byte. `length` is the content length up to
/// and including the last covered byte, so it is always greater than
/// `offset`. Both are omitted for whole-content hashes. An `offset` of zero
/// without a `length` also means whole content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRecord {
    pub hash_algorithm: String,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

impl From<Hash> for HashRecord {
    fn from(hash: Hash) -> Self {
        let (offset, length) = match hash.range {
            Some(range) => (Some(range.from()), Some(range.end_exclusive())),
            None => (None, None),
        };
        Self {
            hash_algorithm: hash.algorithm.as_str().to_string(),
            hash: hash.value,
            offset,
            length,
        }
    }
}

impl TryFrom<HashRecord> for Hash {
    type Error = TypeError;

    fn try_from(record: HashRecord) -> Result<Self, Self::Error> {
        let algorithm: HashAlgorithm = record.hash_algorithm.parse()?;
        let range = match (record.offset, record.length) {
            (None, None) => None,
            (Some(0), None) => None,
            (Some(offset), None) => return Err(TypeError::MissingLength(offset)),
            (offset, Some(length)) => {
                let offset = offset.unwrap_or(0);
                if length <= offset {
                    return Err(TypeError::LengthNotPastOffset { offset, length });
                }
                Some(ByteRange::new(offset, length - 1)?)
            }
        };
        match range {
            Some(range) => Hash::with_range(algorithm, record.hash, range),
            None => Hash::new(algorithm, record.hash),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn algorithm_names_roundtrip() {
        for alg in HashAlgorithm::ALL {
            assert_eq!(alg.as_str().parse::<HashAlgorithm>().unwrap(), alg);
            let json = serde_json::to_string(&alg).unwrap();
            assert_eq!(json, format!("\"{}\"", alg.as_str()));
        }
        assert_eq!("SHA256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert!(matches!(
            "sha512".parse::<HashAlgorithm>(),
            Err(TypeError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn whole_content_hash_omits_range_fields() {
        let h = Hash::new(HashAlgorithm::Md5, "5eb63bbbe01eeed093cb22bb8f5acdc3").unwrap();
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(
            json,
            r#"{"hash_algorithm":"md5","hash":"5eb63bbbe01eeed093cb22bb8f5acdc3"}"#
        );
    }

    #[test]
    fn ranged_hash_serializes_offset_and_length() {
        let range = ByteRange::new(1_048_576, 2_097_151).unwrap();
        let h = Hash::with_range(HashAlgorithm::Sha256, "ab", range).unwrap();
        let value = serde_json::to_value(&h).unwrap();
        assert_eq!(value["offset"], 1_048_576);
        assert_eq!(value["length"], 2_097_152);
    }

    #[test]
    fn missing_algorithm_is_rejected() {
        let err = serde_json::from_str::<Hash>(r#"{"hash":"abc"}"#).unwrap_err();
        assert!(err.to_string().contains("hash_algorithm"));
    }

    #[test]
    fn missing_value_is_rejected() {
        let err = serde_json::from_str::<Hash>(r#"{"hash_algorithm":"md5"}"#).unwrap_err();
        assert!(err.to_string().contains("hash"));
    }

    #[test]
    fn empty_value_is_rejected() {
        assert_eq!(Hash::new(HashAlgorithm::Md5, ""), Err(TypeError::EmptyHashValue));
    }

    #[test]
    fn length_not_past_offset_is_rejected() {
        let record = HashRecord {
            hash_algorithm: "sha256".into(),
            hash: "ab".into(),
            offset: Some(10),
            length: Some(10),
        };
        assert_eq!(
            Hash::try_from(record),
            Err(TypeError::LengthNotPastOffset {
                offset: 10,
                length: 10
            })
        );
        assert!(serde_json::from_str::<Hash>(
            r#"{"hash_algorithm":"sha256","hash":"ab","offset":10,"length":4}"#
        )
        .is_err());
    }

    #[test]
    fn negative_offset_is_rejected() {
        assert!(serde_json::from_str::<Hash>(
            r#"{"hash_algorithm":"sha256","hash":"ab","offset":-1,"length":10}"#
        )
        .is_err());
        assert!(serde_json::from_str::<Hash>(
            r#"{"hash_algorithm":"sha256","hash":"ab","length":-4}"#
        )
        .is_err());
    }

    #[test]
    fn offsets_past_i64_roundtrip() {
        let range = ByteRange::new(1 << 63, u64::MAX - 1).unwrap();
        let h = Hash::with_range(HashAlgorithm::Sha256, "ab", range).unwrap();
        let value = serde_json::to_value(&h).unwrap();
        assert_eq!(value["offset"], 1u64 << 63);
        assert_eq!(value["length"], u64::MAX);

        let parsed: Hash = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, h);
    }

    #[test]
    fn zero_offset_without_length_is_whole_content() {
        let h: Hash =
            serde_json::from_str(r#"{"hash_algorithm":"md5","hash":"ab","offset":0}"#).unwrap();
        assert!(h.is_whole_content());
    }

    #[test]
    fn nonzero_offset_without_length_is_rejected() {
        assert!(serde_json::from_str::<Hash>(
            r#"{"hash_algorithm":"md5","hash":"ab","offset":5}"#
        )
        .is_err());
    }

    #[test]
    fn length_without_offset_starts_at_zero() {
        let h: Hash =
            serde_json::from_str(r#"{"hash_algorithm":"md5","hash":"ab","length":4}"#).unwrap();
        assert_eq!(h.range(), Some(ByteRange::new(0, 3).unwrap()));
    }

    #[test]
    fn matches_ignores_value_case() {
        let a = Hash::new(HashAlgorithm::Sha256, "ABCDEF").unwrap();
        let b = Hash::new(HashAlgorithm::Sha256, "abcdef").unwrap();
        let c = Hash::new(HashAlgorithm::Blake3, "abcdef").unwrap();
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
    }

    fn arb_algorithm() -> impl Strategy<Value = HashAlgorithm> {
        prop::sample::select(HashAlgorithm::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn json_roundtrip(
            alg in arb_algorithm(),
            value in "[0-9a-f]{8,64}",
            range in prop::option::of((0u64..u64::MAX, 0u64..u64::MAX)),
        ) {
            let h = match range {
                Some((a, b)) => {
                    let r = ByteRange::new(a.min(b), a.max(b)).unwrap();
                    Hash::with_range(alg, value, r).unwrap()
                }
                None => Hash::new(alg, value).unwrap(),
            };
            let json = serde_json::to_string(&h).unwrap();
            let parsed: Hash = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(parsed, h);
        }
    }
}
