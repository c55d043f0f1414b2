use arca_types::{ByteRange, Hash};
use serde::{Deserialize, Serialize};

use crate::error::{UploadError, UploadResult};

/// One chunk of an upload together with the hashes sent alongside it.
///
/// Both hashes cover exactly `range`. Part numbers start at 1.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPart")]
pub struct UploadPart {
    number: u32,
    range: ByteRange,
    signing_hash: Hash,
    content_hash: Hash,
}

#[derive(Deserialize)]
struct RawPart {
    number: u32,
    range: ByteRange,
    signing_hash: Hash,
    content_hash: Hash,
}

impl TryFrom<RawPart> for UploadPart {
    type Error = UploadError;

    fn try_from(raw: RawPart) -> Result<Self, Self::Error> {
        UploadPart::new(raw.number, raw.range, raw.signing_hash, raw.content_hash)
    }
}

impl UploadPart {
    pub fn new(number: u32, range: ByteRange, signing_hash: Hash, content_hash: Hash) -> UploadResult<Self> {
        let invalid = |reason: String| UploadError::InvalidPart { number, reason };
        if number == 0 {
            return Err(invalid("part numbers start at 1".into()));
        }
        for hash in [&signing_hash, &content_hash] {
            if hash.range() != Some(range) {
                return Err(invalid(format!("{} hash does not cover bytes {range}", hash.algorithm())));
            }
        }
        Ok(Self {
            number,
            range,
            signing_hash,
            content_hash,
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn range(&self) -> ByteRange {
        self.range
    }

    pub fn len(&self) -> u64 {
        self.range.length()
    }

    /// Always `false`; ranges are never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Hash used to authenticate the part request.
    pub fn signing_hash(&self) -> &Hash {
        &self.signing_hash
    }

    /// Hash the backend checks the received bytes against.
    pub fn content_hash(&self) -> &Hash {
        &self.content_hash
    }
}

/// What a backend acknowledged for one transmitted part.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartReceipt {
    pub number: u32,
    /// Backend-assigned part tag, when the backend issues one.
    pub etag: Option<String>,
    /// Content hash the part was sent with.
    pub content_hash: Hash,
}

impl PartReceipt {
    pub fn new(number: u32, etag: Option<String>, content_hash: Hash) -> Self {
        Self {
            number,
            etag,
            content_hash,
        }
    }
}
