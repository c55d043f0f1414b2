use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Inclusive span of byte offsets within a content stream.
///
/// A `ByteRange` always covers at least one byte: `from <= to` is checked at
/// construction and the fields are never mutated afterwards. `to` stays below
/// `u64::MAX` so the exclusive end and the length always fit in a `u64`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct ByteRange {
    from: u64,
    to: u64,
}

#[derive(Deserialize)]
struct RawRange {
    from: u64,
    to: u64,
}

impl TryFrom<RawRange> for ByteRange {
    type Error = TypeError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        ByteRange::new(raw.from, raw.to)
    }
}

impl ByteRange {
    /// Create a range covering `from..=to`.
    pub fn new(from: u64, to: u64) -> Result<Self, TypeError> {
        if from > to {
            return Err(TypeError::InvalidRange { from, to });
        }
        if to == u64::MAX {
            return Err(TypeError::RangeTooLarge { from, to });
        }
        Ok(Self { from, to })
    }

    /// Create a range of `length` bytes starting at `offset`.
    pub fn from_offset_length(offset: u64, length: u64) -> Result<Self, TypeError> {
        if length == 0 {
            return Err(TypeError::EmptyRange { offset });
        }
        let to = offset
            .checked_add(length - 1)
            .ok_or(TypeError::RangeTooLarge { from: offset, to: u64::MAX })?;
        ByteRange::new(offset, to)
    }

    /// First offset covered.
    pub fn from(&self) -> u64 {
        self.from
    }

    /// Last offset covered.
    pub fn to(&self) -> u64 {
        self.to
    }

    /// Number of bytes covered (`to - from + 1`).
    pub fn length(&self) -> u64 {
        self.to - self.from + 1
    }

    /// Offset one past the last covered byte.
    pub fn end_exclusive(&self) -> u64 {
        self.to + 1
    }

    /// Returns `true` if `offset` falls inside this range.
    pub fn contains(&self, offset: u64) -> bool {
        self.from <= offset && offset <= self.to
    }

    /// The overlap of two ranges, if any.
    pub fn intersect(&self, other: &ByteRange) -> Option<ByteRange> {
        let from = self.from.max(other.from);
        let to = self.to.min(other.to);
        (from <= to).then_some(ByteRange { from, to })
    }

    /// `Content-Range` header value. `None` renders an unknown total as `*`.
    pub fn content_range(&self, total: Option<u64>) -> String {
        match total {
            Some(total) => format!("bytes {}-{}/{}", self.from, self.to, total),
            None => format!("bytes {}-{}/*", self.from, self.to),
        }
    }
}

impl fmt::Debug for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteRange[{}, {}]", self.from, self.to)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// Parses the `from-to` form produced by `Display`.
impl FromStr for ByteRange {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to) = s
            .split_once('-')
            .ok_or_else(|| TypeError::InvalidRangeSyntax(s.to_string()))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u64>()
                .map_err(|_| TypeError::InvalidRangeSyntax(s.to_string()))
        };
        ByteRange::new(parse(from)?, parse(to)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_range() {
        let r = ByteRange::new(7, 7).unwrap();
        assert_eq!(r.length(), 1);
        assert!(r.contains(7));
        assert!(!r.contains(8));
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert_eq!(
            ByteRange::new(10, 9),
            Err(TypeError::InvalidRange { from: 10, to: 9 })
        );
    }

    #[test]
    fn offset_length_construction() {
        let r = ByteRange::from_offset_length(1_048_576, 1_048_576).unwrap();
        assert_eq!(r.from(), 1_048_576);
        assert_eq!(r.to(), 2_097_151);
        assert_eq!(r.end_exclusive(), 2_097_152);
    }

    #[test]
    fn zero_length_is_rejected() {
        assert_eq!(
            ByteRange::from_offset_length(5, 0),
            Err(TypeError::EmptyRange { offset: 5 })
        );
    }

    #[test]
    fn overflowing_length_is_rejected() {
        assert!(ByteRange::from_offset_length(u64::MAX, 2).is_err());
        assert!(ByteRange::from_offset_length(1, u64::MAX).is_err());
    }

    #[test]
    fn last_offset_stays_below_u64_max() {
        assert_eq!(
            ByteRange::new(0, u64::MAX),
            Err(TypeError::RangeTooLarge { from: 0, to: u64::MAX })
        );
        let widest = ByteRange::from_offset_length(0, u64::MAX).unwrap();
        assert_eq!(widest.to(), u64::MAX - 1);
        assert_eq!(widest.length(), u64::MAX);
        assert_eq!(widest.end_exclusive(), u64::MAX);
    }

    #[test]
    fn intersection() {
        let a = ByteRange::new(0, 99).unwrap();
        let b = ByteRange::new(50, 149).unwrap();
        assert_eq!(a.intersect(&b), Some(ByteRange::new(50, 99).unwrap()));

        let c = ByteRange::new(100, 120).unwrap();
        assert_eq!(a.intersect(&c), None);
    }

    #[test]
    fn content_range_header() {
        let r = ByteRange::new(0, 1_048_575).unwrap();
        assert_eq!(r.content_range(Some(4_195_075)), "bytes 0-1048575/4195075");
        assert_eq!(r.content_range(None), "bytes 0-1048575/*");
    }

    #[test]
    fn parse_display_form() {
        let r: ByteRange = "100-199".parse().unwrap();
        assert_eq!(r, ByteRange::new(100, 199).unwrap());
        assert_eq!(r.to_string(), "100-199");
        assert!("199-100".parse::<ByteRange>().is_err());
        assert!("abc".parse::<ByteRange>().is_err());
    }

    #[test]
    fn deserialize_validates_bounds() {
        let ok: ByteRange = serde_json::from_str(r#"{"from":1,"to":2}"#).unwrap();
        assert_eq!(ok.length(), 2);
        assert!(serde_json::from_str::<ByteRange>(r#"{"from":3,"to":2}"#).is_err());
    }
}
