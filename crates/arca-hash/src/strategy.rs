use std::fmt;

use arca_types::{ByteRange, Hash, HashAlgorithm};

use crate::accumulator::Accumulator;
use crate::error::{HashError, HashResult};

/// Which bytes of the stream a strategy covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Span {
    /// Every byte of the stream.
    Whole,
    /// From an offset to the end of the stream.
    From(u64),
    /// An explicit inclusive range.
    Range(ByteRange),
}

impl Span {
    /// First offset covered.
    pub fn start(&self) -> u64 {
        match self {
            Span::Whole => 0,
            Span::From(offset) => *offset,
            Span::Range(range) => range.from(),
        }
    }

    /// Last offset covered, if bounded.
    pub fn end(&self) -> Option<u64> {
        match self {
            Span::Range(range) => Some(range.to()),
            Span::Whole | Span::From(_) => None,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Span::Whole => f.write_str("0-"),
            Span::From(offset) => write!(f, "{offset}-"),
            Span::Range(range) => write!(f, "{range}"),
        }
    }
}

/// Binds one algorithm to one span of the stream.
///
/// The strategy only accepts bytes in stream order and consumes itself on
/// [`finalize`](HashStrategy::finalize).
pub struct HashStrategy {
    span: Span,
    accumulator: Accumulator,
    consumed: u64,
}

impl HashStrategy {
    pub fn new(algorithm: HashAlgorithm, span: Span) -> Self {
        Self {
            span,
            accumulator: Accumulator::new(algorithm),
            consumed: 0,
        }
    }

    /// Hash of the whole stream.
    pub fn whole(algorithm: HashAlgorithm) -> Self {
        Self::new(algorithm, Span::Whole)
    }

    /// Hash of `range` only.
    pub fn range(algorithm: HashAlgorithm, range: ByteRange) -> Self {
        Self::new(algorithm, Span::Range(range))
    }

    /// Hash from `offset` to the end of the stream.
    pub fn from_offset(algorithm: HashAlgorithm, offset: u64) -> Self {
        Self::new(algorithm, Span::From(offset))
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.accumulator.algorithm()
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Bytes fed so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Offset of the next byte this strategy expects.
    pub fn next_offset(&self) -> u64 {
        self.span.start() + self.consumed
    }

    /// Returns `true` once a bounded range has seen its last byte.
    pub fn is_complete(&self) -> bool {
        match self.span {
            Span::Range(range) => self.consumed == range.length(),
            Span::Whole | Span::From(_) => false,
        }
    }

    /// Feed a block of stream bytes that begins at absolute `block_offset`.
    ///
    /// Only the part of the block inside the span is hashed. Blocks must be
    /// fed in stream order without gaps.
    pub fn feed(&mut self, block_offset: u64, block: &[u8]) {
        if block.is_empty() || self.is_complete() {
            return;
        }
        let next = self.next_offset();
        let block_end = block_offset + block.len() as u64;
        debug_assert!(
            block_offset <= next,
            "gap in stream: expected offset {next}, got block at {block_offset}"
        );
        if next >= block_end {
            return;
        }

        let start = (next - block_offset) as usize;
        let end = match self.span.end() {
            Some(last) if last < block_end => (last + 1 - block_offset) as usize,
            _ => block.len(),
        };
        if start >= end {
            return;
        }
        self.accumulator.update(&block[start..end]);
        self.consumed += (end - start) as u64;
    }

    /// Finish the digest.
    ///
    /// A bounded range that was not fully fed fails with
    /// [`HashError::TruncatedRange`] and yields no partial hash.
    pub fn finalize(self) -> HashResult<Hash> {
        let algorithm = self.algorithm();
        match self.span {
            Span::Range(range) => {
                if self.consumed < range.length() {
                    return Err(self.truncated());
                }
                let value = self.accumulator.finalize()?;
                Ok(Hash::with_range(algorithm, value, range)?)
            }
            Span::Whole | Span::From(0) => {
                let value = self.accumulator.finalize()?;
                Ok(Hash::new(algorithm, value)?)
            }
            Span::From(offset) => {
                if self.consumed == 0 {
                    return Err(self.truncated());
                }
                let range = ByteRange::from_offset_length(offset, self.consumed)?;
                let value = self.accumulator.finalize()?;
                Ok(Hash::with_range(algorithm, value, range)?)
            }
        }
    }

    fn truncated(&self) -> HashError {
        HashError::TruncatedRange {
            algorithm: self.algorithm(),
            span: self.span,
            consumed: self.consumed,
        }
    }
}

impl fmt::Debug for HashStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashStrategy")
            .field("algorithm", &self.algorithm())
            .field("span", &self.span)
            .field("consumed", &self.consumed)
            .finish()
    }
}
