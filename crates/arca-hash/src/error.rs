use arca_types::{HashAlgorithm, TypeError};
use thiserror::Error;

use crate::strategy::Span;

/// Errors from hashing operations.
#[derive(Debug, Error)]
pub enum HashError {
    /// The stream ended before a strategy's range was fully consumed.
    #[error("stream ended after {consumed} bytes of {algorithm} range {span}")]
    TruncatedRange {
        algorithm: HashAlgorithm,
        span: Span,
        consumed: u64,
    },

    /// A strategy was added after the stream moved past its first byte.
    #[error("{algorithm} range starting at {start} added at stream position {position}")]
    RangeAlreadyPassed {
        algorithm: HashAlgorithm,
        start: u64,
        position: u64,
    },

    /// Tree hashing needs at least one byte or one digest.
    #[error("tree hash of empty input")]
    EmptyInput,

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for hashing operations.
pub type HashResult<T> = Result<T, HashError>;
