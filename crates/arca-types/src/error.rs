use thiserror::Error;

/// Errors produced when constructing Arca value types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid byte range: from {from} is past to {to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("empty byte range at offset {offset}")]
    EmptyRange { offset: u64 },

    #[error("invalid byte range syntax: {0}")]
    InvalidRangeSyntax(String),

    #[error("byte range {from}-{to} ends past the last addressable offset")]
    RangeTooLarge { from: u64, to: u64 },

    #[error("invalid hash range: length {length} must be greater than offset {offset}")]
    LengthNotPastOffset { offset: u64, length: u64 },

    #[error("hash record with offset {0} has no length")]
    MissingLength(u64),

    #[error("hash value must not be empty")]
    EmptyHashValue,

    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("part size must be greater than zero")]
    ZeroPartSize,

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
