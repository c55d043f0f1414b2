use arca_hash::HashError;
use arca_types::{HashAlgorithm, TypeError};
use thiserror::Error;

use crate::session::UploadState;

/// Errors reported by a backend adapter for a single remote call.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend rejected request: {0}")]
    Rejected(String),

    #[error("checksum mismatch: sent {expected}, backend has {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("response is missing {0}")]
    MissingField(String),

    #[error("malformed response body: {0}")]
    MalformedReply(String),

    #[error("aggregate {0} hash is missing")]
    MissingHash(HashAlgorithm),

    #[error("unknown upload id: {0}")]
    UnknownUpload(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result alias for adapter calls.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors from the chunked upload state machine.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The backend refused to start the upload. Nothing to clean up.
    #[error("failed to initiate upload of {key}: {source}")]
    Initiation {
        key: String,
        #[source]
        source: AdapterError,
    },

    #[error("upload {upload_id}: part {part_number} failed: {source}")]
    PartUpload {
        upload_id: String,
        part_number: u32,
        #[source]
        source: AdapterError,
    },

    #[error("upload {upload_id}: completion failed: {source}")]
    Completion {
        upload_id: String,
        #[source]
        source: AdapterError,
    },

    #[error("upload {upload_id}: reading part {part_number} failed: {source}")]
    Source {
        upload_id: String,
        part_number: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("upload {upload_id}: source ended after {read} of {expected} bytes of part {part_number}")]
    SourceTruncated {
        upload_id: String,
        part_number: u32,
        expected: u64,
        read: u64,
    },

    #[error("upload {upload_id}: source is at offset {position} but part {part_number} starts at {expected}")]
    SourceOutOfOrder {
        upload_id: String,
        part_number: u32,
        position: u64,
        expected: u64,
    },

    #[error("upload {upload_id}: source holds more than the declared {declared} bytes")]
    SourceOverrun { upload_id: String, declared: u64 },

    #[error("upload {upload_id}: only {sent} of {expected} parts were sent")]
    IncompleteUpload {
        upload_id: String,
        sent: usize,
        expected: usize,
    },

    #[error("upload {upload_id} is {state}; cannot {operation}")]
    InvalidState {
        upload_id: String,
        state: UploadState,
        operation: &'static str,
    },

    #[error("content is empty; nothing to upload")]
    EmptyContent,

    #[error("invalid part {number}: {reason}")]
    InvalidPart { number: u32, reason: String },

    #[error("invalid part size {part_size}: {reason}")]
    InvalidPartSize { part_size: u64, reason: String },

    #[error("{parts} parts exceed the backend limit of {max}")]
    TooManyParts { parts: u64, max: u64 },

    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;
