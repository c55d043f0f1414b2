//! Backend-agnostic chunked upload engine for Arca.
//!
//! [`ChunkedUploader`] drives an [`UploadSession`] through
//! `Initiated -> PartsInFlight -> Completed | Aborted` against any
//! [`BackendAdapter`]. Content is partitioned into byte ranges, read once,
//! and hashed once: each part's signing and content hashes and the
//! whole-content aggregates all come from the session's single
//! [`MultiHasher`](arca_hash::MultiHasher). Any failure after initiation
//! leaves the session `Aborted` after exactly one abort attempt.
//!
//! Adapters are provided for S3-style object storage, Glacier-style cold
//! archive vaults and an in-memory backend; [`AnyBackend`] selects one from
//! an [`UploadConfig`].

pub mod backend;
pub mod cold_archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod info;
pub mod memory;
pub mod object_storage;
pub mod part;
pub mod session;
pub mod source;
pub mod traits;
pub mod transport;

#[cfg(test)]
mod mock;

pub use backend::AnyBackend;
pub use cold_archive::ColdArchiveAdapter;
pub use config::{BackendConfig, UploadConfig};
pub use engine::ChunkedUploader;
pub use error::{AdapterError, AdapterResult, UploadError, UploadResult};
pub use info::{MultipartUploadInfo, GIB, MIB};
pub use memory::{CallCounts, InMemoryBackend, StoredContent};
pub use object_storage::ObjectStorageAdapter;
pub use part::{PartReceipt, UploadPart};
pub use session::{AggregateHashes, CompletedUpload, ContentDescription, UploadHandle, UploadSession, UploadState};
pub use source::ByteSource;
pub use traits::{BackendAdapter, BackendKind};
pub use transport::{AnonymousSigner, HttpClient, Request, RequestSigner, Response};
