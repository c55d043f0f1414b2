use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AdapterResult;
use crate::info::MultipartUploadInfo;
use crate::part::{PartReceipt, UploadPart};
use crate::session::{AggregateHashes, ContentDescription, UploadHandle};

/// Which family of storage service an adapter talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    ObjectStorage,
    ColdArchive,
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendKind::ObjectStorage => "object-storage",
            BackendKind::ColdArchive => "cold-archive",
            BackendKind::Memory => "memory",
        };
        f.write_str(s)
    }
}

/// Wire-level operations of one storage backend.
///
/// Adapters translate the four upload steps into backend requests and
/// nothing else: ordering, hashing and cleanup belong to
/// [`ChunkedUploader`](crate::ChunkedUploader). Every call reports failure
/// through [`AdapterError`](crate::AdapterError) and never panics on a bad
/// response.
pub trait BackendAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Part-size limits and the hashes this backend needs.
    fn upload_info(&self) -> &MultipartUploadInfo;

    /// Start a multipart upload and return the backend's upload id.
    fn initiate(&self, content: &ContentDescription) -> AdapterResult<String>;

    /// Send one part. `total_size` is the full content length.
    fn transmit_part(
        &self,
        upload: &UploadHandle,
        part: &UploadPart,
        total_size: u64,
        body: Vec<u8>,
    ) -> AdapterResult<PartReceipt>;

    /// Assemble the parts and return the id of the stored content.
    fn complete(
        &self,
        upload: &UploadHandle,
        total_size: u64,
        parts: &[PartReceipt],
        aggregate: &AggregateHashes,
    ) -> AdapterResult<String>;

    /// Discard the upload and every part sent for it.
    fn abort(&self, upload: &UploadHandle) -> AdapterResult<()>;
}

impl<T: BackendAdapter + ?Sized> BackendAdapter for &T {
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn upload_info(&self) -> &MultipartUploadInfo {
        (**self).upload_info()
    }

    fn initiate(&self, content: &ContentDescription) -> AdapterResult<String> {
        (**self).initiate(content)
    }

    fn transmit_part(
        &self,
        upload: &UploadHandle,
        part: &UploadPart,
        total_size: u64,
        body: Vec<u8>,
    ) -> AdapterResult<PartReceipt> {
        (**self).transmit_part(upload, part, total_size, body)
    }

    fn complete(
        &self,
        upload: &UploadHandle,
        total_size: u64,
        parts: &[PartReceipt],
        aggregate: &AggregateHashes,
    ) -> AdapterResult<String> {
        (**self).complete(upload, total_size, parts, aggregate)
    }

    fn abort(&self, upload: &UploadHandle) -> AdapterResult<()> {
        (**self).abort(upload)
    }
}

impl<T: BackendAdapter + ?Sized> BackendAdapter for Arc<T> {
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn upload_info(&self) -> &MultipartUploadInfo {
        (**self).upload_info()
    }

    fn initiate(&self, content: &ContentDescription) -> AdapterResult<String> {
        (**self).initiate(content)
    }

    fn transmit_part(
        &self,
        upload: &UploadHandle,
        part: &UploadPart,
        total_size: u64,
        body: Vec<u8>,
    ) -> AdapterResult<PartReceipt> {
        (**self).transmit_part(upload, part, total_size, body)
    }

    fn complete(
        &self,
        upload: &UploadHandle,
        total_size: u64,
        parts: &[PartReceipt],
        aggregate: &AggregateHashes,
    ) -> AdapterResult<String> {
        (**self).complete(upload, total_size, parts, aggregate)
    }

    fn abort(&self, upload: &UploadHandle) -> AdapterResult<()> {
        (**self).abort(upload)
    }
}
