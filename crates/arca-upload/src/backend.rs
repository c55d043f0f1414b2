use std::fmt;

use tracing::debug;

use crate::cold_archive::ColdArchiveAdapter;
use crate::config::BackendConfig;
use crate::error::{AdapterResult, UploadError, UploadResult};
use crate::info::MultipartUploadInfo;
use crate::memory::InMemoryBackend;
use crate::object_storage::ObjectStorageAdapter;
use crate::part::{PartReceipt, UploadPart};
use crate::session::{AggregateHashes, ContentDescription, UploadHandle};
use crate::traits::{BackendAdapter, BackendKind};
use crate::transport::{HttpClient, RequestSigner};

/// The closed set of backends, chosen from configuration.
pub enum AnyBackend<C, S> {
    ObjectStorage(ObjectStorageAdapter<C, S>),
    ColdArchive(ColdArchiveAdapter<C, S>),
    Memory(InMemoryBackend),
}

impl<C: HttpClient, S: RequestSigner> AnyBackend<C, S> {
    /// Build the configured backend. Network variants send through `client`
    /// after signing with `signer`.
    pub fn from_config(config: &BackendConfig, client: C, signer: S) -> UploadResult<Self> {
        let info = config.upload_info()?;
        let invalid = |e: crate::error::AdapterError| UploadError::Config(e.to_string());
        let backend = match config {
            BackendConfig::ObjectStorage { endpoint, bucket, .. } => AnyBackend::ObjectStorage(
                ObjectStorageAdapter::new(endpoint, bucket.clone(), client, signer)
                    .with_upload_info(info)
                    .map_err(invalid)?,
            ),
            BackendConfig::ColdArchive {
                endpoint,
                vault,
                account_id,
                ..
            } => AnyBackend::ColdArchive(
                ColdArchiveAdapter::new(endpoint, vault.clone(), client, signer)
                    .with_account_id(account_id.clone())
                    .with_upload_info(info)
                    .map_err(invalid)?,
            ),
            BackendConfig::Memory { .. } => AnyBackend::Memory(InMemoryBackend::new(info)),
        };
        debug!(backend = %backend.kind(), part_size = backend.upload_info().part_size, "backend configured");
        Ok(backend)
    }
}

impl<C, S> fmt::Debug for AnyBackend<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyBackend::ObjectStorage(a) => f.debug_tuple("ObjectStorage").field(a).finish(),
            AnyBackend::ColdArchive(a) => f.debug_tuple("ColdArchive").field(a).finish(),
            AnyBackend::Memory(a) => f.debug_tuple("Memory").field(a).finish(),
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $inner:ident => $call:expr) => {
        match $self {
            AnyBackend::ObjectStorage($inner) => $call,
            AnyBackend::ColdArchive($inner) => $call,
            AnyBackend::Memory($inner) => $call,
        }
    };
}

impl<C: HttpClient, S: RequestSigner> BackendAdapter for AnyBackend<C, S> {
    fn kind(&self) -> BackendKind {
        dispatch!(self, b => b.kind())
    }

    fn upload_info(&self) -> &MultipartUploadInfo {
        dispatch!(self, b => b.upload_info())
    }

    fn initiate(&self, content: &ContentDescription) -> AdapterResult<String> {
        dispatch!(self, b => b.initiate(content))
    }

    fn transmit_part(
        &self,
        upload: &UploadHandle,
        part: &UploadPart,
        total_size: u64,
        body: Vec<u8>,
    ) -> AdapterResult<PartReceipt> {
        dispatch!(self, b => b.transmit_part(upload, part, total_size, body))
    }

    fn complete(
        &self,
        upload: &UploadHandle,
        total_size: u64,
        parts: &[PartReceipt],
        aggregate: &AggregateHashes,
    ) -> AdapterResult<String> {
        dispatch!(self, b => b.complete(upload, total_size, parts, aggregate))
    }

    fn abort(&self, upload: &UploadHandle) -> AdapterResult<()> {
        dispatch!(self, b => b.abort(upload))
    }
}
