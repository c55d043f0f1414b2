use arca_hash::tree_hash_from_hex_strings;
use arca_types::HashAlgorithm;
use chrono::Utc;
use http::header::CONTENT_RANGE;
use http::Method;
use tracing::debug;

use crate::error::{AdapterError, AdapterResult};
use crate::info::MultipartUploadInfo;
use crate::part::{PartReceipt, UploadPart};
use crate::session::{AggregateHashes, ContentDescription, UploadHandle};
use crate::traits::{BackendAdapter, BackendKind};
use crate::transport::{
    encode_segment, expect_status, header_str, required_header, trim_endpoint, HttpClient, Request, RequestBuilder,
    RequestSigner, Response, AMZ_CONTENT_SHA256, EMPTY_SHA256,
};

const GLACIER_VERSION: &str = "2012-06-01";
const VERSION_HEADER: &str = "x-amz-glacier-version";
const TREE_HASH_HEADER: &str = "x-amz-sha256-tree-hash";
const ARCHIVE_SHA256_HEADER: &str = "x-amz-archive-sha256";
const MAX_DESCRIPTION_LEN: usize = 1024;

/// Adapter for Glacier-style vaults.
///
/// Every part carries its linear SHA-256 and its tree hash. At completion
/// the archive tree hash is recombined from the per-part tree hashes and
/// must agree with the one accumulated while streaming.
pub struct ColdArchiveAdapter<C, S> {
    endpoint: String,
    account_id: String,
    vault: String,
    client: C,
    signer: S,
    info: MultipartUploadInfo,
}

impl<C: HttpClient, S: RequestSigner> ColdArchiveAdapter<C, S> {
    pub fn new(endpoint: &str, vault: impl Into<String>, client: C, signer: S) -> Self {
        Self {
            endpoint: trim_endpoint(endpoint),
            account_id: "-".into(),
            vault: vault.into(),
            client,
            signer,
            info: MultipartUploadInfo::cold_archive(),
        }
    }

    /// Address a vault owned by another account. Defaults to `-`, the
    /// account of the signing credentials.
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    /// Replace the upload parameters. Parts must be tree hashed.
    pub fn with_upload_info(mut self, info: MultipartUploadInfo) -> AdapterResult<Self> {
        if info.content_algorithm != HashAlgorithm::TreeSha256 {
            return Err(AdapterError::InvalidRequest(format!(
                "cold archive parts need sha256-tree hashes, not {}",
                info.content_algorithm
            )));
        }
        self.info = info;
        Ok(self)
    }

    pub fn vault(&self) -> &str {
        &self.vault
    }

    fn uploads_url(&self) -> String {
        format!(
            "{}/{}/vaults/{}/multipart-uploads",
            self.endpoint,
            encode_segment(&self.account_id),
            encode_segment(&self.vault)
        )
    }

    fn upload_url(&self, upload: &UploadHandle) -> String {
        format!("{}/{}", self.uploads_url(), encode_segment(&upload.upload_id))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(method, url)
            .dated(Utc::now())
            .header(VERSION_HEADER, GLACIER_VERSION)
    }

    fn send(&self, mut request: Request, payload_sha256: &str) -> AdapterResult<Response> {
        self.signer.sign(&mut request, payload_sha256)?;
        self.client.send(request)
    }
}

impl<C: HttpClient, S: RequestSigner> BackendAdapter for ColdArchiveAdapter<C, S> {
    fn kind(&self) -> BackendKind {
        BackendKind::ColdArchive
    }

    fn upload_info(&self) -> &MultipartUploadInfo {
        &self.info
    }

    fn initiate(&self, content: &ContentDescription) -> AdapterResult<String> {
        let mut builder = self
            .request(Method::POST, &self.uploads_url())
            .header("x-amz-part-size", self.info.part_size.to_string())
            .header(AMZ_CONTENT_SHA256, EMPTY_SHA256);
        if let Some(description) = &content.description {
            validate_description(description)?;
            builder = builder.header("x-amz-archive-description", description);
        }
        let response = self.send(builder.body(Vec::new())?, EMPTY_SHA256)?;
        expect_status(&response, &[201])?;

        let upload_id = required_header(&response, "x-amz-multipart-upload-id")?.to_string();
        debug!(vault = %self.vault, upload_id = %upload_id, "vault multipart upload created");
        Ok(upload_id)
    }

    fn transmit_part(
        &self,
        upload: &UploadHandle,
        part: &UploadPart,
        _total_size: u64,
        body: Vec<u8>,
    ) -> AdapterResult<PartReceipt> {
        let tree = part.content_hash();
        if tree.algorithm() != HashAlgorithm::TreeSha256 {
            return Err(AdapterError::InvalidRequest(format!(
                "part {} carries a {} hash, expected sha256-tree",
                part.number(),
                tree.algorithm()
            )));
        }
        let linear = part.signing_hash().value();

        let request = self
            .request(Method::PUT, &self.upload_url(upload))
            .header(CONTENT_RANGE.as_str(), part.range().content_range(None))
            .header(AMZ_CONTENT_SHA256, linear)
            .header(TREE_HASH_HEADER, tree.value())
            .body(body)?;
        let response = self.send(request, linear)?;
        expect_status(&response, &[204])?;

        if let Some(echoed) = header_str(&response, TREE_HASH_HEADER) {
            if !echoed.eq_ignore_ascii_case(tree.value()) {
                return Err(AdapterError::ChecksumMismatch {
                    expected: tree.value().to_string(),
                    actual: echoed.to_string(),
                });
            }
        }
        Ok(PartReceipt::new(part.number(), None, tree.clone()))
    }

    fn complete(
        &self,
        upload: &UploadHandle,
        total_size: u64,
        parts: &[PartReceipt],
        aggregate: &AggregateHashes,
    ) -> AdapterResult<String> {
        let streamed = aggregate.require(HashAlgorithm::TreeSha256)?;
        let linear = aggregate.require(HashAlgorithm::Sha256)?;

        let part_hashes: Vec<&str> = parts.iter().map(|r| r.content_hash.value()).collect();
        let combined = tree_hash_from_hex_strings(&part_hashes)
            .map_err(|e| AdapterError::InvalidRequest(format!("cannot combine part tree hashes: {e}")))?
            .to_hex();
        if !combined.eq_ignore_ascii_case(streamed.value()) {
            return Err(AdapterError::ChecksumMismatch {
                expected: streamed.value().to_string(),
                actual: combined,
            });
        }

        let request = self
            .request(Method::POST, &self.upload_url(upload))
            .header("x-amz-archive-size", total_size.to_string())
            .header(TREE_HASH_HEADER, &combined)
            .header(ARCHIVE_SHA256_HEADER, linear.value())
            .header(AMZ_CONTENT_SHA256, EMPTY_SHA256)
            .body(Vec::new())?;
        let response = self.send(request, EMPTY_SHA256)?;
        expect_status(&response, &[201])?;
        Ok(required_header(&response, "x-amz-archive-id")?.to_string())
    }

    fn abort(&self, upload: &UploadHandle) -> AdapterResult<()> {
        let request = self
            .request(Method::DELETE, &self.upload_url(upload))
            .header(AMZ_CONTENT_SHA256, EMPTY_SHA256)
            .body(Vec::new())?;
        let response = self.send(request, EMPTY_SHA256)?;
        expect_status(&response, &[204])
    }
}

impl<C, S> std::fmt::Debug for ColdArchiveAdapter<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColdArchiveAdapter")
            .field("endpoint", &self.endpoint)
            .field("account_id", &self.account_id)
            .field("vault", &self.vault)
            .finish_non_exhaustive()
    }
}

/// Archive descriptions are printable ASCII, at most 1024 characters.
fn validate_description(description: &str) -> AdapterResult<()> {
    if description.len() > MAX_DESCRIPTION_LEN {
        return Err(AdapterError::InvalidRequest(format!(
            "archive description is {} bytes, limit is {MAX_DESCRIPTION_LEN}",
            description.len()
        )));
    }
    if !description.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        return Err(AdapterError::InvalidRequest(
            "archive description must be printable ASCII".into(),
        ));
    }
    Ok(())
}
