use arca_hash::digest_hex;
use arca_types::{Hash, HashAlgorithm};
use chrono::Utc;
use http::header::CONTENT_RANGE;
use http::Method;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{AdapterError, AdapterResult};
use crate::info::MultipartUploadInfo;
use crate::part::{PartReceipt, UploadPart};
use crate::session::{AggregateHashes, ContentDescription, UploadHandle};
use crate::traits::{BackendAdapter, BackendKind};
use crate::transport::{
    encode_key, encode_segment, expect_status, header_str, hex_to_base64, trim_endpoint, unquote, HttpClient,
    Request, RequestBuilder, RequestSigner, Response, AMZ_CONTENT_SHA256, EMPTY_SHA256,
};

const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Adapter for S3-compatible object storage using path-style URLs.
///
/// Parts carry their content hash as `Content-MD5` (or an `x-amz-checksum-*`
/// header for other algorithms), and the backend's ETag for each part is
/// checked against the MD5 that was sent. The content id of a completed
/// upload is the object's multipart ETag.
pub struct ObjectStorageAdapter<C, S> {
    endpoint: String,
    bucket: String,
    client: C,
    signer: S,
    info: MultipartUploadInfo,
}

impl<C: HttpClient, S: RequestSigner> ObjectStorageAdapter<C, S> {
    pub fn new(endpoint: &str, bucket: impl Into<String>, client: C, signer: S) -> Self {
        Self {
            endpoint: trim_endpoint(endpoint),
            bucket: bucket.into(),
            client,
            signer,
            info: MultipartUploadInfo::object_storage(),
        }
    }

    /// Replace the upload parameters. The content algorithm must be one
    /// object storage can check.
    pub fn with_upload_info(mut self, info: MultipartUploadInfo) -> AdapterResult<Self> {
        checksum_header_name(info.content_algorithm)?;
        self.info = info;
        Ok(self)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, key: &str, query: &str) -> String {
        format!(
            "{}/{}/{}?{}",
            self.endpoint,
            encode_segment(&self.bucket),
            encode_key(key),
            query
        )
    }

    fn upload_query(upload: &UploadHandle) -> String {
        format!("uploadId={}", encode_segment(&upload.upload_id))
    }

    fn send(&self, mut request: Request, payload_sha256: &str) -> AdapterResult<Response> {
        self.signer.sign(&mut request, payload_sha256)?;
        self.client.send(request)
    }
}

impl<C: HttpClient, S: RequestSigner> BackendAdapter for ObjectStorageAdapter<C, S> {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStorage
    }

    fn upload_info(&self) -> &MultipartUploadInfo {
        &self.info
    }

    fn initiate(&self, content: &ContentDescription) -> AdapterResult<String> {
        let mut builder = RequestBuilder::new(Method::POST, &self.object_url(&content.key, "uploads"))
            .dated(Utc::now())
            .header(AMZ_CONTENT_SHA256, EMPTY_SHA256);
        if let Some(description) = &content.description {
            builder = builder.header("x-amz-meta-description", description);
        }
        let response = self.send(builder.body(Vec::new())?, EMPTY_SHA256)?;
        expect_status(&response, &[200])?;

        let reply: InitiateReply = parse_reply(reply_text(&response)?)?;
        let upload_id = reply
            .upload_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AdapterError::MissingField("UploadId element".into()))?;
        debug!(bucket = %self.bucket, key = %content.key, upload_id, "multipart upload created");
        Ok(upload_id)
    }

    fn transmit_part(
        &self,
        upload: &UploadHandle,
        part: &UploadPart,
        total_size: u64,
        body: Vec<u8>,
    ) -> AdapterResult<PartReceipt> {
        let query = format!("partNumber={}&{}", part.number(), Self::upload_query(upload));
        let content = part.content_hash();
        let payload_sha256 = payload_sha256(part.signing_hash());

        let request = RequestBuilder::new(Method::PUT, &self.object_url(&upload.key, &query))
            .dated(Utc::now())
            .header(CONTENT_RANGE.as_str(), part.range().content_range(Some(total_size)))
            .header(AMZ_CONTENT_SHA256, payload_sha256)
            .header(checksum_header_name(content.algorithm())?, hex_to_base64(content.value())?)
            .body(body)?;
        let response = self.send(request, payload_sha256)?;
        expect_status(&response, &[200])?;

        let etag = header_str(&response, "etag").map(|tag| unquote(tag).to_string());
        if content.algorithm() == HashAlgorithm::Md5 {
            if let Some(tag) = &etag {
                if !tag.eq_ignore_ascii_case(content.value()) {
                    return Err(AdapterError::ChecksumMismatch {
                        expected: content.value().to_string(),
                        actual: tag.clone(),
                    });
                }
            }
        }
        Ok(PartReceipt::new(part.number(), etag, content.clone()))
    }

    fn complete(
        &self,
        upload: &UploadHandle,
        _total_size: u64,
        parts: &[PartReceipt],
        aggregate: &AggregateHashes,
    ) -> AdapterResult<String> {
        let body = completion_body(parts)?;
        let body_sha256 =
            digest_hex(HashAlgorithm::Sha256, &body).map_err(|e| AdapterError::InvalidRequest(e.to_string()))?;

        let mut builder = RequestBuilder::new(Method::POST, &self.object_url(&upload.key, &Self::upload_query(upload)))
            .dated(Utc::now())
            .header(AMZ_CONTENT_SHA256, &body_sha256);
        for algorithm in &self.info.required_algorithms {
            let hash = aggregate.require(*algorithm)?;
            builder = builder.header(&format!("x-amz-meta-{}", algorithm.as_str()), hash.value());
        }
        let response = self.send(builder.body(body)?, &body_sha256)?;
        expect_status(&response, &[200])?;

        // Completion can fail after the 200 status line has been sent.
        let text = reply_text(&response)?;
        if root_element(text)?.as_deref() == Some("Error") {
            let error: ErrorReply = parse_reply(text)?;
            return Err(AdapterError::Rejected(format!(
                "{}: {}",
                error.code.as_deref().unwrap_or("unknown"),
                error.message.unwrap_or_default()
            )));
        }
        let reply: CompleteReply = parse_reply(text)?;
        let etag = reply
            .etag
            .map(|tag| unquote(&tag).to_string())
            .filter(|tag| !tag.is_empty())
            .ok_or_else(|| AdapterError::MissingField("ETag element".into()))?;

        if self.info.content_algorithm == HashAlgorithm::Md5 && etag.contains('-') {
            let expected = multipart_etag(parts)?;
            if !etag.eq_ignore_ascii_case(&expected) {
                return Err(AdapterError::ChecksumMismatch { expected, actual: etag });
            }
        }
        Ok(etag)
    }

    fn abort(&self, upload: &UploadHandle) -> AdapterResult<()> {
        let request = RequestBuilder::new(Method::DELETE, &self.object_url(&upload.key, &Self::upload_query(upload)))
            .dated(Utc::now())
            .header(AMZ_CONTENT_SHA256, EMPTY_SHA256)
            .body(Vec::new())?;
        let response = self.send(request, EMPTY_SHA256)?;
        expect_status(&response, &[200, 204])
    }
}

impl<C, S> std::fmt::Debug for ObjectStorageAdapter<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorageAdapter")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

fn payload_sha256(signing: &Hash) -> &str {
    if signing.algorithm() == HashAlgorithm::Sha256 {
        signing.value()
    } else {
        UNSIGNED_PAYLOAD
    }
}

fn checksum_header_name(algorithm: HashAlgorithm) -> AdapterResult<&'static str> {
    match algorithm {
        HashAlgorithm::Md5 => Ok("content-md5"),
        HashAlgorithm::Sha256 => Ok("x-amz-checksum-sha256"),
        HashAlgorithm::Crc32 => Ok("x-amz-checksum-crc32"),
        other => Err(AdapterError::InvalidRequest(format!(
            "object storage cannot check {other} part hashes"
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct InitiateReply {
    #[serde(rename = "UploadId", default)]
    upload_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompleteReply {
    #[serde(rename = "ETag", default)]
    etag: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorReply {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn reply_text(response: &Response) -> AdapterResult<&str> {
    std::str::from_utf8(response.body()).map_err(|e| AdapterError::MalformedReply(e.to_string()))
}

fn parse_reply<T: DeserializeOwned>(text: &str) -> AdapterResult<T> {
    quick_xml::de::from_str(text).map_err(|e| AdapterError::MalformedReply(e.to_string()))
}

/// Name of the document element, or `None` for an empty body.
fn root_element(text: &str) -> AdapterResult<Option<String>> {
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(Some(String::from_utf8_lossy(e.name().as_ref()).into_owned()));
            }
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(AdapterError::MalformedReply(e.to_string())),
        }
    }
}

fn completion_body(parts: &[PartReceipt]) -> AdapterResult<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    write_event(&mut writer, Event::Start(BytesStart::new("CompleteMultipartUpload")))?;
    for receipt in parts {
        let etag = receipt
            .etag
            .as_deref()
            .ok_or_else(|| AdapterError::MissingField(format!("ETag of part {}", receipt.number)))?;
        write_event(&mut writer, Event::Start(BytesStart::new("Part")))?;
        write_text_element(&mut writer, "PartNumber", &receipt.number.to_string())?;
        write_text_element(&mut writer, "ETag", &format!("\"{etag}\""))?;
        write_event(&mut writer, Event::End(BytesEnd::new("Part")))?;
    }
    write_event(&mut writer, Event::End(BytesEnd::new("CompleteMultipartUpload")))?;
    Ok(writer.into_inner())
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &str) -> AdapterResult<()> {
    write_event(writer, Event::Start(BytesStart::new(name)))?;
    write_event(writer, Event::Text(BytesText::new(value)))?;
    write_event(writer, Event::End(BytesEnd::new(name)))
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> AdapterResult<()> {
    writer
        .write_event(event)
        .map_err(|e| AdapterError::InvalidRequest(e.to_string()))
}

/// ETag object stores assign to a multipart object: the MD5 of the
/// concatenated raw part MD5s, suffixed with the part count.
fn multipart_etag(parts: &[PartReceipt]) -> AdapterResult<String> {
    let mut material = Vec::with_capacity(parts.len() * 16);
    for receipt in parts {
        let raw = hex::decode(receipt.content_hash.value())
            .map_err(|e| AdapterError::InvalidRequest(format!("part {} MD5: {e}", receipt.number)))?;
        material.extend_from_slice(&raw);
    }
    let digest =
        digest_hex(HashAlgorithm::Md5, &material).map_err(|e| AdapterError::InvalidRequest(e.to_string()))?;
    Ok(format!("{digest}-{}", parts.len()))
}
