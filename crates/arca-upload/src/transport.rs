//! HTTP seams shared by the wire adapters.
//!
//! Adapters build plain [`http::Request`] values, hand them to a
//! [`RequestSigner`] and then to an [`HttpClient`]. Neither trait knows
//! anything about multipart uploads.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use http::{HeaderValue, Method};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{AdapterError, AdapterResult};

pub type Request = http::Request<Vec<u8>>;
pub type Response = http::Response<Vec<u8>>;

pub const AMZ_DATE: &str = "x-amz-date";
pub const AMZ_CONTENT_SHA256: &str = "x-amz-content-sha256";

/// SHA-256 of the empty body.
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Sends one request and returns the full response.
///
/// Non-2xx statuses are responses, not errors; only failures to exchange
/// bytes with the server are [`AdapterError::Transport`].
pub trait HttpClient: Send + Sync {
    fn send(&self, request: Request) -> AdapterResult<Response>;
}

/// Adds authentication to a request before it is sent.
///
/// `payload_sha256` is the hex SHA-256 of the body, already computed by the
/// caller.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, request: &mut Request, payload_sha256: &str) -> AdapterResult<()>;
}

/// Signer for endpoints that accept unauthenticated requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnonymousSigner;

impl RequestSigner for AnonymousSigner {
    fn sign(&self, _request: &mut Request, _payload_sha256: &str) -> AdapterResult<()> {
        Ok(())
    }
}

impl<T: HttpClient + ?Sized> HttpClient for Arc<T> {
    fn send(&self, request: Request) -> AdapterResult<Response> {
        (**self).send(request)
    }
}

impl<T: RequestSigner + ?Sized> RequestSigner for Arc<T> {
    fn sign(&self, request: &mut Request, payload_sha256: &str) -> AdapterResult<()> {
        (**self).sign(request, payload_sha256)
    }
}

/// Incrementally assembles a request; header errors surface at `body`.
pub(crate) struct RequestBuilder {
    inner: http::request::Builder,
}

impl RequestBuilder {
    pub(crate) fn new(method: Method, url: &str) -> Self {
        Self {
            inner: http::Request::builder().method(method).uri(url),
        }
    }

    pub(crate) fn header(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.inner = self.inner.header(name, value.as_ref());
        self
    }

    /// Stamp `x-amz-date` with `now`.
    pub(crate) fn dated(self, now: DateTime<Utc>) -> Self {
        self.header(AMZ_DATE, amz_date(now))
    }

    pub(crate) fn body(self, body: Vec<u8>) -> AdapterResult<Request> {
        let len = body.len();
        self.inner
            .header(http::header::CONTENT_LENGTH, len)
            .body(body)
            .map_err(|e| AdapterError::InvalidRequest(e.to_string()))
    }
}

/// Basic ISO-8601 timestamp used by `x-amz-date`.
pub fn amz_date(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Base64 of the raw bytes behind a hex digest, as `Content-MD5` expects.
pub fn hex_to_base64(hex_digest: &str) -> AdapterResult<String> {
    let raw = hex::decode(hex_digest)
        .map_err(|e| AdapterError::InvalidRequest(format!("bad hex digest {hex_digest}: {e}")))?;
    Ok(STANDARD.encode(raw))
}

/// Fail with [`AdapterError::Status`] unless the status is one of `expected`.
pub(crate) fn expect_status(response: &Response, expected: &[u16]) -> AdapterResult<()> {
    let status = response.status().as_u16();
    if expected.contains(&status) {
        Ok(())
    } else {
        Err(AdapterError::Status {
            status,
            body: body_excerpt(response),
        })
    }
}

pub(crate) fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|v: &HeaderValue| v.to_str().ok())
}

pub(crate) fn required_header<'a>(response: &'a Response, name: &str) -> AdapterResult<&'a str> {
    header_str(response, name).ok_or_else(|| AdapterError::MissingField(format!("{name} header")))
}

pub(crate) fn body_excerpt(response: &Response) -> String {
    const LIMIT: usize = 512;
    let text = String::from_utf8_lossy(response.body());
    match text.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.into_owned(),
    }
}

/// Unreserved characters of RFC 3986 pass through; everything else is escaped.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');
const KEY: &AsciiSet = &SEGMENT.remove(b'/');

/// Percent-encode one path segment or query value.
pub(crate) fn encode_segment(text: &str) -> String {
    utf8_percent_encode(text, SEGMENT).to_string()
}

/// Percent-encode an object key, keeping its `/` separators.
pub(crate) fn encode_key(text: &str) -> String {
    utf8_percent_encode(text, KEY).to_string()
}

pub(crate) fn trim_endpoint(endpoint: &str) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Strip the quotes object stores wrap around ETags.
pub(crate) fn unquote(etag: &str) -> &str {
    etag.trim().trim_matches('"')
}
