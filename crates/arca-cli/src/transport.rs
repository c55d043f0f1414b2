use std::time::Duration;

use anyhow::Context;
use arca_upload::{AdapterError, AdapterResult, HttpClient, Request, Response};
use tracing::debug;

/// Blocking HTTP client for the storage adapters.
pub struct ReqwestClient {
    inner: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let inner = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("arca/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { inner })
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: Request) -> AdapterResult<Response> {
        let (parts, body) = request.into_parts();
        debug!(method = %parts.method, uri = %parts.uri, bytes = body.len(), "sending request");
        let response = self
            .inner
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().map_err(transport_error)?;
        debug!(%status, bytes = body.len(), "received response");

        let mut out = http::Response::new(body.to_vec());
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        Ok(out)
    }
}

fn transport_error(err: reqwest::Error) -> AdapterError {
    AdapterError::Transport(err.to_string())
}
