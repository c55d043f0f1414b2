use std::collections::VecDeque;
use std::sync::Mutex;

use http::{HeaderMap, Method};

use crate::error::{AdapterError, AdapterResult};
use crate::transport::{HttpClient, Request, Response};

/// A request as the mock client received it.
#[derive(Clone, Debug)]
pub(crate) struct Recorded {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Replays scripted responses in order and records every request.
#[derive(Default)]
pub(crate) struct MockClient {
    responses: Mutex<VecDeque<AdapterResult<Response>>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockClient {
    pub fn respond(&self, status: u16, headers: &[(&str, &str)], body: &str) -> &Self {
        let mut builder = http::Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let response = builder.body(body.as_bytes().to_vec()).unwrap();
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn fail(&self, error: AdapterError) -> &Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> Recorded {
        self.requests().pop().expect("no request sent")
    }
}

impl HttpClient for MockClient {
    fn send(&self, request: Request) -> AdapterResult<Response> {
        let (parts, body) = request.into_parts();
        self.requests.lock().unwrap().push(Recorded {
            method: parts.method,
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AdapterError::Transport("no scripted response".into())))
    }
}
