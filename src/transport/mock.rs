use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use url::Url;

use super::{ResponseEvent, ResponseHead, ResponseStream, Transport};
use crate::uri::normalize_uri;
use crate::utils::error::TransportError;

/// Canned response served by [`MockTransport`]
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    headers: HeaderMap,
    chunks: Vec<Bytes>,
    body_error: Option<String>,
}

impl MockResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            chunks: Vec::new(),
            body_error: None,
        }
    }

    /// `200 OK` with a `text/html` body
    pub fn html(body: &str) -> Self {
        Self::new(StatusCode::OK)
            .with_header(CONTENT_TYPE.as_str(), "text/html; charset=UTF-8")
            .with_body(body)
    }

    /// Add a header; invalid names or values are ignored
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Append one body chunk
    pub fn with_body(mut self, chunk: &str) -> Self {
        self.chunks.push(Bytes::copy_from_slice(chunk.as_bytes()));
        self
    }

    /// Fail the stream after the body chunks were delivered
    pub fn with_body_error(mut self, reason: &str) -> Self {
        self.body_error = Some(reason.to_string());
        self
    }
}

#[derive(Debug, Clone)]
enum Route {
    Respond(MockResponse),
    Redirect(Url),
    Refuse(String),
}

/// In-process transport for tests
///
/// Unknown URLs answer `404 Not Found` with an empty body. Every request is
/// recorded.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: HashMap<String, Route>,
    requests: Mutex<Vec<Url>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(url: &str) -> String {
        Url::parse(url)
            .map(|u| normalize_uri(u).to_string())
            .unwrap_or_else(|_| url.to_string())
    }

    /// Serve `response` for `url`
    pub fn respond(mut self, url: &str, response: MockResponse) -> Self {
        self.routes.insert(Self::key(url), Route::Respond(response));
        self
    }

    /// Redirect `from` to `to`; the head reports `to` and one redirect
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        if let Ok(target) = Url::parse(to) {
            self.routes.insert(Self::key(from), Route::Redirect(target));
        }
        self
    }

    /// Make `request` itself fail for `url`
    pub fn refuse(mut self, url: &str, reason: &str) -> Self {
        self.routes
            .insert(Self::key(url), Route::Refuse(reason.to_string()));
        self
    }

    /// URLs requested so far, in order
    pub fn requested(&self) -> Vec<Url> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn resolve(&self, url: &Url) -> Result<(Url, usize, MockResponse), TransportError> {
        let mut current = normalize_uri(url.clone());
        let mut redirects = 0;

        loop {
            match self.routes.get(current.as_str()) {
                Some(Route::Respond(response)) => return Ok((current, redirects, response.clone())),
                Some(Route::Redirect(target)) if redirects < 10 => {
                    current = normalize_uri(target.clone());
                    redirects += 1;
                }
                Some(Route::Redirect(_)) => {
                    return Err(TransportError::connection(url, "too many redirects"))
                }
                Some(Route::Refuse(reason)) => return Err(TransportError::connection(url, reason.clone())),
                None => {
                    return Ok((current, redirects, MockResponse::new(StatusCode::NOT_FOUND)))
                }
            }
        }
    }
}

impl Transport for MockTransport {
    fn request(&self, url: &Url) -> Result<ResponseStream, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.clone());
        }

        let (effective, redirect_count, response) = self.resolve(url)?;

        let head = ResponseHead {
            url: effective.clone(),
            status: response.status,
            headers: response.headers,
            redirect_count,
        };

        let mut events: Vec<Result<ResponseEvent, TransportError>> =
            vec![Ok(ResponseEvent::Head(head))];
        events.extend(response.chunks.into_iter().map(|c| Ok(ResponseEvent::Body(c))));
        if let Some(reason) = response.body_error {
            events.push(Err(TransportError::connection(&effective, reason)));
        }

        Ok(stream::iter(events).boxed())
    }
}
