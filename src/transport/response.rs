use std::borrow::Cow;

use bytes::{Bytes, BytesMut};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use url::Url;

use crate::utils::error::HttpError;

/// Status and headers of a response
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// Effective URL after redirects
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Number of redirects followed to reach `url`
    pub redirect_count: usize,
}

/// Accumulated state of one HTTP exchange
///
/// Owned by the scheduler; subscribers get a shared view per chunk.
#[derive(Debug)]
pub struct Response {
    requested: Url,
    head: Option<ResponseHead>,
    body: BytesMut,
}

impl Response {
    pub fn new(requested: Url) -> Self {
        Self {
            requested,
            head: None,
            body: BytesMut::new(),
        }
    }

    /// Response with a head already received
    pub fn with_head(requested: Url, head: ResponseHead) -> Self {
        let mut response = Self::new(requested);
        response.head = Some(head);
        response
    }

    pub(crate) fn set_head(&mut self, head: ResponseHead) {
        self.head = Some(head);
    }

    pub(crate) fn append(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    /// The URL that was requested
    pub fn requested_url(&self) -> &Url {
        &self.requested
    }

    /// Effective URL, the requested one until a head arrived
    pub fn url(&self) -> &Url {
        self.head.as_ref().map_or(&self.requested, |head| &head.url)
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.head.as_ref().map(|head| head.status)
    }

    pub fn redirect_count(&self) -> usize {
        self.head.as_ref().map_or(0, |head| head.redirect_count)
    }

    pub fn has_head(&self) -> bool {
        self.head.is_some()
    }

    /// Headers of a successful response
    ///
    /// Fails for final status codes of 300 and above, which is how HTTP
    /// failures surface to the scheduler.
    pub fn headers(&self) -> Result<&HeaderMap, HttpError> {
        let head = self.head.as_ref().ok_or_else(|| HttpError::NoResponse {
            url: self.requested.clone(),
        })?;

        if head.status.as_u16() >= 300 {
            return Err(HttpError::Status {
                url: head.url.clone(),
                status: head.status,
            });
        }

        Ok(&head.headers)
    }

    /// Headers regardless of the status code
    pub fn headers_unchecked(&self) -> Option<&HeaderMap> {
        self.head.as_ref().map(|head| &head.headers)
    }

    /// A single header value, if present and valid ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers_unchecked()?.get(name)?.to_str().ok()
    }

    /// Body received so far, status-checked like [`Response::headers`]
    pub fn content(&self) -> Result<&[u8], HttpError> {
        self.headers()?;
        Ok(&self.body)
    }

    /// Body received so far as lossily decoded UTF-8
    pub fn text(&self) -> Result<Cow<'_, str>, HttpError> {
        Ok(String::from_utf8_lossy(self.content()?))
    }
}

/// Position of a chunk within its exchange
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    first: bool,
    last: bool,
    bytes: Bytes,
}

impl Chunk {
    /// Chunk delivered when the head arrived
    pub fn first() -> Self {
        Self {
            first: true,
            ..Self::default()
        }
    }

    pub fn body(bytes: Bytes) -> Self {
        Self {
            bytes,
            ..Self::default()
        }
    }

    /// Chunk delivered once the body is complete
    pub fn last() -> Self {
        Self {
            last: true,
            ..Self::default()
        }
    }

    pub fn is_first(&self) -> bool {
        self.first
    }

    pub fn is_last(&self) -> bool {
        self.last
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}
