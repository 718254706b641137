//! HTTP transport boundary
//!
//! A [`Transport`] turns a URL into a stream of [`ResponseEvent`]s: exactly one
//! [`ResponseEvent::Head`] followed by any number of [`ResponseEvent::Body`]
//! chunks. The scheduler multiplexes many of these streams and owns the
//! per-exchange [`Response`] buffer that subscribers see.
//!
//! Dropping a stream cancels the exchange.

mod http;
mod mock;
mod response;

pub use http::ReqwestTransport;
pub use mock::{MockResponse, MockTransport};
pub use response::{Chunk, Response, ResponseHead};

use bytes::Bytes;
use futures::stream::BoxStream;
use url::Url;

use crate::utils::error::TransportError;

/// One step of a streamed HTTP exchange
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    /// Final status line and headers, after redirects were followed
    Head(ResponseHead),
    /// A piece of the body
    Body(Bytes),
}

/// Event stream of one exchange
pub type ResponseStream = BoxStream<'static, Result<ResponseEvent, TransportError>>;

/// Issues HTTP requests
pub trait Transport: Send + Sync {
    /// Start a GET request
    ///
    /// Errors returned here mean the request could not even be started; errors
    /// while the exchange runs are yielded by the stream.
    fn request(&self, url: &Url) -> Result<ResponseStream, TransportError>;
}
