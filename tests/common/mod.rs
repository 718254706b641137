//! Common test utilities

#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use escargot::error::Result;
use escargot::prelude::*;
use escargot::transport::{MockResponse, MockTransport};
use escargot::utils::error::{HttpError, TransportError};
use url::Url;

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn base_uris(uris: &[&str]) -> BaseUriCollection {
    uris.iter().map(|u| url(u)).collect()
}

/// HTML page linking to every href
pub fn page(hrefs: &[&str]) -> MockResponse {
    let links: String = hrefs
        .iter()
        .map(|href| format!("<a href=\"{href}\">{href}</a>"))
        .collect();
    MockResponse::html(&format!("<html><body>{links}</body></html>"))
}

/// New job on `https://a.test/` served by `transport`
pub fn crawler(queue: Arc<dyn Queue>, transport: &Arc<MockTransport>) -> Escargot {
    Escargot::create(base_uris(&["https://a.test/"]), queue)
        .unwrap()
        .with_transport(transport.clone())
}

/// Everything a [`Recorder`] saw, keyed by URI
#[derive(Debug, Default)]
pub struct Events {
    pub should_request: Vec<String>,
    pub needs_content: Vec<String>,
    pub last_chunk: Vec<String>,
    pub transport_exceptions: Vec<String>,
    pub http_exceptions: Vec<(String, Option<u16>)>,
    pub finished: usize,
}

/// Subscriber with fixed votes that records every callback
#[derive(Clone)]
pub struct Recorder {
    name: String,
    request_vote: Decision,
    content_vote: Decision,
    events: Arc<Mutex<Events>>,
}

impl Recorder {
    pub fn new(name: &str, request_vote: Decision, content_vote: Decision) -> Self {
        Self {
            name: name.to_string(),
            request_vote,
            content_vote,
            events: Arc::default(),
        }
    }

    /// Forces requests and bodies for every URI
    pub fn positive(name: &str) -> Self {
        Self::new(name, Decision::Positive, Decision::Positive)
    }

    pub fn events(&self) -> MutexGuard<'_, Events> {
        self.events.lock().unwrap()
    }
}

impl Subscriber for Recorder {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn should_request(&mut self, _ctx: &CrawlContext, crawl_uri: &mut CrawlUri) -> Result<Decision> {
        self.events().should_request.push(crawl_uri.uri().to_string());
        Ok(self.request_vote)
    }

    fn needs_content(
        &mut self,
        _ctx: &CrawlContext,
        crawl_uri: &mut CrawlUri,
        _response: &Response,
        _chunk: &Chunk,
    ) -> Result<Decision> {
        self.events().needs_content.push(crawl_uri.uri().to_string());
        Ok(self.content_vote)
    }

    fn on_last_chunk(
        &mut self,
        _ctx: &CrawlContext,
        crawl_uri: &mut CrawlUri,
        _response: &Response,
        _chunk: &Chunk,
    ) -> Result<()> {
        self.events().last_chunk.push(crawl_uri.uri().to_string());
        Ok(())
    }

    fn as_exception_subscriber(&mut self) -> Option<&mut dyn ExceptionSubscriber> {
        Some(self)
    }

    fn as_finished_subscriber(&mut self) -> Option<&mut dyn FinishedCrawlingSubscriber> {
        Some(self)
    }
}

impl ExceptionSubscriber for Recorder {
    fn on_transport_exception(
        &mut self,
        _ctx: &CrawlContext,
        crawl_uri: &mut CrawlUri,
        _err: &TransportError,
        _response: &Response,
    ) -> Result<()> {
        self.events()
            .transport_exceptions
            .push(crawl_uri.uri().to_string());
        Ok(())
    }

    fn on_http_exception(
        &mut self,
        _ctx: &CrawlContext,
        crawl_uri: &mut CrawlUri,
        err: &HttpError,
        _response: &Response,
        _chunk: &Chunk,
    ) -> Result<()> {
        self.events().http_exceptions.push((
            crawl_uri.uri().to_string(),
            err.status().map(|s| s.as_u16()),
        ));
        Ok(())
    }
}

impl FinishedCrawlingSubscriber for Recorder {
    fn finished_crawling(&mut self, _ctx: &CrawlContext) -> Result<()> {
        self.events().finished += 1;
        Ok(())
    }
}

/// In-memory sink for formatted log output
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Capture all events of the current thread until the guard is dropped
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    (buffer, tracing::subscriber::set_default(subscriber))
}
