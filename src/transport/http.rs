use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{redirect, Client};
use url::Url;

use super::{ResponseEvent, ResponseHead, ResponseStream, Transport};
use crate::config::CrawlConfig;
use crate::utils::error::TransportError;

/// Default transport built on a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

enum Exchange {
    Pending(reqwest::RequestBuilder, Url),
    Body(BoxStream<'static, reqwest::Result<bytes::Bytes>>),
    Done,
}

impl ReqwestTransport {
    /// Create a transport using the user agent, timeout and redirect limit
    /// of a crawl configuration
    pub fn new(config: &CrawlConfig) -> Result<Self, TransportError> {
        Self::build(
            &config.user_agent,
            config.request_timeout(),
            config.max_redirects,
        )
    }

    /// Create a transport with default settings and the given user agent
    pub fn with_user_agent(user_agent: &str) -> Result<Self, TransportError> {
        let defaults = CrawlConfig::default();
        Self::build(user_agent, defaults.request_timeout(), defaults.max_redirects)
    }

    /// Wrap a preconfigured client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn build(
        user_agent: &str,
        timeout: Duration,
        max_redirects: usize,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .redirect(redirect::Policy::limited(max_redirects))
            .build()?;

        Ok(Self { client })
    }

    fn classify(err: reqwest::Error, url: &Url) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() {
            TransportError::connection(url, err.to_string())
        } else {
            TransportError::Request(err)
        }
    }
}

impl Transport for ReqwestTransport {
    fn request(&self, url: &Url) -> Result<ResponseStream, TransportError> {
        let builder = self.client.get(url.clone());
        let exchange = Exchange::Pending(builder, url.clone());

        let events = stream::unfold(exchange, |exchange| async move {
            match exchange {
                Exchange::Pending(builder, requested) => match builder.send().await {
                    Ok(response) => {
                        // reqwest does not expose the redirect chain, only
                        // whether the final URL differs from the requested one
                        let head = ResponseHead {
                            url: response.url().clone(),
                            status: response.status(),
                            headers: response.headers().clone(),
                            redirect_count: usize::from(response.url() != &requested),
                        };
                        tracing::trace!(url = %requested, status = %head.status, "Received response head");
                        Some((
                            Ok(ResponseEvent::Head(head)),
                            Exchange::Body(response.bytes_stream().boxed()),
                        ))
                    }
                    Err(err) => Some((Err(Self::classify(err, &requested)), Exchange::Done)),
                },
                Exchange::Body(mut body) => match body.next().await {
                    Some(Ok(bytes)) => Some((Ok(ResponseEvent::Body(bytes)), Exchange::Body(body))),
                    Some(Err(err)) => Some((Err(TransportError::Request(err)), Exchange::Done)),
                    None => None,
                },
                Exchange::Done => None,
            }
        });

        Ok(events.boxed())
    }
}
