//! The crawl scheduler
//!
//! [`Escargot`] pulls candidate URIs from a [`Queue`], lets subscribers vote on
//! them, issues requests through a [`Transport`] under a concurrency limit and
//! streams the responses back through the vote protocol until the queue is
//! exhausted or a budget is hit.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use escargot::{Escargot, HtmlCrawlerSubscriber, InMemoryQueue};
//!
//! let base_uris = [escargot::uri::http_uri("https://www.terminal42.ch")?]
//!     .into_iter()
//!     .collect();
//! let mut escargot = Escargot::create(base_uris, Arc::new(InMemoryQueue::new()))?
//!     .with_max_depth(2)
//!     .with_concurrency(5)
//!     .with_subscriber(HtmlCrawlerSubscriber::new());
//! escargot.crawl().await?;
//! ```

mod context;
mod crawl;
mod decisions;

pub use context::CrawlContext;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::config::CrawlConfig;
use crate::error::{Error, Result};
use crate::queue::{JobId, Queue};
use crate::subscriber::{RegisteredSubscriber, Subscriber};
use crate::transport::{ReqwestTransport, Response, Transport};
use crate::uri::{BaseUriCollection, CrawlUri};
use decisions::DecisionMap;

/// State of one running exchange
#[derive(Debug)]
struct Exchange {
    crawl_uri: CrawlUri,
    response: Response,
}

impl Exchange {
    fn new(crawl_uri: CrawlUri) -> Self {
        let response = Response::new(crawl_uri.uri().clone());
        Self {
            crawl_uri,
            response,
        }
    }
}

/// Crawl scheduler for one job
pub struct Escargot {
    context: CrawlContext,
    config: CrawlConfig,
    transport: Option<Arc<dyn Transport>>,
    custom_transport: bool,
    clock: Arc<dyn Clock>,
    subscribers: Vec<RegisteredSubscriber>,
    requests_sent: usize,
    running_requests: HashSet<String>,
    exchanges: HashMap<String, Exchange>,
    decisions: DecisionMap,
    started_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for Escargot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Escargot")
            .field("context", &self.context)
            .field("config", &self.config)
            .field("custom_transport", &self.custom_transport)
            .field("subscribers", &self.subscribers)
            .field("requests_sent", &self.requests_sent)
            .field("running_requests", &self.running_requests)
            .finish_non_exhaustive()
    }
}

impl Escargot {
    fn new(queue: Arc<dyn Queue>, job_id: JobId, base_uris: BaseUriCollection) -> Self {
        let config = CrawlConfig::default();

        Self {
            context: CrawlContext {
                queue,
                job_id,
                base_uris,
                max_depth: config.max_depth,
                user_agent: config.user_agent.clone(),
            },
            config,
            transport: None,
            custom_transport: false,
            clock: Arc::new(SystemClock),
            subscribers: Vec::new(),
            requests_sent: 0,
            running_requests: HashSet::new(),
            exchanges: HashMap::new(),
            decisions: DecisionMap::default(),
            started_at: None,
        }
    }

    /// Start a new job for the given base URIs
    pub fn create(base_uris: BaseUriCollection, queue: Arc<dyn Queue>) -> Result<Self> {
        if base_uris.is_empty() {
            return Err(Error::EmptyBaseUris);
        }

        let job_id = queue.create_job_id(&base_uris)?;
        tracing::info!(job_id = %job_id, base_uris = base_uris.len(), "Created crawl job");

        Ok(Self::new(queue, job_id, base_uris))
    }

    /// Resume an existing job
    pub fn create_from_job_id(job_id: &str, queue: Arc<dyn Queue>) -> Result<Self> {
        if !queue.is_job_id_valid(job_id)? {
            return Err(Error::InvalidJobId(job_id.to_string()));
        }

        let base_uris = queue.get_base_uris(job_id)?;
        tracing::info!(job_id = %job_id, base_uris = base_uris.len(), "Resuming crawl job");

        Ok(Self::new(queue, job_id.to_string(), base_uris))
    }

    /// Use a custom transport; the user agent can no longer be changed
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self.custom_transport = true;
        self
    }

    /// Set the user agent of the default transport
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Result<Self> {
        if self.custom_transport {
            return Err(Error::ClientAlreadyCustomized);
        }

        self.config.user_agent = user_agent.into();
        self.context.user_agent.clone_from(&self.config.user_agent);
        self.transport = None;
        Ok(self)
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Apply budgets, politeness settings and the user agent of a crawl
    /// configuration
    pub fn with_crawl_config(self, config: CrawlConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::config(e.to_string()))?;

        let mut new = if config.user_agent == self.config.user_agent {
            self
        } else {
            self.with_user_agent(config.user_agent.clone())?
        };

        if !new.custom_transport {
            new.transport = None;
        }
        new.context.max_depth = config.max_depth;
        new.config = config;
        Ok(new)
    }

    /// Maximum number of simultaneously running requests (at least 1)
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency.max(1);
        self
    }

    /// Maximum number of requests, 0 meaning unbounded
    #[must_use]
    pub fn with_max_requests(mut self, max_requests: usize) -> Self {
        self.config.max_requests = max_requests;
        self
    }

    /// Maximum crawl duration, zero meaning unbounded
    #[must_use]
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.config.set_max_duration(max_duration);
        self
    }

    /// Delay before every request
    #[must_use]
    pub fn with_request_delay(mut self, request_delay: Duration) -> Self {
        self.config.set_request_delay(request_delay);
        self
    }

    /// Maximum depth, 0 meaning unbounded
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.config.max_depth = max_depth;
        self.context.max_depth = max_depth;
        self
    }

    /// Register a subscriber; its `attach` hook runs immediately
    pub fn add_subscriber(&mut self, subscriber: impl Subscriber + 'static) -> &mut Self {
        let mut subscriber: Box<dyn Subscriber> = Box::new(subscriber);
        subscriber.attach(&self.context);

        let registered = RegisteredSubscriber::new(subscriber);
        tracing::debug!(
            source = %registered.name,
            exceptions = registered.handles_exceptions,
            finished = registered.handles_finished,
            tag_values = registered.resolves_tags,
            "Registered subscriber"
        );
        self.subscribers.push(registered);
        self
    }

    #[must_use]
    pub fn with_subscriber(mut self, subscriber: impl Subscriber + 'static) -> Self {
        self.add_subscriber(subscriber);
        self
    }

    pub fn context(&self) -> &CrawlContext {
        &self.context
    }

    pub fn queue(&self) -> &Arc<dyn Queue> {
        &self.context.queue
    }

    pub fn job_id(&self) -> &str {
        &self.context.job_id
    }

    pub fn base_uris(&self) -> &BaseUriCollection {
        &self.context.base_uris
    }

    pub fn crawl_config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn user_agent(&self) -> &str {
        &self.config.user_agent
    }

    pub fn concurrency(&self) -> usize {
        self.config.concurrency
    }

    pub fn max_requests(&self) -> usize {
        self.config.max_requests
    }

    pub fn max_duration(&self) -> Duration {
        self.config.max_duration()
    }

    pub fn request_delay(&self) -> Duration {
        self.config.request_delay()
    }

    pub fn max_depth(&self) -> u32 {
        self.config.max_depth
    }

    /// Requests sent since this instance was created
    pub fn requests_sent(&self) -> usize {
        self.requests_sent
    }

    /// Names of the registered subscribers, in registration order
    pub fn subscribers(&self) -> Vec<&str> {
        self.subscribers.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn is_max_depth_reached(&self, found_on: &CrawlUri) -> bool {
        self.context.is_max_depth_reached(found_on)
    }

    /// See [`CrawlContext::add_uri_to_queue`]
    pub fn add_uri_to_queue(&self, uri: Url, found_on: &CrawlUri, processed: bool) -> Result<CrawlUri> {
        self.context.add_uri_to_queue(uri, found_on, processed)
    }

    pub fn get_crawl_uri(&self, uri: &Url) -> Result<Option<CrawlUri>> {
        self.context.get_crawl_uri(uri)
    }

    pub fn update_crawl_uri(&self, crawl_uri: &CrawlUri) -> Result<()> {
        self.context.update_crawl_uri(crawl_uri)
    }

    /// First value any tag resolving subscriber knows for `tag`
    pub fn resolve_tag_value(&self, tag: &str) -> Option<serde_json::Value> {
        self.subscribers
            .iter()
            .filter(|s| s.resolves_tags)
            .find_map(|s| s.inner.as_tag_value_resolver()?.resolve_tag_value(tag))
    }

    fn transport(&mut self) -> Result<Arc<dyn Transport>> {
        if let Some(transport) = &self.transport {
            return Ok(Arc::clone(transport));
        }

        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(&self.config)?);
        self.transport = Some(Arc::clone(&transport));
        Ok(transport)
    }

    fn is_max_requests_reached(&self) -> bool {
        self.config.max_requests != 0 && self.requests_sent >= self.config.max_requests
    }

    fn is_max_duration_reached(&self) -> bool {
        let max_duration = self.config.max_duration();
        if max_duration.is_zero() {
            return false;
        }

        self.started_at.is_some_and(|started_at| {
            (self.clock.now() - started_at)
                .to_std()
                .is_ok_and(|elapsed| elapsed >= max_duration)
        })
    }

    fn is_max_concurrency_reached(&self) -> bool {
        self.running_requests.len() >= self.config.concurrency
    }
}
