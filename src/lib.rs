//! escargot - a polite, resumable web crawler core
//!
//! The crawler itself knows nothing about what it collects. It walks a work
//! queue of URIs and asks registered subscribers at every step whether a URI
//! should be requested and whether its body is needed. Subscribers extract
//! whatever they are interested in and add newly discovered URIs back to the
//! queue.
//!
//! # Architecture
//!
//! - [`escargot`] - the scheduler and the [`CrawlContext`] handed to subscribers
//! - [`subscriber`] - the vote protocol and the built-in [`HtmlCrawlerSubscriber`]
//! - [`queue`] - persistent work queues (in-memory, SQLite, lazy write-back)
//! - [`transport`] - streaming HTTP exchanges over reqwest, plus a mock
//! - [`uri`] - [`CrawlUri`] and [`BaseUriCollection`]
//! - [`config`] - configuration from TOML files and `ESCARGOT_*` variables
//! - [`clock`] - wall clock abstraction for budgets and request delays
//! - [`utils`] - tracing setup and shared error types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use escargot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     escargot::utils::setup_tracing(&config.logging)?;
//!
//!     let base_uris: BaseUriCollection = [escargot::uri::http_uri("https://www.terminal42.ch")?]
//!         .into_iter()
//!         .collect();
//!     let queue = Arc::new(SqliteQueue::from_config(&config.queue)?);
//!
//!     let mut escargot = Escargot::create(base_uris, queue)?
//!         .with_crawl_config(config.crawler)?
//!         .with_subscriber(HtmlCrawlerSubscriber::new());
//!     escargot.crawl().await?;
//!
//!     println!("Sent {} requests for job {}", escargot.requests_sent(), escargot.job_id());
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod escargot;
pub mod queue;
pub mod subscriber;
pub mod transport;
pub mod uri;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clock::{Clock, MockClock, SystemClock};
    pub use crate::config::{Config, CrawlConfig};
    pub use crate::error::{Error, ErrorCategory, EscargotErrorTrait, Result};
    pub use crate::escargot::{CrawlContext, Escargot};
    pub use crate::queue::{InMemoryQueue, LazyQueue, Queue, SqliteQueue};
    pub use crate::subscriber::{
        Decision, ExceptionSubscriber, FinishedCrawlingSubscriber, HtmlCrawlerSubscriber,
        Subscriber, TagValueResolvingSubscriber,
    };
    pub use crate::transport::{Chunk, Response};
    pub use crate::uri::{BaseUriCollection, CrawlUri};
}

// Direct re-exports for convenience
pub use escargot::{CrawlContext, Escargot};
pub use queue::{InMemoryQueue, LazyQueue, Queue, SqliteQueue};
pub use subscriber::{Decision, HtmlCrawlerSubscriber, Subscriber};
pub use uri::{BaseUriCollection, CrawlUri};
