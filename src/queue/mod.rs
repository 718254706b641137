//! Work queues for crawl jobs
//!
//! A queue owns every job: its base URIs and the ordered, deduplicated
//! sequence of [`CrawlUri`]s discovered while crawling. Backends:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Escargot                             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  Arc<dyn Queue>
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │  InMemoryQueue  │ │   SqliteQueue   │ │    LazyQueue    │
//! │  (reference)    │ │  (persistent)   │ │ primary + secondary
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//! ```
//!
//! Every backend keeps the same contract:
//!
//! - `add` is an idempotent upsert keyed by the normalized URI; the first
//!   insertion fixes `level` and `found_on`, later ones only update the
//!   processed flag and the tags
//! - `get_next` returns the earliest inserted unprocessed entry after skipping
//!   `skip` unprocessed entries and never mutates the queue
//! - storage errors propagate as [`QueueError`]

pub mod error;
mod lazy;
mod memory;
mod sqlite;

pub use error::{QueueError, QueueResult};
pub use lazy::LazyQueue;
pub use memory::InMemoryQueue;
pub use sqlite::{JobIdGenerator, SqliteQueue};

use url::Url;

use crate::uri::{BaseUriCollection, CrawlUri};

/// Opaque job identifier allocated by a queue (at most 128 characters)
pub type JobId = String;

/// Storage of crawl jobs
pub trait Queue: Send + Sync {
    /// Allocate a job and seed its base URIs as unprocessed level 0 entries
    fn create_job_id(&self, base_uris: &BaseUriCollection) -> QueueResult<JobId>;

    fn is_job_id_valid(&self, job_id: &str) -> QueueResult<bool>;

    fn delete_job_id(&self, job_id: &str) -> QueueResult<()>;

    fn get_base_uris(&self, job_id: &str) -> QueueResult<BaseUriCollection>;

    /// Exact lookup by normalized URI
    fn get(&self, job_id: &str, uri: &Url) -> QueueResult<Option<CrawlUri>>;

    /// Insert or update an entry
    fn add(&self, job_id: &str, crawl_uri: &CrawlUri) -> QueueResult<()>;

    /// Earliest inserted unprocessed entry after skipping `skip` of them
    fn get_next(&self, job_id: &str, skip: usize) -> QueueResult<Option<CrawlUri>>;

    fn count_all(&self, job_id: &str) -> QueueResult<usize>;

    fn count_pending(&self, job_id: &str) -> QueueResult<usize>;

    /// All entries in insertion order
    fn get_all(&self, job_id: &str) -> QueueResult<Vec<CrawlUri>>;

    /// Flush buffered state to durable storage
    fn commit(&self, _job_id: &str) -> QueueResult<()> {
        Ok(())
    }
}
