use std::sync::Arc;

use url::Url;

use crate::error::{Error, Result};
use crate::queue::{JobId, Queue};
use crate::uri::{BaseUriCollection, CrawlUri};

/// Live handle on the running job, handed to every subscriber callback
///
/// Gives subscribers the queue operations they need without access to the
/// scheduler itself.
#[derive(Clone)]
pub struct CrawlContext {
    pub(crate) queue: Arc<dyn Queue>,
    pub(crate) job_id: JobId,
    pub(crate) base_uris: BaseUriCollection,
    pub(crate) max_depth: u32,
    pub(crate) user_agent: String,
}

impl std::fmt::Debug for CrawlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlContext")
            .field("job_id", &self.job_id)
            .field("base_uris", &self.base_uris)
            .field("max_depth", &self.max_depth)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl CrawlContext {
    pub fn queue(&self) -> &Arc<dyn Queue> {
        &self.queue
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn base_uris(&self) -> &BaseUriCollection {
        &self.base_uris
    }

    /// Maximum depth, 0 meaning unbounded
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Whether URIs found on `found_on` would exceed the maximum depth
    ///
    /// Check this before doing expensive work like parsing a page for links.
    pub fn is_max_depth_reached(&self, found_on: &CrawlUri) -> bool {
        self.max_depth != 0 && found_on.level() >= self.max_depth
    }

    /// Add a URI discovered on `found_on`, one level below it
    ///
    /// Returns the existing entry unchanged when the URI is already queued.
    /// Adding below the maximum depth is a contract violation reported as
    /// [`Error::MaxDepthReached`].
    pub fn add_uri_to_queue(&self, uri: Url, found_on: &CrawlUri, processed: bool) -> Result<CrawlUri> {
        if self.is_max_depth_reached(found_on) {
            return Err(Error::MaxDepthReached {
                uri: uri.to_string(),
                level: found_on.level(),
                max_depth: self.max_depth,
            });
        }

        if let Some(existing) = self.get_crawl_uri(&uri)? {
            return Ok(existing);
        }

        let crawl_uri = CrawlUri::new(
            uri,
            found_on.level() + 1,
            processed,
            Some(found_on.uri().clone()),
        );
        self.queue.add(&self.job_id, &crawl_uri)?;

        Ok(crawl_uri)
    }

    pub fn get_crawl_uri(&self, uri: &Url) -> Result<Option<CrawlUri>> {
        Ok(self.queue.get(&self.job_id, uri)?)
    }

    /// Persist processed flag and tags of an entry obtained from this context
    pub fn update_crawl_uri(&self, crawl_uri: &CrawlUri) -> Result<()> {
        Ok(self.queue.add(&self.job_id, crawl_uri)?)
    }
}
