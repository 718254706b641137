use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use url::Url;

use super::{JobId, Queue, QueueResult};
use crate::uri::{BaseUriCollection, CrawlUri};

#[derive(Debug)]
struct MappedJob {
    primary_job_id: JobId,
    to_skip: usize,
    /// URIs counted in `to_skip` during this run, kept across commits
    counted: HashSet<String>,
    /// Leading secondary pending entries all known to the primary
    cursor: usize,
}

impl MappedJob {
    fn new(primary_job_id: JobId) -> Self {
        Self {
            primary_job_id,
            to_skip: 0,
            counted: HashSet::new(),
            cursor: 0,
        }
    }

    fn reset(&mut self) {
        self.to_skip = 0;
        self.cursor = 0;
    }
}

/// Two-tier queue: a fast primary in front of a durable secondary
///
/// Job ids always belong to the secondary. Each one lazily maps to a primary
/// job, created on first use and seeded with the secondary's base URIs (base
/// URIs already processed in the secondary are mirrored as processed). Reads
/// fall through to the secondary and backfill the primary, writes go to the
/// primary only until [`Queue::commit`] copies them over.
pub struct LazyQueue {
    primary: Arc<dyn Queue>,
    secondary: Arc<dyn Queue>,
    jobs: Mutex<HashMap<JobId, MappedJob>>,
}

impl std::fmt::Debug for LazyQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyQueue")
            .field("jobs", &self.jobs)
            .finish_non_exhaustive()
    }
}

impl LazyQueue {
    pub fn new(primary: Arc<dyn Queue>, secondary: Arc<dyn Queue>) -> Self {
        Self {
            primary,
            secondary,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Distinct entries marked processed during this run and added since the
    /// last commit
    ///
    /// Entries that were already processed when loaded never count, and
    /// writing the same entry back again does not count twice.
    pub fn to_skip(&self, job_id: &str) -> QueueResult<usize> {
        Ok(self
            .jobs
            .lock()?
            .get(job_id)
            .map_or(0, |job| job.to_skip))
    }

    /// Primary job a job id is mapped to, if it has been used yet
    pub fn mapped_job_id(&self, job_id: &str) -> QueueResult<Option<JobId>> {
        Ok(self
            .jobs
            .lock()?
            .get(job_id)
            .map(|job| job.primary_job_id.clone()))
    }

    fn cursor(&self, job_id: &str) -> QueueResult<usize> {
        Ok(self.jobs.lock()?.get(job_id).map_or(0, |job| job.cursor))
    }

    fn set_cursor(&self, job_id: &str, cursor: usize) -> QueueResult<()> {
        if let Some(job) = self.jobs.lock()?.get_mut(job_id) {
            job.cursor = cursor;
        }
        Ok(())
    }

    fn primary_job_id(&self, job_id: &str) -> QueueResult<JobId> {
        let mut jobs = self.jobs.lock()?;
        if let Some(job) = jobs.get(job_id) {
            return Ok(job.primary_job_id.clone());
        }

        let base_uris = self.secondary.get_base_uris(job_id)?;
        let primary_job_id = self.primary.create_job_id(&base_uris)?;

        for uri in &base_uris {
            if let Some(stored) = self.secondary.get(job_id, uri)? {
                if stored.is_processed() {
                    self.primary.add(&primary_job_id, &stored)?;
                }
            }
        }

        tracing::debug!(
            job_id = %job_id,
            primary_job_id = %primary_job_id,
            "Mapped job to primary queue"
        );

        jobs.insert(job_id.to_string(), MappedJob::new(primary_job_id.clone()));

        Ok(primary_job_id)
    }

    fn backfill(&self, primary_job_id: &str, crawl_uri: &CrawlUri) -> QueueResult<()> {
        self.primary.add(primary_job_id, crawl_uri)
    }
}

impl Queue for LazyQueue {
    fn create_job_id(&self, base_uris: &BaseUriCollection) -> QueueResult<JobId> {
        self.secondary.create_job_id(base_uris)
    }

    fn is_job_id_valid(&self, job_id: &str) -> QueueResult<bool> {
        self.secondary.is_job_id_valid(job_id)
    }

    fn delete_job_id(&self, job_id: &str) -> QueueResult<()> {
        self.secondary.delete_job_id(job_id)?;

        let mapped = self.jobs.lock()?.remove(job_id);
        if let Some(job) = mapped {
            self.primary.delete_job_id(&job.primary_job_id)?;
        }

        Ok(())
    }

    fn get_base_uris(&self, job_id: &str) -> QueueResult<BaseUriCollection> {
        let primary_job_id = self.primary_job_id(job_id)?;
        self.primary.get_base_uris(&primary_job_id)
    }

    fn get(&self, job_id: &str, uri: &Url) -> QueueResult<Option<CrawlUri>> {
        let primary_job_id = self.primary_job_id(job_id)?;

        if let Some(crawl_uri) = self.primary.get(&primary_job_id, uri)? {
            return Ok(Some(crawl_uri));
        }

        let found = self.secondary.get(job_id, uri)?;
        if let Some(crawl_uri) = &found {
            self.backfill(&primary_job_id, crawl_uri)?;
        }

        Ok(found)
    }

    fn add(&self, job_id: &str, crawl_uri: &CrawlUri) -> QueueResult<()> {
        let primary_job_id = self.primary_job_id(job_id)?;
        self.primary.add(&primary_job_id, crawl_uri)?;

        if crawl_uri.was_marked_processed() {
            if let Some(job) = self.jobs.lock()?.get_mut(job_id) {
                if job.counted.insert(crawl_uri.uri().to_string()) {
                    job.to_skip += 1;
                }
            }
        }

        Ok(())
    }

    /// Primary first; on a miss, walk the secondary's pending entries and
    /// return the one at the remaining offset among those the primary does not
    /// know yet
    ///
    /// Entries the primary already holds are excluded from the walk whatever
    /// their state there, so processed-but-uncommitted entries are never
    /// handed out again and pending primary entries are not counted twice.
    /// The walk resumes after the prefix already known to the primary, so
    /// draining a job with `skip == 0` reads each secondary entry once.
    fn get_next(&self, job_id: &str, skip: usize) -> QueueResult<Option<CrawlUri>> {
        let primary_job_id = self.primary_job_id(job_id)?;

        if let Some(next) = self.primary.get_next(&primary_job_id, skip)? {
            return Ok(Some(next));
        }

        let mut remaining = skip.saturating_sub(self.primary.count_pending(&primary_job_id)?);
        let mut offset = self.cursor(job_id)?;
        let mut contiguous = true;

        while let Some(candidate) = self.secondary.get_next(job_id, offset)? {
            offset += 1;

            if self.primary.get(&primary_job_id, candidate.uri())?.is_some() {
                if contiguous {
                    self.set_cursor(job_id, offset)?;
                }
                continue;
            }

            if remaining == 0 {
                self.backfill(&primary_job_id, &candidate)?;
                if contiguous {
                    self.set_cursor(job_id, offset)?;
                }
                return Ok(Some(candidate));
            }
            remaining -= 1;
            contiguous = false;
        }

        Ok(None)
    }

    fn count_all(&self, job_id: &str) -> QueueResult<usize> {
        self.commit(job_id)?;
        self.secondary.count_all(job_id)
    }

    fn count_pending(&self, job_id: &str) -> QueueResult<usize> {
        self.commit(job_id)?;
        self.secondary.count_pending(job_id)
    }

    fn get_all(&self, job_id: &str) -> QueueResult<Vec<CrawlUri>> {
        self.commit(job_id)?;
        self.secondary.get_all(job_id)
    }

    /// Copy every primary entry of the job into the secondary
    fn commit(&self, job_id: &str) -> QueueResult<()> {
        let primary_job_id = match self.jobs.lock()?.get(job_id) {
            Some(job) => job.primary_job_id.clone(),
            None => return Ok(()),
        };

        let entries = self.primary.get_all(&primary_job_id)?;
        for crawl_uri in &entries {
            self.secondary.add(job_id, crawl_uri)?;
        }

        // Committed entries leave the secondary's pending list.
        if let Some(job) = self.jobs.lock()?.get_mut(job_id) {
            job.reset();
        }

        tracing::debug!(job_id = %job_id, entries = entries.len(), "Committed primary queue");
        Ok(())
    }
}
