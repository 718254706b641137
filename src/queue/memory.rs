use std::collections::HashMap;
use std::sync::RwLock;

use url::Url;
use uuid::Uuid;

use super::{JobId, Queue, QueueError, QueueResult};
use crate::uri::{normalize_uri, BaseUriCollection, CrawlUri};

#[derive(Debug, Default)]
struct Job {
    base_uris: BaseUriCollection,
    entries: Vec<CrawlUri>,
    index: HashMap<String, usize>,
}

impl Job {
    fn upsert(&mut self, crawl_uri: &CrawlUri) {
        match self.index.get(crawl_uri.uri().as_str()) {
            Some(&pos) => self.entries[pos].merge_state(crawl_uri),
            None => {
                self.index
                    .insert(crawl_uri.uri().to_string(), self.entries.len());
                self.entries.push(crawl_uri.to_stored());
            }
        }
    }
}

/// Process-local queue; jobs vanish with the process
///
/// Entries live in insertion order with a URI index beside them, `get_next`
/// scans linearly.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs held
    pub fn len(&self) -> usize {
        self.jobs.read().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Queue for InMemoryQueue {
    fn create_job_id(&self, base_uris: &BaseUriCollection) -> QueueResult<JobId> {
        let job_id = Uuid::new_v4().simple().to_string();

        let mut job = Job {
            base_uris: base_uris.clone(),
            ..Job::default()
        };
        for uri in base_uris {
            job.upsert(&CrawlUri::base(uri.clone()));
        }

        self.jobs.write()?.insert(job_id.clone(), job);
        tracing::debug!(job_id = %job_id, base_uris = base_uris.len(), "Created in-memory job");

        Ok(job_id)
    }

    fn is_job_id_valid(&self, job_id: &str) -> QueueResult<bool> {
        Ok(self.jobs.read()?.contains_key(job_id))
    }

    fn delete_job_id(&self, job_id: &str) -> QueueResult<()> {
        self.jobs.write()?.remove(job_id);
        Ok(())
    }

    fn get_base_uris(&self, job_id: &str) -> QueueResult<BaseUriCollection> {
        self.jobs
            .read()?
            .get(job_id)
            .map(|job| job.base_uris.clone())
            .ok_or_else(|| QueueError::InvalidJobId(job_id.to_string()))
    }

    fn get(&self, job_id: &str, uri: &Url) -> QueueResult<Option<CrawlUri>> {
        let key = normalize_uri(uri.clone());
        let jobs = self.jobs.read()?;

        Ok(jobs.get(job_id).and_then(|job| {
            job.index
                .get(key.as_str())
                .map(|&pos| job.entries[pos].clone())
        }))
    }

    fn add(&self, job_id: &str, crawl_uri: &CrawlUri) -> QueueResult<()> {
        self.jobs
            .write()?
            .entry(job_id.to_string())
            .or_default()
            .upsert(crawl_uri);
        Ok(())
    }

    fn get_next(&self, job_id: &str, skip: usize) -> QueueResult<Option<CrawlUri>> {
        let jobs = self.jobs.read()?;

        Ok(jobs.get(job_id).and_then(|job| {
            job.entries
                .iter()
                .filter(|entry| !entry.is_processed())
                .nth(skip)
                .cloned()
        }))
    }

    fn count_all(&self, job_id: &str) -> QueueResult<usize> {
        Ok(self
            .jobs
            .read()?
            .get(job_id)
            .map_or(0, |job| job.entries.len()))
    }

    fn count_pending(&self, job_id: &str) -> QueueResult<usize> {
        Ok(self.jobs.read()?.get(job_id).map_or(0, |job| {
            job.entries.iter().filter(|e| !e.is_processed()).count()
        }))
    }

    fn get_all(&self, job_id: &str) -> QueueResult<Vec<CrawlUri>> {
        Ok(self
            .jobs
            .read()?
            .get(job_id)
            .map(|job| job.entries.clone())
            .unwrap_or_default())
    }
}
