use std::fmt;

use url::Url;

use super::normalize_uri;
use crate::utils::error::UriError;

/// A node in the crawl graph
///
/// Identity is the normalized URI. Tags are lightweight signals subscribers
/// leave for later stages and never change identity.
#[derive(Debug, Clone)]
pub struct CrawlUri {
    uri: Url,
    level: u32,
    processed: bool,
    was_marked_processed: bool,
    found_on: Option<Url>,
    tags: Vec<String>,
}

impl CrawlUri {
    /// Create a new crawl URI; both `uri` and `found_on` are normalized
    pub fn new(uri: Url, level: u32, processed: bool, found_on: Option<Url>) -> Self {
        Self {
            uri: normalize_uri(uri),
            level,
            processed,
            was_marked_processed: false,
            found_on: found_on.map(normalize_uri),
            tags: Vec::new(),
        }
    }

    /// Create an unprocessed level 0 entry for a base URI
    pub fn base(uri: Url) -> Self {
        Self::new(uri, 0, false, None)
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    /// Mark as processed
    ///
    /// Also records that processing happened during the lifetime of this value,
    /// see [`CrawlUri::was_marked_processed`].
    pub fn mark_processed(&mut self) -> &mut Self {
        self.processed = true;
        self.was_marked_processed = true;
        self
    }

    /// True only if [`CrawlUri::mark_processed`] was called on this value
    ///
    /// Entries loaded from storage as already processed return `false`.
    pub fn was_marked_processed(&self) -> bool {
        self.was_marked_processed
    }

    pub fn found_on(&self) -> Option<&Url> {
        self.found_on.as_ref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Add a tag; adding an existing tag is a no-op
    pub fn add_tag(&mut self, tag: &str) -> Result<&mut Self, UriError> {
        if tag.contains(',') {
            return Err(UriError::InvalidTag(tag.to_string()));
        }

        if !self.has_tag(tag) {
            self.tags.push(tag.to_string());
        }

        Ok(self)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn remove_tag(&mut self, tag: &str) -> &mut Self {
        self.tags.retain(|t| t != tag);
        self
    }

    /// Comma-joined tag list as persisted by relational queues
    pub fn joined_tags(&self) -> String {
        self.tags.join(",")
    }

    /// Copy as a queue would load it back: the per-process
    /// `was_marked_processed` flag is dropped
    pub(crate) fn to_stored(&self) -> Self {
        Self {
            was_marked_processed: false,
            ..self.clone()
        }
    }

    /// Rebuild an entry from persisted columns
    pub(crate) fn from_stored(
        uri: Url,
        level: u32,
        processed: bool,
        found_on: Option<Url>,
        tags: &str,
    ) -> Result<Self, UriError> {
        let mut crawl_uri = Self::new(uri, level, processed, found_on);
        for tag in tags.split(',').filter(|t| !t.is_empty()) {
            crawl_uri.add_tag(tag)?;
        }
        Ok(crawl_uri)
    }

    /// Take over the mutable state of a later copy of the same entry
    pub(crate) fn merge_state(&mut self, other: &Self) {
        self.processed = other.processed;
        self.tags.clone_from(&other.tags);
    }
}

impl fmt::Display for CrawlUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "URI: {} (Level: {}, Processed: {}, Found on: {}, Tags: {})",
            self.uri,
            self.level,
            if self.processed { "yes" } else { "no" },
            self.found_on
                .as_ref()
                .map_or_else(|| "root".to_string(), Url::to_string),
            if self.tags.is_empty() {
                "none".to_string()
            } else {
                self.tags.join(", ")
            }
        )
    }
}
