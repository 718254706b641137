use std::collections::HashSet;

use url::Url;

use super::normalize_uri;

/// Deduplicated, order-preserving set of base (seed) URIs
#[derive(Debug, Clone, Default)]
pub struct BaseUriCollection {
    uris: Vec<Url>,
    seen: HashSet<String>,
}

impl BaseUriCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a URI after normalizing it; duplicates are ignored
    pub fn add(&mut self, uri: Url) -> &mut Self {
        let uri = normalize_uri(uri);
        if self.seen.insert(uri.to_string()) {
            self.uris.push(uri);
        }
        self
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.seen
            .contains(normalize_uri(uri.clone()).as_str())
    }

    /// Whether any base URI has the given host, used for same-site scoping
    pub fn contains_host(&self, host: &str) -> bool {
        self.uris.iter().any(|uri| uri.host_str() == Some(host))
    }

    /// New collection holding the URIs of both, `self` first
    pub fn merge_with(&self, other: &Self) -> Self {
        self.iter().chain(other.iter()).cloned().collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Url> {
        self.uris.iter()
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}

impl FromIterator<Url> for BaseUriCollection {
    fn from_iter<I: IntoIterator<Item = Url>>(iter: I) -> Self {
        let mut collection = Self::new();
        for uri in iter {
            collection.add(uri);
        }
        collection
    }
}

impl<'a> IntoIterator for &'a BaseUriCollection {
    type Item = &'a Url;
    type IntoIter = std::slice::Iter<'a, Url>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_add_deduplicates_normalized() {
        let mut collection = BaseUriCollection::new();
        collection
            .add(url("https://www.terminal42.ch"))
            .add(url("https://www.terminal42.ch/#foo"))
            .add(url("https://github.com/"));

        assert_eq!(collection.len(), 2);
        assert!(collection.contains(&url("https://www.terminal42.ch/")));
        assert!(collection.contains(&url("https://www.terminal42.ch#bar")));
        assert!(!collection.contains(&url("https://www.terminal42.ch/foo")));

        let ordered: Vec<_> = collection.iter().map(Url::as_str).collect();
        assert_eq!(ordered, ["https://www.terminal42.ch/", "https://github.com/"]);
    }

    #[test]
    fn test_contains_host() {
        let collection: BaseUriCollection = [url("https://www.terminal42.ch/foo")]
            .into_iter()
            .collect();

        assert!(collection.contains_host("www.terminal42.ch"));
        assert!(!collection.contains_host("terminal42.ch"));
    }

    #[test]
    fn test_merge_with() {
        let a: BaseUriCollection = [url("https://a.test"), url("https://b.test")]
            .into_iter()
            .collect();
        let b: BaseUriCollection = [url("https://b.test"), url("https://c.test")]
            .into_iter()
            .collect();

        let merged = a.merge_with(&b);
        assert_eq!(merged.len(), 3);
        assert_eq!(a.len(), 2);
        assert!(merged.contains(&url("https://c.test/")));
    }
}
